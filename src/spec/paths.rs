//! Path utilities: instance paths, root paths, resource names, parent chains
//! and multi-region host templates.

use crate::error::Error;
use regex::Regex;
use std::sync::LazyLock;

static INSTANCE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*\{.+\}/?$").expect("hard-coded regex is valid"));

static TRAILING_PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)/\{[^/{}]+\}/?$").expect("hard-coded regex is valid"));

static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v(\d+)$").expect("hard-coded regex is valid"));

static PARENT_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/(?:\w+/)??(?:v\d+/)?[\w-]+)/\{([^/{}]+)\}").expect("hard-coded regex is valid")
});

static MULTI_REGION_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*[.\-])\$\{(\w+)\}([.\-].*)$").expect("hard-coded regex is valid")
});

/// True for paths ending in a path parameter, e.g. `/v1/cdns/{id}`
#[must_use]
pub fn is_instance_path(path: &str) -> bool {
    INSTANCE_PATH.is_match(path)
}

/// Finds the collection path for an instance path.
///
/// The trailing `/{param}` is stripped and the result is accepted with or
/// without a trailing slash, whichever the document declares.
///
/// # Errors
///
/// Returns an error when the path is not an instance path or neither candidate is known.
pub fn find_root_path(instance_path: &str, known_paths: &[&str]) -> Result<String, Error> {
    let root = TRAILING_PARAMETER
        .captures(instance_path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            Error::resource_compilation(instance_path, "path is not an instance path")
        })?;

    let with_slash = format!("{root}/");
    let found = [root, with_slash.as_str()]
        .into_iter()
        .find(|candidate| known_paths.contains(candidate))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::resource_compilation(
                instance_path,
                format!("root path '{root}' is not defined in the document"),
            )
        });
    found
}

/// Base name and version of a resource derived from its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePathName {
    pub base: String,
    pub version: Option<String>,
}

impl ResourcePathName {
    /// Joins the base (or a preferred replacement) with the version suffix
    #[must_use]
    pub fn render(&self, preferred_base: Option<&str>) -> String {
        let base = preferred_base.unwrap_or(&self.base);
        self.version
            .as_ref()
            .map_or_else(|| base.to_string(), |v| format!("{base}_v{v}"))
    }
}

/// Splits a resource path into its base name and the version segment directly above it.
///
/// # Errors
///
/// Returns an error if the path has no non-parameter segment.
pub fn parse_resource_name(path: &str) -> Result<ResourcePathName, Error> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (index, base) = segments
        .iter()
        .enumerate()
        .rev()
        .find(|(_, segment)| !is_parameter_segment(segment))
        .ok_or_else(|| Error::resource_compilation(path, "could not derive a resource name"))?;

    let version = index
        .checked_sub(1)
        .and_then(|i| VERSION_SEGMENT.captures(segments[i]))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Ok(ResourcePathName {
        base: (*base).to_string(),
        version,
    })
}

/// Resource name of a path, e.g. `/v1/cdns/{id}` -> `cdns_v1`
///
/// # Errors
///
/// Returns an error if the path has no non-parameter segment.
pub fn extract_resource_name(path: &str) -> Result<String, Error> {
    parse_resource_name(path).map(|name| name.render(None))
}

fn is_parameter_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// One ancestor of a sub-resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentPath {
    pub name: String,
    pub root_path: String,
    pub instance_path: String,
    pub parameter: String,
}

/// Ancestors of a sub-resource (outermost first) plus the sub-resource's own tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChain {
    pub parents: Vec<ParentPath>,
    pub tail: String,
}

impl ParentChain {
    #[must_use]
    pub fn is_sub_resource(&self) -> bool {
        !self.parents.is_empty()
    }

    /// Rebuilds the full path the chain was parsed from
    #[must_use]
    pub fn join(&self) -> String {
        let prefix = self
            .parents
            .last()
            .map_or("", |parent| parent.instance_path.as_str());
        format!("{prefix}{}", self.tail)
    }
}

/// Splits a (root or instance) sub-resource path into its parents, left to right.
///
/// `/v1/cdns/{id}/v1/firewalls` yields one parent (`/v1/cdns`, `/v1/cdns/{id}`)
/// and the tail `/v1/firewalls`. A path without parent segments yields an empty
/// chain whose tail is the whole path.
///
/// # Errors
///
/// Returns an error if a parent name cannot be derived.
pub fn parse_parent_chain(path: &str) -> Result<ParentChain, Error> {
    let mut parents = Vec::new();
    let mut consumed = 0;

    for caps in PARENT_SEGMENT.captures_iter(path) {
        let (Some(whole), Some(segment), Some(parameter)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        // The sub-resource's own `/{id}` is not a parent
        if whole.end() == path.trim_end_matches('/').len() {
            break;
        }

        let root_path = path[..segment.end()].to_string();
        let instance_path = path[..whole.end()].to_string();
        parents.push(ParentPath {
            name: extract_resource_name(segment.as_str())?,
            root_path,
            instance_path,
            parameter: parameter.as_str().to_string(),
        });
        consumed = whole.end();
    }

    Ok(ParentChain {
        parents,
        tail: path[consumed..].to_string(),
    })
}

/// Detects multi-region host templates such as `api.${region}.example.com`.
///
/// Returns the placeholder keyword when the host is a template.
#[must_use]
pub fn multi_region_keyword(host: &str) -> Option<String> {
    MULTI_REGION_HOST
        .captures(host)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Substitutes a region into a multi-region host template
#[must_use]
pub fn resolve_region_host(template: &str, keyword: &str, region: &str) -> String {
    template.replace(&format!("${{{keyword}}}"), region)
}
