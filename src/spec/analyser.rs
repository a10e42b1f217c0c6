//! Scans a document for resource- and data-source-compliant endpoints.
//!
//! Paths that fail the compliance rules or do not compile are skipped with a
//! warning; only document-level contract violations abort the analysis.

use crate::constants;
use crate::error::Error;
use crate::spec::backend::BackendConfiguration;
use crate::spec::headers::{collect_document_headers, HeaderParameter};
use crate::spec::model::{Operation, PathItem, Schema, SwaggerDocument};
use crate::spec::paths::{
    find_root_path, is_instance_path, multi_region_keyword, parse_parent_chain,
    parse_resource_name, resolve_region_host, ParentChain,
};
use crate::spec::resource::{
    DataSource, ParentInfo, Resource, ResourceHost, ResourceOperation, ResourceOperations,
    ResourceSource,
};
use crate::spec::schema::SchemaCompiler;
use crate::spec::security::SecuritySchemes;
use crate::utils::to_snake_case;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A path that was not exported, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    pub path: String,
    pub reason: String,
}

/// Everything the provider is built from
#[derive(Debug, Clone)]
pub struct Analysis {
    pub resources: Vec<Arc<Resource>>,
    pub data_sources: Vec<Arc<DataSource>>,
    pub skipped: Vec<SkippedPath>,
    pub backend: BackendConfiguration,
    pub security: SecuritySchemes,
    pub headers: Vec<HeaderParameter>,
}

impl Analysis {
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Arc<Resource>> {
        self.resources.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn data_source(&self, name: &str) -> Option<&Arc<DataSource>> {
        self.data_sources.iter().find(|d| d.name == name)
    }
}

/// Endpoints backing a compliant resource path
struct Candidate<'d> {
    root_path: String,
    root_item: &'d PathItem,
    instance_item: &'d PathItem,
    post: &'d Operation,
    schema: Schema,
}

pub struct SpecAnalyser<'d> {
    document: &'d SwaggerDocument,
    document_url: &'d str,
    compiler: SchemaCompiler<'d>,
    security: SecuritySchemes,
}

impl<'d> SpecAnalyser<'d> {
    #[must_use]
    pub fn new(document: &'d SwaggerDocument, document_url: &'d str) -> Self {
        Self {
            document,
            document_url,
            compiler: SchemaCompiler::new(&document.definitions),
            security: SecuritySchemes::from_document(document),
        }
    }

    /// Runs the analysis.
    ///
    /// # Errors
    ///
    /// Returns `DocumentValidation` when the backend cannot be resolved or a
    /// multi-region resource host has no regions list.
    pub fn analyse(&self) -> Result<Analysis, Error> {
        let backend = BackendConfiguration::from_document(self.document, self.document_url)?;

        let mut resources: Vec<Arc<Resource>> = Vec::new();
        let mut data_sources: Vec<Arc<DataSource>> = Vec::new();
        let mut skipped = Vec::new();
        let mut names = HashSet::new();

        for path in self.document.paths.keys() {
            if is_instance_path(path) {
                match self.build_resources(path) {
                    Ok(built) => {
                        for resource in built {
                            if names.insert(resource.name.clone()) {
                                debug!(
                                    "compiled resource '{}' from {path} ({} properties)",
                                    resource.name,
                                    resource.schema.properties.len()
                                );
                                resources.push(Arc::new(resource));
                            } else {
                                let reason = format!("duplicate resource name '{}'", resource.name);
                                warn!("skipping {path}: {reason}");
                                skipped.push(SkippedPath {
                                    path: path.clone(),
                                    reason,
                                });
                            }
                        }
                    }
                    Err(e) if e.is_compilation() => {
                        warn!("skipping {path}: {e}");
                        skipped.push(SkippedPath {
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            } else {
                match self.build_data_source(path) {
                    Ok(Some(data_source)) => {
                        if data_sources.iter().any(|d| d.name == data_source.name) {
                            warn!(
                                "skipping data source {path}: duplicate name '{}'",
                                data_source.name
                            );
                        } else {
                            data_sources.push(Arc::new(data_source));
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_compilation() => {
                        warn!("skipping data source {path}: {e}");
                        skipped.push(SkippedPath {
                            path: path.clone(),
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(Analysis {
            resources,
            data_sources,
            skipped,
            backend,
            security: self.security.clone(),
            headers: collect_document_headers(self.document),
        })
    }

    fn known_paths(&self) -> Vec<&str> {
        self.document.paths.keys().map(String::as_str).collect()
    }

    fn candidate(&self, instance_path: &str) -> Result<Candidate<'d>, Error> {
        let fail = |reason: &str| Error::resource_compilation(instance_path, reason);

        if !is_instance_path(instance_path) {
            return Err(fail("not an instance path"));
        }
        let instance_item = self
            .document
            .paths
            .get(instance_path)
            .ok_or_else(|| fail("path is not defined"))?;

        let has_object_get = instance_item
            .get
            .as_ref()
            .and_then(|get| get.response(200))
            .and_then(|r| r.schema.as_ref())
            .is_some_and(Schema::is_object);
        if !has_object_get {
            return Err(fail("missing GET operation with a 200 object response"));
        }

        let root_path = find_root_path(instance_path, &self.known_paths())?;
        let root_item = &self.document.paths[root_path.as_str()];
        let post = root_item
            .post
            .as_ref()
            .ok_or_else(|| fail("root path has no POST operation"))?;

        let response = post.success_response_schema().filter(|s| s.has_properties());
        let schema = match (post.body_schema(), response) {
            (Some(body), _) if !body.has_properties() => {
                return Err(fail("POST body schema has no properties"))
            }
            (Some(body), Some(response)) if body.canonical() != response.canonical() => {
                merge_schemas(body, response).map_err(|e| e.in_resource(instance_path))?
            }
            (Some(body), _) => body.clone(),
            (None, Some(response)) => {
                if let Some((name, _)) = response.properties.iter().find(|(_, p)| !p.read_only) {
                    return Err(fail(&format!(
                        "POST has no body and response property '{name}' is not readOnly"
                    )));
                }
                response.clone()
            }
            (None, None) => {
                return Err(fail(
                    "POST has neither a body nor a successful response schema with properties",
                ))
            }
        };

        Ok(Candidate {
            root_path,
            root_item,
            instance_item,
            post,
            schema,
        })
    }

    fn build_resources(&self, instance_path: &str) -> Result<Vec<Resource>, Error> {
        let candidate = self.candidate(instance_path)?;

        let schema = self
            .compiler
            .compile_definition(&candidate.schema)
            .map_err(|e| e.in_resource(instance_path))?;
        schema
            .validate_identifier()
            .map_err(|e| e.in_resource(instance_path))?;

        let chain = parse_parent_chain(instance_path)?;
        let (parent_names, source) = self.parents_of(instance_path, &chain)?;
        let own = parse_resource_name(&candidate.root_path)?
            .render(preferred_name(Some(candidate.post)));
        let name = join_name(&parent_names, &own);

        let operations = self
            .operations(&candidate)
            .map_err(|e| e.in_resource(&name))?;
        let should_ignore = candidate
            .post
            .extensions
            .get_bool(constants::EXT_EXCLUDE_RESOURCE);
        let schema = Arc::new(schema);

        let hosts = self.resource_hosts(&name, candidate.post)?;
        Ok(hosts
            .into_iter()
            .map(|(name, host)| Resource {
                name,
                root_path: candidate.root_path.clone(),
                instance_path: instance_path.to_string(),
                schema: Arc::clone(&schema),
                operations: operations.clone(),
                host,
                source: source.clone(),
                should_ignore,
            })
            .collect())
    }

    fn operations(&self, candidate: &Candidate<'_>) -> Result<ResourceOperations, Error> {
        let instance = candidate.instance_item;
        let compile = |op: &Operation, item: &PathItem| {
            ResourceOperation::from_operation(op, &item.parameters, &self.security)
        };

        Ok(ResourceOperations {
            post: compile(candidate.post, candidate.root_item)?,
            get: instance
                .get
                .as_ref()
                .map(|op| compile(op, instance))
                .transpose()?
                .unwrap_or_default(),
            put: instance.put.as_ref().map(|op| compile(op, instance)).transpose()?,
            delete: instance
                .delete
                .as_ref()
                .map(|op| compile(op, instance))
                .transpose()?,
        })
    }

    /// Validates the ancestors of a (possible) sub-resource and names them
    fn parents_of(
        &self,
        path: &str,
        chain: &ParentChain,
    ) -> Result<(Vec<String>, ResourceSource), Error> {
        if !chain.is_sub_resource() {
            return Ok((Vec::new(), ResourceSource::Plain));
        }

        let mut names = Vec::new();
        let mut parents = Vec::new();
        for parent in &chain.parents {
            let root_item = self.path_item(&parent.root_path).ok_or_else(|| {
                Error::resource_compilation(
                    path,
                    format!("parent root path '{}' is not defined", parent.root_path),
                )
            })?;
            if self.path_item(&parent.instance_path).is_none() {
                return Err(Error::resource_compilation(
                    path,
                    format!("parent instance path '{}' is not defined", parent.instance_path),
                ));
            }
            let excluded = root_item
                .post
                .as_ref()
                .is_some_and(|post| post.extensions.get_bool(constants::EXT_EXCLUDE_RESOURCE));
            if excluded {
                return Err(Error::resource_compilation(
                    path,
                    format!("parent '{}' is excluded", parent.root_path),
                ));
            }

            names.push(
                parse_resource_name(&parent.root_path)?
                    .render(preferred_name(root_item.post.as_ref())),
            );
            parents.push(ParentInfo {
                resource_name: names.join("_"),
                root_path: parent.root_path.clone(),
                instance_path: parent.instance_path.clone(),
            });
        }

        Ok((names, ResourceSource::SubResource { parents }))
    }

    /// The path item at `path`, tolerating a trailing slash mismatch
    fn path_item(&self, path: &str) -> Option<&'d PathItem> {
        let paths = &self.document.paths;
        paths
            .get(path)
            .or_else(|| paths.get(format!("{path}/").as_str()))
            .or_else(|| paths.get(path.trim_end_matches('/')))
    }

    /// One `(name, host)` pair per resource to emit
    fn resource_hosts(
        &self,
        name: &str,
        post: &Operation,
    ) -> Result<Vec<(String, ResourceHost)>, Error> {
        let Some(host) = post
            .extensions
            .get_str(constants::EXT_RESOURCE_HOST)
            .map(str::trim)
            .filter(|h| !h.is_empty())
        else {
            return Ok(vec![(name.to_string(), ResourceHost::Global)]);
        };

        let Some(keyword) = multi_region_keyword(host) else {
            return Ok(vec![(
                name.to_string(),
                ResourceHost::Override(host.to_string()),
            )]);
        };

        let key = format!("{}{keyword}", constants::EXT_RESOURCE_REGIONS_PREFIX);
        let regions = self.document.extensions.get_csv(&key).ok_or_else(|| {
            Error::document_validation(format!(
                "resource '{name}' uses the multi-region host '{host}' but {key} is not declared"
            ))
        })?;
        if regions.is_empty() {
            return Err(Error::document_validation(format!(
                "resource '{name}' uses the multi-region host '{host}' but {key} is empty"
            )));
        }

        Ok(regions
            .into_iter()
            .map(|region| {
                let resolved = resolve_region_host(host, &keyword, &region);
                (
                    format!("{name}_{}", to_snake_case(&region)),
                    ResourceHost::Regional {
                        region,
                        host: resolved,
                    },
                )
            })
            .collect())
    }

    fn build_data_source(&self, path: &str) -> Result<Option<DataSource>, Error> {
        let Some(item) = self.document.paths.get(path) else {
            return Ok(None);
        };
        let Some(get) = item.get.as_ref() else {
            return Ok(None);
        };
        let Some(items) = get
            .response(200)
            .and_then(|r| r.schema.as_ref())
            .filter(|s| s.is_type(constants::TYPE_ARRAY))
            .and_then(|s| s.items.as_deref())
            .filter(|items| items.is_object() && items.has_properties())
        else {
            return Ok(None);
        };
        if get.extensions.get_bool(constants::EXT_EXCLUDE_RESOURCE) {
            return Ok(None);
        }

        let schema = self
            .compiler
            .compile_definition(items)
            .map_err(|e| e.in_resource(path))?;

        let chain = parse_parent_chain(path)?;
        let (parent_names, source) = self.parents_of(path, &chain)?;
        let preferred = preferred_name(item.post.as_ref().or(Some(get)));
        let own = parse_resource_name(path)?.render(preferred);
        let name = join_name(&parent_names, &own);

        let get = ResourceOperation::from_operation(get, &item.parameters, &self.security)
            .map_err(|e| e.in_resource(&name))?;
        let host = item
            .post
            .as_ref()
            .and_then(|post| post.extensions.get_str(constants::EXT_RESOURCE_HOST))
            .filter(|h| !h.trim().is_empty() && multi_region_keyword(h).is_none())
            .map_or(ResourceHost::Global, |h| ResourceHost::Override(h.trim().to_string()));

        Ok(Some(DataSource {
            name,
            path: path.to_string(),
            schema: Arc::new(schema),
            get,
            host,
            source,
        }))
    }
}

fn preferred_name(operation: Option<&Operation>) -> Option<&str> {
    operation
        .and_then(|op| op.extensions.get_str(constants::EXT_RESOURCE_NAME))
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

fn join_name(parents: &[String], own: &str) -> String {
    if parents.is_empty() {
        own.to_string()
    } else {
        format!("{}_{own}", parents.join("_"))
    }
}

/// Merges a POST request schema with its (different) response schema.
///
/// The response's properties become read-only unless the request supplies them;
/// request properties keep their input semantics, their vendor extensions are
/// unioned with the response's (response wins) and `required` is the request's.
///
/// # Errors
///
/// Returns `ResourceCompilation` when the response lacks a writable request property.
pub fn merge_schemas(request: &Schema, response: &Schema) -> Result<Schema, Error> {
    let missing: Vec<&str> = request
        .properties
        .iter()
        .filter(|(name, p)| !p.read_only && !response.properties.contains_key(*name))
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(Error::resource_compilation(
            "",
            format!(
                "response schema is missing request properties: {}",
                missing.join(", ")
            ),
        ));
    }

    let mut merged = response.clone();
    for (name, property) in &mut merged.properties {
        if property.read_only {
            continue;
        }
        let supplied = request
            .properties
            .get(name)
            .is_some_and(|p| !p.read_only);
        if !supplied {
            warn!("response property '{name}' is not in the request schema; treating it as readOnly");
        }
        property.read_only = true;
    }

    for (name, requested) in request.properties.iter().filter(|(_, p)| !p.read_only) {
        let mut property = requested.clone();
        if let Some(returned) = response.properties.get(name) {
            property.extensions.merge_from(&returned.extensions);
        }
        merged.properties.insert(name.clone(), property);
    }
    merged.required.clone_from(&request.required);

    Ok(merged)
}
