/// Normalises a property, header or scheme name into the snake_case form the
/// host configuration language expects.
///
/// - `camelCase`: `"ipAddress"` -> "ip_address"
/// - Hyphens: `"X-Request-ID"` -> "x_request_id"
/// - Already normalised names are returned unchanged
///
/// A word boundary is only inserted before an uppercase character that follows
/// a lowercase one, so acronyms stay glued together (`"HTTPServer"` -> "httpserver").
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut last_was_lower = false;

    for ch in s.chars() {
        match ch {
            '-' => {
                result.push('_');
                last_was_lower = false;
            }
            c if c.is_uppercase() => {
                if last_was_lower {
                    result.push('_');
                }
                for lower_ch in c.to_lowercase() {
                    result.push(lower_ch);
                }
                last_was_lower = false;
            }
            c => {
                result.push(c);
                last_was_lower = c.is_lowercase();
            }
        }
    }

    result
}

/// Splits a comma separated extension value, trimming entries and dropping empty ones
#[must_use]
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("ipAddress"), "ip_address");
        assert_eq!(to_snake_case("X-Request-ID"), "x_request_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("Id"), "id");
        assert_eq!(to_snake_case("HTTPServer"), "httpserver");
        assert_eq!(to_snake_case("objectPropertyName"), "object_property_name");
        assert_eq!(to_snake_case("label1Name"), "label1name");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_to_snake_case_is_idempotent() {
        for input in [
            "ipAddress",
            "X-Request-ID",
            "someLongCamelCaseName",
            "mixed-Case_nameHere",
            "ÄpfelBaum",
        ] {
            let once = to_snake_case(input);
            assert_eq!(to_snake_case(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv("us, eu"), vec!["us", "eu"]);
        assert_eq!(split_csv(" deployed ,, ready "), vec!["deployed", "ready"]);
        assert!(split_csv(" , ").is_empty());
        assert!(split_csv("").is_empty());
    }
}
