//! Compiles the named line regexes of a configuration.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{ClassifyError, ClassifyResult};
use crate::placeholders::expand_placeholders;

/// Prefix marking a regex definition as a placeholder rather than a parser.
pub const PLACEHOLDER_PREFIX: &str = "__";

const REQUIRED_GROUPS: [&str; 2] = ["source", "message"];

/// Compile every non-placeholder definition in `definitions`.
///
/// Definitions named `__foo` are placeholders, referenced as `%(foo)` from
/// the others. Each compiled regex must define the `source` and `message`
/// named groups.
pub fn compile_regexps(
    definitions: &BTreeMap<String, String>,
) -> ClassifyResult<BTreeMap<String, Regex>> {
    let placeholders: BTreeMap<String, String> = definitions
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(PLACEHOLDER_PREFIX)
                .map(|short| (short.to_string(), value.clone()))
        })
        .collect();

    let mut compiled = BTreeMap::new();
    for (name, template) in definitions {
        if name.starts_with(PLACEHOLDER_PREFIX) {
            continue;
        }
        let source = expand_placeholders(template, &placeholders)?;
        let regex = Regex::new(&source).map_err(|e| ClassifyError::Regex {
            name: name.clone(),
            message: e.to_string(),
        })?;
        let has_groups = REQUIRED_GROUPS
            .iter()
            .all(|group| regex.capture_names().flatten().any(|n| n == *group));
        if !has_groups {
            return Err(ClassifyError::MissingGroups { name: name.clone() });
        }
        compiled.insert(name.clone(), regex);
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn placeholders_are_expanded_and_skipped() {
        let compiled =
            compile_regexps(&defs(&[("__msg", "(?P<message>.)"), ("test", "(?P<source>.)%(msg)")]))
                .unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled["test"].as_str(), "(?P<source>.)(?P<message>.)");
    }

    #[test]
    fn groups_are_required() {
        assert!(matches!(
            compile_regexps(&defs(&[("test", "foo")])),
            Err(ClassifyError::MissingGroups { name }) if name == "test"
        ));
        assert!(matches!(
            compile_regexps(&defs(&[("test", "(?P<source>.)")])),
            Err(ClassifyError::MissingGroups { .. })
        ));
    }

    #[test]
    fn invalid_regex() {
        assert!(matches!(
            compile_regexps(&defs(&[("test", "???(?P<source>.)(?P<message>.)")])),
            Err(ClassifyError::Regex { .. })
        ));
    }

    #[test]
    fn invalid_placeholder() {
        assert!(matches!(
            compile_regexps(&defs(&[("test", "%(none)(?P<source>.)(?P<message>.)")])),
            Err(ClassifyError::UnknownPlaceholder(_))
        ));
    }
}
