//! `%(name)` placeholder expansion for regex definitions.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ClassifyError, ClassifyResult};

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%\((\w+)\)").unwrap());

/// Replace every `%(name)` in `template` with `placeholders[name]`, recursively.
///
/// Unknown names and self-referencing chains are errors.
pub fn expand_placeholders(
    template: &str,
    placeholders: &BTreeMap<String, String>,
) -> ClassifyResult<String> {
    expand(template, placeholders, &mut Vec::new())
}

fn expand(
    template: &str,
    placeholders: &BTreeMap<String, String>,
    active: &mut Vec<String>,
) -> ClassifyResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in RE_PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        if active.iter().any(|n| n == name) {
            let mut chain = active.clone();
            chain.push(name.to_string());
            return Err(ClassifyError::PlaceholderCycle(chain.join(" -> ")));
        }
        let value = placeholders
            .get(name)
            .ok_or_else(|| ClassifyError::UnknownPlaceholder(name.to_string()))?;

        active.push(name.to_string());
        let expanded = expand(value, placeholders, active)?;
        active.pop();

        out.push_str(&template[last..whole.start()]);
        out.push_str(&expanded);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}
