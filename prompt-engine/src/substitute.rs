//! Placeholder substitution over template text.

use std::collections::HashMap;

use crate::template::strict_spans;

/// Caller-supplied mapping from parameter name to replacement value.
///
/// How the values were collected (and whether they persist anywhere) is the
/// caller's concern; the engine consumes the finished map once per pass.
pub type SubstitutionMap = HashMap<String, String>;

/// Replaces every placeholder whose name has an entry in `values`.
///
/// Replacement is keyed on the name alone: an occurrence's declared kind
/// and options are ignored, and the value is inserted verbatim with no
/// escaping or re-validation. Placeholders whose name is absent from the
/// map are left untouched, and every occurrence of one name receives the
/// same value. Total over all inputs; never fails.
#[must_use]
pub fn substitute(template: &str, values: &SubstitutionMap) -> String {
    let spans = strict_spans(template);
    if spans.is_empty() {
        return template.to_owned();
    }

    let mut result = String::with_capacity(template.len());
    let mut cursor = 0;
    for span in spans {
        let body = span.body(template);
        let name = body.split_once('|').map_or(body, |(name, _)| name).trim();
        if let Some(value) = values.get(name) {
            result.push_str(&template[cursor..span.start]);
            result.push_str(value);
            cursor = span.end;
        }
    }
    result.push_str(&template[cursor..]);
    result
}
