//! Placeholder grammar parsing for prompt templates.
//!
//! Templates embed typed substitution points using `{{ name }}`,
//! `{{ name | kind }}`, and `{{ name | kind : options }}` forms. The body
//! between the delimiters must not itself contain a delimiter character;
//! the only fatal condition is a placeholder opened inside another
//! placeholder's span.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias for template parsing.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Year range applied when a `year` parameter declares no bounds.
const DEFAULT_YEAR_SPAN: u32 = 5;

/// Errors raised while validating template text.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder was opened inside another placeholder's span.
    #[error("nested placeholder `{inner}` inside `{outer}`")]
    NestedPlaceholder {
        /// Text of the enclosing placeholder span.
        outer: String,
        /// Text of the contained placeholder span.
        inner: String,
    },
}

/// Declared input type of a placeholder.
///
/// Unrecognised kind strings are preserved verbatim in
/// [`ParameterKind::Other`] so newer authoring surfaces can introduce kinds
/// without breaking older parsers; rendering layers fall back to plain-text
/// treatment for them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterKind {
    /// Single-line free text (the default).
    Text,
    /// Multi-line free text.
    Multiline,
    /// Numeric input.
    Number,
    /// Calendar date, optionally with a display format.
    Date,
    /// Time of day, optionally with a display format.
    Time,
    /// Month selection, optionally with a display format.
    Month,
    /// Year selection bounded by past and future ranges.
    Year,
    /// Email address.
    Email,
    /// URL input.
    Url,
    /// Single choice from a fixed option list (`radio` normalises here).
    Select,
    /// Multiple choices from a fixed option list.
    MultiSelect,
    /// Checkbox choice; a bare declaration gets a boolean option pair at
    /// render time.
    Checkbox,
    /// File attachment reference.
    File,
    /// Any kind string this parser does not recognise.
    Other(String),
}

impl ParameterKind {
    /// Returns true for kinds backed by a fixed option list.
    #[must_use]
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect | Self::Checkbox)
    }

    /// Returns true for kinds that carry a display format.
    #[must_use]
    pub fn has_format(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Month)
    }
}

impl From<String> for ParameterKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => Self::Text,
            "multiline" => Self::Multiline,
            "number" => Self::Number,
            "date" => Self::Date,
            "time" => Self::Time,
            "month" => Self::Month,
            "year" => Self::Year,
            "email" => Self::Email,
            "url" => Self::Url,
            "select" | "radio" => Self::Select,
            "multiselect" => Self::MultiSelect,
            "checkbox" => Self::Checkbox,
            "file" => Self::File,
            _ => Self::Other(value),
        }
    }
}

impl From<ParameterKind> for String {
    fn from(kind: ParameterKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Multiline => f.write_str("multiline"),
            Self::Number => f.write_str("number"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::Month => f.write_str("month"),
            Self::Year => f.write_str("year"),
            Self::Email => f.write_str("email"),
            Self::Url => f.write_str("url"),
            Self::Select => f.write_str("select"),
            Self::MultiSelect => f.write_str("multiselect"),
            Self::Checkbox => f.write_str("checkbox"),
            Self::File => f.write_str("file"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// One discovered placeholder declaration.
///
/// Declarations are recomputed on every parse and never persisted; the
/// template text itself is the stored representation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Parameter name, trimmed, unique within one template.
    pub name: String,
    /// Declared input kind; `text` when unspecified.
    pub kind: ParameterKind,
    /// Option list for choice kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Display format for date, time, and month kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Years into the past offered by a year kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_years: Option<u32>,
    /// Years into the future offered by a year kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_years: Option<u32>,
}

impl ParameterDeclaration {
    fn plain(name: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            options: None,
            format: None,
            past_years: None,
            future_years: None,
        }
    }

    /// Returns the selectable options for choice kinds.
    ///
    /// A bare `checkbox` declaration receives the boolean pair here rather
    /// than at parse time, so the parsed declaration mirrors the template
    /// text exactly.
    #[must_use]
    pub fn effective_options(&self) -> Option<Vec<String>> {
        match (&self.kind, &self.options) {
            (_, Some(options)) => Some(options.clone()),
            (ParameterKind::Checkbox, None) => {
                Some(vec!["true".to_owned(), "false".to_owned()])
            }
            _ => None,
        }
    }
}

/// Half-open byte span of one placeholder occurrence, delimiters included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PlaceholderSpan {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl PlaceholderSpan {
    /// Body text between the delimiters.
    pub(crate) fn body<'t>(&self, template: &'t str) -> &'t str {
        &template[self.start + 2..self.end - 2]
    }
}

/// Parses every placeholder declaration out of `template`.
///
/// Scans for all non-overlapping spans whose body is free of delimiter
/// characters, then validates nesting across a more permissive span scan
/// before any declaration is extracted. Duplicate names keep the
/// first-seen declaration; an empty template, or one without placeholders,
/// yields an empty vector.
///
/// # Errors
///
/// Returns [`TemplateError::NestedPlaceholder`] when a placeholder span is
/// contained inside another placeholder's span.
pub fn parse_parameters(template: &str) -> TemplateResult<Vec<ParameterDeclaration>> {
    let spans = strict_spans(template);
    validate_nesting(template)?;

    let mut seen = HashSet::new();
    let mut declarations = Vec::new();
    for span in spans {
        let Some(declaration) = declaration_from_body(span.body(template)) else {
            continue;
        };
        if seen.insert(declaration.name.clone()) {
            declarations.push(declaration);
        }
    }
    Ok(declarations)
}

/// Finds every non-overlapping placeholder span whose body contains no
/// delimiter characters. Spans are byte-indexed; the delimiter bytes are
/// ASCII, so every index falls on a character boundary.
pub(crate) fn strict_spans(template: &str) -> Vec<PlaceholderSpan> {
    let bytes = template.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    'scan: while i + 1 < bytes.len() {
        if !(bytes[i] == b'{' && bytes[i + 1] == b'{') {
            i += 1;
            continue;
        }
        let open = i;
        let mut j = open + 2;
        while j < bytes.len() {
            match bytes[j] {
                b'}' if j + 1 < bytes.len() && bytes[j + 1] == b'}' => {
                    spans.push(PlaceholderSpan {
                        start: open,
                        end: j + 2,
                    });
                    i = j + 2;
                    continue 'scan;
                }
                // A delimiter character inside the body disqualifies this
                // span; resume scanning at the offending character.
                b'{' => {
                    i = j;
                    continue 'scan;
                }
                b'}' => {
                    i = j + 1;
                    continue 'scan;
                }
                _ => j += 1,
            }
        }
        break;
    }
    spans
}

/// Permissive span scan that rejects spans-within-spans.
///
/// An opening delimiter discovered while a span is still open is a nesting
/// conflict, provided a closing delimiter still exists somewhere ahead (an
/// unterminated tail is literal text, not a placeholder). A closing
/// delimiter with no open placeholder is likewise literal text.
fn validate_nesting(template: &str) -> TemplateResult<()> {
    let bytes = template.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if !(bytes[i] == b'{' && bytes[i + 1] == b'{') {
            i += 1;
            continue;
        }
        let open = i;
        let mut j = open + 2;
        loop {
            if j + 1 >= bytes.len() {
                // No closing delimiter anywhere after the open, so no
                // further span can form.
                return Ok(());
            }
            if bytes[j] == b'{' && bytes[j + 1] == b'{' {
                if template[j..].contains("}}") {
                    return Err(TemplateError::NestedPlaceholder {
                        outer: outer_snippet(template, open, j).to_owned(),
                        inner: delimited_snippet(template, j).to_owned(),
                    });
                }
                return Ok(());
            }
            if bytes[j] == b'}' && bytes[j + 1] == b'}' {
                i = j + 2;
                break;
            }
            j += 1;
        }
    }
    Ok(())
}

/// Text from `from` through the first closing delimiter, or to the end.
fn delimited_snippet(template: &str, from: usize) -> &str {
    template[from..]
        .find("}}")
        .map_or(&template[from..], |rel| &template[from..from + rel + 2])
}

/// Text of the enclosing span: from the outer open through the first close
/// after the inner span ends.
fn outer_snippet(template: &str, open: usize, inner_start: usize) -> &str {
    let inner_end = inner_start + delimited_snippet(template, inner_start).len();
    match template[inner_end..].find("}}") {
        Some(rel) => &template[open..inner_end + rel + 2],
        None => &template[open..],
    }
}

fn declaration_from_body(body: &str) -> Option<ParameterDeclaration> {
    let (name_part, decoration) = match body.split_once('|') {
        Some((name, rest)) => (name, Some(rest)),
        None => (body, None),
    };
    let name = name_part.trim();
    if name.is_empty() {
        return None;
    }

    let (kind_text, options_text) = match decoration {
        Some(rest) => match rest.split_once(':') {
            Some((kind, options)) => (kind.trim().to_lowercase(), Some(options)),
            None => (rest.trim().to_lowercase(), None),
        },
        None => (String::new(), None),
    };

    // The year sub-grammar lives in the kind position (`year-last-3`) or in
    // the options (`year : 2-1`), so it is handled before kind lookup.
    if kind_text == "year" || kind_text.starts_with("year-") {
        let (past, future) = year_bounds(&kind_text, options_text);
        let mut declaration = ParameterDeclaration::plain(name, ParameterKind::Year);
        declaration.past_years = Some(past);
        declaration.future_years = Some(future);
        return Some(declaration);
    }

    let kind = if kind_text.is_empty() {
        ParameterKind::Text
    } else {
        ParameterKind::from(kind_text)
    };

    let mut declaration = ParameterDeclaration::plain(name, kind);
    if declaration.kind.is_choice() {
        declaration.options = options_text.map(|options| {
            options
                .split(',')
                .map(|option| option.trim().to_owned())
                .collect()
        });
    } else if declaration.kind.has_format() {
        declaration.format = options_text.map(|format| format.trim().to_owned());
    }
    Some(declaration)
}

fn year_bounds(kind: &str, options: Option<&str>) -> (u32, u32) {
    if let Some(past) = kind
        .strip_prefix("year-last-")
        .and_then(|n| n.parse().ok())
    {
        return (past, 0);
    }
    if let Some(future) = kind
        .strip_prefix("year-next-")
        .and_then(|n| n.parse().ok())
    {
        return (0, future);
    }
    if let Some((past, future)) = options.and_then(|options| options.trim().split_once('-')) {
        if let (Ok(past), Ok(future)) = (past.trim().parse(), future.trim().parse()) {
            return (past, future);
        }
    }
    (DEFAULT_YEAR_SPAN, DEFAULT_YEAR_SPAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_declarations() {
        assert!(parse_parameters("no placeholders here").unwrap().is_empty());
        assert!(parse_parameters("").unwrap().is_empty());
    }

    #[test]
    fn parses_undecorated_placeholder_as_text() {
        let declarations = parse_parameters("Hello {{ name }}!").unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "name");
        assert_eq!(declarations[0].kind, ParameterKind::Text);
    }

    #[test]
    fn kind_is_lowercased_and_trimmed() {
        let declarations = parse_parameters("{{ amount | NuMbEr }}").unwrap();
        assert_eq!(declarations[0].kind, ParameterKind::Number);
    }

    #[test]
    fn first_declaration_wins_for_duplicates() {
        let declarations = parse_parameters("{{x}} {{x|number}}").unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "x");
        assert_eq!(declarations[0].kind, ParameterKind::Text);
    }

    #[test]
    fn names_are_case_sensitive() {
        let declarations = parse_parameters("{{x}} {{X}}").unwrap();
        assert_eq!(declarations.len(), 2);
    }

    #[test]
    fn select_options_are_comma_split_and_trimmed() {
        let declarations =
            parse_parameters("{{ level | select : low, medium , high }}").unwrap();
        assert_eq!(declarations[0].kind, ParameterKind::Select);
        assert_eq!(
            declarations[0].options.as_deref(),
            Some(&["low".to_owned(), "medium".to_owned(), "high".to_owned()][..])
        );
    }

    #[test]
    fn radio_normalises_to_select() {
        let declarations = parse_parameters("{{ pick | radio : a,b }}").unwrap();
        assert_eq!(declarations[0].kind, ParameterKind::Select);
        assert_eq!(
            declarations[0].options.as_deref(),
            Some(&["a".to_owned(), "b".to_owned()][..])
        );
    }

    #[test]
    fn bare_checkbox_defaults_to_boolean_pair_at_render_time() {
        let declarations = parse_parameters("{{ agree | checkbox }}").unwrap();
        assert_eq!(declarations[0].options, None);
        assert_eq!(
            declarations[0].effective_options(),
            Some(vec!["true".to_owned(), "false".to_owned()])
        );
    }

    #[test]
    fn date_options_become_a_format() {
        let declarations = parse_parameters("{{ due | date : YYYY-MM-DD }}").unwrap();
        assert_eq!(declarations[0].kind, ParameterKind::Date);
        assert_eq!(declarations[0].format.as_deref(), Some("YYYY-MM-DD"));
        assert_eq!(declarations[0].options, None);
    }

    #[test]
    fn year_shorthands() {
        let last = parse_parameters("{{d|year-last-3}}").unwrap();
        assert_eq!(last[0].past_years, Some(3));
        assert_eq!(last[0].future_years, Some(0));

        let next = parse_parameters("{{d|year-next-2}}").unwrap();
        assert_eq!(next[0].past_years, Some(0));
        assert_eq!(next[0].future_years, Some(2));

        let range = parse_parameters("{{d|year:2-1}}").unwrap();
        assert_eq!(range[0].past_years, Some(2));
        assert_eq!(range[0].future_years, Some(1));

        let bare = parse_parameters("{{d|year}}").unwrap();
        assert_eq!(bare[0].past_years, Some(5));
        assert_eq!(bare[0].future_years, Some(5));
    }

    #[test]
    fn unknown_kinds_are_kept_verbatim() {
        let declarations = parse_parameters("{{ x | hologram }}").unwrap();
        assert_eq!(
            declarations[0].kind,
            ParameterKind::Other("hologram".to_owned())
        );
    }

    #[test]
    fn nested_placeholder_is_rejected() {
        let err = parse_parameters("{{a{{b}}c}}").expect_err("nesting must fail");
        let TemplateError::NestedPlaceholder { outer, inner } = err;
        assert_eq!(inner, "{{b}}");
        assert_eq!(outer, "{{a{{b}}c}}");
    }

    #[test]
    fn nesting_rejected_before_declarations_are_extracted() {
        assert!(parse_parameters("{{ok}} and {{a{{b}}c}}").is_err());
    }

    #[test]
    fn unterminated_open_is_literal_text() {
        assert!(parse_parameters("dangling {{ tail").unwrap().is_empty());
    }

    #[test]
    fn stray_close_is_literal_text() {
        let declarations = parse_parameters("}} then {{ name }}").unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "name");
    }

    #[test]
    fn empty_name_is_dropped() {
        assert!(parse_parameters("{{}} {{ | text }}").unwrap().is_empty());
    }

    #[test]
    fn declaration_serialises_without_absent_fields() {
        let declarations = parse_parameters("{{ name }}").unwrap();
        let json = serde_json::to_value(&declarations[0]).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "name", "kind": "text" }));
    }
}
