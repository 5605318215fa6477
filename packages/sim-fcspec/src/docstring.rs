//! Google style docstring parsing.
//!
//! ```text
//! Fetches a space.
//!
//! Args:
//!     name (str): Resource name, e.g. "spaces/AAA".
//!     view (str, optional): Field mask. Defaults to FULL.
//!
//! Returns:
//!     dict: The space resource.
//!
//! Raises:
//!     ValueError: If the name is malformed.
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// One documented argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocParam {
    pub name: String,
    /// Type hint from the parentheses, without the `optional` marker
    pub type_name: Option<String>,
    pub description: String,
    /// Marked `optional` next to the type
    pub is_optional: bool,
    /// Value named by a "Defaults to ..." phrase
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocReturns {
    pub type_name: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocRaises {
    pub exception: String,
    pub description: String,
}

/// A parsed docstring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Docstring {
    /// First line of the description
    pub short_description: Option<String>,
    /// Remaining description text
    pub long_description: Option<String>,
    pub params: Vec<DocParam>,
    pub returns: Option<DocReturns>,
    pub raises: Vec<DocRaises>,
}

impl Docstring {
    /// Short and long description separated by a blank line.
    pub fn description(&self) -> String {
        [&self.short_description, &self.long_description]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
    }

    pub fn param(&self, name: &str) -> Option<&DocParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Args,
    Returns,
    Raises,
    Other,
}

fn section_of(line: &str) -> Option<Section> {
    let title = line.trim_end().strip_suffix(':')?;
    let section = match title.to_lowercase().as_str() {
        "args" | "arguments" | "parameters" | "params" => Section::Args,
        "returns" | "return" | "yields" | "yield" => Section::Returns,
        "raises" | "raise" | "exceptions" | "except" => Section::Raises,
        "attributes" | "example" | "examples" | "note" | "notes" | "methods" | "warns"
        | "warnings" | "see also" | "todo" => Section::Other,
        _ => return None,
    };
    Some(section)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Strips the common indentation of non-blank lines.
fn dedent(lines: &[String]) -> Vec<String> {
    let min = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(min..).unwrap_or_else(|| l.trim_start()).to_string())
        .collect()
}

/// Normalizes a raw docstring: first line trimmed, the rest dedented,
/// surrounding blank lines dropped.
fn clean(text: &str) -> Vec<String> {
    let mut lines = text.lines().map(str::to_string);
    let first = lines.next().map(|l| l.trim().to_string()).unwrap_or_default();
    let rest: Vec<String> = lines.collect();
    let mut out = vec![first];
    out.extend(dedent(&rest).into_iter().map(|l| l.trim_end().to_string()));

    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

/// Groups section lines into entries: each starts at the section's base
/// indentation, deeper lines continue it.
fn entries(lines: &[String]) -> Vec<(String, Vec<String>)> {
    let body = dedent(lines);
    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for line in body {
        if line.trim().is_empty() {
            continue;
        }
        match out.last_mut() {
            Some((_, continuation)) if indent_of(&line) > 0 => {
                continuation.push(line);
            }
            _ => out.push((line.trim().to_string(), Vec::new())),
        }
    }
    out
}

fn join_description(first: &str, continuation: &[String]) -> String {
    let mut parts = vec![first.trim().to_string()];
    parts.extend(dedent(continuation).into_iter().map(|l| l.trim_end().to_string()));
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn typed_arg_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(.+?)\s*\(\s*(.*\S)\s*\)\s*$").expect("static pattern")
    })
}

fn default_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\s)[Dd]efaults?(?:\s+to\b|\s*[:=])\s*`?([\w\-\.'\x22]*[\w'\x22])")
            .expect("static pattern")
    })
}

fn parse_param(head: &str, continuation: &[String]) -> DocParam {
    let (before, first) = head.split_once(':').unwrap_or((head, ""));
    let description = join_description(first, continuation);

    let (name, mut type_name, mut is_optional) = match typed_arg_regex().captures(before) {
        Some(caps) => (caps[1].to_string(), Some(caps[2].trim().to_string()), false),
        None => (before.trim().to_string(), None, false),
    };
    if let Some(t) = type_name.take() {
        let is_marker = |s: &str| s.trim().eq_ignore_ascii_case("optional");
        if is_marker(&t) {
            is_optional = true;
        } else if let Some(idx) = t.rfind(',').filter(|&i| is_marker(&t[i + 1..])) {
            is_optional = true;
            type_name = Some(t[..idx].trim().to_string());
        } else {
            type_name = Some(t);
        }
    }

    let default = default_regex()
        .captures(&description)
        .map(|caps| caps[1].trim_matches(|c| c == '\'' || c == '"').to_string());

    DocParam {
        name,
        type_name,
        description,
        is_optional,
        default,
    }
}

/// Whether `s` reads as a type hint: no spaces outside brackets.
fn looks_like_type(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => return false,
            _ => {}
        }
    }
    true
}

fn parse_returns(lines: &[String]) -> Option<DocReturns> {
    let body = dedent(lines);
    let first = body.iter().position(|l| !l.trim().is_empty())?;
    let head = body[first].trim();
    let rest = &body[first + 1..];

    let (type_name, first_line) = match head.split_once(':') {
        Some((t, d)) if looks_like_type(t) => (Some(t.trim().to_string()), d),
        _ => (None, head),
    };
    Some(DocReturns {
        type_name,
        description: join_description(first_line, rest),
    })
}

fn is_none_section(lines: &[String]) -> bool {
    let content: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    content.is_empty() || (content.len() == 1 && content[0].eq_ignore_ascii_case("none"))
}

/// Parses a Google style docstring.
///
/// Unknown text is kept in the description; an `Args:` section holding
/// only `None` yields no params.
pub fn parse_docstring(text: &str) -> Docstring {
    let lines = clean(text);
    let mut doc = Docstring::default();

    let mut description: Vec<String> = Vec::new();
    let mut sections: Vec<(Section, Vec<String>)> = Vec::new();
    for line in lines {
        let header = (indent_of(&line) == 0).then(|| section_of(&line)).flatten();
        match (header, sections.last_mut()) {
            (Some(section), _) => sections.push((section, Vec::new())),
            (None, Some((_, body))) => body.push(line),
            (None, None) => description.push(line),
        }
    }

    let mut description = description.into_iter();
    doc.short_description = description
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let long = description.collect::<Vec<_>>().join("\n").trim().to_string();
    doc.long_description = (!long.is_empty()).then_some(long);

    for (section, body) in sections {
        match section {
            Section::Args if !is_none_section(&body) => {
                doc.params.extend(
                    entries(&body)
                        .iter()
                        .map(|(head, continuation)| parse_param(head, continuation)),
                );
            }
            Section::Returns if !is_none_section(&body) => {
                doc.returns = parse_returns(&body);
            }
            Section::Raises => {
                doc.raises.extend(entries(&body).into_iter().map(|(head, continuation)| {
                    let (exception, first) = head.split_once(':').unwrap_or((head.as_str(), ""));
                    DocRaises {
                        exception: exception.trim().to_string(),
                        description: join_description(first, &continuation),
                    }
                }));
            }
            _ => {}
        }
    }

    tracing::trace!(params = doc.params.len(), "parsed docstring");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_SPACE: &str = r#"Fetches a space by resource name.

        Looks up the space in the simulated store. Archived spaces
        are returned as well.

        Args:
            name (str): Resource name of the space,
                e.g. "spaces/AAA".
            view (str, optional): Field mask to apply. Defaults to FULL.
            page_size (int): Max results. Defaults to 25.
            strict: Whether to fail on unknown fields.

        Returns:
            Dict[str, Any]: The space resource.

        Raises:
            ValueError: If the name is malformed.
            KeyError: If the space does not exist.
        "#;

    #[test]
    fn test_descriptions() {
        let doc = parse_docstring(GET_SPACE);
        assert_eq!(doc.short_description.as_deref(), Some("Fetches a space by resource name."));
        assert_eq!(
            doc.long_description.as_deref(),
            Some("Looks up the space in the simulated store. Archived spaces\nare returned as well.")
        );
        assert!(doc.description().starts_with("Fetches a space by resource name.\n\nLooks up"));
    }

    #[test]
    fn test_args() {
        let doc = parse_docstring(GET_SPACE);
        let names: Vec<&str> = doc.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "view", "page_size", "strict"]);

        let name = doc.param("name").unwrap();
        assert_eq!(name.type_name.as_deref(), Some("str"));
        assert_eq!(name.description, "Resource name of the space,\ne.g. \"spaces/AAA\".");
        assert!(!name.is_optional);

        let view = doc.param("view").unwrap();
        assert!(view.is_optional);
        assert_eq!(view.type_name.as_deref(), Some("str"));
        assert_eq!(view.default.as_deref(), Some("FULL"));

        assert_eq!(doc.param("page_size").unwrap().default.as_deref(), Some("25"));

        let strict = doc.param("strict").unwrap();
        assert_eq!(strict.type_name, None);
        assert_eq!(strict.description, "Whether to fail on unknown fields.");
    }

    #[test]
    fn test_returns_and_raises() {
        let doc = parse_docstring(GET_SPACE);
        let returns = doc.returns.unwrap();
        assert_eq!(returns.type_name.as_deref(), Some("Dict[str, Any]"));
        assert_eq!(returns.description, "The space resource.");

        let raised: Vec<&str> = doc.raises.iter().map(|r| r.exception.as_str()).collect();
        assert_eq!(raised, vec!["ValueError", "KeyError"]);
    }

    #[test]
    fn test_args_none_section() {
        let doc = parse_docstring("Lists spaces.\n\nArgs:\n    None\n\nReturns:\n    List of spaces.");
        assert!(doc.params.is_empty());
        let returns = doc.returns.unwrap();
        assert_eq!(returns.type_name, None);
        assert_eq!(returns.description, "List of spaces.");
    }

    #[test]
    fn test_empty_docstring() {
        assert_eq!(parse_docstring(""), Docstring::default());
        assert_eq!(parse_docstring("   \n  "), Docstring::default());
    }
}
