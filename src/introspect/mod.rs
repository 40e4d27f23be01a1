//! Introspection service: read-only queries over the namespace store
//!
//! Everything here is advisory. No function executes submitted code, no
//! function panics; lookups that miss return a typed `NotFound` which the
//! output layer serializes as an `{error}` payload.

use regex::Regex;

use crate::engine::builtins::{type_methods, type_properties, BUILTIN_FUNCTIONS};
use crate::engine::Shell;
use crate::error::{Result, SlateError};
use crate::parser::KEYWORDS;
use crate::runtime::Value;

/// Completion candidates for the identifier ending at the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReply {
    /// The partial token the candidates would replace.
    pub matched_prefix: String,
    pub candidates: Vec<String>,
    /// Half-open byte range in the input that the candidates replace.
    pub span: (usize, usize),
}

/// Result of `inspect`: detail 0 is type + rendering, 1 adds the doc
/// string, 2 adds source where available.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectReply {
    pub type_name: String,
    pub rendering: String,
    pub docstring: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureReply {
    pub signature_text: String,
    pub docstring: String,
    pub defining_location: Option<String>,
}

/// Attributes of a bound value, partitioned by capability.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributesReply {
    pub attributes: Vec<String>,
    pub callables: Vec<String>,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultReply {
    pub present: bool,
    pub kind: Option<String>,
    pub message: Option<String>,
}

/// Complete the identifier (or dotted path) ending at `cursor`.
pub fn complete(shell: &Shell, text: &str, cursor: Option<usize>) -> CompletionReply {
    let mut cur = cursor.unwrap_or(text.len()).min(text.len());
    while cur > 0 && !text.is_char_boundary(cur) {
        cur -= 1;
    }
    let head = &text[..cur];

    let mut start = cur;
    for (i, ch) in head.char_indices().rev() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
            start = i;
        } else {
            break;
        }
    }
    let token = &head[start..];

    if let Some((base_path, partial)) = token.rsplit_once('.') {
        let candidates = match resolve_path(shell, base_path) {
            Some(value) => attribute_names(&value, partial),
            None => Vec::new(),
        };
        return CompletionReply {
            matched_prefix: partial.to_string(),
            candidates,
            span: (start + base_path.len() + 1, cur),
        };
    }

    let mut candidates: Vec<String> = shell
        .store()
        .all_names()
        .filter(|name| !name.starts_with('_') || token.starts_with('_'))
        .map(|name| name.to_string())
        .chain(BUILTIN_FUNCTIONS.iter().map(|s| s.to_string()))
        .chain(KEYWORDS.iter().map(|s| s.to_string()))
        .filter(|name| name.starts_with(token))
        .collect();
    candidates.sort();
    candidates.dedup();

    CompletionReply {
        matched_prefix: token.to_string(),
        candidates,
        span: (start, cur),
    }
}

/// Resolve a dotted path through map fields, without executing anything.
fn resolve_path(shell: &Shell, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = shell.store().get(first)?.clone();
    for segment in segments {
        match current {
            Value::Map(ref entries) => current = entries.get(segment)?.clone(),
            _ => return None,
        }
    }
    Some(current)
}

fn attribute_names(value: &Value, partial: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Value::Map(entries) = value {
        names.extend(entries.keys().cloned());
    }
    names.extend(type_methods(value).iter().map(|s| s.to_string()));
    names.extend(type_properties(value).iter().map(|s| s.to_string()));

    let mut out: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(partial))
        .filter(|name| !name.starts_with('_') || partial.starts_with('_'))
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Inspect a bound value at the given detail level (clamped to 0..=2).
pub fn inspect(shell: &Shell, name: &str, detail: u8) -> Result<InspectReply> {
    let value = shell
        .store()
        .get(name)
        .ok_or_else(|| SlateError::NotFound(format!("name '{}' is not bound", name)))?;
    let detail = detail.min(2);

    let docstring = if detail >= 1 {
        match value {
            Value::Func(f) => f.decl.doc.clone(),
            Value::Native(n) if !n.doc.is_empty() => Some(n.doc.clone()),
            _ => None,
        }
    } else {
        None
    };

    let source = if detail >= 2 {
        match value {
            Value::Func(f) => Some(f.decl.source.clone()),
            _ => None,
        }
    } else {
        None
    };

    Ok(InspectReply {
        type_name: value.type_name().to_string(),
        rendering: value.render(),
        docstring,
        source,
    })
}

/// Signature and doc of a callable binding.
pub fn signature(shell: &Shell, name: &str) -> Result<SignatureReply> {
    let value = shell
        .store()
        .get(name)
        .ok_or_else(|| SlateError::NotFound(format!("name '{}' is not bound", name)))?;

    match value {
        Value::Func(f) => Ok(SignatureReply {
            signature_text: format!("fn {}({})", f.decl.name, f.decl.params.join(", ")),
            docstring: f.decl.doc.clone().unwrap_or_default(),
            defining_location: Some(format!("fragment #{}", f.defined_in)),
        }),
        Value::Native(n) => Ok(SignatureReply {
            signature_text: n.signature.clone(),
            docstring: n.doc.clone(),
            defining_location: Some("registered helper".to_string()),
        }),
        other => Err(SlateError::NotFound(format!(
            "'{}' is bound to a non-callable '{}' value",
            name,
            other.type_name()
        ))),
    }
}

/// Enumerate a bound value's attributes, partitioned into data attributes,
/// callables and property-like accessors. `pattern` is a case-insensitive
/// glob (`*`, `?`).
pub fn list_attributes(
    shell: &Shell,
    name: &str,
    pattern: Option<&str>,
    include_private: bool,
) -> Result<AttributesReply> {
    let value = shell
        .store()
        .get(name)
        .ok_or_else(|| SlateError::NotFound(format!("name '{}' is not bound", name)))?;

    let matcher = glob_regex(pattern.unwrap_or("*"));
    let keep = |attr: &str| -> bool {
        if !include_private && attr.starts_with('_') {
            return false;
        }
        match &matcher {
            Some(re) => re.is_match(attr),
            None => true,
        }
    };

    let mut attributes = Vec::new();
    let mut callables = Vec::new();

    if let Value::Map(entries) = value {
        for (key, field) in entries {
            if !keep(key) {
                continue;
            }
            if field.is_callable() {
                callables.push(key.clone());
            } else {
                attributes.push(key.clone());
            }
        }
    }

    for method in type_methods(value) {
        if keep(method) {
            callables.push(method.to_string());
        }
    }

    let mut properties: Vec<String> = type_properties(value)
        .iter()
        .filter(|p| keep(p))
        .map(|p| p.to_string())
        .collect();

    attributes.sort();
    attributes.dedup();
    callables.sort();
    callables.dedup();
    properties.sort();
    properties.dedup();

    Ok(AttributesReply {
        attributes,
        callables,
        properties,
    })
}

/// The most recent fault-during-run recorded by the engine.
pub fn last_fault(shell: &Shell) -> FaultReply {
    match shell.last_fault() {
        Some(fault) => FaultReply {
            present: true,
            kind: Some(fault.kind.clone()),
            message: Some(fault.message.clone()),
        },
        None => FaultReply {
            present: false,
            kind: None,
            message: None,
        },
    }
}

fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut body = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' => body.push_str(".*"),
            '?' => body.push('.'),
            other => body.push_str(&regex::escape(&other.to_string())),
        }
    }
    Regex::new(&format!("(?i)^{}$", body)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::run_fragment;

    fn shell_with(code: &str) -> Shell {
        let mut shell = Shell::new();
        let outcome = run_fragment(&mut shell, code);
        assert!(outcome.ok(), "setup fragment failed: {:?}", outcome);
        shell
    }

    #[test]
    fn test_complete_bare_names() {
        let shell = shell_with("alpha = 1; alphabet = 2; beta = 3");
        let reply = complete(&shell, "alp", None);
        assert_eq!(reply.matched_prefix, "alp");
        assert_eq!(
            reply.candidates,
            vec!["alpha".to_string(), "alphabet".to_string()]
        );
        assert_eq!(reply.span, (0, 3));
    }

    #[test]
    fn test_complete_includes_builtins_and_keywords() {
        let shell = Shell::new();
        let reply = complete(&shell, "pr", None);
        assert!(reply.candidates.contains(&"print".to_string()));
        let reply = complete(&shell, "ra", None);
        assert!(reply.candidates.contains(&"raise".to_string()));
        assert!(reply.candidates.contains(&"range".to_string()));
    }

    #[test]
    fn test_complete_dotted_path() {
        let shell = shell_with("cfg = {\"host\": \"db1\", \"port\": 5432}");
        let reply = complete(&shell, "x = cfg.h", None);
        assert_eq!(reply.matched_prefix, "h");
        assert!(reply.candidates.contains(&"host".to_string()));
        assert!(reply.candidates.contains(&"has".to_string()));
        assert_eq!(reply.span, (8, 9));
    }

    #[test]
    fn test_complete_mid_text_cursor() {
        let shell = shell_with("value = 1");
        let reply = complete(&shell, "val + other", Some(3));
        assert_eq!(reply.matched_prefix, "val");
        assert!(reply.candidates.contains(&"value".to_string()));
    }

    #[test]
    fn test_complete_underscore_hidden_unless_requested() {
        let shell = shell_with("1 + 1");
        let bare = complete(&shell, "", None);
        assert!(!bare.candidates.iter().any(|c| c.starts_with('_')));
        let underscored = complete(&shell, "_", None);
        assert!(underscored.candidates.contains(&"_".to_string()));
    }

    #[test]
    fn test_inspect_detail_levels() {
        let shell = shell_with("fn area(r) {\n  \"circle area\"\n  return 3 * r * r\n}");

        let level0 = inspect(&shell, "area", 0).unwrap();
        assert_eq!(level0.type_name, "function");
        assert!(level0.docstring.is_none());
        assert!(level0.source.is_none());

        let level1 = inspect(&shell, "area", 1).unwrap();
        assert_eq!(level1.docstring.as_deref(), Some("circle area"));
        assert!(level1.source.is_none());

        let level2 = inspect(&shell, "area", 2).unwrap();
        assert!(level2.source.as_deref().unwrap().starts_with("fn area"));

        // Detail is clamped, not rejected.
        let clamped = inspect(&shell, "area", 9).unwrap();
        assert_eq!(clamped, level2);
    }

    #[test]
    fn test_inspect_missing_is_not_found() {
        let shell = Shell::new();
        assert!(matches!(
            inspect(&shell, "ghost", 0),
            Err(SlateError::NotFound(_))
        ));
    }

    #[test]
    fn test_signature_of_function_and_non_callable() {
        let shell = shell_with("fn add(a, b) { return a + b }\nn = 5");

        let reply = signature(&shell, "add").unwrap();
        assert_eq!(reply.signature_text, "fn add(a, b)");
        assert_eq!(reply.defining_location.as_deref(), Some("fragment #1"));

        assert!(matches!(
            signature(&shell, "n"),
            Err(SlateError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_attributes_partitioned() {
        let shell = shell_with("s = \"text\"");
        let reply = list_attributes(&shell, "s", None, false).unwrap();
        assert!(reply.callables.contains(&"upper".to_string()));
        assert!(reply.properties.contains(&"len".to_string()));
        assert!(reply.attributes.is_empty());
    }

    #[test]
    fn test_list_attributes_glob_and_private() {
        let shell = shell_with("m = {\"alpha\": 1, \"_hidden\": 2, \"beta\": 3}");

        let reply = list_attributes(&shell, "m", Some("AL*"), false).unwrap();
        assert_eq!(reply.attributes, vec!["alpha".to_string()]);
        assert!(reply.callables.is_empty());

        let unfiltered = list_attributes(&shell, "m", None, false).unwrap();
        assert!(unfiltered.callables.contains(&"has".to_string()));

        let with_private = list_attributes(&shell, "m", Some("_*"), true).unwrap();
        assert_eq!(with_private.attributes, vec!["_hidden".to_string()]);

        let without_private = list_attributes(&shell, "m", Some("_*"), false).unwrap();
        assert!(without_private.attributes.is_empty());
    }

    #[test]
    fn test_last_fault_reporting() {
        let mut shell = Shell::new();
        assert!(!last_fault(&shell).present);

        run_fragment(&mut shell, "raise \"bad\"");
        let reply = last_fault(&shell);
        assert!(reply.present);
        assert_eq!(reply.kind.as_deref(), Some("RaisedFault"));
        assert_eq!(reply.message.as_deref(), Some("bad"));
    }
}
