//! Static validation of generated scripts (spec §4.2).
//!
//! This is a lexical approximation of an AST walk: string/comment literals
//! are stripped first so blocklist matching never fires on a quoted example
//! or a comment, then the remaining token stream is checked for balance and
//! scanned for import statements and bare identifier references.

use regex::Regex;
use std::sync::OnceLock;

/// Modules scripts may import from: the CAD API surface plus approved math
/// utilities (spec §4.2 "approved math utilities").
const ALLOWED_MODULES: &[&str] = &[
    "FreeCAD", "Part", "PartDesign", "Sketcher", "Draft", "Mesh", "math",
];

/// Identifiers that must never appear, regardless of import path — process
/// control, dynamic code, and network/filesystem escape hatches (spec §4.2).
const BLOCKED_IDENTIFIERS: &[&str] = &[
    "__import__",
    "eval",
    "exec",
    "compile",
    "os",
    "sys",
    "subprocess",
    "socket",
];

fn import_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*(?:from\s+([A-Za-z_][\w\.]*)\s+import\s+[^\n]+|import\s+([A-Za-z_][\w\.]*(?:\s*,\s*[A-Za-z_][\w\.]*)*))",
        )
        .expect("static import pattern is valid")
    })
}

fn string_literal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)(?:'''.*?'''|""".*?"""|'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")"#)
            .expect("static string-literal pattern is valid")
    })
}

fn comment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)#[^\n]*").expect("static comment pattern is valid"))
}

fn identifier_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).expect("escaped identifier is valid regex")
}

fn open_call_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bopen\s*\(\s*(?:f?['"])([^'"]*)(['"])"#).expect("static open pattern is valid")
    })
}

/// Result of `validate`: `ok` is true only when `reasons` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub reasons: Vec<String>,
}

impl ValidationOutcome {
    fn pass() -> Self {
        Self {
            ok: true,
            reasons: Vec::new(),
        }
    }

    fn fail(reasons: Vec<String>) -> Self {
        Self { ok: false, reasons }
    }
}

/// Strip string/comment literals so later scans only see executable tokens.
fn strip_literals(source: &str) -> String {
    let no_strings = string_literal_pattern().replace_all(source, " ");
    comment_pattern().replace_all(&no_strings, "").into_owned()
}

/// Balanced-delimiter check. A cheap stand-in for a real parse: catches the
/// common truncated-generation failure (an unterminated call or block).
fn check_balanced(source: &str) -> Option<String> {
    let mut stack = Vec::new();
    for ch in source.chars() {
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(open) if open == expected => {}
                    _ => return Some(format!("unbalanced delimiter near '{ch}'")),
                }
            }
            _ => {}
        }
    }
    if let Some(unclosed) = stack.pop() {
        return Some(format!("unclosed delimiter '{unclosed}'"));
    }
    None
}

fn root_module(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Check every `import`/`from ... import` statement's root module against
/// the allow-list.
fn check_imports(source: &str) -> Vec<String> {
    let mut reasons = Vec::new();
    for caps in import_pattern().captures_iter(source) {
        let modules = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        for module in modules.split(',') {
            let module = module.trim();
            if module.is_empty() {
                continue;
            }
            let root = root_module(module);
            if !ALLOWED_MODULES.contains(&root) {
                reasons.push(format!("import not allowed: {module}"));
            }
        }
    }
    reasons
}

/// Exact (non-fuzzy) whole-word scan for blocklisted identifiers, plus a
/// narrower check on `open(...)` calls: only escapes from the working
/// directory (absolute paths, `..` traversal) are rejected.
fn check_identifiers(source: &str) -> Vec<String> {
    let mut reasons = Vec::new();
    for name in BLOCKED_IDENTIFIERS {
        if identifier_pattern(name).is_match(source) {
            reasons.push(format!("blocked identifier referenced: {name}"));
        }
    }
    for caps in open_call_pattern().captures_iter(source) {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if path.starts_with('/') || path.contains("..") {
            reasons.push(format!("open() outside working directory: {path}"));
        }
    }
    reasons
}

/// Validate `script_text` per spec §4.2: syntactic check, then allow-list
/// and blocklist checks against the literal-stripped token stream.
pub fn validate(script_text: &str) -> ValidationOutcome {
    if script_text.trim().is_empty() {
        return ValidationOutcome::fail(vec!["script is empty".to_string()]);
    }

    let stripped = strip_literals(script_text);

    if let Some(reason) = check_balanced(&stripped) {
        return ValidationOutcome::fail(vec![reason]);
    }

    let mut reasons = check_imports(&stripped);
    reasons.extend(check_identifiers(&stripped));

    if reasons.is_empty() {
        ValidationOutcome::pass()
    } else {
        ValidationOutcome::fail(reasons)
    }
}
