// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lightweight scan of ES module syntax
//!
//! Finds static imports, exported names and top-level `await` without a full
//! parser. Comments are stripped first, then string contents are blanked so
//! text inside literals never matches. Blanking keeps byte offsets, so
//! import specifiers are read back from the unblanked code.

use regex::Regex;
use std::collections::HashSet;
use std::iter;
use std::sync::LazyLock;

/// `import ... from 'x'`, `import 'x'`, `export ... from 'x'`
static STATIC_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import|export)\s*(?:[\w$*{}\s,]*?\bfrom\s*)?["']([^"'\n]+)["']"#)
        .expect("static import pattern")
});

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\bexport\s+(?:",
        r"(?P<default>default)\b",
        r"|(?:async\s+)?function\s*\*?\s*(?P<function>[\w$]+)",
        r"|(?:const|let|var|class)\s+(?P<binding>[\w$]+)",
        r"|\*\s*as\s+(?P<namespace>[\w$]+)",
        r")",
        r"|\bexport\s*\{(?P<list>[^}]*)\}",
    ))
    .expect("export pattern")
});

static IMPORT_META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bimport\s*\.\s*meta\b").expect("import.meta pattern"));

static AWAIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w$.])(await)\b").expect("await pattern"));

/// What a scan found in a module body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    /// Static import specifiers in source order, without duplicates
    pub imports: Vec<String>,
    /// Exported names in source order
    pub exports: Vec<String>,
    /// `import.meta` is referenced
    pub import_meta: bool,
    /// `await` appears outside any function body
    pub top_level_await: bool,
}

impl ModuleSyntax {
    /// Whether the body can only be an ES module
    pub fn is_module(&self) -> bool {
        !self.imports.is_empty() || !self.exports.is_empty() || self.import_meta || self.top_level_await
    }
}

/// Scan a module body
pub fn scan(source: &str) -> ModuleSyntax {
    let code = strip_comments(source);
    let blanked = blank_strings(&code);
    ModuleSyntax {
        imports: static_imports(&code, &blanked),
        exports: exported_names(&blanked),
        import_meta: IMPORT_META_RE.is_match(&blanked),
        top_level_await: await_outside_functions(&blanked),
    }
}

fn static_imports(code: &str, blanked: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    STATIC_IMPORT_RE
        .captures_iter(blanked)
        .filter_map(|caps| caps.get(1))
        .map(|m| code[m.range()].to_string())
        .filter(|specifier| seen.insert(specifier.clone()))
        .collect()
}

fn exported_names(code: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for caps in EXPORT_RE.captures_iter(code) {
        if let Some(list) = caps.name("list") {
            for item in list.as_str().split(',') {
                // `local as exported` exports the alias
                let exported = item.split_whitespace().last().unwrap_or_default();
                push(exported);
            }
            continue;
        }

        let single = ["default", "function", "binding", "namespace"]
            .into_iter()
            .find_map(|group| caps.name(group));
        if let Some(name) = single {
            push(name.as_str());
        }
    }

    names
}

/// Replace comments with whitespace, keeping line breaks and string
/// literals intact.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.next_if(|&n| n != '\n').is_some() {}
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

/// Replace the contents of string and template literals with spaces.
///
/// Quotes and line breaks stay, and every character keeps its byte length,
/// so offsets into the result are valid in `code`.
pub fn blank_strings(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in code.chars() {
        match quote {
            Some(q) if !escaped && c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => {
                escaped = !escaped && c == '\\';
                push_blank(&mut out, c);
            }
            None => {
                if matches!(c, '"' | '\'' | '`') {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }

    out
}

/// Whether `await` is used outside every function and class body.
///
/// Statement blocks (`try`, `if`, loops, bare blocks) do not hide an
/// `await`. An `await` inside a concise `async` arrow body on the same
/// statement is not counted.
pub fn has_top_level_await(code: &str) -> bool {
    await_outside_functions(&blank_strings(code))
}

fn await_outside_functions(blanked: &str) -> bool {
    let top = top_level_text(blanked);
    AWAIT_RE.captures_iter(&top).filter_map(|caps| caps.get(1)).any(|m| {
        let statement_start = top[..m.start()].rfind([';', '\n']).map_or(0, |i| i + 1);
        let statement = &top[statement_start..m.start()];
        !(statement.contains("async") && statement.contains("=>"))
    })
}

/// Blank every function and class body, keeping the text that runs when
/// the module body runs
fn top_level_text(blanked: &str) -> String {
    let chars: Vec<char> = blanked.chars().collect();
    let mut out = String::with_capacity(blanked.len());
    // One flag per open brace: does it belong to a function or class body
    let mut braces: Vec<bool> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        let in_body = braces.last().copied().unwrap_or(false);
        match c {
            '{' => braces.push(in_body || opens_body(&chars[..i])),
            '}' => {
                braces.pop();
            }
            _ => {}
        }

        if in_body || matches!(c, '{' | '}') {
            push_blank(&mut out, c);
        } else {
            out.push(c);
        }
    }

    out
}

/// Whether a `{` preceded by `before` opens a function or class body
fn opens_body(before: &[char]) -> bool {
    let head = trim_end(before);
    if head.ends_with(&['=', '>']) {
        return true;
    }

    if head.last() == Some(&')') {
        let Some(open) = matching_paren(head) else {
            return false;
        };
        let (word, rest) = last_word(&head[..open]);
        return match word.as_str() {
            "if" | "for" | "while" | "catch" | "switch" | "with" => false,
            "await" => last_word(rest).0 != "for",
            _ => true,
        };
    }

    // `class Name extends Base {`
    let statement_start = head
        .iter()
        .rposition(|c| matches!(c, ';' | '{' | '}'))
        .map_or(0, |i| i + 1);
    let header: String = head[statement_start..].iter().collect();
    header.split(|c: char| !is_ident(c)).any(|word| word == "class")
}

fn matching_paren(head: &[char]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in head.iter().enumerate().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The identifier ending `chars` and everything before it
fn last_word(chars: &[char]) -> (String, &[char]) {
    let head = trim_end(chars);
    let start = head.iter().rposition(|&c| !is_ident(c)).map_or(0, |i| i + 1);
    (head[start..].iter().collect(), &head[..start])
}

fn trim_end(chars: &[char]) -> &[char] {
    let end = chars.iter().rposition(|c| !c.is_whitespace()).map_or(0, |i| i + 1);
    &chars[..end]
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn push_blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(iter::repeat_n(' ', c.len_utf8()));
    }
}
