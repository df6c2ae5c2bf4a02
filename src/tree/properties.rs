//! Reader for `key=value` properties files.
//!
//! Follows the usual properties syntax: `=`, `:` or whitespace separate key
//! and value; `#` and `!` start comment lines; a trailing backslash
//! continues the logical line; `\n`, `\t`, `\uXXXX` and escaped separators
//! are unescaped. A later duplicate key replaces the earlier entry.

use super::{Declaration, ElementValue, FileTree};
use crate::model::FileKind;

/// Turn properties text into a tree of string-valued declarations.
pub fn parse_properties(name: impl Into<String>, text: &str) -> FileTree {
    let mut declarations: Vec<Declaration> = Vec::new();

    for line in logical_lines(text) {
        let (key, value) = split_entry(&line);
        if key.is_empty() {
            continue;
        }
        let decl = Declaration::property(key.clone(), ElementValue::String(value));
        match declarations.iter().position(|d| d.name == key) {
            Some(idx) => declarations[idx] = decl,
            None => declarations.push(decl),
        }
    }

    for (idx, decl) in declarations.iter_mut().enumerate() {
        decl.source_order_index = idx;
    }

    FileTree {
        name: name.into(),
        kind: FileKind::Properties,
        declarations,
        applied: Vec::new(),
        parent: None,
        properties: None,
        unparsed_elements: 0,
    }
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for raw in text.lines() {
        let line = raw.trim_start();
        if !continuing && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&line[..line.len() - 1]);
            continuing = true;
        } else {
            current.push_str(line);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_entry(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_escaped(&mut key, escaped, &mut chars);
                }
            }
            '=' | ':' => break,
            c if c.is_whitespace() => {
                // Whitespace separator, optionally followed by '=' or ':'.
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if matches!(chars.peek(), Some('=') | Some(':')) {
                    chars.next();
                }
                break;
            }
            c => key.push(c),
        }
    }

    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                push_escaped(&mut value, escaped, &mut chars);
            }
        } else {
            value.push(c);
        }
    }

    (key, value)
}

fn push_escaped(out: &mut String, escaped: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    match escaped {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'f' => out.push('\u{c}'),
        'u' => {
            let hex: String = (0..4).filter_map(|_| chars.next()).collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(c) => out.push(c),
                None => {
                    out.push('u');
                    out.push_str(&hex);
                }
            }
        }
        other => out.push(other),
    }
}
