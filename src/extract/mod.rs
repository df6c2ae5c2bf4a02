//! # Reference Extraction
//!
//! Classifies declared values and finds the reference paths inside them.
//!
//! ```text
//! "${prop1} world!"   → [Reference(prop1), Literal(" world!")]
//! "$a.b and \$c"      → [Reference(a.b), Literal(" and $c")]
//! prop1[0]            → REFERENCE
//! obj.getName()       → UNKNOWN, no references
//! ```
//!
//! Nothing here fails: text that is not a reference is literal or UNKNOWN.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::model::{PathExpression, RawValue, ReferenceTo, Segment};
use crate::resolve::lexer::{is_ident_char, is_ident_start};
use crate::resolve::parse_path;
use crate::tree::ElementValue;

/// A piece of a string template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text, with `\$` already unescaped.
    Literal(String),
    /// `${path}` or `$name`, with the text as written.
    Reference { expression: PathExpression, text: String },
}

/// Parse an expression as a reference path. Order annotations read as
/// method calls in expression text, so they disqualify it.
pub(crate) fn reference_path(text: &str) -> Option<PathExpression> {
    parse_path(text.trim())
        .ok()
        .filter(|p| p.segments.iter().all(|s| !matches!(s, Segment::Name { ordinal: Some(_), .. })))
}

/// Split a string into literal text and interpolated references.
pub fn parse_template(input: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(ch) = input[pos..].chars().next() {
        let rest = &input[pos..];
        if rest.starts_with("\\$") {
            literal.push('$');
            pos += 2;
            continue;
        }
        if ch == '$' {
            if let Some((len, part)) = interpolation(rest) {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(part);
                pos += len;
                continue;
            }
        }
        literal.push(ch);
        pos += ch.len_utf8();
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    parts
}

/// Recognize an interpolation at the start of `rest` (which starts with
/// `$`). Returns its byte length.
fn interpolation(rest: &str) -> Option<(usize, TemplatePart)> {
    if let Some(body) = rest.strip_prefix("${") {
        let close = body.find('}')?;
        let expression = reference_path(&body[..close])?;
        let len = close + 3;
        return Some((len, TemplatePart::Reference { expression, text: rest[..len].to_string() }));
    }

    // $name, $name.other
    let body = &rest[1..];
    let mut end = 0;
    while body[end..].chars().next().is_some_and(is_ident_start) {
        let seg = &body[end..];
        end += seg.find(|c: char| !is_ident_char(c)).unwrap_or(seg.len());
        let dotted = body[end..].starts_with('.') && body[end + 1..].chars().next().is_some_and(is_ident_start);
        if !dotted {
            break;
        }
        end += 1;
    }
    if end == 0 {
        return None;
    }
    let expression = reference_path(&body[..end])?;
    Some((end + 1, TemplatePart::Reference { expression, text: rest[..end + 1].to_string() }))
}

pub fn has_interpolation(text: &str) -> bool {
    parse_template(text).iter().any(|p| matches!(p, TemplatePart::Reference { .. }))
}

/// Decimal literals without a fractional part are integers.
pub fn normalize_decimal(d: Decimal) -> RawValue {
    if d.scale() == 0 {
        if let Some(i) = d.to_i64() {
            return RawValue::Integer(i);
        }
    }
    RawValue::BigDecimal(d)
}

/// The raw value a declared element holds. Containers classify as
/// `List`/`Map`; their elements become derived nodes.
pub fn classify(value: &ElementValue) -> RawValue {
    match value {
        ElementValue::None => RawValue::None,
        ElementValue::String(s) => RawValue::String(s.clone()),
        ElementValue::Integer(i) => RawValue::Integer(*i),
        ElementValue::Boolean(b) => RawValue::Boolean(*b),
        ElementValue::Decimal(text) => match text.trim().parse::<Decimal>() {
            Ok(d) => normalize_decimal(d),
            Err(_) => RawValue::Unknown(text.clone()),
        },
        ElementValue::Expression(text) => match reference_path(text) {
            Some(_) => RawValue::Reference(ReferenceTo::new(text.trim())),
            None => RawValue::Unknown(text.clone()),
        },
        ElementValue::List(_) => RawValue::List,
        ElementValue::Map(_) => RawValue::Map,
    }
}

/// Every reference in a declared value, left to right, recursing into
/// containers. Duplicates are kept.
pub fn extract_references(value: &ElementValue) -> Vec<PathExpression> {
    match value {
        ElementValue::String(s) => parse_template(s)
            .into_iter()
            .filter_map(|p| match p {
                TemplatePart::Reference { expression, .. } => Some(expression),
                TemplatePart::Literal(_) => None,
            })
            .collect(),
        ElementValue::Expression(text) => reference_path(text).into_iter().collect(),
        ElementValue::List(items) => items.iter().flat_map(extract_references).collect(),
        ElementValue::Map(entries) => entries.iter().flat_map(|(_, v)| extract_references(v)).collect(),
        _ => Vec::new(),
    }
}

/// References in a node's own raw value, with their text as written.
/// Container elements carry their own.
pub(crate) fn raw_references(raw: &RawValue) -> Vec<(PathExpression, String)> {
    match raw {
        RawValue::String(s) => parse_template(s)
            .into_iter()
            .filter_map(|p| match p {
                TemplatePart::Reference { expression, text } => Some((expression, text)),
                TemplatePart::Literal(_) => None,
            })
            .collect(),
        RawValue::Reference(r) => reference_path(&r.text).map(|p| (p, r.text.clone())).into_iter().collect(),
        _ => Vec::new(),
    }
}
