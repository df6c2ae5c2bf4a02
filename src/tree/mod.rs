//! Element tree — the already-parsed input the engine is built from.
//!
//! A concrete-syntax parser lives outside this crate. It hands over one
//! [`FileTree`] per document: ordered declarations per scope plus the
//! file's links. These types are pure data.

pub mod properties;

use crate::model::FileKind;

/// Declared value as the parser saw it. Containers nest.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    None,
    /// Quoted string literal. `${...}` / `$name` segments are references.
    String(String),
    Integer(i64),
    Boolean(bool),
    /// Numeric literal with a fractional part, kept as written.
    Decimal(String),
    /// Unquoted host expression: a reference path when it parses as one,
    /// otherwise uninterpreted.
    Expression(String),
    List(Vec<ElementValue>),
    Map(Vec<(String, ElementValue)>),
}

impl ElementValue {
    pub fn expr(text: impl Into<String>) -> Self {
        ElementValue::Expression(text.into())
    }

    pub fn decimal(text: impl Into<String>) -> Self {
        ElementValue::Decimal(text.into())
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<ElementValue>>) -> Self {
        ElementValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<K: Into<String>, V: Into<ElementValue>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        ElementValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for ElementValue { fn from(v: &str) -> Self { ElementValue::String(v.to_owned()) } }
impl From<String> for ElementValue { fn from(v: String) -> Self { ElementValue::String(v) } }
impl From<i64> for ElementValue { fn from(v: i64) -> Self { ElementValue::Integer(v) } }
impl From<i32> for ElementValue { fn from(v: i32) -> Self { ElementValue::Integer(v as i64) } }
impl From<bool> for ElementValue { fn from(v: bool) -> Self { ElementValue::Boolean(v) } }

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Property(ElementValue),
    Variable(ElementValue),
    Block(Vec<Declaration>),
}

/// One named declaration in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Position among its siblings. Ties keep vector order.
    pub source_order_index: usize,
}

impl Declaration {
    pub fn property(name: impl Into<String>, value: impl Into<ElementValue>) -> Self {
        Self { name: name.into(), kind: DeclarationKind::Property(value.into()), source_order_index: 0 }
    }

    pub fn variable(name: impl Into<String>, value: impl Into<ElementValue>) -> Self {
        Self { name: name.into(), kind: DeclarationKind::Variable(value.into()), source_order_index: 0 }
    }

    pub fn block(name: impl Into<String>, children: Vec<Declaration>) -> Self {
        Self { name: name.into(), kind: DeclarationKind::Block(children), source_order_index: 0 }
    }

    pub fn at(mut self, source_order_index: usize) -> Self {
        self.source_order_index = source_order_index;
        self
    }
}

/// A parsed document and its links to other documents, by file name.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTree {
    pub name: String,
    pub kind: FileKind,
    pub declarations: Vec<Declaration>,
    /// Applied files, in application order.
    pub applied: Vec<String>,
    pub parent: Option<String>,
    pub properties: Option<String>,
    /// Elements the parser gave up on.
    pub unparsed_elements: usize,
}

impl FileTree {
    pub fn build(name: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Build,
            declarations,
            applied: Vec::new(),
            parent: None,
            properties: None,
            unparsed_elements: 0,
        }
    }

    pub fn apply(mut self, file: impl Into<String>) -> Self {
        self.applied.push(file.into());
        self
    }

    pub fn with_parent(mut self, file: impl Into<String>) -> Self {
        self.parent = Some(file.into());
        self
    }

    pub fn with_properties(mut self, file: impl Into<String>) -> Self {
        self.properties = Some(file.into());
        self
    }

    pub fn with_unparsed(mut self, count: usize) -> Self {
        self.unparsed_elements = count;
        self
    }
}
