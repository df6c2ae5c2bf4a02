//! # Property Model Facade
//!
//! Cheap handles over a shared [`PropertyGraph`]. Every handle holds the
//! same `Arc<RwLock<_>>`, so a write through one is visible through all
//! of them. Each call takes the lock once, for reading or for writing.
//!
//! ```text
//! Project ──build_model("build.gradle")──▶ BuildModel
//!    BuildModel ──find_property("ext.prop1")──▶ PropertyHandle
//!    BuildModel ──block("android")──▶ BlockModel ──declared_properties()──▶ [PropertyHandle]
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ModelConfig;
use crate::export;
use crate::graph::PropertyGraph;
use crate::model::*;
use crate::mutation::IntoElementValue;
use crate::tree::FileTree;
use crate::{Error, Result};

type Shared = Arc<RwLock<PropertyGraph>>;

// ============================================================================
// Project
// ============================================================================

/// A set of linked documents loaded into one graph.
#[derive(Clone)]
pub struct Project {
    graph: Shared,
}

impl Project {
    pub fn load(trees: Vec<FileTree>) -> Result<Self> {
        Self::load_with_config(trees, ModelConfig::default())
    }

    pub fn load_with_config(trees: Vec<FileTree>, config: ModelConfig) -> Result<Self> {
        let graph = PropertyGraph::load(trees, config)?;
        Ok(Self { graph: Arc::new(RwLock::new(graph)) })
    }

    /// The model of one document, by file name.
    pub fn build_model(&self, name: &str) -> Result<BuildModel> {
        let graph = self.graph.read();
        let file = graph.file_by_name(name).ok_or_else(|| Error::NotFound(format!("file '{name}'")))?;
        let root = graph.file(file).map(|f| f.root).ok_or_else(|| Error::NotFound(format!("file '{name}'")))?;
        Ok(BuildModel { graph: Arc::clone(&self.graph), file, root })
    }

    /// Names of all loaded documents, in load order.
    pub fn files(&self) -> Vec<String> {
        self.graph.read().files().iter().map(|f| f.name.clone()).collect()
    }

    /// See [`PropertyGraph::apply_changes`].
    pub fn apply_changes(&self) {
        self.graph.write().apply_changes();
    }

    /// Read access to the underlying graph (for advanced use).
    pub fn graph(&self) -> parking_lot::RwLockReadGuard<'_, PropertyGraph> {
        self.graph.read()
    }
}

// ============================================================================
// BuildModel
// ============================================================================

/// One document of a [`Project`].
#[derive(Clone)]
pub struct BuildModel {
    graph: Shared,
    file: FileId,
    root: BlockId,
}

impl BuildModel {
    pub fn name(&self) -> String {
        self.graph.read().file(self.file).map(|f| f.name.clone()).unwrap_or_default()
    }

    pub fn file_id(&self) -> FileId {
        self.file
    }

    /// The document's top-level scope.
    pub fn root(&self) -> BlockModel {
        BlockModel { graph: Arc::clone(&self.graph), block: self.root }
    }

    /// The extra-properties block, created when missing.
    pub fn ext(&self) -> Result<BlockModel> {
        let name = self.graph.read().config().extra_block.clone();
        self.block(&name)
    }

    /// A block by dotted path, e.g. `android.defaultConfig`. Missing
    /// blocks are created empty and stay out of the written text until
    /// something is declared in them.
    pub fn block(&self, path: &str) -> Result<BlockModel> {
        self.root().block(path)
    }

    /// The property at `path`, e.g. `ext.prop1`, `ext.list[0]` or
    /// `ext.map["key"]`. A name that is not declared yet comes back as a
    /// placeholder of type `NONE` that can be set.
    pub fn find_property(&self, path: &str) -> Result<PropertyHandle> {
        self.root().find_property(path)
    }

    /// Top-level declarations in declaration order.
    pub fn declared_properties(&self) -> Vec<PropertyHandle> {
        self.root().declared_properties()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.graph.read().file(self.file).map(|f| f.notifications.clone()).unwrap_or_default()
    }

    pub fn apply_changes(&self) {
        self.graph.write().apply_changes();
    }

    /// The document rendered back to DSL text.
    pub fn text(&self) -> Result<String> {
        export::file_text(&self.graph.read(), self.file)
    }

    pub fn write_text(&self, writer: &mut dyn Write) -> Result<()> {
        export::write_file(&self.graph.read(), self.file, writer)
    }

    /// Resolved top-level values as JSON.
    pub fn snapshot(&self) -> serde_json::Value {
        export::snapshot(&self.graph.read(), self.file)
    }
}

impl fmt::Debug for BuildModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildModel").field("file", &self.file).finish()
    }
}

// ============================================================================
// BlockModel
// ============================================================================

/// A named scope inside a document, e.g. `ext` or `android.defaultConfig`.
#[derive(Clone)]
pub struct BlockModel {
    graph: Shared,
    block: BlockId,
}

impl BlockModel {
    pub fn name(&self) -> String {
        self.graph.read().block(self.block).map(|b| b.name.clone()).unwrap_or_default()
    }

    /// Dotted path from the file root. Empty for the root itself.
    pub fn path(&self) -> String {
        self.graph.read().block_path(self.block)
    }

    pub fn block(&self, path: &str) -> Result<BlockModel> {
        let block = self.graph.write().find_block(self.block, path)?;
        Ok(BlockModel { graph: Arc::clone(&self.graph), block })
    }

    /// The property at `path` relative to this block.
    pub fn find_property(&self, path: &str) -> Result<PropertyHandle> {
        let id = self.graph.write().find_property(self.block, path)?;
        Ok(PropertyHandle::new(&self.graph, id))
    }

    /// Declarations directly in this block, in declaration order.
    pub fn declared_properties(&self) -> Vec<PropertyHandle> {
        self.members_where(|_| true)
    }

    pub fn properties(&self) -> Vec<PropertyHandle> {
        self.members_where(|t| matches!(t, PropertyType::Regular | PropertyType::PropertiesFile))
    }

    pub fn variables(&self) -> Vec<PropertyHandle> {
        self.members_where(|t| t == PropertyType::Variable)
    }

    fn members_where(&self, keep: impl Fn(PropertyType) -> bool) -> Vec<PropertyHandle> {
        let graph = self.graph.read();
        let Some(block) = graph.block(self.block) else { return Vec::new() };
        block
            .members
            .iter()
            .filter_map(|&m| match m {
                Member::Node(id) => graph.node(id),
                Member::Block(_) => None,
            })
            .filter(|n| n.declared && keep(n.property_type))
            .map(|n| PropertyHandle::new(&self.graph, n.id))
            .collect()
    }

    /// Every property visible from this block, by the name it is visible
    /// under. Shadowed declarations are left out.
    pub fn in_scope_properties(&self) -> Vec<(String, PropertyHandle)> {
        self.graph
            .read()
            .in_scope_properties(self.block)
            .into_iter()
            .map(|(name, id)| (name, PropertyHandle::new(&self.graph, id)))
            .collect()
    }
}

impl fmt::Debug for BlockModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockModel").field("block", &self.block.0).finish()
    }
}

// ============================================================================
// PropertyHandle
// ============================================================================

/// A property, variable, list element, map entry or projection.
///
/// Handles stay valid across mutations: a deleted property reads as
/// `NONE` and can be set again.
#[derive(Clone)]
pub struct PropertyHandle {
    graph: Shared,
    id: NodeId,
}

impl PropertyHandle {
    fn new(graph: &Shared, id: NodeId) -> Self {
        Self { graph: Arc::clone(graph), id }
    }

    fn handle(&self, id: NodeId) -> Self {
        Self::new(&self.graph, id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind of the declared value. `NONE` for placeholders.
    pub fn value_type(&self) -> ValueType {
        let graph = self.graph.read();
        match graph.node(self.id) {
            Some(node) if !node.declared => ValueType::None,
            Some(node) if node.projection.is_some() => graph.raw_view(self.id).value_type(),
            Some(node) => node.value_type(),
            None => ValueType::None,
        }
    }

    pub fn property_type(&self) -> Option<PropertyType> {
        self.graph.read().node(self.id).map(|n| n.property_type)
    }

    pub fn name(&self) -> String {
        self.graph.read().node(self.id).map(|n| n.name.clone()).unwrap_or_default()
    }

    pub fn fully_qualified_name(&self) -> String {
        self.graph.read().qualified_name(self.id)
    }

    /// Name of the document the property is declared in.
    pub fn file_name(&self) -> String {
        let graph = self.graph.read();
        graph.node(self.id).and_then(|n| graph.file(n.file)).map(|f| f.name.clone()).unwrap_or_default()
    }

    pub fn is_declared(&self) -> bool {
        self.graph.read().node(self.id).is_some_and(|n| n.declared)
    }

    /// The value with every reference followed.
    pub fn resolve(&self) -> Value {
        self.graph.read().resolve(self.id)
    }

    /// Resolved value as `T`. `None` when absent or of another kind.
    pub fn value<T: FromValue>(&self) -> Option<T> {
        T::from_value(&self.resolve())
    }

    /// Declared value as `T`, references not followed.
    pub fn raw_value<T: FromValue>(&self) -> Option<T> {
        T::from_value(&self.graph.read().raw_view(self.id))
    }

    pub fn set_value<V: IntoElementValue>(&self, value: V) -> Result<()> {
        let value = value.into_element_value()?;
        self.graph.write().set_value(self.id, value)
    }

    pub fn rename(&self, new_name: &str) -> Result<()> {
        self.graph.write().rename(self.id, new_name)
    }

    pub fn delete(&self) -> Result<()> {
        self.graph.write().delete(self.id)
    }

    pub fn move_to(&self, index: usize) -> Result<()> {
        self.graph.write().move_to(self.id, index)
    }

    /// Targets of this property's resolved references, list elements and
    /// map entries included, in reference order. A target referenced
    /// twice appears twice.
    pub fn dependencies(&self) -> Vec<PropertyHandle> {
        let graph = self.graph.read();
        graph
            .effective_dependencies(self.id)
            .into_iter()
            .filter_map(|e| graph.edge(e).and_then(|edge| edge.target))
            .map(|t| self.handle(t))
            .collect()
    }

    /// Properties whose references resolve to this one, or pass through
    /// it on the way to something else.
    pub fn dependents(&self) -> Vec<PropertyHandle> {
        let graph = self.graph.read();
        graph
            .effective_dependents(self.id)
            .into_iter()
            .filter_map(|e| graph.edge(e).map(|edge| edge.origin))
            .map(|o| self.handle(o))
            .collect()
    }

    /// True when the declaration differs from the last load or apply.
    pub fn is_modified(&self) -> bool {
        self.graph.read().is_modified(self.id)
    }

    // ========================================================================
    // Lists and maps
    // ========================================================================

    pub fn to_list(&self) -> Option<Vec<PropertyHandle>> {
        let graph = self.graph.read();
        let node = graph.node(self.id).filter(|n| n.declared && n.raw == RawValue::List)?;
        Some(node.children.iter().map(|&c| self.handle(c)).collect())
    }

    pub fn to_map(&self) -> Option<Vec<(String, PropertyHandle)>> {
        let graph = self.graph.read();
        let node = graph.node(self.id).filter(|n| n.declared && n.raw == RawValue::Map)?;
        Some(
            node.children
                .iter()
                .filter_map(|&c| graph.node(c).map(|n| (n.name.clone(), self.handle(c))))
                .collect(),
        )
    }

    /// The list element whose declared value reads as `text`.
    pub fn list_value(&self, text: &str) -> Option<PropertyHandle> {
        self.graph.read().list_value(self.id, text).map(|c| self.handle(c))
    }

    pub fn map_value(&self, key: &str) -> Result<PropertyHandle> {
        let id = self.graph.write().map_value(self.id, key)?;
        Ok(self.handle(id))
    }

    pub fn add_list_value<V: IntoElementValue>(&self, value: V) -> Result<PropertyHandle> {
        let value = value.into_element_value()?;
        let id = self.graph.write().add_list_value(self.id, value)?;
        Ok(self.handle(id))
    }

    pub fn add_list_value_at<V: IntoElementValue>(&self, index: usize, value: V) -> Result<PropertyHandle> {
        let value = value.into_element_value()?;
        let id = self.graph.write().add_list_value_at(self.id, index, value)?;
        Ok(self.handle(id))
    }

    pub fn convert_to_empty_list(&self) -> Result<()> {
        self.graph.write().convert_to_empty_list(self.id)
    }

    pub fn convert_to_empty_map(&self) -> Result<()> {
        self.graph.write().convert_to_empty_map(self.id)
    }

    /// Segment `index` of this property's `separator`-split string value,
    /// as a property of its own named `name`.
    pub fn projection(&self, name: &str, separator: char, index: usize) -> Result<PropertyHandle> {
        let id = self.graph.write().projection(self.id, name, separator, index)?;
        Ok(self.handle(id))
    }
}

impl PartialEq for PropertyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.graph, &other.graph)
    }
}

impl Eq for PropertyHandle {}

impl fmt::Debug for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{properties::parse_properties, Declaration, ElementValue};
    use pretty_assertions::assert_eq;

    fn project(decls: Vec<Declaration>) -> BuildModel {
        Project::load(vec![FileTree::build("build.gradle", decls)]).unwrap().build_model("build.gradle").unwrap()
    }

    #[test]
    fn test_unknown_file() {
        let p = Project::load(vec![FileTree::build("build.gradle", vec![])]).unwrap();
        assert!(matches!(p.build_model("other.gradle"), Err(Error::NotFound(_))));
        assert_eq!(p.files(), vec!["build.gradle"]);
    }

    #[test]
    fn test_handle_accessors() {
        let model = project(vec![Declaration::block("ext", vec![
            Declaration::property("prop1", "value"),
            Declaration::property("prop2", ElementValue::expr("prop1")),
        ])]);
        let prop2 = model.find_property("ext.prop2").unwrap();
        assert_eq!(prop2.name(), "prop2");
        assert_eq!(prop2.fully_qualified_name(), "ext.prop2");
        assert_eq!(prop2.file_name(), "build.gradle");
        assert_eq!(prop2.value_type(), ValueType::Reference);
        assert_eq!(prop2.property_type(), Some(PropertyType::Regular));
        assert_eq!(prop2.value::<String>(), Some("value".to_string()));
        assert_eq!(prop2.raw_value::<ReferenceTo>(), Some(ReferenceTo::new("prop1")));
        assert_eq!(prop2.value::<i64>(), None);
        assert_eq!(prop2.dependencies(), vec![model.find_property("ext.prop1").unwrap()]);
        assert_eq!(model.find_property("ext.prop1").unwrap().dependents(), vec![prop2]);
    }

    #[test]
    fn test_placeholder_then_declare() {
        let model = project(vec![Declaration::block("ext", vec![Declaration::property("user", "${later}!")])]);
        let later = model.find_property("ext.later").unwrap();
        assert_eq!(later.value_type(), ValueType::None);
        assert!(!later.is_declared());
        later.set_value("hi").unwrap();
        assert_eq!(model.find_property("ext.user").unwrap().value::<String>(), Some("hi!".to_string()));
    }

    #[test]
    fn test_block_listings() {
        let model = project(vec![
            Declaration::variable("v", 1),
            Declaration::property("p", 2),
            Declaration::block("ext", vec![Declaration::property("e", 3)]),
        ]);
        let names = |hs: Vec<PropertyHandle>| hs.iter().map(PropertyHandle::name).collect::<Vec<_>>();
        assert_eq!(names(model.declared_properties()), vec!["v", "p"]);
        assert_eq!(names(model.root().variables()), vec!["v"]);
        assert_eq!(names(model.root().properties()), vec!["p"]);
        assert_eq!(names(model.ext().unwrap().declared_properties()), vec!["e"]);
        assert_eq!(model.ext().unwrap().path(), "ext");
    }

    #[test]
    fn test_new_block_is_written_once_used() {
        let model = project(vec![]);
        let config = model.block("android.defaultConfig").unwrap();
        assert_eq!(model.text().unwrap(), "");
        config.find_property("minSdk").unwrap().set_value(21).unwrap();
        assert_eq!(model.text().unwrap(), "android {\n  defaultConfig {\n    minSdk = 21\n  }\n}\n");
    }

    #[test]
    fn test_list_and_map_handles() {
        let model = project(vec![Declaration::block("ext", vec![
            Declaration::property("l", ElementValue::list([1, 2])),
            Declaration::property("m", ElementValue::map([("k", "v")])),
        ])]);
        let l = model.find_property("ext.l").unwrap();
        let items = l.to_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].fully_qualified_name(), "ext.l[1]");
        assert!(matches!(items[0].rename("x"), Err(Error::UnsupportedOperation(_))));
        l.add_list_value(3).unwrap();
        assert_eq!(l.value::<Vec<Value>>().map(|v| v.len()), Some(3));

        let m = model.find_property("ext.m").unwrap();
        let entries = m.to_map().unwrap();
        assert_eq!(entries[0].0, "k");
        entries[0].1.rename("key").unwrap();
        assert_eq!(m.value::<Value>().and_then(|v| v.get("key").cloned()), Some(Value::String("v".into())));
        assert!(l.to_map().is_none());
    }

    #[test]
    fn test_properties_file_model() {
        let p = Project::load(vec![parse_properties("gradle.properties", "nested.key = v")]).unwrap();
        let model = p.build_model("gradle.properties").unwrap();
        let prop = model.find_property("nested.key").unwrap();
        assert_eq!(prop.property_type(), Some(PropertyType::PropertiesFile));
        assert_eq!(prop.value::<String>(), Some("v".to_string()));
        assert!(matches!(prop.set_value("x"), Err(Error::IllegalState(_))));
    }
}
