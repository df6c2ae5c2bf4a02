//! End-to-end scenarios through the public model.
//!
//! Each test loads a project from element trees, then reads and edits it
//! through `BuildModel` and `PropertyHandle` only.

use pretty_assertions::assert_eq;
use propgraph::{Declaration, ElementValue, Error, FileTree, Project, PropertyHandle, Value, ValueType};

fn ext_model(decls: Vec<Declaration>) -> propgraph::BuildModel {
    Project::load(vec![FileTree::build("build.gradle", vec![Declaration::block("ext", decls)])])
        .unwrap()
        .build_model("build.gradle")
        .unwrap()
}

fn names(handles: &[PropertyHandle]) -> Vec<String> {
    handles.iter().map(PropertyHandle::fully_qualified_name).collect()
}

// ============================================================================
// A. Interpolation
// ============================================================================

#[test]
fn test_interpolated_string_resolves() {
    let model = ext_model(vec![
        Declaration::property("prop1", "value"),
        Declaration::property("prop2", "${prop1} world!"),
    ]);
    let prop2 = model.find_property("ext.prop2").unwrap();
    assert_eq!(prop2.value_type(), ValueType::String);
    assert_eq!(prop2.resolve(), Value::String("value world!".into()));
    assert_eq!(names(&prop2.dependencies()), vec!["ext.prop1"]);
    assert_eq!(prop2.raw_value::<String>(), Some("${prop1} world!".to_string()));
}

// ============================================================================
// B. Self reference
// ============================================================================

#[test]
fn test_self_reference_terminates() {
    let model = ext_model(vec![Declaration::property("prop1", ElementValue::expr("prop1"))]);
    let prop1 = model.find_property("ext.prop1").unwrap();
    assert_eq!(prop1.resolve(), Value::String("prop1".into()));
    assert!(prop1.dependencies().is_empty());
    assert!(prop1.dependents().is_empty());
}

// ============================================================================
// C. Deleting a referenced list element
// ============================================================================

#[test]
fn test_deleted_list_element_leaves_reference_dangling() {
    let model = ext_model(vec![
        Declaration::property("prop1", ElementValue::list([1, 2, 3])),
        Declaration::property("prop2", ElementValue::expr("prop1[1]")),
    ]);
    let prop2 = model.find_property("ext.prop2").unwrap();
    assert_eq!(prop2.value::<i64>(), Some(2));

    model.find_property("ext.prop1[1]").unwrap().delete().unwrap();
    assert_eq!(prop2.resolve(), Value::String("prop1[1]".into()));
    assert!(prop2.dependencies().is_empty());
    assert_eq!(model.find_property("ext.prop1").unwrap().resolve(), Value::from(vec![1, 3]));

    // The apply boundary rebinds by path.
    model.apply_changes();
    assert_eq!(prop2.value::<i64>(), Some(3));
}

// ============================================================================
// D. Rename keeps edges
// ============================================================================

#[test]
fn test_rename_keeps_dependent_bound() {
    let model = ext_model(vec![
        Declaration::property("prop3", "three"),
        Declaration::property("user", ElementValue::expr("prop3")),
    ]);
    let prop3 = model.find_property("ext.prop3").unwrap();
    let user = model.find_property("ext.user").unwrap();

    prop3.rename("prop9").unwrap();
    assert!(prop3.is_modified());
    assert_eq!(prop3.fully_qualified_name(), "ext.prop9");
    assert_eq!(user.dependencies(), vec![prop3.clone()]);
    assert_eq!(user.value::<String>(), Some("three".to_string()));

    prop3.rename("prop3").unwrap();
    assert!(!prop3.is_modified());
}

// ============================================================================
// E. Lazy propagation
// ============================================================================

#[test]
fn test_change_propagates_lazily() {
    let model = ext_model(vec![
        Declaration::property("prop1", "hello"),
        Declaration::property("prop2", "${prop1} world"),
    ]);
    let prop2 = model.find_property("ext.prop2").unwrap();
    assert_eq!(prop2.value::<String>(), Some("hello world".to_string()));

    model.find_property("ext.prop1").unwrap().set_value("goodbye").unwrap();
    assert_eq!(prop2.value::<String>(), Some("goodbye world".to_string()));
    assert!(!prop2.is_modified());
    assert!(model.find_property("ext.prop1").unwrap().is_modified());
}

// ============================================================================
// Error policy
// ============================================================================

#[test]
fn test_loud_failures() {
    let model = ext_model(vec![
        Declaration::property("list", ElementValue::list(["a"])),
        Declaration::property("text", "value"),
    ]);
    let list = model.find_property("ext.list").unwrap();
    let element = model.find_property("ext.list[0]").unwrap();
    assert!(matches!(element.rename("b"), Err(Error::UnsupportedOperation(_))));
    assert!(matches!(list.set_value(f64::NAN), Err(Error::IllegalArgument(_))));
    assert!(matches!(list.add_list_value_at(5, "x"), Err(Error::IndexOutOfBounds { index: 5, len: 1 })));
    assert!(matches!(
        model.find_property("ext.text").unwrap().map_value("k"),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_quiet_degradation() {
    let model = ext_model(vec![
        Declaration::property("call", ElementValue::expr("obj.getName()")),
        Declaration::property("missing", ElementValue::expr("nowhere")),
        Declaration::property("text", "value"),
    ]);
    let call = model.find_property("ext.call").unwrap();
    assert_eq!(call.value_type(), ValueType::Unknown);
    assert!(call.dependencies().is_empty());
    assert_eq!(model.find_property("ext.missing").unwrap().value::<String>(), Some("nowhere".to_string()));
    assert_eq!(model.find_property("ext.text").unwrap().value::<i64>(), None);
}
