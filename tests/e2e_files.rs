//! Linked documents: applied files, parent files, properties files,
//! notifications and text export.

use pretty_assertions::assert_eq;
use propgraph::tree::properties::parse_properties;
use propgraph::{Declaration, ElementValue, FileTree, ModelConfig, Notification, Project, Value};

fn versions() -> FileTree {
    FileTree::build("versions.gradle", vec![Declaration::block("ext", vec![
        Declaration::property("kotlin", "1.9.0"),
        Declaration::property("sdk", 34),
    ])])
}

// ============================================================================
// 1. Scope chain
// ============================================================================

#[test]
fn test_applied_file_is_searched() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::block("dependencies", vec![
            Declaration::property("stdlib", "org.jetbrains.kotlin:kotlin-stdlib:${kotlin}"),
        ])])
        .apply("versions.gradle"),
        versions(),
    ])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    let stdlib = model.find_property("dependencies.stdlib").unwrap();
    assert_eq!(stdlib.value::<String>().as_deref(), Some("org.jetbrains.kotlin:kotlin-stdlib:1.9.0"));

    let deps = stdlib.dependencies();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].file_name(), "versions.gradle");
    assert_eq!(deps[0].fully_qualified_name(), "ext.kotlin");
    assert_eq!(deps[0].dependents(), vec![stdlib]);
}

#[test]
fn test_own_declaration_shadows_applied_file() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::block("ext", vec![
            Declaration::property("kotlin", "2.0.0"),
            Declaration::property("used", ElementValue::expr("kotlin")),
        ])])
        .apply("versions.gradle"),
        versions(),
    ])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    assert_eq!(model.find_property("ext.used").unwrap().value::<String>().as_deref(), Some("2.0.0"));
}

#[test]
fn test_submodule_sees_parent_and_root_project() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::block("ext", vec![Declaration::property("sdk", 33)])]),
        FileTree::build("app/build.gradle", vec![Declaration::block("android", vec![
            Declaration::property("compileSdk", ElementValue::expr("sdk")),
            Declaration::property("targetSdk", ElementValue::expr("rootProject.ext.sdk")),
            Declaration::property("minSdk", ElementValue::expr("project.ext.min")),
        ])])
        .with_parent("build.gradle"),
    ])
    .unwrap();
    let app = project.build_model("app/build.gradle").unwrap();
    assert_eq!(app.find_property("android.compileSdk").unwrap().value::<i64>(), Some(33));
    assert_eq!(app.find_property("android.targetSdk").unwrap().value::<i64>(), Some(33));

    // `project.ext.min` only looks in the submodule's own chain; declaring
    // it there binds the dangling edge.
    let min = app.find_property("android.minSdk").unwrap();
    assert_eq!(min.value::<String>().as_deref(), Some("project.ext.min"));
    app.find_property("ext.min").unwrap().set_value(21).unwrap();
    assert_eq!(min.value::<i64>(), Some(21));
}

#[test]
fn test_properties_file_has_lowest_priority() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::block("ext", vec![
            Declaration::property("animal", "cat"),
            Declaration::property("pair", "${animal} and ${nested.prop5}"),
        ])])
        .with_properties("gradle.properties"),
        parse_properties("gradle.properties", "animal = lion\nnested.prop5 = narwhal"),
    ])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    assert_eq!(model.find_property("ext.pair").unwrap().value::<String>().as_deref(), Some("cat and narwhal"));
}

#[test]
fn test_deleting_shadowing_property_falls_back() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::block("ext", vec![
            Declaration::property("animal", "cat"),
            Declaration::property("says", "${animal}!"),
        ])])
        .with_properties("gradle.properties"),
        parse_properties("gradle.properties", "animal = lion"),
    ])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    let says = model.find_property("ext.says").unwrap();
    model.find_property("ext.animal").unwrap().delete().unwrap();
    assert_eq!(says.value::<String>().as_deref(), Some("lion!"));
    assert_eq!(says.dependencies()[0].file_name(), "gradle.properties");
}

// ============================================================================
// 2. Notifications
// ============================================================================

#[test]
fn test_notifications_are_attached_to_their_file() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![]).apply("a.gradle").with_unparsed(2),
        FileTree::build("a.gradle", vec![]).apply("build.gradle").apply("gone.gradle"),
    ])
    .unwrap();
    assert_eq!(project.build_model("build.gradle").unwrap().notifications(), vec![Notification::IncompleteParse {
        count: 2
    }]);
    assert_eq!(project.build_model("a.gradle").unwrap().notifications(), vec![
        Notification::CircularApplication { applied: "build.gradle".into() },
        Notification::MissingLinkedFile { name: "gone.gradle".into() },
    ]);
}

#[test]
fn test_circular_application_still_resolves() {
    let project = Project::load(vec![
        FileTree::build("build.gradle", vec![Declaration::property("x", ElementValue::expr("y"))]).apply("a.gradle"),
        FileTree::build("a.gradle", vec![Declaration::property("y", 1)]).apply("build.gradle"),
    ])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    assert_eq!(model.find_property("x").unwrap().value::<i64>(), Some(1));
}

// ============================================================================
// 3. Export
// ============================================================================

#[test]
fn test_text_follows_edits() {
    let project = Project::load(vec![FileTree::build("build.gradle", vec![
        Declaration::variable("base", "1.0"),
        Declaration::block("ext", vec![
            Declaration::property("version", "${base}-SNAPSHOT"),
            Declaration::property("libs", ElementValue::list(["a", "b"])),
        ]),
    ])])
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    let libs = model.find_property("ext.libs").unwrap();
    libs.add_list_value("c").unwrap();
    model.find_property("ext.flags").unwrap().convert_to_empty_map().unwrap();
    model.find_property("ext.flags").unwrap().map_value("debug").unwrap().set_value(true).unwrap();

    assert_eq!(
        model.text().unwrap(),
        "def base = '1.0'\next {\n  version = \"${base}-SNAPSHOT\"\n  libs = ['a', 'b', 'c']\n  flags = [debug: true]\n}\n"
    );
    let snapshot = model.snapshot();
    assert_eq!(snapshot["properties"]["ext.version"], "1.0-SNAPSHOT");
    assert_eq!(snapshot["properties"]["ext.flags"]["debug"], true);
}

#[test]
fn test_custom_extra_block_name() {
    let config = ModelConfig { extra_block: "extra".into(), ..ModelConfig::default() };
    let project = Project::load_with_config(
        vec![FileTree::build("build.gradle", vec![
            Declaration::block("extra", vec![Declaration::property("a", 1)]),
            Declaration::property("b", ElementValue::expr("a")),
        ])],
        config,
    )
    .unwrap();
    let model = project.build_model("build.gradle").unwrap();
    assert_eq!(model.find_property("b").unwrap().resolve(), Value::Integer(1));
    assert_eq!(model.ext().unwrap().name(), "extra");
}
