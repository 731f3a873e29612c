//! Projection Tests
//!
//! Tests for moving data between records and views:
//! - Applying a view deep-merges nested records and maps of records
//! - Fields a view omits keep the target's values
//! - Building a view from a record keeps only what the view declares
//! - Aliased schemas behave the same as plain ones
//! - A pass-through view applies like any other

use schema_views::schema::{
    AccessMode, Catalog, DefaultFactory, FieldSpec, Record, Schema, TypeExpr,
};
use schema_views::views::{Builder, Projector};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn camel(name: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn identity(name: &str) -> String {
    name.to_string()
}

/// `field_int`, a write-only string, a write-only optional self reference
/// and a map of self references.
fn model_schema(name: &str, alias: fn(&str) -> String) -> Schema {
    let field = |field: &str, ty: TypeExpr| {
        let spec = FieldSpec::new(field, ty);
        let external = alias(field);
        if external == field {
            spec
        } else {
            spec.alias(external)
        }
    };
    Schema::new(
        name,
        "tests::models",
        vec![
            field("field_int", TypeExpr::Int).default_value(json!(1)),
            field("field_str", TypeExpr::Str)
                .access(AccessMode::WriteOnly)
                .default_value(json!("default str")),
            field("field_recurrent", TypeExpr::optional(TypeExpr::reference(name)))
                .access(AccessMode::WriteOnly)
                .default_value(Value::Null),
            field("field_dict", TypeExpr::map(TypeExpr::Str, TypeExpr::reference(name)))
                .default_factory(DefaultFactory::empty_map()),
        ],
    )
}

fn setup_catalog() -> Catalog {
    let catalog = Catalog::new();
    for (name, alias) in cases() {
        catalog.register(model_schema(name, alias)).unwrap();
        Builder::update().build_view(&catalog, name).unwrap();
        Builder::load().build_view(&catalog, name).unwrap();
        catalog
            .ensure_views(name)
            .unwrap()
            .register_pass_through("Replica")
            .unwrap();
    }
    catalog
}

fn cases() -> [(&'static str, fn(&str) -> String); 2] {
    [("Model", identity), ("ModelAlias", camel)]
}

fn original(catalog: &Catalog, schema: &str, a: fn(&str) -> String) -> Record {
    catalog
        .construct(
            schema,
            json!({
                a("field_int"): 3,
                a("field_recurrent"): {
                    a("field_int"): 2,
                    a("field_str"): "no-touch"
                },
                a("field_dict"): {"test": {a("field_str"): "nnn"}}
            }),
        )
        .unwrap()
}

fn patch_input(a: fn(&str) -> String) -> Value {
    json!({
        a("field_recurrent"): {a("field_int"): 5},
        a("field_dict"): {
            "test": {a("field_int"): 8},
            "test2": {a("field_int"): 9}
        }
    })
}

fn assert_merged(merged: &Record) {
    assert_eq!(merged.get("field_int"), Some(&json!(3)));

    let recurrent = merged.get("field_recurrent").unwrap();
    assert_eq!(recurrent["field_int"], json!(5));
    assert_eq!(recurrent["field_str"], json!("no-touch"));

    let dict = merged.get("field_dict").unwrap();
    assert_eq!(dict["test"]["field_str"], json!("nnn"));
    assert_eq!(dict["test"]["field_int"], json!(8));
    assert_eq!(dict["test2"]["field_int"], json!(9));
    assert_eq!(dict["test2"]["field_str"], json!("default str"));
    assert_eq!(dict["test2"]["field_dict"], json!({}));
}

// =============================================================================
// Apply Tests
// =============================================================================

#[test]
fn test_update_model() {
    let catalog = setup_catalog();
    let projector = Projector::new(&catalog);

    for (schema, a) in cases() {
        let orig = original(&catalog, schema, a);
        let update_view = catalog.view(schema, "Update").unwrap();
        let update = catalog.construct(&update_view.schema().name, patch_input(a)).unwrap();

        let merged = projector.apply_to(&update, &orig).unwrap();
        assert_eq!(merged.schema_name(), schema);
        assert_merged(&merged);

        // Inputs are left untouched
        assert_eq!(orig.get("field_recurrent").unwrap()["field_int"], json!(2));
    }
}

#[test]
fn test_no_view() {
    let catalog = setup_catalog();
    let projector = Projector::new(&catalog);

    for (schema, a) in cases() {
        let replica = catalog.view(schema, "Replica").unwrap();
        assert!(replica.is_pass_through());
        assert_eq!(replica.schema().fields, catalog.get(schema).unwrap().fields);

        let orig = original(&catalog, schema, a);
        let update = catalog.construct(&replica.schema().name, patch_input(a)).unwrap();

        let merged = projector.apply(&orig, &update).unwrap();
        // field_int was not provided by the patch: its default 1 must not leak
        assert_merged(&merged);
    }
}

#[test]
fn test_apply_explicit_null_replaces() {
    let catalog = setup_catalog();
    let orig = original(&catalog, "Model", identity);
    let update = catalog
        .construct("ModelUpdate", json!({"field_recurrent": null}))
        .unwrap();

    let merged = Projector::new(&catalog).apply_to(&update, &orig).unwrap();
    assert_eq!(merged.get("field_recurrent"), Some(&Value::Null));
    assert_eq!(merged.get("field_int"), Some(&json!(3)));
}

#[test]
fn test_apply_all_optional_view_skips_unset() {
    let catalog = setup_catalog();
    Builder::new("Patch", [AccessMode::WriteOnly])
        .all_optional(true)
        .build_view(&catalog, "Model")
        .unwrap();
    let orig = original(&catalog, "Model", identity);

    let patch = catalog.construct("ModelPatch", json!({"field_str": "new"})).unwrap();
    assert!(!patch.is_set("field_int"));

    let merged = Projector::new(&catalog).apply_to(&patch, &orig).unwrap();
    assert_eq!(merged.get("field_str"), Some(&json!("new")));
    assert_eq!(merged.get("field_int"), Some(&json!(3)));
    assert_eq!(merged.get("field_recurrent").unwrap()["field_str"], json!("no-touch"));
}

#[test]
fn test_apply_unrelated_schema_rejected() {
    let catalog = setup_catalog();
    catalog
        .register(Schema::new(
            "Loose",
            "",
            vec![FieldSpec::new("field_int", TypeExpr::Any).default_value(Value::Null)],
        ))
        .unwrap();
    let orig = original(&catalog, "Model", identity);
    let loose = catalog.construct("Loose", json!({"field_int": "three"})).unwrap();

    let err = Projector::new(&catalog).apply(&orig, &loose).unwrap_err();
    assert_eq!(err.code().code(), "VIEW_SOURCE_MISMATCH");
    assert_eq!(orig.get("field_int"), Some(&json!(3)));
}

// =============================================================================
// Build-From Tests
// =============================================================================

#[test]
fn test_model_perspective() {
    let catalog = setup_catalog();
    let projector = Projector::new(&catalog);

    for (schema, a) in cases() {
        let orig = original(&catalog, schema, a);
        let load = catalog.view(schema, "Load").unwrap();

        let pov = projector.build_from(&load.schema().name, &orig).unwrap();
        assert_eq!(pov.get("field_int"), Some(&json!(3)));
        assert_eq!(pov.get("field_dict").unwrap()["test"]["field_int"], json!(1));
        assert_eq!(pov.get("field_dict").unwrap()["test"]["field_dict"], json!({}));

        // Write-only fields are not readable
        assert!(pov.get("field_str").is_none());
        assert!(pov.get("field_dict").unwrap()["test"].get("field_str").is_none());
    }
}

/// Nested records are projected element-wise through lists.
#[test]
fn test_build_from_through_list() {
    let catalog = Catalog::new();
    catalog
        .register(Schema::new(
            "Inner",
            "",
            vec![
                FieldSpec::new("x", TypeExpr::Int).default_value(json!(0)),
                FieldSpec::new("label", TypeExpr::Str)
                    .access(AccessMode::ReadOnly)
                    .default_value(json!("unnamed")),
            ],
        ))
        .unwrap();
    catalog
        .register(Schema::new(
            "Outer",
            "",
            vec![
                FieldSpec::new("a", TypeExpr::Int),
                FieldSpec::new("items", TypeExpr::list(TypeExpr::reference("Inner"))),
            ],
        ))
        .unwrap();

    Builder::load().build_view(&catalog, "Outer").unwrap();
    let source = catalog.construct("Outer", json!({"a": 1, "items": [{"x": 4}]})).unwrap();
    assert_eq!(source.get("items").unwrap()[0]["label"], json!("unnamed"));

    let view = Projector::new(&catalog).build_from("OuterLoad", &source).unwrap();
    assert_eq!(view.to_value(), json!({"a": 1, "items": [{"x": 4, "label": "unnamed"}]}));
    assert_eq!(view.schema().origin.as_ref().unwrap().source, "Outer");
}

#[test]
fn test_build_from_root_view() {
    let catalog = setup_catalog();
    catalog
        .register(Schema::root(
            "Models",
            "",
            TypeExpr::var_tuple(TypeExpr::reference("Model")),
        ))
        .unwrap();
    let view = Builder::load().build_view(&catalog, "Models").unwrap();

    let source = catalog
        .construct("Models", json!([{"field_str": "hidden"}, {"field_int": 7}]))
        .unwrap();
    let projected = Projector::new(&catalog).build_from(&view.name, &source).unwrap();

    assert_eq!(
        projected.to_value(),
        json!([
            {"field_int": 1, "field_dict": {}},
            {"field_int": 7, "field_dict": {}}
        ])
    );
}

#[test]
fn test_build_from_wrong_source() {
    let catalog = setup_catalog();
    let orig = original(&catalog, "Model", identity);

    let err = Projector::new(&catalog).build_from("ModelAliasLoad", &orig).unwrap_err();
    assert_eq!(err.code().code(), "VIEW_SOURCE_MISMATCH");
}

// =============================================================================
// Alias Tests
// =============================================================================

#[test]
fn test_dump_by_alias() {
    let catalog = setup_catalog();
    let orig = original(&catalog, "ModelAlias", camel);
    let validator = schema_views::schema::RecordValidator::new(&catalog);

    let dumped = validator.dump(&orig, true).unwrap();
    assert_eq!(dumped["fieldInt"], json!(3));
    assert_eq!(dumped["fieldRecurrent"]["fieldStr"], json!("no-touch"));
    assert_eq!(dumped["fieldDict"]["test"]["fieldStr"], json!("nnn"));

    let plain = validator.dump(&orig, false).unwrap();
    assert_eq!(plain["field_int"], json!(3));
}
