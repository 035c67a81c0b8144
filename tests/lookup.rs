use paramodel::model::Membership;
use paramodel::{ContextKind, ElementSpec, Model, ModelError, Resolved, Value};

fn three_levels() -> Model {
    let mut m = Model::new("model");
    let root = m.root();
    let a = m.add_context(root, "a", ContextKind::Scenario).unwrap();
    let b = m.add_context(a, "b", ContextKind::Assembly).unwrap();
    m.add_element(b, ElementSpec::new("c", "Point").with_property("x", 4.0))
        .unwrap();
    m
}

#[test]
fn nested_lookup_matches_manual_traversal() {
    let m = three_levels();
    let root = m.root();
    let a = m.element_map(root).unwrap().id("a").unwrap();
    let b = m.element_map(a).unwrap().id("b").unwrap();
    let c = m.element_map(b).unwrap().id("c").unwrap();
    assert_eq!(m.lookup(root, "a.b.c").unwrap(), Resolved::Element(c));
    assert_eq!(m.lookup(a, "b.c").unwrap(), Resolved::Element(c));
    assert_eq!(m.canonical_name(c).unwrap(), "model.a.b.c");
}

#[test]
fn missing_leaf_is_unresolved() {
    let m = three_levels();
    let err = m.lookup(m.root(), "a.b.missing").unwrap_err();
    assert!(matches!(err, ModelError::UnresolvedReference { ref path, .. } if path == "a.b.missing"));
}

#[test]
fn trailing_property_resolves_on_leaves_and_contexts() {
    let mut m = three_levels();
    let root = m.root();
    assert_eq!(m.resolve_value(root, "a.b.c.x").unwrap(), Value::Number(4.0));
    assert_eq!(
        m.resolve_value(root, "a.b.type").unwrap(),
        Value::Text("Assembly".into())
    );
    let c = m.lookup_element(root, "a.b.c").unwrap();
    m.set_property(c, "x", Value::Null).unwrap();
    assert!(matches!(
        m.lookup(root, "a.b.c.x"),
        Err(ModelError::UnresolvedReference { .. })
    ));
}

#[test]
fn lookup_goes_through_contextual_entries() {
    let mut m = Model::new("m");
    let root = m.root();
    let lib = m.add_context(root, "lib", ContextKind::Group).unwrap();
    let cs = m
        .add_element(lib, ElementSpec::new("cs", "CoordinateSystem").with_property("origin", [1.0, 0.0, 0.0]))
        .unwrap();
    let sc = m.add_context(root, "sc", ContextKind::Scenario).unwrap();
    m.add_contextual(sc, cs).unwrap();

    assert_eq!(m.lookup(sc, "cs").unwrap(), Resolved::Element(cs));
    assert_eq!(
        m.element_map(sc).unwrap().get("cs").unwrap().membership,
        Membership::Contextual
    );
    // The canonical name follows ownership, not the scenario entry.
    assert_eq!(m.canonical_name(cs).unwrap(), "m.lib.cs");
}

#[test]
fn delete_then_re_add_same_name() {
    let mut m = three_levels();
    let root = m.root();
    let b = m.lookup_element(root, "a.b").unwrap();
    let c = m.lookup_element(b, "c").unwrap();
    m.delete(c).unwrap();
    assert!(m.lookup(b, "c").is_err());
    let c2 = m.add_element(b, ElementSpec::new("c", "Point")).unwrap();
    assert_ne!(c, c2);
    assert_eq!(m.lookup(root, "a.b.c").unwrap(), Resolved::Element(c2));
}

#[test]
fn rename_keeps_position_and_rejects_duplicates() {
    let mut m = Model::new("m");
    let root = m.root();
    let first = m.add_element(root, ElementSpec::new("first", "Point")).unwrap();
    m.add_element(root, ElementSpec::new("second", "Point")).unwrap();
    m.rename(first, "renamed").unwrap();
    let names: Vec<&str> = m.element_map(root).unwrap().names().collect();
    assert_eq!(names, vec!["renamed", "second"]);

    let err = m.rename(first, "second").unwrap_err();
    assert_eq!(
        err,
        ModelError::DuplicateName {
            name: "second".into(),
            context: "m".into()
        }
    );
    let names: Vec<&str> = m.element_map(root).unwrap().names().collect();
    assert_eq!(names, vec!["renamed", "second"]);
}
