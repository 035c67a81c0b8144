use paramodel::selection::{Directive, Scope};
use paramodel::{ContextKind, ElementSpec, Model, ModelError, SelectionQuery, select};

fn names(model: &Model, query: &str) -> Vec<String> {
    select(model, model.root(), query)
        .unwrap()
        .into_keys()
        .collect()
}

#[test]
fn select_assembly_by_name() {
    let mut m = Model::new("m");
    let root = m.root();
    m.add_context(root, "myAssembly3", ContextKind::Assembly).unwrap();
    m.add_context(root, "myAssembly4", ContextKind::Assembly).unwrap();
    assert_eq!(names(&m, "SELECT * WHERE name=='myAssembly4'"), vec!["myAssembly4"]);
    assert_eq!(names(&m, "SELECT * WHERE name!='myAssembly4'"), vec!["myAssembly3"]);
}

#[test]
fn and_is_intersection() {
    let mut m = Model::new("m");
    let root = m.root();
    for (name, x, y) in [("p1", 5.0, 1.0), ("p2", 1.0, 1.0), ("p3", 5.0, 5.0)] {
        m.add_element(
            root,
            ElementSpec::new(name, "Point")
                .with_property("X", x)
                .with_property("Y", y),
        )
        .unwrap();
    }
    assert_eq!(names(&m, "SELECT * WHERE X>3 AND Y<3"), vec!["p1"]);
    assert_eq!(names(&m, "SELECT * WHERE X>3 OR Y<3"), vec!["p1", "p2", "p3"]);
    assert_eq!(names(&m, "SELECT * WHERE X>=5 AND Y<=5 AND name!='p3'"), vec!["p1"]);
}

#[test]
fn parse_records_scope_and_directives() {
    let q = SelectionQuery::parse("SELECT asm.* WHERE INSTANCEOF(Point) ORDEREDBY x LIMIT 3").unwrap();
    assert_eq!(q.scope, Scope::Children("asm".into()));
    assert_eq!(
        q.directives,
        vec![Directive::OrderedBy(vec!["x".into()]), Directive::Limit(3)]
    );
}

#[test]
fn structural_errors_are_raised_at_parse_time() {
    for bad in [
        "SELECT * WHERE",
        "select * where x==1",
        "SELECT WHERE x==1 AND",
        "SELECT * FROM x==1",
        "SELECT * WHERE RANGE(1,2,3)",
        "SELECT * WHERE x==1 LIMIT many",
    ] {
        assert!(
            matches!(SelectionQuery::parse(bad), Err(ModelError::MalformedQuery { .. })),
            "{bad:?} should not parse"
        );
    }
}

#[test]
fn not_and_xor_are_reported_as_unsupported() {
    let m = Model::new("m");
    for q in [
        "SELECT * WHERE x==1 ! y==2",
        "SELECT * WHERE x==1 XOR y==2",
        "SELECT * WHERE NOT x==1",
        "SELECT * WHERE ! x==1",
        "SELECT * WHERE y==2 AND NOT x==1",
    ] {
        assert!(matches!(
            select(&m, m.root(), q),
            Err(ModelError::UnsupportedSelection(_))
        ));
    }
}

#[test]
fn instanceof_matches_types_capabilities_and_contexts() {
    let mut m = Model::new("m");
    let root = m.root();
    m.add_context(root, "asm", ContextKind::Assembly).unwrap();
    m.add_element(root, ElementSpec::new("p", "Point")).unwrap();
    assert_eq!(names(&m, "SELECT * WHERE INSTANCEOF(Point)"), vec!["p"]);
    assert_eq!(names(&m, "SELECT * WHERE INSTANCEOF(Assembly)"), vec!["asm"]);
    assert_eq!(names(&m, "SELECT * WHERE INSTANCEOF(Context)"), vec!["asm"]);
    assert_eq!(names(&m, "SELECT * WHERE INSTANCEOF(Updateable)"), vec!["asm", "p"]);
}

#[test]
fn quoted_literals_compare_as_text() {
    let mut m = Model::new("m");
    let root = m.root();
    for name in ["nan", "inf", "p7"] {
        m.add_element(root, ElementSpec::new(name, "Point")).unwrap();
    }
    assert_eq!(names(&m, "SELECT * WHERE name=='nan'"), vec!["nan"]);
    assert_eq!(names(&m, "SELECT * WHERE name!='inf'"), vec!["nan", "p7"]);
    assert!(names(&m, "SELECT * WHERE name>3").is_empty());
}
