use paramodel::builtins::PARAMETER;
use paramodel::graph::DependencyGraph;
use paramodel::{ElementSpec, MethodRegistry, Model, ModelError, UpdateBinding, UpdateExecutor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A random DAG over `n` nodes. Edges only point from higher to lower rank;
/// nodes are inserted in shuffled order so insertion order says nothing about
/// the dependency order.
fn random_dag(rng: &mut StdRng, n: usize) -> DependencyGraph<usize> {
    let mut nodes: Vec<usize> = (0..n).collect();
    nodes.shuffle(rng);
    let mut g = DependencyGraph::new();
    for &node in &nodes {
        g.add_node(node);
        for dep in 0..node {
            if rng.gen_bool(0.15) {
                g.add_dependency(node, dep);
            }
        }
    }
    g
}

#[test]
fn every_node_follows_its_dependencies() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let n = rng.gen_range(1..40);
        let g = random_dag(&mut rng, n);
        let order = g.sequence().expect("acyclic graph must sequence");
        assert_eq!(order.len(), n);
        let mut pos = vec![0; n];
        for (i, node) in order.iter().enumerate() {
            pos[*node] = i;
        }
        for node in g.nodes() {
            for &dep in g.dependencies(node) {
                assert!(pos[dep] < pos[node], "{dep} must come before {node}");
            }
        }
    }
}

#[test]
fn injected_cycle_is_always_reported() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let n = rng.gen_range(2..30);
        let mut g = random_dag(&mut rng, n);
        let low = rng.gen_range(0..n - 1);
        let high = rng.gen_range(low + 1..n);
        // Close a loop through a chain low <- ... <- high <- low.
        g.add_dependency(high, low);
        g.add_dependency(low, high);

        let err = g.sequence().expect_err("cycle must not sequence");
        let cycle = err.cycle;
        assert!(cycle.len() >= 2);
        assert_eq!(cycle.first(), cycle.last());
        for pair in cycle.windows(2) {
            assert!(
                g.dependencies(pair[0]).contains(&pair[1]),
                "{} does not depend on {}",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn update_order_on_random_model() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut methods = MethodRegistry::new();
    paramodel::builtins::register_builtins(&mut methods);

    let n = 25;
    let mut ranks: Vec<usize> = (0..n).collect();
    ranks.shuffle(&mut rng);
    let mut model = Model::new("m");
    let root = model.root();
    for &rank in &ranks {
        let mut binding = UpdateBinding::new().literal("value", rank as f64);
        for dep in 0..rank {
            if rng.gen_bool(0.2) {
                binding = binding.reference(format!("dep{}", dep), format!("e{}", dep));
            }
        }
        model
            .add_element(
                root,
                ElementSpec::new(format!("e{}", rank), PARAMETER).with_binding(binding),
            )
            .unwrap();
    }

    let report = UpdateExecutor::new(&methods).update(&mut model, root).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.order.len(), n);
    for (_, el) in model.elements().skip(1) {
        let me = report.position(&format!("m.{}", el.name())).unwrap();
        for (_, path) in el.binding().unwrap().references() {
            let dep = report.position(&format!("m.{}", path)).unwrap();
            assert!(dep < me, "{} must be updated before {}", path, el.name());
        }
    }
}

#[test]
fn model_cycle_aborts_the_pass() {
    let methods = MethodRegistry::new();
    let mut model = Model::new("m");
    let root = model.root();
    for (name, next) in [("a", "b"), ("b", "c"), ("c", "a")] {
        model
            .add_element(
                root,
                ElementSpec::new(name, PARAMETER)
                    .with_binding(UpdateBinding::new().reference("value", next)),
            )
            .unwrap();
    }
    match UpdateExecutor::new(&methods).update(&mut model, root) {
        Err(ModelError::GraphCycle { cycle }) => {
            assert_eq!(cycle, vec!["m.a", "m.b", "m.c", "m.a"]);
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}
