use proptest::prelude::*;
use qtree_core::node::XSD_INTEGER_IRI;
use qtree_core::{Node, ResourceTree};
use qtree_sparql::{parse_query, render, render_string, tree_to_patterns, PrefixMap, ROOT_VAR};

fn iri_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        (0u8..4).prop_map(|i| Node::iri(format!("http://ex.org/r{i}"))),
        (0u8..2).prop_map(|i| Node::iri(format!("http://other.org/ns#t{i}"))),
    ]
}

fn literal_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        "[a-z \"\\\\\n]{0,6}".prop_map(Node::literal),
        "[a-z]{1,4}".prop_map(|s| Node::lang_literal(s, "en")),
        (0u32..1000).prop_map(|n| Node::typed_literal(n.to_string(), XSD_INTEGER_IRI)),
    ]
}

fn data_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        2 => Just(Node::Var),
        2 => iri_strategy(),
        1 => literal_strategy(),
        1 => Just(Node::blank("b0")),
    ]
}

fn tree_strategy() -> impl Strategy<Value = ResourceTree> {
    let leaf = data_strategy().prop_map(ResourceTree::new);
    leaf.prop_recursive(3, 24, 3, |inner| {
        (
            data_strategy(),
            prop::collection::vec((iri_strategy(), inner), 0..4),
        )
            .prop_map(|(data, branches)| {
                let mut tree = ResourceTree::new(data);
                for (edge, child) in branches {
                    tree.add_child(edge, child);
                }
                tree
            })
    })
}

fn prefixes() -> PrefixMap {
    let mut map = PrefixMap::new();
    map.insert("ex".into(), "http://ex.org/".into());
    map.insert("xsd".into(), "http://www.w3.org/2001/XMLSchema#".into());
    map
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn parsing_a_rendered_tree_recovers_its_patterns(t in tree_strategy()) {
        let text = render_string(&t, None, &prefixes());
        let parsed = parse_query(&text).unwrap();
        prop_assert_eq!(parsed.target(), ROOT_VAR);
        prop_assert_eq!(parsed.patterns, tree_to_patterns(&t));
    }

    #[test]
    fn base_relative_rendering_round_trips(t in tree_strategy()) {
        let text = render_string(&t, Some("http://ex.org/"), &PrefixMap::new());
        let parsed = parse_query(&text).unwrap();
        prop_assert_eq!(parsed.patterns, tree_to_patterns(&t));
    }

    #[test]
    fn rendering_is_deterministic(t in tree_strategy()) {
        let copy = t.clone();
        prop_assert_eq!(
            render(&t, None, &prefixes()).to_string(),
            render(&copy, None, &prefixes()).to_string()
        );
        prop_assert_eq!(
            tree_to_patterns(&t).len(),
            t.branch_count().max(1)
        );
    }
}
