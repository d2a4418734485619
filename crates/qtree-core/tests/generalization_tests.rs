use qtree_core::{
    lgg, lgg_all, prune, remove_var_leafs, subsumes, Node, PruneScope, ResourceTree, Triple,
    TreeFactory, RDF_TYPE_IRI,
};

fn ex(s: &str) -> Node {
    Node::iri(format!("http://ex.org/{s}"))
}

fn typed(class: &str) -> ResourceTree {
    ResourceTree::top().with_child(Node::iri(RDF_TYPE_IRI), ResourceTree::new(ex(class)))
}

#[test]
fn spouse_edge_is_generalized_away() {
    let a = typed("Person");
    let b = typed("Person").with_child(ex("spouse"), ResourceTree::new(ex("x")));
    assert_eq!(lgg(&a, &b), a);
    assert_eq!(lgg(&b, &a), a);
}

#[test]
fn generalizing_described_resources() {
    let triples = vec![
        Triple::new(ex("alice"), Node::rdf_type(), ex("Person")),
        Triple::new(ex("alice"), ex("worksFor"), ex("acme")),
        Triple::new(ex("acme"), Node::rdf_type(), ex("Company")),
        Triple::new(ex("alice"), ex("name"), Node::literal("Alice")),
        Triple::new(ex("bob"), Node::rdf_type(), ex("Person")),
        Triple::new(ex("bob"), ex("worksFor"), ex("initech")),
        Triple::new(ex("initech"), Node::rdf_type(), ex("Company")),
        Triple::new(ex("bob"), ex("age"), Node::literal("42")),
    ];
    let factory = TreeFactory::default();
    let alice = factory.build(&ex("alice"), &triples);
    let bob = factory.build(&ex("bob"), &triples);

    let g = lgg_all([&alice, &bob]).unwrap();
    let expected = typed("Person").with_child(
        ex("worksFor"),
        ResourceTree::var().with_child(Node::iri(RDF_TYPE_IRI), ResourceTree::new(ex("Company"))),
    );
    assert_eq!(g, expected);
    assert!(subsumes(&g, &alice));
    assert!(subsumes(&g, &bob));
    assert!(!subsumes(&alice, &bob));
}

#[test]
fn scoring_preparation_strips_unconstrained_branches() {
    let tree = typed("Person")
        .with_child(ex("name"), ResourceTree::var())
        .with_child(ex("knows"), ResourceTree::var().with_child(ex("name"), ResourceTree::var()));
    let prepared = prune(&remove_var_leafs(&tree), PruneScope::rdf());
    assert_eq!(prepared, typed("Person"));
    // Inputs are never touched.
    assert_eq!(tree.branch_count(), 4);
}
