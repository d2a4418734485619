use qtree_core::{
    prune, AxiomCheck, Node, PropertyCharacteristic, PruneScope, ResourceTree, SuperClassLookup,
    TreeFactory,
};
use qtree_ingest_rdfowl::{load_graph, parse_file, ClassHierarchy, MemoryEndpoint, PropertyAxioms};
use qtree_sparql::{render, Endpoint, PrefixMap};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn ex(s: &str) -> Node {
    Node::iri(format!("http://ex.org/{s}"))
}

#[test]
fn loads_turtle_fixture() {
    let graph = load_graph(&fixture("people.ttl")).expect("load fixture");
    assert_eq!(graph.len(), 18);
    assert_eq!(
        graph.instances_of(&ex("Person")),
        BTreeSet::from([ex("alice"), ex("bob"), ex("carol")])
    );
}

#[test]
fn ntriples_written_to_disk_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("tiny.nt");
    std::fs::write(
        &path,
        "<http://ex.org/a> <http://ex.org/p> \"one\"@en .\n\
         <http://ex.org/a> <http://ex.org/q> _:b1 .\n",
    )
    .expect("write");
    let triples = parse_file(&path).expect("parse");
    assert_eq!(triples.len(), 2);
    assert!(triples.iter().any(|t| t.object == Node::lang_literal("one", "en")));
}

#[test]
fn missing_files_report_their_path() {
    let dir = tempdir().expect("tempdir");
    let err = parse_file(&dir.path().join("absent.ttl")).unwrap_err();
    assert!(err.to_string().contains("absent.ttl"));
}

#[test]
fn schema_services_from_fixture() {
    let graph = load_graph(&fixture("people.ttl")).expect("load fixture");
    let hierarchy = ClassHierarchy::from_graph(&graph);
    assert_eq!(
        hierarchy.super_classes(&ex("Employee")),
        BTreeSet::from([ex("Person"), ex("Agent")])
    );
    let axioms = PropertyAxioms::from_graph(&graph);
    assert!(axioms.is_declared("http://ex.org/knows", PropertyCharacteristic::Symmetric));
}

#[test]
fn rdfs_pruning_drops_implied_type_edges_of_built_trees() {
    let graph = load_graph(&fixture("people.ttl")).expect("load fixture");
    let hierarchy = ClassHierarchy::from_graph(&graph);
    let endpoint = MemoryEndpoint::new(graph);

    let triples = endpoint
        .construct_description(&ex("alice"), 2)
        .expect("describe");
    let tree = TreeFactory::default().build(&ex("alice"), &triples);
    assert!(tree.children(&Node::rdf_type()).any(|c| c.data() == &ex("Person")));

    let pruned = prune(&tree, PruneScope::rdfs(&hierarchy));
    let types: Vec<&ResourceTree> = pruned.children(&Node::rdf_type()).collect();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].data(), &ex("Employee"));
}

#[test]
fn endpoint_answers_rendered_trees() {
    let graph = load_graph(&fixture("people.ttl")).expect("load fixture");
    let endpoint = MemoryEndpoint::new(graph);

    let tree = ResourceTree::top().with_child(
        ex("worksFor"),
        ResourceTree::var().with_child(Node::rdf_type(), ResourceTree::new(ex("Company"))),
    );
    let query = render(&tree, None, &PrefixMap::new());
    assert_eq!(
        endpoint.resources(&query).expect("resources"),
        BTreeSet::from([ex("alice"), ex("bob")])
    );
    assert_eq!(endpoint.count(&query).expect("count"), 2);
}
