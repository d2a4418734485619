use qtree_core::Measure;
use qtree_eval::{Evaluation, EvaluationConfig, ScoringConfig, ScoringEngine};
use qtree_ingest_rdfowl::{load_graph, MemoryEndpoint};
use qtree_sparql::parse_query;
use std::fmt::Write as _;
use tempfile::tempdir;

/// Twelve employees of two companies and eight robots, as Turtle.
fn company_turtle() -> String {
    let mut ttl = String::from("@prefix ex: <http://ex.org/> .\n");
    for i in 0..12 {
        let _ = writeln!(
            ttl,
            "ex:e{i} a ex:Employee ; ex:worksFor ex:co{} ; ex:name \"E{i}\" .",
            i % 2
        );
    }
    for i in 0..2 {
        let _ = writeln!(ttl, "ex:co{i} a ex:Company .");
    }
    for i in 0..8 {
        let _ = writeln!(ttl, "ex:r{i} a ex:Robot ; ex:name \"R{i}\" .");
    }
    ttl
}

fn load_endpoint(dir: &std::path::Path) -> MemoryEndpoint {
    let path = dir.join("company.ttl");
    std::fs::write(&path, company_turtle()).expect("write turtle");
    MemoryEndpoint::new(load_graph(&path).expect("load graph"))
}

#[test]
fn scoring_engine_over_a_loaded_file() {
    let dir = tempdir().expect("tempdir");
    let endpoint = load_endpoint(dir.path());
    let engine = ScoringEngine::new(&endpoint, ScoringConfig::default()).expect("engine");
    assert_eq!(engine.kb_size(), 22);

    let reference = parse_query(
        "PREFIX ex: <http://ex.org/> SELECT DISTINCT ?s WHERE { ?s ex:worksFor ?c . ?c a ex:Company . }",
    )
    .expect("reference");
    let employees = qtree_sparql::tree_from_query(
        &parse_query("PREFIX ex: <http://ex.org/> SELECT ?s WHERE { ?s a ex:Employee . }")
            .expect("query"),
    )
    .expect("tree");
    let score = engine.score(&reference, &employees, 0.0).expect("score");
    assert_eq!(score.true_positives, 12);
    assert_eq!(score.false_positives, 0);
    assert_eq!(score.true_negatives, 10);
}

#[test]
fn evaluation_report_is_written_as_json() {
    let dir = tempdir().expect("tempdir");
    let endpoint = load_endpoint(dir.path());
    let config: EvaluationConfig = serde_json::from_str(
        r#"{
            "nr_of_examples": [6],
            "noise_levels": [0.0, 0.2],
            "measures": ["f_measure"],
            "max_negative_candidates": 5,
            "retry_backoff_ms": 0,
            "threads": 2
        }"#,
    )
    .expect("config");
    assert_eq!(config.measures, vec![Measure::FMeasure]);

    let reference =
        parse_query("PREFIX ex: <http://ex.org/> SELECT DISTINCT ?s WHERE { ?s a ex:Employee . }")
            .expect("reference");
    let report = Evaluation::new(endpoint, config)
        .run(vec![reference])
        .expect("report");

    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.failed_tasks().count(), 0);
    let noise_free = report.tasks[0].result().expect("completed");
    assert_eq!(noise_free.learned.recall, 1.0);
    assert_eq!(noise_free.learned.precision, 1.0);

    let path = dir.path().join("report.json");
    report.write_json(&path).expect("write report");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
    assert_eq!(json["configurations"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["tasks"][1]["noise"], 0.2);
    assert_eq!(json["tasks"][1]["outcome"], "completed");
}
