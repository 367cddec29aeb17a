use super::*;
use crate::error::Error;

const STUDY: &str = "biolink.StudyVariable";

fn diabetes_graph() -> InMemoryGraphStore {
    InMemoryGraphStore::new()
        .with_node(NodeSpec::new("MONDO:0005148", "type 2 diabetes"))
        .with_node(NodeSpec::new("HP:0001627", "abnormal heart morphology"))
        .with_node(NodeSpec::new("UBERON:0002107", "liver"))
        .with_node(NodeSpec::new("S1", "Framingham").with_label(STUDY))
        .with_node(NodeSpec::new("S2", "UK Biobank").with_label(STUDY))
        .with_node(NodeSpec::new("X", "not a study").with_label("biolink.Gene"))
        .with_edge("MONDO:0005148", "HP:0001627")
        .with_edge("MONDO:0005148", "UBERON:0002107")
        .with_edge("HP:0001627", "S1")
        .with_edge("HP:0001627", "X")
        .with_edge("UBERON:0002107", "S2")
        .with_edge("UBERON:0002107", "S1")
}

#[tokio::test]
async fn test_two_hop_walk() {
    let store = diabetes_graph();
    let rows = store
        .query(&TwoHopPattern::new("MONDO:0005148"))
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            GraphRow::new("MONDO:0005148", "abnormal heart morphology", "Framingham"),
            GraphRow::new("MONDO:0005148", "liver", "UK Biobank"),
            GraphRow::new("MONDO:0005148", "liver", "Framingham"),
        ]
    );
}

#[tokio::test]
async fn test_terminal_label_filters() {
    let store = diabetes_graph();
    let rows = store
        .query(&TwoHopPattern::new("MONDO:0005148").with_terminal_label("biolink.Gene"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].study.as_deref(), Some("not a study"));
}

#[tokio::test]
async fn test_limit_caps_rows() {
    let store = diabetes_graph();
    let rows = store
        .query(&TwoHopPattern::new("MONDO:0005148").with_limit(2))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_unknown_seed_is_empty() {
    let store = diabetes_graph();
    let rows = store.query(&TwoHopPattern::new("NOPE:1")).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_invalid_pattern_rejected() {
    let store = diabetes_graph();
    let result = store.query(&TwoHopPattern::new("")).await;
    assert!(matches!(result, Err(Error::InvalidPattern(_))));
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    std::fs::write(
        &path,
        r#"{
            "nodes": [
                {"id": "A", "name": "A"},
                {"id": "B", "name": "B"},
                {"id": "S", "name": "study", "labels": ["biolink.StudyVariable"]}
            ],
            "edges": [{"from": "A", "to": "B"}, {"from": "B", "to": "S"}]
        }"#,
    )
    .unwrap();

    let store = InMemoryGraphStore::load(&path).await.unwrap();
    assert_eq!(store.node_count(), 3);
    let rows = store.query(&TwoHopPattern::new("A")).await.unwrap();
    assert_eq!(rows, vec![GraphRow::new("A", "B", "study")]);
}

#[test]
fn test_malformed_json() {
    assert!(matches!(
        InMemoryGraphStore::from_json("{nodes"),
        Err(Error::Serialization(_))
    ));
}
