use search_core::{DocType, Document, DocumentStore, Filters, SearchConfig, SearchEngine, TermMatch};

fn engine_with(config: SearchConfig) -> SearchEngine {
    SearchEngine::new(DocumentStore::temporary().unwrap(), config)
}

fn engine() -> SearchEngine { engine_with(SearchConfig::default()) }

fn seed_scenario(engine: &SearchEngine) {
    let store = engine.store();
    store
        .add_document(&Document::new(DocType::Player, "1", "Patrick Mahomes", "Patrick Mahomes KC QB #15 active").with_metadata("position", "QB"))
        .unwrap();
    store
        .add_document(&Document::new(DocType::Player, "2", "Pat McAfee", "Pat McAfee IND P #1 retired").with_metadata("position", "P"))
        .unwrap();
}

fn entity_ids(engine: &SearchEngine, query: &str) -> Vec<String> {
    engine.search(query, None, None, 20).results.into_iter().map(|hit| hit.entity_id).collect()
}

#[test]
fn end_to_end_scenario() {
    let engine = engine();
    seed_scenario(&engine);

    let response = engine.search("mahomes", None, None, 20);
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].entity_id, "1");
    assert_eq!(response.results[0].metadata["position"], "QB");

    let mut both = entity_ids(&engine, "pat");
    both.sort();
    assert_eq!(both, vec!["1", "2"]);

    let titles: Vec<String> = engine.autocomplete("pa", None, 10).suggestions.into_iter().map(|s| s.suggestion).collect();
    assert_eq!(titles, vec!["Pat McAfee", "Patrick Mahomes"]);
}

#[test]
fn exact_matching_does_not_expand() {
    let engine = engine_with(SearchConfig { term_match: TermMatch::Exact, ..SearchConfig::default() });
    seed_scenario(&engine);
    assert_eq!(entity_ids(&engine, "pat"), vec!["2"]);
}

#[test]
fn denser_document_ranks_higher() {
    let engine = engine_with(SearchConfig { term_match: TermMatch::Exact, ..SearchConfig::default() });
    let store = engine.store();
    store.add_document(&Document::new(DocType::Player, "b", "B", "touchdown")).unwrap();
    store.add_document(&Document::new(DocType::Player, "a", "A", "touchdown touchdown touchdown touchdown touchdown")).unwrap();

    let response = engine.search("touchdowns", None, None, 10);
    assert_eq!(response.count, 2);
    assert_eq!(response.results[0].entity_id, "a");
    assert_eq!(response.results[0].relevance_score, 2.5);
    assert_eq!(response.results[1].relevance_score, 0.5);
}

#[test]
fn score_uses_distinct_matched_terms() {
    let engine = engine_with(SearchConfig { term_match: TermMatch::Exact, ..SearchConfig::default() });
    engine.store().add_document(&Document::new(DocType::Player, "1", "Travis Kelce", "travis kelce kelce")).unwrap();
    // (1 + 2) / (1 + 2)
    let response = engine.search("travis kelce", None, None, 10);
    assert_eq!(response.results[0].relevance_score, 1.0);
}

#[test]
fn metadata_filters_are_exact() {
    let engine = engine();
    let store = engine.store();
    store.add_document(&Document::new(DocType::Player, "1", "Josh Allen", "Josh Allen quarterback").with_metadata("position", "QB")).unwrap();
    store.add_document(&Document::new(DocType::Player, "2", "Josh Jacobs", "Josh Jacobs running back").with_metadata("position", "RB")).unwrap();
    store.add_document(&Document::new(DocType::Player, "3", "Josh Dobbs", "Josh Dobbs backup").with_metadata("position", "qb")).unwrap();

    let filters: Filters = [("position".to_string(), "QB".to_string())].into_iter().collect();
    let response = engine.search("josh", None, Some(&filters), 10);
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].entity_id, "1");
}

#[test]
fn doc_type_restriction_and_limit() {
    let engine = engine();
    let store = engine.store();
    store.add_document(&Document::new(DocType::Team, "KC", "Kansas City Chiefs", "Kansas City Chiefs KC AFC West")).unwrap();
    store.add_document(&Document::new(DocType::Player, "1", "Patrick Mahomes", "Patrick Mahomes KC QB")).unwrap();
    store.add_document(&Document::new(DocType::Player, "2", "Travis Kelce", "Travis Kelce KC TE")).unwrap();

    let teams = engine.search("kc", Some(DocType::Team), None, 10);
    assert_eq!(teams.count, 1);
    assert_eq!(teams.results[0].doc_type, DocType::Team);

    assert_eq!(engine.search("kc", None, None, 2).count, 2);
    assert_eq!(engine.search("kc", None, None, 0).count, 0);
}

#[test]
fn empty_queries_return_nothing_and_are_not_recorded() {
    let engine = engine();
    seed_scenario(&engine);
    assert_eq!(engine.search("", None, None, 10).count, 0);
    assert_eq!(engine.search("   ", None, None, 10).count, 0);
    assert_eq!(engine.search("the and of", None, None, 10).count, 0);
    assert!(engine.get_popular_searches(10).is_empty());
}

#[test]
fn autocomplete_boundaries() {
    let engine = engine();
    seed_scenario(&engine);
    assert_eq!(engine.autocomplete("p", None, 10).count, 0);
    assert_eq!(engine.autocomplete("PA", None, 10).count, 2);
    assert_eq!(engine.autocomplete("patr", None, 10).suggestions[0].entity_id, "1");
    assert_eq!(engine.autocomplete("pa", Some(DocType::Team), 10).count, 0);
    assert_eq!(engine.autocomplete("pa", None, 1).count, 1);
}

#[test]
fn autocomplete_returns_distinct_titles() {
    let engine = engine();
    let store = engine.store();
    store.add_document(&Document::new(DocType::Player, "10", "Josh Allen", "Josh Allen QB")).unwrap();
    store.add_document(&Document::new(DocType::Player, "11", "Josh Allen", "Josh Allen LB")).unwrap();
    store.add_document(&Document::new(DocType::Player, "12", "Josh Jacobs", "Josh Jacobs RB")).unwrap();

    let titles: Vec<String> = engine.autocomplete("jo", None, 10).suggestions.into_iter().map(|s| s.suggestion).collect();
    assert_eq!(titles, vec!["Josh Allen", "Josh Jacobs"]);
}

#[test]
fn popular_searches_by_count() {
    let engine = engine();
    seed_scenario(&engine);
    engine.search("mahomes", None, None, 10);
    engine.search("pat", None, None, 10);
    engine.search("mahomes", None, None, 10);

    let popular = engine.get_popular_searches(10);
    assert_eq!(popular[0].query, "mahomes");
    assert_eq!(popular[0].search_count, 2);
    assert_eq!(popular[0].result_count, 1);
    assert_eq!(popular[1].query, "pat");
    assert_eq!(engine.get_popular_searches(1).len(), 1);
}

#[test]
fn statistics_key_on_raw_query() {
    let engine = engine();
    seed_scenario(&engine);
    engine.search("Mahomes", None, None, 10);
    engine.search("mahomes", None, None, 10);
    assert_eq!(engine.get_popular_searches(10).len(), 2);
}

#[test]
fn clear_semantics() {
    let engine = engine();
    seed_scenario(&engine);
    engine.store().add_document(&Document::new(DocType::Team, "KC", "Kansas City Chiefs", "Kansas City Chiefs KC")).unwrap();
    engine.search("chiefs", None, None, 10);

    assert!(engine.store().clear_index(Some(DocType::Player)));
    assert_eq!(engine.search("mahomes", None, None, 10).count, 0);
    assert_eq!(engine.search("chiefs", None, None, 10).count, 1);
    assert_eq!(engine.autocomplete("pa", None, 10).count, 0);

    assert!(engine.store().clear_index(None));
    assert!(engine.get_popular_searches(10).is_empty());
    assert_eq!(engine.get_index_stats().total_documents, 0);
}

#[test]
fn index_stats_delegate_to_store() {
    let engine = engine();
    seed_scenario(&engine);
    let stats = engine.get_index_stats();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.documents_by_type.get("player"), Some(&2));
    assert!(stats.total_terms > 0);
    assert!(stats.total_index_entries >= stats.total_terms);
}
