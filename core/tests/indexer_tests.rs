use anyhow::{bail, Result};
use search_core::{DataSource, DocType, DocumentStore, IndexStats, Indexer, PlayerRecord, SearchConfig, SearchEngine, TeamRecord};

#[derive(Default)]
struct StaticSource {
    players: Vec<PlayerRecord>,
    teams: Vec<TeamRecord>,
    teams_down: bool,
    players_down: bool,
}

impl DataSource for StaticSource {
    async fn fetch_players(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>> {
        if self.players_down {
            bail!("players endpoint unavailable");
        }
        let n = limit.unwrap_or(self.players.len());
        Ok(self.players.iter().take(n).cloned().collect())
    }

    async fn fetch_player(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        if self.players_down {
            bail!("players endpoint unavailable");
        }
        Ok(self.players.iter().find(|p| p.player_id == player_id).cloned())
    }

    async fn fetch_teams(&self) -> Result<Vec<TeamRecord>> {
        if self.teams_down {
            bail!("teams endpoint unavailable");
        }
        Ok(self.teams.clone())
    }
}

fn player(id: &str, name: &str, team: &str, position: &str) -> PlayerRecord {
    PlayerRecord {
        player_id: id.into(),
        name: name.into(),
        team: Some(team.into()),
        position: Some(position.into()),
        status: Some("Active".into()),
        ..Default::default()
    }
}

fn team(id: &str, city: &str, name: &str, key: &str) -> TeamRecord {
    TeamRecord {
        team_id: id.into(),
        name: name.into(),
        city: Some(city.into()),
        abbreviation: Some(key.into()),
        conference: Some("AFC".into()),
        ..Default::default()
    }
}

fn source() -> StaticSource {
    StaticSource {
        players: vec![
            player("1", "Patrick Mahomes", "KC", "QB"),
            player("2", "Travis Kelce", "KC", "TE"),
            player("3", "Josh Allen", "BUF", "QB"),
        ],
        teams: vec![team("16", "Kansas City", "Chiefs", "KC"), team("4", "Buffalo", "Bills", "BUF")],
        ..Default::default()
    }
}

fn setup(source: StaticSource) -> (Indexer<StaticSource>, SearchEngine) {
    let store = DocumentStore::temporary().unwrap();
    let engine = SearchEngine::new(store.clone(), SearchConfig::default());
    (Indexer::new(store, source).with_flush_every(2), engine)
}

#[tokio::test]
async fn rebuild_indexes_everything() {
    let (indexer, engine) = setup(source());
    let stats = indexer.rebuild_index(None).await;
    assert!(stats.success);
    assert_eq!(stats.players_indexed, 3);
    assert_eq!(stats.teams_indexed, 2);
    assert_eq!(stats.error, None);

    let index = engine.get_index_stats();
    assert_eq!(index.total_documents, 5);
    assert_eq!(engine.search("kelce", None, None, 10).results[0].entity_id, "2");
    assert_eq!(engine.search("chiefs", Some(DocType::Team), None, 10).results[0].title, "Kansas City Chiefs");
}

#[tokio::test]
async fn rebuild_reports_partial_failure() {
    let (indexer, _engine) = setup(StaticSource { teams_down: true, ..source() });
    let stats = indexer.rebuild_index(None).await;
    assert!(!stats.success);
    assert_eq!(stats.players_indexed, 3);
    assert_eq!(stats.teams_indexed, 0);
    assert!(stats.error.unwrap().contains("teams"));
}

#[tokio::test]
async fn scoped_rebuild_leaves_other_type() {
    let (indexer, engine) = setup(source());
    indexer.rebuild_index(None).await;
    let stats = indexer.rebuild_index(Some(DocType::Team)).await;
    assert!(stats.success);
    assert_eq!(stats.players_indexed, 0);
    assert_eq!(stats.teams_indexed, 2);
    assert_eq!(engine.get_index_stats().total_documents, 5);
}

#[tokio::test]
async fn failed_fetch_indexes_nothing() {
    let (indexer, _engine) = setup(StaticSource { players_down: true, ..source() });
    assert_eq!(indexer.index_all_players(None).await, 0);
    assert!(!indexer.update_player_index("1").await);
    assert_eq!(indexer.index_all_teams().await, 2);
}

#[tokio::test]
async fn player_limit_is_passed_to_source() {
    let (indexer, _engine) = setup(source());
    assert_eq!(indexer.index_all_players(Some(2)).await, 2);
}

#[tokio::test]
async fn update_player_refreshes_one_document() {
    let (indexer, engine) = setup(source());
    assert!(indexer.index_player(&player("1", "Patrick Mahomes", "DAL", "QB")));
    assert_eq!(engine.search("dal", None, None, 10).count, 1);

    assert!(indexer.update_player_index("1").await);
    assert_eq!(engine.search("dal", None, None, 10).count, 0);
    assert_eq!(engine.search("mahomes", None, None, 10).count, 1);
    assert_eq!(engine.get_index_stats().total_documents, 1);

    assert!(!indexer.update_player_index("999").await);
}

#[tokio::test]
async fn position_filter_over_indexed_players() {
    let (indexer, engine) = setup(source());
    indexer.index_all_players(None).await;
    let filters = [("position".to_string(), "QB".to_string())].into_iter().collect();
    let response = engine.search("active", None, Some(&filters), 10);
    let mut ids: Vec<String> = response.results.into_iter().map(|hit| hit.entity_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "3"]);
}

#[tokio::test]
async fn stats_fall_back_to_empty_on_storage_error() {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let indexer = Indexer::new(DocumentStore::from_db(db.clone()).unwrap(), source());
    indexer.index_all_players(None).await;
    assert_eq!(indexer.get_index_stats().total_documents, 3);

    db.open_tree("postings").unwrap().insert(&b"x"[..], vec![0u8, 0, 0, 1]).unwrap();
    assert_eq!(indexer.get_index_stats(), IndexStats::default());
}
