//! Populates the index from an external player/team source.

use crate::config::DEFAULT_FLUSH_EVERY;
use crate::store::DocumentStore;
use crate::{DocType, Document, IndexStats, RebuildStats};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::future::Future;

/// Where players and teams come from. Implementations own their own paging,
/// limits and timeouts.
pub trait DataSource: Send + Sync {
    /// Up to `limit` players, or every player the source will return.
    fn fetch_players(&self, limit: Option<usize>) -> impl Future<Output = Result<Vec<PlayerRecord>>> + Send;
    /// A single player, `None` when the source does not know the id.
    fn fetch_player(&self, player_id: &str) -> impl Future<Output = Result<Option<PlayerRecord>>> + Send;
    fn fetch_teams(&self) -> impl Future<Output = Result<Vec<TeamRecord>>> + Send;
}

/// Upstream field names (`PlayerID`, `Name`, ...) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(alias = "PlayerID", alias = "id", deserialize_with = "string_or_number")]
    pub player_id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Team", deserialize_with = "opt_string_or_number")]
    pub team: Option<String>,
    #[serde(default, alias = "Position", deserialize_with = "opt_string_or_number")]
    pub position: Option<String>,
    #[serde(default, alias = "Number", deserialize_with = "opt_string_or_number")]
    pub number: Option<String>,
    #[serde(default, alias = "Status", deserialize_with = "opt_string_or_number")]
    pub status: Option<String>,
    #[serde(default, alias = "College", deserialize_with = "opt_string_or_number")]
    pub college: Option<String>,
    #[serde(default, alias = "Height", deserialize_with = "opt_string_or_number")]
    pub height: Option<String>,
    #[serde(default, alias = "Weight", deserialize_with = "opt_string_or_number")]
    pub weight: Option<String>,
    #[serde(default, alias = "Experience", deserialize_with = "opt_string_or_number")]
    pub experience: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    #[serde(alias = "TeamID", alias = "id", deserialize_with = "string_or_number")]
    pub team_id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "City", deserialize_with = "opt_string_or_number")]
    pub city: Option<String>,
    #[serde(default, alias = "Key", alias = "Abbreviation", deserialize_with = "opt_string_or_number")]
    pub abbreviation: Option<String>,
    #[serde(default, alias = "Conference", deserialize_with = "opt_string_or_number")]
    pub conference: Option<String>,
    #[serde(default, alias = "Division", deserialize_with = "opt_string_or_number")]
    pub division: Option<String>,
    #[serde(default, alias = "Stadium", alias = "StadiumName", deserialize_with = "opt_string_or_number")]
    pub stadium: Option<String>,
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    scalar_text(value).ok_or_else(|| serde::de::Error::custom("expected a non-empty string or number"))
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

/// Content is the name, team, position, `#number`, status and the optional
/// attributes joined by spaces; every present attribute is also metadata.
pub fn player_document(player: &PlayerRecord) -> Document {
    let number = player.number.as_ref().map(|n| format!("#{n}"));
    let parts = [
        Some(player.name.as_str()),
        player.team.as_deref(),
        player.position.as_deref(),
        number.as_deref(),
        player.status.as_deref(),
        player.college.as_deref(),
        player.height.as_deref(),
        player.weight.as_deref(),
        player.experience.as_deref(),
    ];
    let content = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");

    let mut doc = Document::new(DocType::Player, player.player_id.as_str(), player.name.as_str(), content);
    let fields = [
        ("position", &player.position),
        ("team", &player.team),
        ("status", &player.status),
        ("number", &player.number),
        ("college", &player.college),
        ("height", &player.height),
        ("weight", &player.weight),
        ("experience", &player.experience),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            doc = doc.with_metadata(key, value.as_str());
        }
    }
    doc
}

/// Title is "City Name" when the city is known.
pub fn team_document(team: &TeamRecord) -> Document {
    let title = match &team.city {
        Some(city) => format!("{city} {}", team.name),
        None => team.name.clone(),
    };
    let parts = [
        team.city.as_deref(),
        Some(team.name.as_str()),
        team.abbreviation.as_deref(),
        team.conference.as_deref(),
        team.division.as_deref(),
        team.stadium.as_deref(),
    ];
    let content = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");

    let mut doc = Document::new(DocType::Team, team.team_id.as_str(), title, content);
    let fields = [
        ("abbreviation", &team.abbreviation),
        ("city", &team.city),
        ("conference", &team.conference),
        ("division", &team.division),
        ("stadium", &team.stadium),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            doc = doc.with_metadata(key, value.as_str());
        }
    }
    doc
}

pub struct Indexer<S> {
    store: DocumentStore,
    source: S,
    flush_every: usize,
}

impl<S: DataSource> Indexer<S> {
    pub fn new(store: DocumentStore, source: S) -> Self {
        Self { store, source, flush_every: DEFAULT_FLUSH_EVERY }
    }

    /// Flush to disk after every `n` documents of a bulk run.
    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = n.max(1);
        self
    }

    pub fn store(&self) -> &DocumentStore { &self.store }

    pub fn source(&self) -> &S { &self.source }

    pub fn index_player(&self, player: &PlayerRecord) -> bool {
        self.store.add_document(&player_document(player)).is_some()
    }

    pub fn index_team(&self, team: &TeamRecord) -> bool {
        self.store.add_document(&team_document(team)).is_some()
    }

    /// Fetch and index players. A failed fetch indexes nothing and returns 0.
    pub async fn index_all_players(&self, limit: Option<usize>) -> usize {
        self.try_index_all_players(limit).await.unwrap_or_else(|err| {
            tracing::error!(error = %format!("{err:#}"), "player indexing failed");
            0
        })
    }

    pub async fn index_all_teams(&self) -> usize {
        self.try_index_all_teams().await.unwrap_or_else(|err| {
            tracing::error!(error = %format!("{err:#}"), "team indexing failed");
            0
        })
    }

    async fn try_index_all_players(&self, limit: Option<usize>) -> Result<usize> {
        let players = self.source.fetch_players(limit).await.context("fetching players")?;
        let docs: Vec<Document> = players.iter().map(player_document).collect();
        let indexed = self.index_in_chunks(&docs);
        tracing::info!(indexed, attempted = docs.len(), "indexed players");
        Ok(indexed)
    }

    async fn try_index_all_teams(&self) -> Result<usize> {
        let teams = self.source.fetch_teams().await.context("fetching teams")?;
        let docs: Vec<Document> = teams.iter().map(team_document).collect();
        let indexed = self.index_in_chunks(&docs);
        tracing::info!(indexed, attempted = docs.len(), "indexed teams");
        Ok(indexed)
    }

    fn index_in_chunks(&self, docs: &[Document]) -> usize {
        let mut indexed = 0;
        for chunk in docs.chunks(self.flush_every.max(1)) {
            indexed += self.store.add_documents_batch(chunk);
            if let Err(err) = self.store.flush() {
                tracing::warn!(error = %format!("{err:#}"), "flush failed");
            }
        }
        indexed
    }

    /// Clear the index (only `doc_type` if given) and index it again from
    /// the source. Failures are reported in the returned stats.
    pub async fn rebuild_index(&self, doc_type: Option<DocType>) -> RebuildStats {
        let mut stats = RebuildStats::default();
        if !self.store.clear_index(doc_type) {
            stats.error = Some("failed to clear index".to_string());
            return stats;
        }

        let mut errors = Vec::new();
        if doc_type.map_or(true, |t| t == DocType::Player) {
            match self.try_index_all_players(None).await {
                Ok(n) => stats.players_indexed = n,
                Err(err) => errors.push(format!("players: {err:#}")),
            }
        }
        if doc_type.map_or(true, |t| t == DocType::Team) {
            match self.try_index_all_teams().await {
                Ok(n) => stats.teams_indexed = n,
                Err(err) => errors.push(format!("teams: {err:#}")),
            }
        }

        stats.success = errors.is_empty();
        if !errors.is_empty() {
            tracing::error!(errors = %errors.join("; "), "rebuild finished with errors");
            stats.error = Some(errors.join("; "));
        }
        tracing::info!(players = stats.players_indexed, teams = stats.teams_indexed, success = stats.success, "rebuild complete");
        stats
    }

    /// Re-fetch one player and upsert its document.
    pub async fn update_player_index(&self, player_id: &str) -> bool {
        match self.source.fetch_player(player_id).await {
            Ok(Some(player)) => self.index_player(&player),
            Ok(None) => {
                tracing::warn!(player_id, "player not found in source");
                false
            }
            Err(err) => {
                tracing::error!(player_id, error = %format!("{err:#}"), "failed to fetch player");
                false
            }
        }
    }

    pub fn clear_index(&self, doc_type: Option<DocType>) -> bool { self.store.clear_index(doc_type) }

    pub fn get_index_stats(&self) -> IndexStats {
        self.store.get_index_stats().unwrap_or_else(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to compute index stats");
            IndexStats::default()
        })
    }
}
