//! REST client for the upstream NFL data API, exposed as a [`DataSource`].

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use reqwest::{header, Client, StatusCode};
use search_core::{DataSource, PlayerRecord, TeamRecord};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use url::Url;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL; endpoint paths are joined onto it.
    pub base_url: Url,
    pub api_key: Option<String>,
    pub page_size: usize,
    /// Upper bound on pages fetched in one players listing.
    pub max_pages: usize,
    pub timeout: Duration,
    /// Minimum spacing between two requests to the API.
    pub min_interval: Duration,
    pub user_agent: String,
}

impl FeedConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        // without a trailing slash Url::join would replace the last path segment
        let base = if base_url.ends_with('/') { base_url.to_string() } else { format!("{base_url}/") };
        Ok(Self {
            base_url: Url::parse(&base).with_context(|| format!("invalid feed base url {base_url}"))?,
            api_key: None,
            page_size: 100,
            max_pages: 500,
            timeout: Duration::from_secs(12),
            min_interval: Duration::from_millis(100),
            user_agent: "gridiron-search/0.1".to_string(),
        })
    }
}

pub struct HttpSource {
    client: Client,
    config: FeedConfig,
    next_slot: Mutex<Option<Instant>>,
}

impl HttpSource {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config, next_slot: Mutex::new(None) })
    }

    pub fn config(&self) -> &FeedConfig { &self.config }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config.base_url.join(path).with_context(|| format!("building url for {path}"))
    }

    /// `players/{id}` with the id percent-encoded as a single path segment.
    fn player_url(&self, player_id: &str) -> Result<Url> {
        if player_id.is_empty() || player_id == "." || player_id == ".." {
            bail!("invalid player id {player_id:?}");
        }
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("feed base url {} cannot take a path", self.config.base_url))?
            .pop_if_empty()
            .push("players")
            .push(player_id);
        Ok(url)
    }

    /// Wait until this request's turn under `min_interval`.
    async fn pace(&self) {
        let wait = {
            let mut slot = self.next_slot.lock();
            let now = Instant::now();
            let start = slot.map_or(now, |next| next.max(now));
            *slot = Some(start + self.config.min_interval);
            start - now
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    /// GET a JSON document. 404 is `None`; other non-success statuses fail.
    async fn get_json(&self, url: Url) -> Result<Option<Value>> {
        self.pace().await;
        let mut req = self.client.get(url.clone()).header(header::ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        let bytes = resp.bytes().await.with_context(|| format!("reading body of {url}"))?;
        let json = serde_json::from_slice(&bytes).with_context(|| format!("decoding JSON from {url}"))?;
        Ok(Some(json))
    }
}

/// A list payload is either a bare array or an object with a `data` array.
fn list_items(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(anyhow!("expected a JSON array or an object with a `data` array")),
        },
        _ => Err(anyhow!("expected a JSON array or an object with a `data` array")),
    }
}

/// Decode each record on its own, skipping the ones that do not fit.
fn decode_records<T: DeserializeOwned>(items: Vec<Value>, kind: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(kind, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// Unwrap `{"data": {...}}` around a single record.
fn single_item(payload: Value) -> Value {
    match payload {
        Value::Object(mut obj) if obj.len() == 1 && obj.get("data").is_some_and(Value::is_object) => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

impl DataSource for HttpSource {
    async fn fetch_players(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>> {
        let mut players: Vec<PlayerRecord> = Vec::new();
        let mut page = 1usize;
        let mut previous_first: Option<String> = None;
        loop {
            let remaining = limit.map_or(usize::MAX, |l| l.saturating_sub(players.len()));
            if remaining == 0 {
                break;
            }
            let per_page = self.config.page_size.max(1).min(remaining);
            let mut url = self.endpoint("players")?;
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &per_page.to_string());

            let Some(payload) = self.get_json(url).await? else { bail!("players endpoint not found") };
            let items = list_items(payload)?;
            let received = items.len();
            let records = decode_records::<PlayerRecord>(items, "player");
            let first = records.first().map(|p| p.player_id.clone());
            if first.is_some() && first == previous_first {
                tracing::warn!(page, "page repeats the previous one, the API ignores paging");
                break;
            }
            players.extend(records);
            tracing::debug!(page, received, total = players.len(), "fetched player page");

            // a short page is the last one; a page larger than requested means the API ignores paging
            if received == 0 || received != per_page {
                break;
            }
            if page >= self.config.max_pages {
                tracing::warn!(page, "stopping at the page limit");
                break;
            }
            previous_first = first;
            page += 1;
        }
        if let Some(limit) = limit {
            players.truncate(limit);
        }
        tracing::info!(count = players.len(), "fetched players");
        Ok(players)
    }

    async fn fetch_player(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        let url = self.player_url(player_id)?;
        match self.get_json(url).await? {
            Some(payload) => {
                let player = serde_json::from_value(single_item(payload)).with_context(|| format!("decoding player {player_id}"))?;
                Ok(Some(player))
            }
            None => Ok(None),
        }
    }

    async fn fetch_teams(&self) -> Result<Vec<TeamRecord>> {
        let Some(payload) = self.get_json(self.endpoint("teams")?).await? else { bail!("teams endpoint not found") };
        let teams = decode_records::<TeamRecord>(list_items(payload)?, "team");
        tracing::info!(count = teams.len(), "fetched teams");
        Ok(teams)
    }
}
