use anyhow::{Context, Result};
use search_core::{DataSource, PlayerRecord, TeamRecord};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Players and teams loaded from JSON / JSONL exports on disk.
#[derive(Debug, Default)]
pub struct FileSource {
    players: Vec<PlayerRecord>,
    teams: Vec<TeamRecord>,
}

impl FileSource {
    pub fn load(players: Option<&Path>, teams: Option<&Path>) -> Result<Self> {
        let players = match players {
            Some(path) => read_records(path)?,
            None => Vec::new(),
        };
        let teams = match teams {
            Some(path) => read_records(path)?,
            None => Vec::new(),
        };
        tracing::info!(players = players.len(), teams = teams.len(), "loaded records from files");
        Ok(Self { players, teams })
    }
}

impl DataSource for FileSource {
    async fn fetch_players(&self, limit: Option<usize>) -> Result<Vec<PlayerRecord>> {
        Ok(self.players.iter().take(limit.unwrap_or(usize::MAX)).cloned().collect())
    }

    async fn fetch_player(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        Ok(self.players.iter().find(|p| p.player_id == player_id).cloned())
    }

    async fn fetch_teams(&self) -> Result<Vec<TeamRecord>> {
        Ok(self.teams.clone())
    }
}

/// `.json` and `.jsonl` files under `input`, or `input` itself if it is a file.
pub fn collect_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

pub fn read_records<T: DeserializeOwned>(input: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for file in collect_files(input) {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut records)?;
        } else {
            read_json(&file, &mut records)?;
        }
    }
    Ok(records)
}

fn read_jsonl<T: DeserializeOwned>(file: &Path, out: &mut Vec<T>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let record = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        out.push(record);
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(file: &Path, out: &mut Vec<T>) -> Result<()> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    let items = match json {
        serde_json::Value::Array(arr) => arr,
        serde_json::Value::Object(mut obj) => match obj.remove("data") {
            Some(serde_json::Value::Array(arr)) => arr,
            Some(other) => vec![other],
            None => vec![serde_json::Value::Object(obj)],
        },
        _ => Vec::new(),
    };
    for v in items {
        out.push(serde_json::from_value(v).with_context(|| format!("decoding record in {}", file.display()))?);
    }
    Ok(())
}
