use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_FLOORS;
use crate::error::StoreError;
use crate::types::{CharacterType, RankingEntry, RankingResponse};

const STORE_VERSION: u8 = 1;
const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredRankingEntry {
    name: String,
    runs: u64,
    #[serde(rename = "bestFloor", alias = "best_floor")]
    best_floor: u32,
    #[serde(default)]
    character: Option<CharacterType>,
    #[serde(rename = "updatedAtMs", alias = "updated_at_ms")]
    updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RankingStoreFile<'a> {
    version: u8,
    players: &'a HashMap<String, StoredRankingEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct RankingStoreFileRaw {
    version: u8,
    players: HashMap<String, serde_json::Value>,
}

/// Best floor per player name, persisted as one JSON file.
pub struct RankingStore {
    file_path: PathBuf,
    players: HashMap<String, StoredRankingEntry>,
}

impl RankingStore {
    /// Opens the store, starting empty when the file is missing or unusable.
    pub fn new(file_path: PathBuf) -> Self {
        let players = match load_players(&file_path) {
            Ok(players) => players,
            Err(error) => {
                tracing::warn!(%error, "ranking store unreadable, starting empty");
                HashMap::new()
            }
        };
        Self { file_path, players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn record_run(&mut self, name: &str, floor: u32, character: Option<CharacterType>) {
        let key = ranking_key(name);
        if key.is_empty() {
            return;
        }
        let floor = floor.min(MAX_FLOORS);
        let now_ms = now_ms();
        let current = self
            .players
            .entry(key)
            .or_insert_with(|| StoredRankingEntry {
                name: name.trim().to_string(),
                runs: 0,
                best_floor: 0,
                character: None,
                updated_at_ms: now_ms,
            });

        current.name = name.trim().to_string();
        current.runs += 1;
        if floor > current.best_floor || current.character.is_none() {
            current.character = character.or(current.character);
        }
        current.best_floor = current.best_floor.max(floor);
        current.updated_at_ms = now_ms;

        if let Err(error) = self.save() {
            tracing::warn!(%error, "failed to persist ranking");
        }
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> RankingResponse {
        RankingResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.get_top(requested_limit),
        }
    }

    fn get_top(&self, requested_limit: Option<usize>) -> Vec<RankingEntry> {
        let limit = requested_limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let mut entries: Vec<RankingEntry> = self
            .players
            .values()
            .map(|entry| RankingEntry {
                name: entry.name.clone(),
                best_floor: entry.best_floor,
                character: entry.character,
                runs: entry.runs,
                updated_at_ms: entry.updated_at_ms,
            })
            .collect();

        // Whoever reached a floor first keeps the higher place.
        entries.sort_by(|a, b| {
            b.best_floor
                .cmp(&a.best_floor)
                .then_with(|| a.updated_at_ms.cmp(&b.updated_at_ms))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        entries.truncate(limit);
        entries
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = RankingStoreFile {
            version: STORE_VERSION,
            players: &self.players,
        };
        let text = serde_json::to_string_pretty(&payload).map_err(|source| StoreError::Json {
            path: self.file_path.clone(),
            source,
        })?;
        fs::write(&self.file_path, text).map_err(|source| StoreError::Io {
            path: self.file_path.clone(),
            source,
        })
    }
}

fn load_players(path: &Path) -> Result<HashMap<String, StoredRankingEntry>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let parsed: RankingStoreFileRaw =
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    if parsed.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: parsed.version,
        });
    }

    let mut sanitized = HashMap::<String, StoredRankingEntry>::new();
    for (player_key, raw_value) in parsed.players {
        let value: StoredRankingEntry = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(
                    player = %player_key,
                    path = %path.display(),
                    %error,
                    "skipping malformed ranking entry"
                );
                continue;
            }
        };
        let Some(normalized) = sanitize_stored_entry(value) else {
            continue;
        };
        let key = ranking_key(&normalized.name);

        match sanitized.get_mut(&key) {
            Some(current) => {
                if normalized.best_floor > current.best_floor {
                    current.character = normalized.character.or(current.character);
                }
                current.name = normalized.name;
                current.runs += normalized.runs;
                current.best_floor = current.best_floor.max(normalized.best_floor);
                current.updated_at_ms = current.updated_at_ms.max(normalized.updated_at_ms);
            }
            None => {
                sanitized.insert(key, normalized);
            }
        }
    }

    Ok(sanitized)
}

fn sanitize_stored_entry(value: StoredRankingEntry) -> Option<StoredRankingEntry> {
    let name = value.name.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some(StoredRankingEntry {
        name,
        runs: value.runs.max(1),
        best_floor: value.best_floor.min(MAX_FLOORS),
        character: value.character,
        updated_at_ms: value.updated_at_ms,
    })
}

fn ranking_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("nested").join("ranking.json")
    }

    #[test]
    fn record_run_keeps_best_floor_and_counts_runs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = store_path(&dir);
        let mut store = RankingStore::new(path.clone());
        store.record_run("Alice", 12, Some(CharacterType::Hero));
        store.record_run(" alice ", 7, Some(CharacterType::Thief));
        store.record_run("Bob", 30, None);

        let response = store.build_response(Some(10));
        assert_eq!(response.entries.len(), 2);
        assert_eq!(response.entries[0].name, "Bob");
        let alice = &response.entries[1];
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.best_floor, 12);
        assert_eq!(alice.runs, 2);
        assert_eq!(alice.character, Some(CharacterType::Hero));
        assert!(path.exists());
    }

    #[test]
    fn blank_names_are_not_ranked() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = RankingStore::new(store_path(&dir));
        store.record_run("   ", 50, None);
        assert!(store.is_empty());
    }

    #[test]
    fn floors_past_the_top_are_clamped() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = RankingStore::new(store_path(&dir));
        store.record_run("Alice", 101, None);
        assert_eq!(store.build_response(None).entries[0].best_floor, MAX_FLOORS);
    }

    #[test]
    fn entries_survive_reopening() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = store_path(&dir);
        {
            let mut store = RankingStore::new(path.clone());
            store.record_run("Alice", 21, Some(CharacterType::Elf));
        }
        let store = RankingStore::new(path);
        let response = store.build_response(None);
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.entries[0].best_floor, 21);
        assert_eq!(response.entries[0].character, Some(CharacterType::Elf));
    }

    #[test]
    fn load_merges_case_insensitive_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ranking.json");
        let raw = r#"{
  "version": 1,
  "players": {
    "ALICE": { "name": "Alice", "runs": 2, "bestFloor": 15, "updatedAtMs": 10 },
    "alice_legacy": { "name": " alice ", "runs": 1, "best_floor": 9, "updated_at_ms": 20 }
  }
}"#;
        fs::write(&path, raw).expect("write file");

        let store = RankingStore::new(path);
        let response = store.build_response(Some(10));
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.entries[0].runs, 3);
        assert_eq!(response.entries[0].best_floor, 15);
        assert_eq!(response.entries[0].updated_at_ms, 20);
    }

    #[test]
    fn load_keeps_valid_entries_when_invalid_entries_exist() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ranking.json");
        let raw = r#"{
  "version": 1,
  "players": {
    "valid": { "name": "Alice", "runs": 2, "bestFloor": 40, "updatedAtMs": 10 },
    "invalid": { "name": "Broken", "runs": -1 }
  }
}"#;
        fs::write(&path, raw).expect("write file");

        let store = RankingStore::new(path);
        let response = store.build_response(Some(10));
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.entries[0].name, "Alice");
    }

    #[test]
    fn unsupported_version_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ranking.json");
        fs::write(&path, r#"{ "version": 9, "players": {} }"#).expect("write file");

        let error = load_players(&path).expect_err("version 9 rejected");
        assert!(matches!(error, StoreError::UnsupportedVersion { version: 9, .. }));
        assert!(RankingStore::new(path).is_empty());
    }

    #[test]
    fn garbage_file_is_reported_as_json_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ranking.json");
        fs::write(&path, "not json").expect("write file");
        assert!(matches!(
            load_players(&path),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn build_response_limits_range() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = RankingStore::new(store_path(&dir));
        for idx in 0..3u32 {
            store.record_run(&format!("P{}", idx + 1), idx + 1, None);
        }

        assert_eq!(store.build_response(Some(1)).entries.len(), 1);
        assert_eq!(store.build_response(Some(0)).entries.len(), 1);
        assert_eq!(store.build_response(Some(999)).entries.len(), 3);
        assert_eq!(store.build_response(None).entries[0].name, "P3");
    }
}
