//! Local player profiles: best floor, unlocked characters and the current
//! pick, kept per player name in one JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FLOORS, THIEF_UNLOCK_FLOOR};
use crate::error::StoreError;
use crate::types::CharacterType;

const STORE_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "bestFloor", default)]
    pub best_floor: u32,
    #[serde(rename = "unlockedCharacters", default = "default_unlocked")]
    pub unlocked_characters: Vec<CharacterType>,
    #[serde(rename = "selectedCharacter", default = "default_selected")]
    pub selected_character: CharacterType,
}

fn default_unlocked() -> Vec<CharacterType> {
    vec![CharacterType::Hero]
}

fn default_selected() -> CharacterType {
    CharacterType::Hero
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            best_floor: 0,
            unlocked_characters: default_unlocked(),
            selected_character: default_selected(),
        }
    }
}

impl Profile {
    pub fn is_unlocked(&self, character: CharacterType) -> bool {
        self.unlocked_characters.contains(&character)
    }

    pub fn unlock(&mut self, character: CharacterType) {
        if !self.is_unlocked(character) {
            self.unlocked_characters.push(character);
        }
    }

    /// Switches to `character` if it is unlocked.
    pub fn select(&mut self, character: CharacterType) -> bool {
        if !self.is_unlocked(character) {
            return false;
        }
        self.selected_character = character;
        true
    }

    pub fn record_floor(&mut self, floor: u32) {
        let floor = floor.min(MAX_FLOORS);
        self.best_floor = self.best_floor.max(floor);
        if self.best_floor >= THIEF_UNLOCK_FLOOR {
            self.unlock(CharacterType::Thief);
        }
    }

    fn normalize(mut self) -> Self {
        self.best_floor = self.best_floor.min(MAX_FLOORS);
        let mut unlocked = Vec::with_capacity(self.unlocked_characters.len() + 1);
        for character in std::iter::once(CharacterType::Hero).chain(self.unlocked_characters) {
            if !unlocked.contains(&character) {
                unlocked.push(character);
            }
        }
        self.unlocked_characters = unlocked;
        if self.best_floor >= THIEF_UNLOCK_FLOOR {
            self.unlock(CharacterType::Thief);
        }
        if !self.is_unlocked(self.selected_character) {
            self.selected_character = CharacterType::Hero;
        }
        self
    }
}

#[derive(Clone, Debug, Serialize)]
struct ProfileFile<'a> {
    version: u8,
    profiles: &'a HashMap<String, Profile>,
}

#[derive(Clone, Debug, Deserialize)]
struct ProfileFileRaw {
    version: u8,
    profiles: HashMap<String, serde_json::Value>,
}

pub struct ProfileBook {
    file_path: PathBuf,
    profiles: HashMap<String, Profile>,
}

impl ProfileBook {
    pub fn new(file_path: PathBuf) -> Self {
        let profiles = match load_profiles(&file_path) {
            Ok(profiles) => profiles,
            Err(error) => {
                tracing::warn!(%error, "profile store unreadable, starting empty");
                HashMap::new()
            }
        };
        Self {
            file_path,
            profiles,
        }
    }

    /// The stored profile for `name`, or a fresh one.
    pub fn profile(&self, name: &str) -> Profile {
        self.profiles
            .get(&profile_key(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn record_floor(&mut self, name: &str, floor: u32) {
        self.update(name, |profile| {
            profile.record_floor(floor);
            true
        });
    }

    pub fn select_character(&mut self, name: &str, character: CharacterType) -> bool {
        self.update(name, |profile| profile.select(character))
    }

    fn update(&mut self, name: &str, apply: impl FnOnce(&mut Profile) -> bool) -> bool {
        let key = profile_key(name);
        if key.is_empty() {
            return false;
        }
        let profile = self.profiles.entry(key).or_default();
        if !apply(profile) {
            return false;
        }
        if let Err(error) = self.save() {
            tracing::warn!(%error, "failed to persist profiles");
        }
        true
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = ProfileFile {
            version: STORE_VERSION,
            profiles: &self.profiles,
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

fn load_profiles(path: &Path) -> Result<HashMap<String, Profile>, StoreError> {
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
    let parsed: ProfileFileRaw = serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if parsed.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: parsed.version,
        });
    }

    let mut profiles = HashMap::new();
    for (name, raw) in parsed.profiles {
        let key = profile_key(&name);
        if key.is_empty() {
            continue;
        }
        match serde_json::from_value::<Profile>(raw) {
            Ok(profile) => {
                profiles.insert(key, profile.normalize());
            }
            Err(error) => {
                tracing::warn!(player = %name, %error, "skipping malformed profile");
            }
        }
    }
    Ok(profiles)
}

fn profile_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_profile_has_only_the_hero() {
        let profile = Profile::default();
        assert!(profile.is_unlocked(CharacterType::Hero));
        assert!(!profile.is_unlocked(CharacterType::Thief));
        assert_eq!(profile.selected_character, CharacterType::Hero);
    }

    #[test]
    fn reaching_floor_ten_unlocks_the_thief() {
        let mut profile = Profile::default();
        profile.record_floor(9);
        assert!(!profile.select(CharacterType::Thief));
        profile.record_floor(THIEF_UNLOCK_FLOOR);
        assert!(profile.select(CharacterType::Thief));
        assert_eq!(profile.selected_character, CharacterType::Thief);
        profile.record_floor(3);
        assert_eq!(profile.best_floor, THIEF_UNLOCK_FLOOR);
    }

    #[test]
    fn premium_characters_stay_locked() {
        let mut profile = Profile::default();
        profile.record_floor(MAX_FLOORS);
        assert!(!profile.select(CharacterType::Wizard));
        assert!(!profile.select(CharacterType::Elf));
    }

    #[test]
    fn book_persists_between_openings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("profiles.json");
        {
            let mut book = ProfileBook::new(path.clone());
            book.record_floor("Alice", 14);
            assert!(book.select_character("alice", CharacterType::Thief));
            assert!(!book.select_character("Alice", CharacterType::Elf));
        }
        let book = ProfileBook::new(path);
        let profile = book.profile(" ALICE ");
        assert_eq!(profile.best_floor, 14);
        assert_eq!(profile.selected_character, CharacterType::Thief);
        assert_eq!(book.profile("Bob"), Profile::default());
    }

    #[test]
    fn loading_repairs_inconsistent_profiles() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("profiles.json");
        let raw = r#"{
  "version": 1,
  "profiles": {
    "alice": { "bestFloor": 250, "unlockedCharacters": ["elf"], "selectedCharacter": "wizard" },
    "bob": { "bestFloor": "high" }
  }
}"#;
        fs::write(&path, raw).expect("write file");

        let book = ProfileBook::new(path);
        let alice = book.profile("alice");
        assert_eq!(alice.best_floor, MAX_FLOORS);
        assert!(alice.is_unlocked(CharacterType::Hero));
        assert!(alice.is_unlocked(CharacterType::Thief));
        assert!(alice.is_unlocked(CharacterType::Elf));
        assert_eq!(alice.selected_character, CharacterType::Hero);
        assert_eq!(book.profile("bob"), Profile::default());
    }

    #[test]
    fn wrong_version_starts_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("profiles.json");
        fs::write(&path, r#"{ "version": 2, "profiles": {} }"#).expect("write file");
        assert!(matches!(
            load_profiles(&path),
            Err(StoreError::UnsupportedVersion { version: 2, .. })
        ));
        assert_eq!(ProfileBook::new(path).profile("x").best_floor, 0);
    }
}
