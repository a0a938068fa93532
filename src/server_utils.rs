use serde::Serialize;

use crate::profile_store::Profile;
use crate::types::{AiLevel, CharacterType, Skill};

pub const MAX_NAME_CHARS: usize = 16;

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect()
}

pub fn parse_ranking_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}

/// Picks the character a connection plays: the requested one if the profile
/// has it, otherwise the profile's current selection.
pub fn resolve_character(requested: Option<CharacterType>, profile: &Profile) -> CharacterType {
    match requested {
        Some(character) if profile.is_unlocked(character) => character,
        _ if profile.is_unlocked(profile.selected_character) => profile.selected_character,
        _ => CharacterType::Hero,
    }
}

/// One entry of the character picker sent in `welcome`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterOption {
    pub character: CharacterType,
    pub skill: Skill,
    pub skill_description: &'static str,
    pub free: bool,
    pub unlocked: bool,
}

pub fn character_options(profile: &Profile) -> Vec<CharacterOption> {
    CharacterType::ALL
        .into_iter()
        .map(|character| {
            let skill = character.skill();
            CharacterOption {
                character,
                skill,
                skill_description: skill.skill_type.description(),
                free: character.is_free(),
                unlocked: profile.is_unlocked(character),
            }
        })
        .collect()
}

pub fn normalize_ai_choice(value: Option<AiLevel>) -> AiLevel {
    value.unwrap_or(AiLevel::Easy)
}

/// Derives a per-connection engine seed from a random token.
pub fn seed_from_token(token: u64) -> u32 {
    let folded = token ^ (token >> 32);
    let seed = folded as u32;
    if seed == 0 {
        0x9e37_79b9
    } else {
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_limit_parsing_is_lenient_for_invalid_values() {
        assert_eq!(parse_ranking_limit(Some("8")), Some(8));
        assert_eq!(parse_ranking_limit(Some("0")), Some(0));
        assert_eq!(parse_ranking_limit(Some("abc")), None);
        assert_eq!(parse_ranking_limit(Some("-1")), None);
        assert_eq!(parse_ranking_limit(None), None);
    }

    #[test]
    fn sanitize_name_applies_trim_empty_and_max_len() {
        assert_eq!(sanitize_name(""), "Player");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Alice "), "Alice");
        assert_eq!(sanitize_name("12345678901234567890"), "1234567890123456");
    }

    #[test]
    fn locked_characters_fall_back_to_selection() {
        let mut profile = Profile::default();
        assert_eq!(
            resolve_character(Some(CharacterType::Thief), &profile),
            CharacterType::Hero
        );
        profile.record_floor(10);
        assert_eq!(
            resolve_character(Some(CharacterType::Thief), &profile),
            CharacterType::Thief
        );
        assert!(profile.select(CharacterType::Thief));
        assert_eq!(resolve_character(None, &profile), CharacterType::Thief);
        assert_eq!(
            resolve_character(Some(CharacterType::Wizard), &profile),
            CharacterType::Thief
        );
    }

    #[test]
    fn character_options_follow_the_profile() {
        let mut profile = Profile::default();
        let options = character_options(&profile);
        assert_eq!(options.len(), 4);
        assert!(options[0].unlocked);
        assert!(options[1].free);
        assert!(!options[1].unlocked);
        assert!(!options[3].free);
        assert_eq!(options[3].skill_description, "freeze the oni for one beat");

        profile.record_floor(10);
        assert!(character_options(&profile)[1].unlocked);

        let value = serde_json::to_value(&options[2]).expect("serialize option");
        assert_eq!(value["character"], "wizard");
        assert_eq!(value["skillDescription"], "survive one hit from the oni");
        assert_eq!(value["skill"]["type"], "invisible");
    }

    #[test]
    fn ai_choice_defaults_to_easy() {
        assert_eq!(normalize_ai_choice(None), AiLevel::Easy);
        assert_eq!(normalize_ai_choice(Some(AiLevel::Hard)), AiLevel::Hard);
    }

    #[test]
    fn seeds_are_never_zero() {
        assert_ne!(seed_from_token(0), 0);
        assert_eq!(seed_from_token(42), 42);
    }
}
