use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{GRID_COLUMNS, GRID_ROWS, GRID_SIZE, MAX_SKILL_USAGE};
use crate::error::PositionError;

/// A cell of the 3x3 board, numbered 1..=9 row by row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    pub const TOP_LEFT: Position = Position(1);
    pub const BOTTOM_RIGHT: Position = Position(GRID_SIZE);

    pub fn new(value: u8) -> Option<Self> {
        if (1..=GRID_SIZE).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn from_row_col(row: i32, col: i32) -> Option<Self> {
        if row < 0 || col < 0 || row >= GRID_ROWS || col >= GRID_COLUMNS {
            return None;
        }
        Some(Self((row * GRID_COLUMNS + col + 1) as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn row(self) -> i32 {
        (self.0 as i32 - 1) / GRID_COLUMNS
    }

    pub fn col(self) -> i32 {
        (self.0 as i32 - 1) % GRID_COLUMNS
    }

    pub fn all() -> impl Iterator<Item = Position> {
        (1..=GRID_SIZE).map(Position)
    }
}

impl TryFrom<u8> for Position {
    type Error = PositionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PositionError::OutOfRange(value))
    }
}

impl From<Position> for u8 {
    fn from(value: Position) -> Self {
        value.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Enumeration order shared by neighbor lookup and every AI tie-break.
    pub const CANONICAL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Dash,
    Diagonal,
    Invisible,
    Bind,
}

impl SkillType {
    pub fn description(self) -> &'static str {
        match self {
            SkillType::Dash => "move two cells in a straight line",
            SkillType::Diagonal => "step diagonally",
            SkillType::Invisible => "survive one hit from the oni",
            SkillType::Bind => "freeze the oni for one beat",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Skill {
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    #[serde(rename = "maxUsage")]
    pub max_usage: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterType {
    Hero,
    Thief,
    Wizard,
    Elf,
}

impl CharacterType {
    pub const ALL: [CharacterType; 4] = [
        CharacterType::Hero,
        CharacterType::Thief,
        CharacterType::Wizard,
        CharacterType::Elf,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hero" => Some(Self::Hero),
            "thief" => Some(Self::Thief),
            "wizard" => Some(Self::Wizard),
            "elf" => Some(Self::Elf),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Thief => "thief",
            Self::Wizard => "wizard",
            Self::Elf => "elf",
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, Self::Hero | Self::Thief)
    }

    pub fn skill(self) -> Skill {
        let skill_type = match self {
            Self::Hero => SkillType::Dash,
            Self::Thief => SkillType::Diagonal,
            Self::Wizard => SkillType::Invisible,
            Self::Elf => SkillType::Bind,
        };
        Skill {
            skill_type,
            max_usage: MAX_SKILL_USAGE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiLevel {
    Easy,
    Normal,
    Hard,
}

impl AiLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialRule {
    None,
    Fog,
    Disappear,
    FogDisappear,
}

impl SpecialRule {
    pub fn has_fog(self) -> bool {
        matches!(self, Self::Fog | Self::FogDisappear)
    }

    pub fn has_disappear(self) -> bool {
        matches!(self, Self::Disappear | Self::FogDisappear)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Idle,
    Playing,
    Paused,
    Win,
    Lose,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Win | Self::Lose)
    }
}

/// Outcome of the pure terminal-condition check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnResult {
    Continue,
    Win,
    Lose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoseReason {
    NoMove,
    InvalidMove,
    FellIntoVoid,
    Caught,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    TurnResolved {
        turn: u32,
        player: Position,
        enemy: Position,
    },
    SkillUsed {
        skill: SkillType,
        remaining: u32,
    },
    CollisionAvoided {
        crossing: bool,
    },
    FloorCleared {
        floor: u32,
    },
    SkillReset {
        floor: u32,
    },
    FloorStarted {
        floor: u32,
        bpm: f64,
        #[serde(rename = "specialRule")]
        special_rule: SpecialRule,
    },
    GameOver {
        status: GameStatus,
        floor: u32,
        reason: Option<LoseReason>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub floor: u32,
    #[serde(rename = "turnCount")]
    pub turn_count: u32,
    #[serde(rename = "maxTurns")]
    pub max_turns: u32,
    #[serde(rename = "playerPosition")]
    pub player_position: Position,
    #[serde(rename = "enemyPosition")]
    pub enemy_position: Position,
    pub status: GameStatus,
    pub character: CharacterType,
    pub skill: Skill,
    #[serde(rename = "skillUsageCount")]
    pub skill_usage_count: u32,
    #[serde(rename = "remainingSkillUses")]
    pub remaining_skill_uses: u32,
    #[serde(rename = "pendingMove")]
    pub pending_move: Option<Position>,
    #[serde(rename = "availableMoves")]
    pub available_moves: Vec<Position>,
    #[serde(rename = "specialRule")]
    pub special_rule: SpecialRule,
    #[serde(rename = "disappearedCells")]
    pub disappeared_cells: Vec<Position>,
    #[serde(rename = "visibleCells")]
    pub visible_cells: Vec<Position>,
    pub bpm: f64,
    #[serde(rename = "aiLevel")]
    pub ai_level: AiLevel,
    #[serde(rename = "enemySprite")]
    pub enemy_sprite: &'static str,
    #[serde(rename = "currentBeat")]
    pub current_beat: u64,
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
    #[serde(rename = "timeUntilNextBeat")]
    pub time_until_next_beat: f64,
    #[serde(rename = "isSkillActive")]
    pub is_skill_active: bool,
    #[serde(rename = "isInvisible")]
    pub is_invisible: bool,
    #[serde(rename = "enemyStopped")]
    pub enemy_stopped: bool,
    #[serde(rename = "consecutiveWaits")]
    pub consecutive_waits: u32,
    #[serde(rename = "showFloorClear")]
    pub show_floor_clear: bool,
    #[serde(rename = "showSkillReset")]
    pub show_skill_reset: bool,
    #[serde(rename = "lastSelectionOnBeat")]
    pub last_selection_on_beat: Option<bool>,
    #[serde(rename = "bestFloor")]
    pub best_floor: u32,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub status: GameStatus,
    pub floor: u32,
    pub character: CharacterType,
    #[serde(rename = "aiLevel")]
    pub ai_level: AiLevel,
    #[serde(rename = "totalTurns")]
    pub total_turns: u64,
    pub reason: Option<LoseReason>,
    #[serde(rename = "bestFloor")]
    pub best_floor: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct RankingEntry {
    pub name: String,
    #[serde(rename = "bestFloor")]
    pub best_floor: u32,
    pub character: Option<CharacterType>,
    pub runs: u64,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RankingResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<RankingEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_rejects_out_of_grid_values() {
        assert!(Position::new(0).is_none());
        assert!(Position::new(10).is_none());
        assert_eq!(Position::try_from(10), Err(PositionError::OutOfRange(10)));
        assert_eq!(Position::new(9).map(Position::get), Some(9));
    }

    #[test]
    fn position_row_and_col_follow_reading_order() {
        let cells: Vec<(i32, i32)> = Position::all().map(|p| (p.row(), p.col())).collect();
        assert_eq!(
            cells,
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 0),
                (1, 1),
                (1, 2),
                (2, 0),
                (2, 1),
                (2, 2)
            ]
        );
        for position in Position::all() {
            assert_eq!(
                Position::from_row_col(position.row(), position.col()),
                Some(position)
            );
        }
        assert!(Position::from_row_col(3, 0).is_none());
        assert!(Position::from_row_col(0, -1).is_none());
    }

    #[test]
    fn position_serializes_as_plain_number() {
        let position = Position::new(4).expect("valid position");
        assert_eq!(serde_json::to_string(&position).expect("serialize"), "4");
        let parsed: Position = serde_json::from_str("7").expect("deserialize");
        assert_eq!(parsed.get(), 7);
        assert!(serde_json::from_str::<Position>("0").is_err());
    }

    #[test]
    fn characters_map_to_their_skills() {
        assert_eq!(CharacterType::Hero.skill().skill_type, SkillType::Dash);
        assert_eq!(CharacterType::Thief.skill().skill_type, SkillType::Diagonal);
        assert_eq!(CharacterType::Wizard.skill().skill_type, SkillType::Invisible);
        assert_eq!(CharacterType::Elf.skill().skill_type, SkillType::Bind);
        assert!(CharacterType::Thief.is_free());
        assert!(!CharacterType::Elf.is_free());
        for character in CharacterType::ALL {
            assert_eq!(CharacterType::parse(character.key()), Some(character));
        }
    }

    #[test]
    fn ai_levels_are_ordered_by_strength() {
        assert!(AiLevel::Easy < AiLevel::Normal);
        assert!(AiLevel::Normal < AiLevel::Hard);
        assert_eq!(AiLevel::Easy.max(AiLevel::Hard), AiLevel::Hard);
    }
}
