use std::collections::BTreeSet;

use crate::types::{AiLevel, GameStatus, LoseReason, Position, SpecialRule};

/// Mutable state of one run. Owned by the engine; callers only get `&`.
#[derive(Clone, Debug, PartialEq)]
pub struct GameSession {
    pub current_floor: u32,
    pub turn_count: u32,
    pub max_turns: u32,
    pub player_position: Position,
    pub enemy_position: Position,
    pub status: GameStatus,
    pub ai_choice: AiLevel,
    pub special_rule: SpecialRule,
    pub disappeared_cells: BTreeSet<Position>,
    pub skill_usage_count: u32,
    pub consecutive_waits: u32,
    pub pending_move: Option<Position>,
    pub is_skill_active: bool,
    pub is_invisible: bool,
    pub enemy_stopped: bool,
    pub show_floor_clear: bool,
    pub show_skill_reset: bool,
    pub lose_reason: Option<LoseReason>,
    pub total_turns: u64,
}

impl GameSession {
    pub fn new(max_turns: u32) -> Self {
        Self {
            current_floor: 1,
            turn_count: 0,
            max_turns,
            player_position: Position::TOP_LEFT,
            enemy_position: Position::BOTTOM_RIGHT,
            status: GameStatus::Idle,
            ai_choice: AiLevel::Easy,
            special_rule: SpecialRule::None,
            disappeared_cells: BTreeSet::new(),
            skill_usage_count: 0,
            consecutive_waits: 0,
            pending_move: None,
            is_skill_active: false,
            is_invisible: false,
            enemy_stopped: false,
            show_floor_clear: false,
            show_skill_reset: false,
            lose_reason: None,
            total_turns: 0,
        }
    }

    pub(super) fn clear_transient_flags(&mut self) {
        self.is_skill_active = false;
        self.is_invisible = false;
        self.enemy_stopped = false;
    }

    /// Playing and not parked on a floor-clear screen.
    pub fn accepts_input(&self) -> bool {
        self.status == GameStatus::Playing && !self.show_floor_clear
    }
}
