//! Deterministic evasive bot that plays through the public engine API.

use crate::engine::TurnEngine;
use crate::grid::{available_moves, dash_moves, manhattan};
use crate::pursuit;
use crate::rng::Rng;
use crate::types::{AiLevel, Position, Skill, SkillType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Move(Position),
    Dash(Position),
    BindThenMove(Position),
}

/// What the bot needs to know about one beat.
#[derive(Clone, Debug)]
pub struct Situation {
    pub player: Position,
    pub enemy: Position,
    pub level: AiLevel,
    pub enemy_stopped: bool,
    pub moves: Vec<Position>,
    pub skill: Skill,
    pub remaining_skill_uses: u32,
    pub is_skill_active: bool,
    pub disappeared: Vec<Position>,
}

impl Situation {
    pub fn from_engine(engine: &TurnEngine) -> Self {
        let session = engine.session();
        Self {
            player: session.player_position,
            enemy: session.enemy_position,
            level: engine.effective_ai_level(),
            enemy_stopped: session.enemy_stopped,
            moves: engine.available_moves(),
            skill: engine.skill(),
            remaining_skill_uses: engine.remaining_skill_uses(),
            is_skill_active: session.is_skill_active,
            disappeared: session.disappeared_cells.iter().copied().collect(),
        }
    }

    /// Every cell the oni may occupy after the next beat.
    fn enemy_replies(&self, stopped: bool) -> Vec<Position> {
        if stopped {
            return vec![self.enemy];
        }
        match self.level {
            AiLevel::Easy => available_moves(self.enemy),
            // Normal and Hard never touch the generator.
            AiLevel::Normal | AiLevel::Hard => vec![pursuit::next_move(
                self.enemy,
                self.player,
                self.level,
                &mut Rng::new(1),
            )],
        }
    }

    fn can_use(&self, skill_type: SkillType) -> bool {
        self.skill.skill_type == skill_type && self.remaining_skill_uses > 0
    }
}

pub fn plan(situation: &Situation) -> Option<Action> {
    let replies = situation.enemy_replies(situation.enemy_stopped);
    if let Some(target) = best_target(situation, &situation.moves, &replies, true) {
        return Some(Action::Move(target));
    }

    if situation.can_use(SkillType::Dash) && !situation.is_skill_active {
        let jumps: Vec<Position> = dash_moves(situation.player)
            .into_iter()
            .filter(|cell| !situation.disappeared.contains(cell))
            .collect();
        if let Some(target) = best_target(situation, &jumps, &replies, true) {
            return Some(Action::Dash(target));
        }
    }

    if situation.can_use(SkillType::Bind) && !situation.enemy_stopped {
        let frozen = situation.enemy_replies(true);
        if let Some(target) = best_target(situation, &situation.moves, &frozen, true) {
            return Some(Action::BindThenMove(target));
        }
    }

    best_target(situation, &situation.moves, &replies, false).map(Action::Move)
}

/// Plans and applies one action. Returns what was done, if anything.
pub fn act(engine: &mut TurnEngine) -> Option<Action> {
    let action = plan(&Situation::from_engine(engine))?;
    match action {
        Action::Move(target) => {
            engine.select_move(target);
        }
        Action::Dash(target) => {
            engine.activate_skill();
            engine.select_move(target);
        }
        Action::BindThenMove(target) => {
            engine.bind_enemy();
            engine.select_move(target);
        }
    }
    Some(action)
}

fn is_safe(situation: &Situation, target: Position, replies: &[Position]) -> bool {
    if replies.contains(&target) {
        return false;
    }
    // Swapping cells with the oni is a catch too.
    !(target == situation.enemy && replies.contains(&situation.player))
}

fn best_target(
    situation: &Situation,
    candidates: &[Position],
    replies: &[Position],
    require_safe: bool,
) -> Option<Position> {
    let mut best = None;
    let mut best_key = (i32::MIN, false);
    for &target in candidates {
        if require_safe && !is_safe(situation, target, replies) {
            continue;
        }
        let distance = replies
            .iter()
            .map(|reply| manhattan(target, *reply))
            .min()
            .unwrap_or(i32::MAX);
        // Waiting is capped, so moving wins ties.
        let key = (distance, target != situation.player);
        if key > best_key {
            best_key = key;
            best = Some(target);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CharacterType;

    fn pos(value: u8) -> Position {
        Position::new(value).expect("valid test position")
    }

    fn situation(
        character: CharacterType,
        level: AiLevel,
        player: u8,
        enemy: u8,
        moves: &[u8],
    ) -> Situation {
        let skill = character.skill();
        Situation {
            player: pos(player),
            enemy: pos(enemy),
            level,
            enemy_stopped: false,
            moves: moves.iter().map(|value| pos(*value)).collect(),
            skill,
            remaining_skill_uses: skill.max_usage,
            is_skill_active: false,
            disappeared: Vec::new(),
        }
    }

    #[test]
    fn avoids_both_the_landing_cell_and_the_swap() {
        let s = situation(CharacterType::Hero, AiLevel::Normal, 1, 2, &[1, 2, 4]);
        assert_eq!(plan(&s), Some(Action::Move(pos(4))));
    }

    #[test]
    fn easy_oni_threatens_all_its_neighbors() {
        let s = situation(CharacterType::Hero, AiLevel::Easy, 1, 5, &[1, 2, 4]);
        assert_eq!(plan(&s), Some(Action::Move(pos(1))));
    }

    #[test]
    fn prefers_distance_then_moving() {
        let s = situation(CharacterType::Hero, AiLevel::Normal, 5, 9, &[5, 2, 8, 4, 6]);
        // Oni heads for 6: 2, 8 and 4 all sit two steps away, first one wins.
        assert_eq!(plan(&s), Some(Action::Move(pos(2))));
    }

    #[test]
    fn dashes_out_when_cornered() {
        let mut s = situation(CharacterType::Hero, AiLevel::Normal, 1, 2, &[2]);
        s.disappeared = vec![pos(4)];
        assert_eq!(plan(&s), Some(Action::Dash(pos(7))));

        s.is_skill_active = true;
        assert_eq!(plan(&s), Some(Action::Move(pos(2))));
    }

    #[test]
    fn binds_when_the_only_step_is_threatened() {
        let s = situation(CharacterType::Elf, AiLevel::Normal, 1, 3, &[2]);
        assert_eq!(plan(&s), Some(Action::BindThenMove(pos(2))));
    }

    #[test]
    fn falls_back_to_the_least_bad_move() {
        let mut s = situation(CharacterType::Thief, AiLevel::Normal, 1, 3, &[2]);
        s.remaining_skill_uses = 0;
        assert_eq!(plan(&s), Some(Action::Move(pos(2))));
        s.moves.clear();
        assert_eq!(plan(&s), None);
    }

    #[test]
    fn a_stopped_oni_only_threatens_its_own_cell() {
        let s = situation(CharacterType::Elf, AiLevel::Easy, 1, 5, &[1, 2, 4]);
        assert!(!is_safe(&s, pos(2), &s.enemy_replies(false)));
        assert!(is_safe(&s, pos(2), &s.enemy_replies(true)));
    }
}
