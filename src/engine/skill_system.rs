use super::*;

/// How a pending move relates to the player's current cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MoveKind {
    Wait,
    Step,
    Dash,
    Diagonal,
}

impl TurnEngine {
    pub fn remaining_skill_uses(&self) -> u32 {
        self.skill
            .max_usage
            .saturating_sub(self.session.skill_usage_count)
    }

    fn has_skill(&self, skill_type: SkillType) -> bool {
        self.skill.skill_type == skill_type && self.remaining_skill_uses() > 0
    }

    fn dash_ready(&self) -> bool {
        self.has_skill(SkillType::Dash) && self.session.is_skill_active
    }

    /// Diagonal steps need no activation, only charges.
    fn diagonal_ready(&self) -> bool {
        self.has_skill(SkillType::Diagonal)
    }

    pub(super) fn classify_move(&self, from: Position, to: Position) -> Option<MoveKind> {
        if from == to {
            return (self.session.consecutive_waits < MAX_CONSECUTIVE_WAITS)
                .then_some(MoveKind::Wait);
        }
        if is_valid_move(from, to) {
            return Some(MoveKind::Step);
        }
        if self.dash_ready() && is_valid_dash_move(from, to) {
            return Some(MoveKind::Dash);
        }
        if self.diagonal_ready() && is_valid_diagonal_move(from, to) {
            return Some(MoveKind::Diagonal);
        }
        None
    }

    pub(super) fn consume_skill_charge(&mut self) {
        if self.remaining_skill_uses() == 0 {
            return;
        }
        self.session.skill_usage_count += 1;
        self.events.push(RuntimeEvent::SkillUsed {
            skill: self.skill.skill_type,
            remaining: self.remaining_skill_uses(),
        });
    }

    /// Dash arms the next move, Invisible flashes the shield. Diagonal is
    /// always on and Bind goes through [`TurnEngine::bind_enemy`], so both
    /// are no-ops here.
    pub fn activate_skill(&mut self) -> bool {
        if !self.session.accepts_input() || self.remaining_skill_uses() == 0 {
            return false;
        }
        match self.skill.skill_type {
            SkillType::Dash => {
                self.session.is_skill_active = true;
                true
            }
            SkillType::Invisible => {
                self.session.is_invisible = true;
                true
            }
            SkillType::Diagonal | SkillType::Bind => false,
        }
    }

    pub fn bind_enemy(&mut self) -> bool {
        if !self.session.accepts_input()
            || !self.has_skill(SkillType::Bind)
            || self.session.enemy_stopped
        {
            return false;
        }
        self.session.enemy_stopped = true;
        self.consume_skill_charge();
        tracing::debug!(
            floor = self.session.current_floor,
            remaining = self.remaining_skill_uses(),
            "oni bound"
        );
        true
    }

    /// Spends a charge on collision if the character can shrug it off.
    pub(super) fn try_absorb_collision(&mut self, crossing: bool) -> bool {
        if !self.has_skill(SkillType::Invisible) {
            return false;
        }
        self.consume_skill_charge();
        self.session.is_invisible = true;
        self.events.push(RuntimeEvent::CollisionAvoided { crossing });
        true
    }
}
