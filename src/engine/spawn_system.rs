use super::*;

impl TurnEngine {
    /// Drops the player and the oni on two distinct cells that have not
    /// disappeared. Falls back to opposite corners if fewer than two remain.
    pub(super) fn place_actors(&mut self) {
        let mut open: Vec<Position> = Position::all()
            .filter(|cell| !self.session.disappeared_cells.contains(cell))
            .collect();
        if open.len() < 2 {
            self.session.player_position = Position::TOP_LEFT;
            self.session.enemy_position = Position::BOTTOM_RIGHT;
            return;
        }
        let (Some(player), Some(enemy)) = (self.rng.take(&mut open), self.rng.take(&mut open))
        else {
            return;
        };
        self.session.player_position = player;
        self.session.enemy_position = enemy;
    }
}
