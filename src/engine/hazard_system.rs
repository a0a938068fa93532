use super::*;

impl TurnEngine {
    /// Rolls this floor's missing cells, never under the player or the oni.
    pub(super) fn refresh_disappeared_cells(&mut self) {
        self.session.disappeared_cells.clear();
        if !self.session.special_rule.has_disappear() {
            return;
        }
        let count = disappearing_cell_count(self.session.current_floor);
        let player = self.session.player_position;
        let enemy = self.session.enemy_position;
        let mut candidates: Vec<Position> = Position::all()
            .filter(|cell| *cell != player && *cell != enemy)
            .collect();
        for _ in 0..count {
            let Some(cell) = self.rng.take(&mut candidates) else {
                break;
            };
            self.session.disappeared_cells.insert(cell);
        }
    }

    /// Under fog only the player's cell and its eight surrounding cells are
    /// visible. Missing cells always show so they can be avoided.
    pub fn is_cell_visible(&self, cell: Position) -> bool {
        if self.session.disappeared_cells.contains(&cell) {
            return true;
        }
        if !self.session.special_rule.has_fog() {
            return true;
        }
        let player = self.session.player_position;
        (cell.row() - player.row()).abs() <= 1 && (cell.col() - player.col()).abs() <= 1
    }

    pub fn visible_cells(&self) -> Vec<Position> {
        Position::all()
            .filter(|cell| self.is_cell_visible(*cell))
            .collect()
    }
}
