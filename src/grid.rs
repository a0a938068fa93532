//! Adjacency and terminal-condition rules of the 3x3 board.
//!
//! Everything here is a pure function of its arguments. Neighbor lists are
//! always produced in [`Direction::CANONICAL`] order so the pursuit AI's
//! tie-breaks stay deterministic.

use crate::types::{Direction, Position, TurnResult};

pub fn manhattan(a: Position, b: Position) -> i32 {
    (a.row() - b.row()).abs() + (a.col() - b.col()).abs()
}

fn deltas(from: Position, to: Position) -> (i32, i32) {
    ((to.row() - from.row()).abs(), (to.col() - from.col()).abs())
}

pub fn neighbor(pos: Position, dir: Direction) -> Option<Position> {
    offset(pos, dir, 1)
}

fn offset(pos: Position, dir: Direction, steps: i32) -> Option<Position> {
    let (dr, dc) = dir.delta();
    Position::from_row_col(pos.row() + dr * steps, pos.col() + dc * steps)
}

/// One orthogonal step.
pub fn is_valid_move(from: Position, to: Position) -> bool {
    if from == to {
        return false;
    }
    matches!(deltas(from, to), (1, 0) | (0, 1))
}

pub fn is_valid_diagonal_move(from: Position, to: Position) -> bool {
    deltas(from, to) == (1, 1)
}

/// Two cells in a straight line.
pub fn is_valid_dash_move(from: Position, to: Position) -> bool {
    matches!(deltas(from, to), (2, 0) | (0, 2))
}

/// Orthogonal neighbors of `pos` in canonical order.
pub fn available_moves(pos: Position) -> Vec<Position> {
    Direction::CANONICAL
        .iter()
        .filter_map(|dir| neighbor(pos, *dir))
        .collect()
}

pub fn dash_moves(pos: Position) -> Vec<Position> {
    Direction::CANONICAL
        .iter()
        .filter_map(|dir| offset(pos, *dir, 2))
        .collect()
}

pub fn diagonal_moves(pos: Position) -> Vec<Position> {
    [(-1, -1), (-1, 1), (1, -1), (1, 1)]
        .iter()
        .filter_map(|(dr, dc)| Position::from_row_col(pos.row() + dr, pos.col() + dc))
        .collect()
}

pub fn check_game_result(
    player: Position,
    enemy: Position,
    turn_count: u32,
    max_turns: u32,
) -> TurnResult {
    if player == enemy {
        return TurnResult::Lose;
    }
    if turn_count >= max_turns {
        return TurnResult::Win;
    }
    TurnResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(value: u8) -> Position {
        Position::new(value).expect("valid test position")
    }

    fn values(cells: Vec<Position>) -> Vec<u8> {
        cells.into_iter().map(Position::get).collect()
    }

    #[test]
    fn available_moves_size_depends_on_cell_kind() {
        for p in Position::all() {
            let moves = available_moves(p);
            let expected = match p.get() {
                1 | 3 | 7 | 9 => 2,
                5 => 4,
                _ => 3,
            };
            assert_eq!(moves.len(), expected, "cell {p}");
            assert!(moves.iter().all(|m| manhattan(p, *m) == 1));
        }
    }

    #[test]
    fn available_moves_follow_canonical_order() {
        assert_eq!(values(available_moves(pos(5))), vec![2, 8, 4, 6]);
        assert_eq!(values(available_moves(pos(1))), vec![4, 2]);
        assert_eq!(values(available_moves(pos(9))), vec![6, 8]);
    }

    #[test]
    fn staying_put_is_never_a_valid_step() {
        for p in Position::all() {
            assert!(!is_valid_move(p, p));
            assert!(!is_valid_diagonal_move(p, p));
            assert!(!is_valid_dash_move(p, p));
        }
    }

    #[test]
    fn orthogonal_and_diagonal_steps_are_exclusive() {
        for from in Position::all() {
            for to in Position::all() {
                assert!(!(is_valid_move(from, to) && is_valid_diagonal_move(from, to)));
            }
        }
    }

    #[test]
    fn row_wrap_is_not_adjacent() {
        assert!(!is_valid_move(pos(3), pos(4)));
        assert!(!is_valid_move(pos(6), pos(7)));
        assert!(is_valid_move(pos(2), pos(3)));
    }

    #[test]
    fn dash_bounds_are_symmetric() {
        assert_eq!(values(dash_moves(pos(1))), vec![7, 3]);
        assert_eq!(values(dash_moves(pos(9))), vec![3, 7]);
        assert_eq!(values(dash_moves(pos(4))), vec![6]);
        assert_eq!(values(dash_moves(pos(2))), vec![8]);
        assert!(dash_moves(pos(5)).is_empty());
        for from in Position::all() {
            for to in dash_moves(from) {
                assert!(is_valid_dash_move(from, to));
                assert!(is_valid_dash_move(to, from));
            }
        }
        assert!(!is_valid_dash_move(pos(1), pos(9)));
    }

    #[test]
    fn diagonal_moves_stay_on_board() {
        assert_eq!(values(diagonal_moves(pos(5))), vec![1, 3, 7, 9]);
        assert_eq!(values(diagonal_moves(pos(1))), vec![5]);
        assert_eq!(values(diagonal_moves(pos(8))), vec![4, 6]);
    }

    #[test]
    fn game_result_prefers_capture_over_clear() {
        assert_eq!(check_game_result(pos(3), pos(3), 10, 10), TurnResult::Lose);
        assert_eq!(check_game_result(pos(3), pos(4), 10, 10), TurnResult::Win);
        assert_eq!(check_game_result(pos(3), pos(4), 9, 10), TurnResult::Continue);
    }
}
