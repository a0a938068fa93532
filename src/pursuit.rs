//! Pursuit AI for the oni.
//!
//! [`next_move`] is a pure function of the two positions and the tier; the
//! only hidden input is the caller's [`Rng`], which the Easy tier uses for its
//! coin flip and random wander.

use crate::constants::EASY_AI_CHASE_PROBABILITY;
use crate::grid::{available_moves, manhattan};
use crate::rng::Rng;
use crate::types::{AiLevel, Position};

pub fn next_move(enemy: Position, player: Position, level: AiLevel, rng: &mut Rng) -> Position {
    let moves = available_moves(enemy);
    match level {
        AiLevel::Easy => easy_move(enemy, player, &moves, rng),
        AiLevel::Normal => move_towards(player, &moves).unwrap_or(enemy),
        AiLevel::Hard => hard_move(enemy, player, &moves),
    }
}

fn easy_move(enemy: Position, player: Position, moves: &[Position], rng: &mut Rng) -> Position {
    if rng.chance(EASY_AI_CHASE_PROBABILITY) {
        if let Some(step) = move_towards(player, moves) {
            return step;
        }
    }
    rng.pick(moves).unwrap_or(enemy)
}

fn hard_move(enemy: Position, player: Position, moves: &[Position]) -> Position {
    let predicted = predict_player_move(player, enemy);
    if let Some(step) = move_towards(predicted, moves) {
        if manhattan(step, predicted) < manhattan(enemy, predicted) {
            return step;
        }
    }
    move_towards(player, moves).unwrap_or(enemy)
}

/// Assumes the player flees: the neighbor of `player` farthest from the
/// oni, first in canonical order on ties.
pub fn predict_player_move(player: Position, enemy: Position) -> Position {
    let mut best = player;
    let mut best_distance = -1;
    for candidate in available_moves(player) {
        let distance = manhattan(candidate, enemy);
        if distance > best_distance {
            best_distance = distance;
            best = candidate;
        }
    }
    best
}

/// Greedy step: the first candidate (in the given order) with the strictly
/// smallest distance to `target`.
pub fn move_towards(target: Position, candidates: &[Position]) -> Option<Position> {
    let mut best = None;
    let mut best_distance = i32::MAX;
    for candidate in candidates {
        let distance = manhattan(*candidate, target);
        if distance < best_distance {
            best_distance = distance;
            best = Some(*candidate);
        }
    }
    best
}
