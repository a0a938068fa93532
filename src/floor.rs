//! Floor progression: tempo, hazards and oni strength as pure functions of the
//! floor number. Floors outside 1..=100 are clamped to the nearest tier.

use crate::constants::{
    bpm_step_count, clamp_floor, BPM_INCREMENT, COMBINED_RULES_START_FLOOR,
    DISAPPEAR_START_FLOOR, DOUBLE_DISAPPEAR_FLOOR, FLOORS_PER_BPM_STEP, FOG_START_FLOOR,
    HARD_AI_START_FLOOR, MAX_DISAPPEARING_CELLS, MIN_BPM, NORMAL_AI_START_FLOOR,
};
use crate::types::{AiLevel, SpecialRule};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorConfig {
    pub bpm: f64,
    pub special_rule: SpecialRule,
    pub ai_level: AiLevel,
    pub disappearing_cells: usize,
}

pub fn floor_config(floor: u32) -> FloorConfig {
    FloorConfig {
        bpm: bpm(floor),
        special_rule: special_rule(floor),
        ai_level: ai_level(floor),
        disappearing_cells: disappearing_cell_count(floor),
    }
}

pub fn bpm(floor: u32) -> f64 {
    let floor = clamp_floor(floor);
    let step = ((floor - 1) / FLOORS_PER_BPM_STEP).min(bpm_step_count());
    MIN_BPM + step as f64 * BPM_INCREMENT
}

pub fn special_rule(floor: u32) -> SpecialRule {
    let floor = clamp_floor(floor);
    if floor < FOG_START_FLOOR {
        SpecialRule::None
    } else if floor < DISAPPEAR_START_FLOOR {
        SpecialRule::Fog
    } else if floor < COMBINED_RULES_START_FLOOR {
        SpecialRule::Disappear
    } else {
        SpecialRule::FogDisappear
    }
}

pub fn ai_level(floor: u32) -> AiLevel {
    let floor = clamp_floor(floor);
    if floor < NORMAL_AI_START_FLOOR {
        AiLevel::Easy
    } else if floor < HARD_AI_START_FLOOR {
        AiLevel::Normal
    } else {
        AiLevel::Hard
    }
}

/// Zero on floors without the disappear rule.
pub fn disappearing_cell_count(floor: u32) -> usize {
    if !special_rule(floor).has_disappear() {
        return 0;
    }
    let count = if clamp_floor(floor) < DOUBLE_DISAPPEAR_FLOOR {
        1
    } else {
        2
    };
    count.min(MAX_DISAPPEARING_CELLS)
}

pub fn enemy_sprite(floor: u32) -> &'static str {
    match clamp_floor(floor) {
        1..=25 => "red_oni",
        26..=50 => "blue_oni",
        51..=75 => "skeleton",
        _ => "dragon",
    }
}

pub fn describe(floor: u32) -> String {
    let mut description = format!("Floor {} - BPM: {}", floor, bpm(floor) as u32);
    match special_rule(floor) {
        SpecialRule::None => {}
        SpecialRule::Fog => description.push_str(" (Fog)"),
        SpecialRule::Disappear => description.push_str(" (Disappear)"),
        SpecialRule::FogDisappear => description.push_str(" (Fog + Disappear)"),
    }
    description
}
