use std::time::Duration;

pub const GRID_ROWS: i32 = 3;
pub const GRID_COLUMNS: i32 = 3;
pub const GRID_SIZE: u8 = (GRID_ROWS * GRID_COLUMNS) as u8;

pub const MAX_FLOORS: u32 = 100;
pub const MAX_TURNS: u32 = 10;
pub const MAX_SKILL_USAGE: u32 = 5;
pub const MAX_CONSECUTIVE_WAITS: u32 = 2;
pub const SKILL_RESET_INTERVAL: u32 = 10;

pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 240.0;
pub const BPM_INCREMENT: f64 = 20.0;
pub const FLOORS_PER_BPM_STEP: u32 = 10;

/// Fraction of the beat interval a selection may miss the beat by and still
/// count as "on beat" for feedback purposes.
pub const TIMING_TOLERANCE: f64 = 0.15;
pub const BEAT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const FIRST_BEAT_GRACE_MULTIPLIER: u32 = 2;

pub const FOG_START_FLOOR: u32 = 21;
pub const DISAPPEAR_START_FLOOR: u32 = 41;
pub const COMBINED_RULES_START_FLOOR: u32 = 61;
pub const DOUBLE_DISAPPEAR_FLOOR: u32 = 70;
pub const MAX_DISAPPEARING_CELLS: usize = 2;

pub const NORMAL_AI_START_FLOOR: u32 = 21;
pub const HARD_AI_START_FLOOR: u32 = 51;
pub const EASY_AI_CHASE_PROBABILITY: f64 = 0.5;

pub const THIEF_UNLOCK_FLOOR: u32 = 10;

pub fn clamp_floor(floor: u32) -> u32 {
    floor.clamp(1, MAX_FLOORS)
}

pub fn bpm_step_count() -> u32 {
    ((MAX_BPM - MIN_BPM) / BPM_INCREMENT) as u32
}

pub fn beat_interval(bpm: f64) -> Duration {
    let bpm = if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        MIN_BPM
    };
    Duration::from_secs_f64(60.0 / bpm)
}
