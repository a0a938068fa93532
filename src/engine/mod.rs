use std::sync::Arc;
use std::time::Duration;

use crate::beat_clock::{BeatClock, BeatId, TimeSource};
use crate::collaborators::{AudioClock, Collaborators, ProfileStore, ScoreSink};
use crate::constants::{clamp_floor, MAX_CONSECUTIVE_WAITS, MAX_FLOORS, MAX_TURNS, SKILL_RESET_INTERVAL};
use crate::floor::{self, disappearing_cell_count, floor_config};
use crate::grid::{check_game_result, is_valid_dash_move, is_valid_diagonal_move, is_valid_move};
use crate::pursuit;
use crate::rng::Rng;
use crate::types::{
    AiLevel, CharacterType, GameStatus, GameSummary, LoseReason, Position, RuntimeEvent, Skill,
    SkillType, Snapshot, TurnResult,
};

mod hazard_system;
mod session;
mod skill_system;
mod spawn_system;

pub use self::session::GameSession;
use self::skill_system::MoveKind;

#[derive(Clone, Debug, Default)]
pub struct TurnEngineOptions {
    pub start_floor_override: Option<u32>,
    pub ai_level_override: Option<AiLevel>,
    pub max_turns_override: Option<u32>,
}

/// Turn engine for one player.
///
/// Beats come from the internal [`BeatClock`], sampled through [`poll`]; each
/// beat resolves the pending player move and the oni's reply simultaneously.
/// All mutation goes through `&mut self`, so a caller that owns the engine on
/// one task never interleaves a tick with input.
///
/// [`poll`]: TurnEngine::poll
pub struct TurnEngine {
    character: CharacterType,
    skill: Skill,
    options: TurnEngineOptions,
    session: GameSession,
    clock: BeatClock,
    time: Arc<dyn TimeSource>,
    rng: Rng,
    audio: Box<dyn AudioClock>,
    score_sink: Box<dyn ScoreSink>,
    profile: Box<dyn ProfileStore>,
    events: Vec<RuntimeEvent>,
    last_processed_beat: Option<BeatId>,
    last_selection_on_beat: Option<bool>,
}

impl TurnEngine {
    pub fn new(
        character: CharacterType,
        seed: u32,
        time: Arc<dyn TimeSource>,
        options: TurnEngineOptions,
    ) -> Self {
        let max_turns = options.max_turns_override.unwrap_or(MAX_TURNS).max(1);
        let collaborators = Collaborators::default();
        Self {
            character,
            skill: character.skill(),
            options,
            session: GameSession::new(max_turns),
            clock: BeatClock::new(),
            time,
            rng: Rng::new(seed),
            audio: collaborators.audio,
            score_sink: collaborators.score_sink,
            profile: collaborators.profile,
            events: Vec::new(),
            last_processed_beat: None,
            last_selection_on_beat: None,
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.audio = collaborators.audio;
        self.score_sink = collaborators.score_sink;
        self.profile = collaborators.profile;
        self
    }

    pub fn start_game(&mut self, ai_choice: AiLevel) {
        let now = self.time.now();
        self.clock.stop();
        self.events.clear();
        self.last_processed_beat = None;
        self.last_selection_on_beat = None;

        let max_turns = self.session.max_turns;
        self.session = GameSession::new(max_turns);
        self.session.current_floor = clamp_floor(self.options.start_floor_override.unwrap_or(1));
        self.session.status = GameStatus::Playing;
        self.session.ai_choice = ai_choice;

        self.place_actors();
        // Primed wait so the first beat cannot end the run before any input.
        self.session.pending_move = Some(self.session.player_position);

        let config = floor_config(self.session.current_floor);
        self.session.special_rule = config.special_rule;
        self.refresh_disappeared_cells();

        self.clock.load(config.bpm);
        self.clock.play(now);
        self.audio.start(config.bpm);
        self.events.push(RuntimeEvent::FloorStarted {
            floor: self.session.current_floor,
            bpm: config.bpm,
            special_rule: config.special_rule,
        });
        tracing::info!(
            character = self.character.key(),
            floor = self.session.current_floor,
            bpm = config.bpm,
            ai = ?self.effective_ai_level(),
            "game started"
        );
    }

    /// Cells the player may pick for the next beat, in board order.
    pub fn available_moves(&self) -> Vec<Position> {
        let from = self.session.player_position;
        Position::all()
            .filter(|cell| !self.session.disappeared_cells.contains(cell))
            .filter(|cell| self.classify_move(from, *cell).is_some())
            .collect()
    }

    /// Sets the move applied on the next beat. Anything outside
    /// [`available_moves`](Self::available_moves) is ignored.
    pub fn select_move(&mut self, target: Position) -> bool {
        if !self.session.accepts_input() {
            return false;
        }
        if !self.available_moves().contains(&target) {
            return false;
        }
        self.session.pending_move = Some(target);
        self.last_selection_on_beat = Some(self.check_move_timing());
        true
    }

    /// Samples the time source and resolves at most one beat.
    pub fn poll(&mut self) -> Option<BeatId> {
        let now = self.time.now();
        let beat = self.clock.poll(now)?;
        self.on_tick(beat).then_some(beat)
    }

    /// Resolves one beat. Returns false when the beat was dropped: engine not
    /// playing, beat from an earlier epoch, or already processed.
    pub fn on_tick(&mut self, beat: BeatId) -> bool {
        if !self.session.accepts_input() {
            return false;
        }
        if beat.epoch != self.clock.epoch() {
            tracing::debug!(?beat, epoch = self.clock.epoch(), "stale beat dropped");
            return false;
        }
        if self.last_processed_beat.is_some_and(|last| beat <= last) {
            return false;
        }
        self.last_processed_beat = Some(beat);
        self.session.is_invisible = false;
        self.session.show_skill_reset = false;

        let Some(target) = self.session.pending_move else {
            self.end_game(GameStatus::Lose, Some(LoseReason::NoMove));
            return true;
        };

        let previous_player = self.session.player_position;
        let previous_enemy = self.session.enemy_position;
        let Some(kind) = self.classify_move(previous_player, target) else {
            self.end_game(GameStatus::Lose, Some(LoseReason::InvalidMove));
            return true;
        };
        if matches!(kind, MoveKind::Dash | MoveKind::Diagonal) {
            self.consume_skill_charge();
        }
        self.session.is_skill_active = false;

        if self.session.disappeared_cells.contains(&target) {
            self.end_game(GameStatus::Lose, Some(LoseReason::FellIntoVoid));
            return true;
        }

        // The oni chases where the player was, not where they are going.
        let next_enemy = if self.session.enemy_stopped {
            self.session.enemy_stopped = false;
            previous_enemy
        } else {
            let level = self.effective_ai_level();
            pursuit::next_move(previous_enemy, previous_player, level, &mut self.rng)
        };

        if kind == MoveKind::Wait {
            self.session.consecutive_waits += 1;
        } else {
            self.session.consecutive_waits = 0;
        }

        self.session.player_position = target;
        self.session.enemy_position = next_enemy;
        self.session.pending_move = None;

        let crossing = previous_player == next_enemy && previous_enemy == target;
        let same_cell = check_game_result(
            target,
            next_enemy,
            self.session.turn_count,
            self.session.max_turns,
        ) == TurnResult::Lose;
        if (same_cell || crossing) && !self.try_absorb_collision(crossing) {
            self.end_game(GameStatus::Lose, Some(LoseReason::Caught));
            return true;
        }

        self.session.turn_count += 1;
        self.session.total_turns += 1;
        self.events.push(RuntimeEvent::TurnResolved {
            turn: self.session.turn_count,
            player: target,
            enemy: next_enemy,
        });
        tracing::debug!(
            floor = self.session.current_floor,
            turn = self.session.turn_count,
            beat = beat.beat,
            player = %target,
            enemy = %next_enemy,
            "turn resolved"
        );

        if check_game_result(
            target,
            next_enemy,
            self.session.turn_count,
            self.session.max_turns,
        ) == TurnResult::Win
        {
            self.signal_floor_clear();
        }
        true
    }

    fn signal_floor_clear(&mut self) {
        self.session.show_floor_clear = true;
        self.clock.pause();
        self.audio.pause();
        self.events.push(RuntimeEvent::FloorCleared {
            floor: self.session.current_floor,
        });
        tracing::info!(floor = self.session.current_floor, "floor cleared");
    }

    /// Leaves a cleared floor. Ignored unless a floor clear is pending.
    pub fn next_floor(&mut self) -> bool {
        if self.session.status != GameStatus::Playing || !self.session.show_floor_clear {
            return false;
        }
        self.session.show_floor_clear = false;
        self.session.current_floor += 1;
        self.session.turn_count = 0;

        if self.session.current_floor > MAX_FLOORS {
            self.end_game(GameStatus::Win, None);
            return true;
        }

        if self.session.current_floor % SKILL_RESET_INTERVAL == 1 {
            self.session.skill_usage_count = 0;
            self.session.show_skill_reset = true;
            self.events.push(RuntimeEvent::SkillReset {
                floor: self.session.current_floor,
            });
        }

        self.session.pending_move = None;
        self.session.clear_transient_flags();
        self.session.consecutive_waits = 0;

        let config = floor_config(self.session.current_floor);
        self.session.special_rule = config.special_rule;
        self.refresh_disappeared_cells();
        self.place_actors();
        self.session.pending_move = Some(self.session.player_position);

        let now = self.time.now();
        self.clock.change_bpm(config.bpm, now);
        self.audio.change_bpm(config.bpm);
        self.events.push(RuntimeEvent::FloorStarted {
            floor: self.session.current_floor,
            bpm: config.bpm,
            special_rule: config.special_rule,
        });
        tracing::info!(
            floor = self.session.current_floor,
            ai = ?self.effective_ai_level(),
            "{}",
            floor::describe(self.session.current_floor)
        );
        true
    }

    pub fn pause_game(&mut self) {
        if self.session.status != GameStatus::Playing {
            return;
        }
        self.session.status = GameStatus::Paused;
        self.clock.pause();
        self.audio.pause();
    }

    pub fn resume_game(&mut self) {
        if self.session.status != GameStatus::Paused {
            return;
        }
        self.session.status = GameStatus::Playing;
        // A cleared floor stays parked until next_floor.
        if !self.session.show_floor_clear {
            self.clock.resume(self.time.now());
            self.audio.resume();
        }
    }

    pub fn reset_game(&mut self) {
        self.clock.stop();
        self.audio.stop();
        self.session = GameSession::new(self.session.max_turns);
        self.events.clear();
        self.last_processed_beat = None;
        self.last_selection_on_beat = None;
    }

    fn end_game(&mut self, status: GameStatus, reason: Option<LoseReason>) {
        if self.session.status.is_terminal() {
            return;
        }
        self.session.status = status;
        self.session.lose_reason = reason;
        self.session.pending_move = None;
        self.clock.stop();
        self.audio.stop();

        let floor = self.session.current_floor.min(MAX_FLOORS);
        self.events.push(RuntimeEvent::GameOver {
            status,
            floor,
            reason,
        });
        tracing::info!(?status, ?reason, floor, "game over");
        self.score_sink.submit(floor);
        self.profile.record_floor(floor);
    }

    /// The stronger of the chosen tier and the floor's tier, unless overridden.
    pub fn effective_ai_level(&self) -> AiLevel {
        self.options.ai_level_override.unwrap_or_else(|| {
            self.session
                .ai_choice
                .max(floor::ai_level(self.session.current_floor))
        })
    }

    /// UI feedback: was the player close to a beat boundary just now.
    pub fn check_move_timing(&self) -> bool {
        self.clock.is_within_tolerance(self.time.now())
    }

    pub fn time_until_next_beat(&self) -> f64 {
        self.clock.time_until_next_beat(self.time.now())
    }

    pub fn time_to_next_beat(&self) -> Duration {
        self.clock.time_to_next_beat(self.time.now())
    }

    pub fn current_beat(&self) -> u64 {
        self.clock.current_beat()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn status(&self) -> GameStatus {
        self.session.status
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn character(&self) -> CharacterType {
        self.character
    }

    pub fn skill(&self) -> Skill {
        self.skill
    }

    pub fn best_floor(&self) -> u32 {
        self.profile.best_floor()
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let floor = self.session.current_floor;
        Snapshot {
            floor,
            turn_count: self.session.turn_count,
            max_turns: self.session.max_turns,
            player_position: self.session.player_position,
            enemy_position: self.session.enemy_position,
            status: self.session.status,
            character: self.character,
            skill: self.skill,
            skill_usage_count: self.session.skill_usage_count,
            remaining_skill_uses: self.remaining_skill_uses(),
            pending_move: self.session.pending_move,
            available_moves: if self.session.accepts_input() {
                self.available_moves()
            } else {
                Vec::new()
            },
            special_rule: self.session.special_rule,
            disappeared_cells: self.session.disappeared_cells.iter().copied().collect(),
            visible_cells: self.visible_cells(),
            bpm: self.clock.bpm(),
            ai_level: self.effective_ai_level(),
            enemy_sprite: floor::enemy_sprite(floor),
            current_beat: self.clock.current_beat(),
            is_playing: self.clock.is_playing(),
            time_until_next_beat: self.time_until_next_beat(),
            is_skill_active: self.session.is_skill_active,
            is_invisible: self.session.is_invisible,
            enemy_stopped: self.session.enemy_stopped,
            consecutive_waits: self.session.consecutive_waits,
            show_floor_clear: self.session.show_floor_clear,
            show_skill_reset: self.session.show_skill_reset,
            last_selection_on_beat: self.last_selection_on_beat,
            best_floor: self.profile.best_floor(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            status: self.session.status,
            floor: self.session.current_floor.min(MAX_FLOORS),
            character: self.character,
            ai_level: self.effective_ai_level(),
            total_turns: self.session.total_turns,
            reason: self.session.lose_reason,
            best_floor: self.profile.best_floor(),
        }
    }
}
