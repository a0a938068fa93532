//! Music, score submission and the local profile, as seen from the engine.

use std::sync::{Arc, Mutex};

/// Something that plays music at a tempo. The engine keeps its own
/// [`BeatClock`](crate::beat_clock::BeatClock) for turn timing; this is only
/// told when to start, stop and retune.
pub trait AudioClock: Send {
    fn start(&mut self, bpm: f64);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn change_bpm(&mut self, bpm: f64);
}

pub trait ScoreSink: Send {
    fn submit(&mut self, floor: u32);
}

pub trait ProfileStore: Send {
    fn best_floor(&self) -> u32;
    fn record_floor(&mut self, floor: u32);
}

/// The engine's outbound collaborators. Defaults do nothing.
pub struct Collaborators {
    pub audio: Box<dyn AudioClock>,
    pub score_sink: Box<dyn ScoreSink>,
    pub profile: Box<dyn ProfileStore>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            audio: Box::new(SilentAudio),
            score_sink: Box::new(NullScoreSink),
            profile: Box::new(MemoryProfile::default()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAudio;

impl AudioClock for SilentAudio {
    fn start(&mut self, _bpm: f64) {}
    fn stop(&mut self) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn change_bpm(&mut self, _bpm: f64) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullScoreSink;

impl ScoreSink for NullScoreSink {
    fn submit(&mut self, floor: u32) {
        tracing::debug!(floor, "score dropped, no sink configured");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryProfile {
    best_floor: u32,
}

impl MemoryProfile {
    pub fn new(best_floor: u32) -> Self {
        Self { best_floor }
    }
}

impl ProfileStore for MemoryProfile {
    fn best_floor(&self) -> u32 {
        self.best_floor
    }

    fn record_floor(&mut self, floor: u32) {
        self.best_floor = self.best_floor.max(floor);
    }
}

/// Score sink that collects submissions in memory. Clones share the list.
#[derive(Clone, Debug, Default)]
pub struct CollectingScoreSink {
    floors: Arc<Mutex<Vec<u32>>>,
}

impl CollectingScoreSink {
    pub fn floors(&self) -> Vec<u32> {
        self.floors
            .lock()
            .map(|floors| floors.clone())
            .unwrap_or_default()
    }
}

impl ScoreSink for CollectingScoreSink {
    fn submit(&mut self, floor: u32) {
        if let Ok(mut floors) = self.floors.lock() {
            floors.push(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_profile_keeps_the_best_floor() {
        let mut profile = MemoryProfile::new(12);
        profile.record_floor(8);
        assert_eq!(profile.best_floor(), 12);
        profile.record_floor(30);
        assert_eq!(profile.best_floor(), 30);
    }

    #[test]
    fn default_collaborators_are_inert() {
        let mut collaborators = Collaborators::default();
        collaborators.audio.start(60.0);
        collaborators.score_sink.submit(3);
        collaborators.profile.record_floor(3);
        assert_eq!(collaborators.profile.best_floor(), 3);
    }

    #[test]
    fn collecting_sink_shares_submissions() {
        let sink = CollectingScoreSink::default();
        let mut handle = sink.clone();
        handle.submit(4);
        assert_eq!(sink.floors(), vec![4]);
    }
}
