pub mod autopilot;
pub mod beat_clock;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod floor;
pub mod grid;
pub mod profile_store;
pub mod pursuit;
pub mod ranking_store;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
