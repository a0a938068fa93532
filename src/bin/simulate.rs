use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use escape_nine::autopilot;
use escape_nine::beat_clock::ManualTime;
use escape_nine::constants::{MAX_CONSECUTIVE_WAITS, MAX_FLOORS};
use escape_nine::engine::{TurnEngine, TurnEngineOptions};
use escape_nine::types::{
    AiLevel, CharacterType, GameStatus, GameSummary, LoseReason, RuntimeEvent, Snapshot,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Upper bound on beats per run: every floor at full length, twice over.
const BEAT_SAFETY_LIMIT: u64 = (MAX_FLOORS as u64) * 10 * 2;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of runs for a custom scenario.
    #[arg(long)]
    runs: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    /// hero, thief, wizard or elf.
    #[arg(long)]
    character: Option<String>,
    /// easy, normal or hard.
    #[arg(long)]
    ai: Option<String>,
    #[arg(long)]
    start_floor: Option<u32>,
    /// Stop a run once this floor is cleared.
    #[arg(long)]
    max_floor: Option<u32>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    character: CharacterType,
    ai: AiLevel,
    seed: u32,
    #[serde(rename = "startFloor")]
    start_floor: Option<u32>,
    #[serde(rename = "maxFloor")]
    max_floor: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    character: CharacterType,
    ai: AiLevel,
    outcome: String,
    #[serde(rename = "floorReached")]
    floor_reached: u32,
    #[serde(rename = "totalTurns")]
    total_turns: u64,
    #[serde(rename = "simulatedMs")]
    simulated_ms: u64,
    #[serde(rename = "floorsCleared")]
    floors_cleared: u32,
    #[serde(rename = "skillUses")]
    skill_uses: u32,
    #[serde(rename = "collisionsAvoided")]
    collisions_avoided: u32,
    #[serde(rename = "skillResets")]
    skill_resets: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    beat: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_beat: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageFloor")]
    average_floor: f64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,simulate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli)?;
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut scenario_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            seed = scenario.seed,
            character = scenario.character.key(),
            ai = ?scenario.ai,
            "scenario started"
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            tracing::warn!(
                match_id = %match_id,
                scenario = %scenario.name,
                beat = anomaly.beat,
                message = %anomaly.message,
                "anomaly detected"
            );
        }
        total_anomalies += scenario_run.anomaly_records.len();
        *outcome_counts
            .entry(scenario_run.result.outcome.clone())
            .or_insert(0) += 1;

        tracing::info!(
            match_id = %match_id,
            scenario = %scenario.name,
            beat = scenario_run.finished_beat,
            outcome = %scenario_run.result.outcome,
            floor = scenario_run.result.floor_reached,
            "scenario finished"
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).context("serialize scenario result")?
        );
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        scenario_results,
        outcome_counts,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary)?;
    }

    tracing::info!(
        match_id = %match_id,
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        average_floor = summary.average_floor,
        summary_out = ?cli.summary_out,
        "run finished"
    );

    if summary.anomaly_count > 0 {
        anyhow::bail!("{} anomalies detected", summary.anomaly_count);
    }
    Ok(())
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let time = ManualTime::new();
    let mut engine = TurnEngine::new(
        scenario.character,
        scenario.seed,
        Arc::new(time.clone()),
        TurnEngineOptions {
            start_floor_override: scenario.start_floor,
            ..TurnEngineOptions::default()
        },
    );
    engine.start_game(scenario.ai);

    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut floors_cleared = 0;
    let mut skill_uses = 0;
    let mut collisions_avoided = 0;
    let mut skill_resets = 0;
    let mut simulated = Duration::ZERO;
    let mut beats = 0u64;
    let mut stopped_at_limit = false;

    while !engine.status().is_terminal() {
        autopilot::act(&mut engine);
        let wait = engine.time_to_next_beat();
        time.advance(wait);
        simulated += wait;
        if engine.poll().is_none() {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                beats,
                "beat did not fire after waiting the full interval".to_string(),
            );
            break;
        }
        beats += 1;

        let snapshot = engine.build_snapshot(true);
        for message in collect_snapshot_anomalies(&snapshot) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                beats,
                message,
            );
        }
        for event in &snapshot.events {
            match event {
                RuntimeEvent::FloorCleared { .. } => floors_cleared += 1,
                RuntimeEvent::SkillUsed { .. } => skill_uses += 1,
                RuntimeEvent::CollisionAvoided { .. } => collisions_avoided += 1,
                RuntimeEvent::SkillReset { .. } => skill_resets += 1,
                _ => {}
            }
        }

        if snapshot.show_floor_clear {
            if snapshot.floor >= scenario.max_floor {
                stopped_at_limit = true;
                break;
            }
            engine.next_floor();
        }

        if beats > BEAT_SAFETY_LIMIT {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                beats,
                "beat safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = engine.build_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            character: scenario.character,
            ai: scenario.ai,
            outcome: outcome_key(&summary, stopped_at_limit),
            floor_reached: summary.floor,
            total_turns: summary.total_turns,
            simulated_ms: simulated.as_millis() as u64,
            floors_cleared,
            skill_uses,
            collisions_avoided,
            skill_resets,
            anomalies,
        },
        anomaly_records,
        finished_beat: beats,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    if snapshot.status == GameStatus::Playing
        && !snapshot.is_invisible
        && snapshot.player_position == snapshot.enemy_position
    {
        anomalies.push(format!(
            "player and oni share cell {} while playing",
            snapshot.player_position
        ));
    }
    if snapshot.status == GameStatus::Playing
        && snapshot.disappeared_cells.contains(&snapshot.player_position)
    {
        anomalies.push(format!(
            "player stands on missing cell {}",
            snapshot.player_position
        ));
    }
    if snapshot.turn_count > snapshot.max_turns {
        anomalies.push(format!(
            "turn count {} exceeds {}",
            snapshot.turn_count, snapshot.max_turns
        ));
    }
    if snapshot.skill_usage_count > snapshot.skill.max_usage {
        anomalies.push(format!(
            "skill used {} times, cap {}",
            snapshot.skill_usage_count, snapshot.skill.max_usage
        ));
    }
    if snapshot.consecutive_waits > MAX_CONSECUTIVE_WAITS {
        anomalies.push(format!("{} consecutive waits", snapshot.consecutive_waits));
    }
    if !snapshot.bpm.is_finite() || snapshot.bpm <= 0.0 {
        anomalies.push(format!("invalid bpm: {}", snapshot.bpm));
    }
    anomalies
}

fn outcome_key(summary: &GameSummary, stopped_at_limit: bool) -> String {
    if stopped_at_limit {
        return "floor_limit".to_string();
    }
    match (summary.status, summary.reason) {
        (GameStatus::Win, _) => "win",
        (GameStatus::Lose, Some(LoseReason::NoMove)) => "lose_no_move",
        (GameStatus::Lose, Some(LoseReason::InvalidMove)) => "lose_invalid_move",
        (GameStatus::Lose, Some(LoseReason::FellIntoVoid)) => "lose_fell_into_void",
        (GameStatus::Lose, _) => "lose_caught",
        _ => "unfinished",
    }
    .to_string()
}

fn resolve_scenarios(cli: &Cli) -> anyhow::Result<Vec<Scenario>> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    let character = match cli.character.as_deref() {
        None => None,
        Some(raw) => Some(
            CharacterType::parse(&raw.trim().to_ascii_lowercase())
                .with_context(|| format!("unknown character {raw:?}"))?,
        ),
    };
    let ai = match cli.ai.as_deref() {
        None => None,
        Some(raw) => Some(
            AiLevel::parse(&raw.trim().to_ascii_lowercase())
                .with_context(|| format!("unknown ai level {raw:?}"))?,
        ),
    };
    let max_floor = cli.max_floor.unwrap_or(MAX_FLOORS).clamp(1, MAX_FLOORS);

    if cli.runs.is_some() || character.is_some() || ai.is_some() {
        let runs = cli.runs.unwrap_or(1).clamp(1, 1_000);
        let character = character.unwrap_or(CharacterType::Hero);
        let ai = ai.unwrap_or(AiLevel::Normal);
        return Ok((0..runs)
            .map(|idx| Scenario {
                name: format!("custom-{}-{}", character.key(), idx + 1),
                character,
                ai,
                seed: seed.wrapping_add(idx),
                start_floor: cli.start_floor,
                max_floor,
            })
            .collect());
    }

    Ok(CharacterType::ALL
        .iter()
        .zip([AiLevel::Easy, AiLevel::Normal, AiLevel::Normal, AiLevel::Hard])
        .enumerate()
        .map(|(idx, (character, ai))| Scenario {
            name: format!("tour-{}", character.key()),
            character: *character,
            ai,
            seed: seed.wrapping_add(idx as u32),
            start_floor: cli.start_floor,
            max_floor,
        })
        .collect())
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    beat: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        beat,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_floor = if scenario_count == 0 {
        0.0
    } else {
        let total: u64 = scenarios
            .iter()
            .map(|scenario| u64::from(scenario.floor_reached))
            .sum();
        total as f64 / scenario_count as f64
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_floor,
        outcome_counts,
        scenarios,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let summary_text =
        serde_json::to_string_pretty(summary).context("serialize run summary")?;
    std::fs::write(path, summary_text)
        .with_context(|| format!("write summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(character: CharacterType, ai: AiLevel, seed: u32) -> Scenario {
        Scenario {
            name: "test".to_string(),
            character,
            ai,
            seed,
            start_floor: None,
            max_floor: MAX_FLOORS,
        }
    }

    fn make_scenario_result(outcome: &str, floor_reached: u32) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            character: CharacterType::Hero,
            ai: AiLevel::Normal,
            outcome: outcome.to_string(),
            floor_reached,
            total_turns: 0,
            simulated_ms: 0,
            floors_cleared: 0,
            skill_uses: 0,
            collisions_avoided: 0,
            skill_resets: 0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_floor() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result("lose_caught", 12),
                make_scenario_result("win", 100),
            ],
            BTreeMap::from([("lose_caught".to_string(), 1usize), ("win".to_string(), 1usize)]),
            0,
        );
        assert_eq!(summary.average_floor, 56.0);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("missing").join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result("win", 100)],
            BTreeMap::new(),
            0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn same_seed_replays_identically() {
        let first = run_scenario(&scenario(CharacterType::Thief, AiLevel::Easy, 77));
        let second = run_scenario(&scenario(CharacterType::Thief, AiLevel::Easy, 77));
        assert_eq!(
            serde_json::to_value(&first.result).expect("serialize"),
            serde_json::to_value(&second.result).expect("serialize")
        );
        assert_eq!(first.finished_beat, second.finished_beat);
        assert!(first.finished_beat > 0);
    }

    #[test]
    fn runs_stop_at_the_floor_limit() {
        let mut limited = scenario(CharacterType::Hero, AiLevel::Easy, 5);
        limited.max_floor = 1;
        let run = run_scenario(&limited);
        assert!(matches!(
            run.result.outcome.as_str(),
            "floor_limit" | "lose_caught"
        ));
        assert!(run.result.floor_reached <= 1);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
    }

    #[test]
    fn unknown_character_flag_is_rejected() {
        let cli = Cli::parse_from(["simulate", "--character", "ninja"]);
        assert!(resolve_scenarios(&cli).is_err());
    }

    #[test]
    fn default_tour_covers_every_character() {
        let cli = Cli::parse_from(["simulate", "--seed", "9"]);
        let scenarios = resolve_scenarios(&cli).expect("scenarios");
        assert_eq!(scenarios.len(), CharacterType::ALL.len());
        assert_eq!(scenarios[0].seed, 9);
        assert_eq!(scenarios[3].character, CharacterType::Elf);
    }

    #[test]
    fn outcome_key_names_the_loss() {
        let summary = GameSummary {
            status: GameStatus::Lose,
            floor: 3,
            character: CharacterType::Hero,
            ai_level: AiLevel::Easy,
            total_turns: 25,
            reason: Some(LoseReason::FellIntoVoid),
            best_floor: 3,
        };
        assert_eq!(outcome_key(&summary, false), "lose_fell_into_void");
        assert_eq!(outcome_key(&summary, true), "floor_limit");
    }
}
