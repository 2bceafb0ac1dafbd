use colored::Colorize;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use wayfarer_core::{NavConfig, NavStats};

use super::simulation::RunSummary;
use crate::common::scenario::Scenario;
use crate::common::util::{artifacts_dir, write_failure_artifacts};

/// Seed distance between concurrent actors of one iteration.
const ACTOR_SEED_STRIDE: u64 = 1_000_003;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
    /// Navigation counters summed over every actor and iteration.
    pub stats: NavStats,
}

type ActorOutcome = (usize, Result<RunSummary, String>);

pub struct NavTester {
    config: NavConfig,
    actors: usize,
    verbose: bool,
    artifacts: Option<PathBuf>,
}

impl NavTester {
    pub fn new(config: NavConfig, actors: usize, verbose: bool) -> Self {
        Self {
            config,
            actors: actors.max(1),
            verbose,
            artifacts: None,
        }
    }

    /// Write a summary of every failed actor run under `dir`.
    #[must_use]
    pub fn with_artifacts(mut self, dir: Option<PathBuf>) -> Self {
        self.artifacts = dir;
        self
    }

    pub async fn run_scenario(
        &self,
        scenario: Arc<dyn Scenario>,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (actors: {} seed: {})",
                    scenario.name().bright_white(),
                    self.actors,
                    seed
                );
            }

            let result = self.run_single_scenario(&scenario, seed, iterations).await;
            results.push(result);
        }

        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &Arc<dyn Scenario>,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut stats = NavStats::default();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let outcomes = self.run_iteration(scenario, iteration_seed).await;

            let mut iteration_failures = Vec::new();
            for (actor, outcome) in &outcomes {
                match outcome {
                    Ok(summary) => {
                        stats.merge(&summary.stats);
                        if let Some(err) = scenario.evaluate(summary) {
                            let line = describe_failure(i, summary, &err);
                            self.save_artifacts(scenario.name(), summary, &line);
                            iteration_failures.push(line);
                        }
                    }
                    Err(err) => iteration_failures.push(format!(
                        "Iteration {} (actor-{actor}, seed {iteration_seed}): {err}",
                        i + 1
                    )),
                }
            }

            if iteration_failures.is_empty() {
                successes += 1;
                let duration = start_time.elapsed();
                performance_data.push(duration);

                if self.verbose {
                    let ticks: u64 = outcomes
                        .iter()
                        .filter_map(|(_, o)| o.as_ref().ok())
                        .map(|s| s.stats.ticks)
                        .sum();
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) ticks:{ticks}",
                        i + 1,
                        iterations
                    );
                }
            } else {
                if self.verbose {
                    for failure in &iteration_failures {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            failure.clone().red()
                        );
                    }
                }
                failures.extend(iteration_failures);
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
            stats,
        }
    }

    /// Run every actor of one iteration concurrently, each in its own world.
    async fn run_iteration(&self, scenario: &Arc<dyn Scenario>, seed: u64) -> Vec<ActorOutcome> {
        let mut set = JoinSet::new();
        for actor in 0..self.actors {
            let scenario = Arc::clone(scenario);
            let config = self.config.clone();
            let actor_seed = seed.wrapping_add(
                u64::try_from(actor)
                    .unwrap_or(u64::MAX)
                    .wrapping_mul(ACTOR_SEED_STRIDE),
            );
            set.spawn(async move {
                let outcome = scenario
                    .run_actor(actor_seed, actor, &config)
                    .await
                    .map_err(|err| format!("{err:#}"));
                (actor, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(self.actors);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => outcomes.push((usize::MAX, Err(format!("actor task failed: {err}")))),
            }
        }
        outcomes.sort_by_key(|(actor, _)| *actor);
        outcomes
    }

    fn save_artifacts(&self, scenario: &str, summary: &RunSummary, failure: &str) {
        let Some(base) = &self.artifacts else {
            return;
        };
        let dir = artifacts_dir(base, scenario, summary.seed, &summary.actor);
        let payload = serde_json::to_value(summary).unwrap_or_default();
        if let Err(err) = write_failure_artifacts(&dir, &payload, failure) {
            warn!(
                target: "wayfarer::tester",
                "could not save artifacts to {}: {err:#}",
                dir.display()
            );
        } else if self.verbose {
            println!("  📁 Artifacts saved to {}", dir.display());
        }
    }
}

fn describe_failure(iteration: usize, summary: &RunSummary, err: &str) -> String {
    format!(
        "Iteration {} ({}, seed {}, ticks {}, outcome '{}'): {} | at {} in {} | nudges {} path errors {} detours {}",
        iteration + 1,
        summary.actor,
        summary.seed,
        summary.stats.ticks,
        summary.outcome_label(),
        err,
        summary.final_state.position,
        summary.final_area,
        summary.log.nudges,
        summary.stats.path_errors,
        summary.stats.detours
    )
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scenario::get_scenario;
    use wayfarer_core::Timings;

    fn tester(actors: usize) -> NavTester {
        let config = NavConfig {
            timings: Timings::instant(),
            ..NavConfig::default()
        };
        NavTester::new(config, actors, false)
    }

    fn scenario(key: &str) -> Arc<dyn Scenario> {
        Arc::from(get_scenario(key).unwrap())
    }

    #[tokio::test]
    async fn passing_scenario_reports_every_iteration() {
        let results = tester(1)
            .run_scenario(scenario("open-field"), &[1, 2], 2)
            .await;
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.passed, "{:?}", result.failures);
            assert_eq!(result.successful_iterations, 2);
            assert_eq!(result.performance_data.len(), 2);
            assert!(result.stats.ticks > 0);
        }
    }

    #[tokio::test]
    async fn concurrent_actors_each_get_a_world() {
        let results = tester(4).run_scenario(scenario("maze"), &[9], 1).await;
        assert!(results[0].passed, "{:?}", results[0].failures);
        assert!(results[0].stats.ticks >= 4);
    }

    #[tokio::test]
    async fn zero_actors_still_runs_one() {
        let results = tester(0).run_scenario(scenario("sealed-vault"), &[3], 1).await;
        assert!(results[0].passed, "{:?}", results[0].failures);
        assert_eq!(results[0].successful_iterations, 1);
    }

    #[tokio::test]
    async fn failed_runs_leave_artifacts() {
        let base = std::env::temp_dir().join(format!(
            "wayfarer-tester-artifacts-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let config = NavConfig {
            timings: Timings::instant(),
            chicken_percent: 0,
            ..NavConfig::default()
        };
        let tester = NavTester::new(config, 1, false).with_artifacts(Some(base.clone()));
        let results = tester.run_scenario(scenario("ambush"), &[5], 1).await;
        assert!(!results[0].passed);
        let seed_dir = base.join("ambush-chicken").join("seed-5").join("actor-0");
        let saved = std::fs::read_dir(seed_dir).unwrap().count();
        assert_eq!(saved, 1);
    }

    #[test]
    fn durations_serialise_as_millis() {
        let result = ScenarioResult {
            scenario_name: "Open Field Walk".to_string(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
            stats: NavStats::default(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        assert_eq!(json["performance_data"][0], 12);
        let back: ScenarioResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.average_duration, Duration::from_millis(12));
    }

    #[test]
    fn failure_lines_carry_context() {
        let summary = RunSummary {
            actor: "actor-2".to_string(),
            seed: 44,
            error: Some("actor died".to_string()),
            error_kind: None,
            final_area: wayfarer_core::AreaId(1),
            final_state: wayfarer_core::ActorState::default(),
            goal_distance: None,
            stats: NavStats::default(),
            log: crate::sim::SimLog::default(),
            remaining: Vec::new(),
        };
        let line = describe_failure(0, &summary, "boom");
        assert!(line.starts_with("Iteration 1 (actor-2, seed 44"));
        assert!(line.contains("outcome 'actor died'"));
        assert!(line.contains("boom"));
    }
}
