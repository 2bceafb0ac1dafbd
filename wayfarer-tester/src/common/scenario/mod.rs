use anyhow::Result;
use async_trait::async_trait;
use wayfarer_core::NavConfig;

use crate::logic::simulation::{RunSummary, SimulationPlan, run_plan};

pub mod catalog;

use catalog::{CATALOG, find_catalog_scenario};

/// A scenario the tester can run: one simulated world per actor plus the
/// expectations every actor's run must satisfy.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_actor(&self, seed: u64, actor: usize, config: &NavConfig) -> Result<RunSummary>;

    /// First failed expectation, if any.
    fn evaluate(&self, summary: &RunSummary) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct SimulationScenario {
    name: &'static str,
    plan: SimulationPlan,
}

impl SimulationScenario {
    pub fn new(name: &'static str, plan: SimulationPlan) -> Self {
        Self { name, plan }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn plan(&self) -> &SimulationPlan {
        &self.plan
    }
}

#[async_trait]
impl Scenario for SimulationScenario {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run_actor(&self, seed: u64, actor: usize, config: &NavConfig) -> Result<RunSummary> {
        run_plan(&self.plan, seed, actor, config).await
    }

    fn evaluate(&self, summary: &RunSummary) -> Option<String> {
        self.plan
            .expectations
            .iter()
            .find_map(|expectation| expectation(summary).err())
            .map(|err| err.to_string())
    }
}

pub fn get_scenario(name: &str) -> Option<Box<dyn Scenario>> {
    find_catalog_scenario(&name.to_lowercase()).map(|scenario| Box::new(scenario) as _)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG
        .iter()
        .map(|entry| (entry.key, (entry.scenario)().name))
        .collect()
}

/// Every catalog key, in catalog order.
pub fn all_scenario_keys() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|entry| entry.key)
}
