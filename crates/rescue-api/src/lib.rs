//! In-process session facade: wires a [`RescueAgent`] to a belief store and
//! drives it either tick by tick or through a scripted scenario.

mod persistence;
pub mod scenario;

use std::path::Path;

use contracts::{AgentConfig, InboundMessage, Phase, TickOutput, TrustBelief, SCHEMA_VERSION_V1};
use rescue_core::{MemoryBeliefStore, RescueAgent, Router, WorldView};
use serde::Serialize;
use tracing::info;

pub use persistence::{PersistedBelief, PersistenceError, SqliteBeliefStore};
pub use scenario::{Scenario, ScenarioError, ScenarioWorld, StraightRouter};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionStatus {
    pub schema_version: String,
    pub agent_name: String,
    pub teammate_name: String,
    pub ticks_run: u64,
    pub last_tick: Option<u64>,
    pub phase: Phase,
    pub belief: TrustBelief,
    pub backend: StoreBackend,
    pub last_persistence_error: Option<String>,
}

#[derive(Debug)]
pub struct RescueSession {
    agent: RescueAgent,
    backend: StoreBackend,
    ticks_run: u64,
    last_tick: Option<u64>,
}

impl RescueSession {
    /// Session backed by a process-local store; the belief starts from the
    /// policy's initial value.
    pub fn from_config(config: AgentConfig) -> Self {
        Self {
            agent: RescueAgent::new(config, Box::new(MemoryBeliefStore::new())),
            backend: StoreBackend::Memory,
            ticks_run: 0,
            last_tick: None,
        }
    }

    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Ok(Self::from_config(scenario.agent_config()?))
    }

    /// Switch to a durable store. The agent is rebuilt so the stored belief
    /// for the teammate is loaded, which is only allowed before the first tick.
    pub fn attach_sqlite_store(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), PersistenceError> {
        if let Some(tick) = self.last_tick {
            return Err(PersistenceError::SessionStarted(tick));
        }
        let store = SqliteBeliefStore::open(path.as_ref())?;
        self.agent = RescueAgent::new(self.agent.config().clone(), Box::new(store));
        self.backend = StoreBackend::Sqlite;
        info!(path = %path.as_ref().display(), "sqlite belief store attached");
        Ok(())
    }

    /// One decision cycle against a host-supplied world.
    pub fn step(
        &mut self,
        world: &dyn WorldView,
        router: &mut dyn Router,
        inbox: &[InboundMessage],
    ) -> TickOutput {
        let output = self.agent.decide(world, router, inbox);
        self.ticks_run += 1;
        self.last_tick = Some(output.tick);
        output
    }

    /// Play `scenario` until every drop zone is filled or the tick budget
    /// (`max_ticks`, else the scenario's own) runs out.
    pub fn run_scenario(
        &mut self,
        scenario: &Scenario,
        max_ticks: Option<u64>,
    ) -> Vec<TickOutput> {
        let budget = max_ticks.unwrap_or(scenario.ticks);
        let teammate = self.agent.config().teammate_name.clone();
        let mut world = ScenarioWorld::new(scenario.clone(), teammate);
        let mut router = StraightRouter::default();
        let mut outputs = Vec::new();

        for _ in 0..budget {
            let inbox = world.inbox().to_vec();
            let output = self.step(&world, &mut router, &inbox);
            world.apply(output.action.as_ref());
            outputs.push(output);
            if world.is_complete() {
                info!(tick = world.tick(), score = world.score(), "all victims delivered");
                break;
            }
        }
        outputs
    }

    pub fn status(&self) -> SessionStatus {
        let config = self.agent.config();
        SessionStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            agent_name: config.agent_name.clone(),
            teammate_name: config.teammate_name.clone(),
            ticks_run: self.ticks_run,
            last_tick: self.last_tick,
            phase: self.agent.state().phase,
            belief: self.agent.belief(),
            backend: self.backend,
            last_persistence_error: self.last_persistence_error().map(str::to_string),
        }
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.agent.last_persistence_error()
    }

    pub fn config(&self) -> &AgentConfig {
        self.agent.config()
    }

    /// Expose the underlying agent for direct inspection.
    pub fn agent(&self) -> &RescueAgent {
        &self.agent
    }
}
