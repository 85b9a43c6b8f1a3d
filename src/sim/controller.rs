//! Step controller: the Idle/Running state machine driving the engine,
//! either one step at a time or from a periodic timer tick. The timer
//! itself lives with whoever owns the controller; `tick` is the only
//! entry point it may call, and leaving Running must cancel it.
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::net::core::Net;
use crate::net::ids::{PlaceId, PlaceRef, TransitionId};
use crate::net::io::{ConfigError, NetConfig, PlaceSchema};
use crate::net::structure::{Actor, Distribution, Token};
use crate::sim::engine::{self, StepReport, execute_step};
use crate::sim::outcome::{OutcomeProbability, ProbabilityTable};
use crate::sim::store::{LogEntry, LogKind, TokenStore};

pub const MIN_STEP_INTERVAL_MS: u64 = 100;
pub const MAX_STEP_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_STEP_INTERVAL_MS: u64 = 1000;

/// Owns the topology, token store, probability table and RNG of one
/// simulation session. All mutation funnels through its methods; steps
/// are discrete and run to completion, so no locking happens here.
pub struct StepController {
    net: Net,
    store: TokenStore,
    probabilities: ProbabilityTable,
    rng: StdRng,
    running: bool,
    step_interval: Duration,
}

impl StepController {
    pub fn new(net: Net) -> Self {
        Self::with_rng(net, StdRng::from_os_rng())
    }

    /// Seeded construction for reproducible runs.
    pub fn with_seed(net: Net, seed: u64) -> Self {
        Self::with_rng(net, StdRng::seed_from_u64(seed))
    }

    fn with_rng(net: Net, rng: StdRng) -> Self {
        Self {
            net,
            store: TokenStore::new(),
            probabilities: ProbabilityTable::new(),
            rng,
            running: false,
            step_interval: Duration::from_millis(DEFAULT_STEP_INTERVAL_MS),
        }
    }

    /// Build a session straight from an imported configuration,
    /// including its per-place probability overrides.
    pub fn from_config(config: &NetConfig, schema: &PlaceSchema) -> Result<Self, ConfigError> {
        Self::from_config_with_seed(config, schema, None)
    }

    /// [`Self::from_config`] with an optional fixed seed.
    pub fn from_config_with_seed(
        config: &NetConfig,
        schema: &PlaceSchema,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let net = config.build_net(schema)?;
        let mut controller = match seed {
            Some(seed) => Self::with_seed(net, seed),
            None => Self::new(net),
        };
        if let Some(simulation) = &config.simulation {
            controller.probabilities = ProbabilityTable::from_simulation_config(simulation);
        }
        Ok(controller)
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn distribution(&self) -> &Distribution {
        self.store.distribution()
    }

    pub fn probabilities(&self) -> &ProbabilityTable {
        &self.probabilities
    }

    pub fn set_probability(&mut self, place: PlaceId, probability: OutcomeProbability) {
        self.probabilities.set(place, probability);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    /// Clamp into the supported auto-run range rather than reject.
    pub fn set_step_interval(&mut self, millis: u64) {
        let clamped = millis.clamp(MIN_STEP_INTERVAL_MS, MAX_STEP_INTERVAL_MS);
        self.step_interval = Duration::from_millis(clamped);
    }

    pub fn set_log_capacity(&mut self, capacity: Option<usize>) {
        self.store.set_log_capacity(capacity);
    }

    /// Ids of currently enabled transitions, in selection order.
    pub fn enabled(&self) -> Vec<TransitionId> {
        self.net
            .enabled_transitions(self.store.distribution(), self.store.last_fired())
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    /// Idle -> Running, only when at least one transition is enabled.
    pub fn start(&mut self) -> bool {
        if self.running {
            return true;
        }
        if self.enabled().is_empty() {
            return false;
        }
        self.running = true;
        self.store
            .append_log(LogEntry::new(LogKind::TokenInject, "Simulation started"));
        true
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.store
                .append_log(LogEntry::new(LogKind::TokenInject, "Simulation stopped"));
        }
    }

    /// Force Idle and clear all session state.
    pub fn reset(&mut self) {
        self.running = false;
        self.store.reset();
    }

    /// One step, firing the best enabled transition; valid in any state.
    pub fn manual_step(&mut self) -> Option<StepReport> {
        execute_step(
            &self.net,
            &mut self.store,
            &self.probabilities,
            &mut self.rng,
            None,
        )
    }

    /// Fire exactly `transition`, subject to the enablement rule.
    pub fn fire_specific(&mut self, transition: &TransitionId) -> Option<StepReport> {
        execute_step(
            &self.net,
            &mut self.store,
            &self.probabilities,
            &mut self.rng,
            Some(transition),
        )
    }

    /// Timer callback while Running. When a tick makes no progress the
    /// controller leaves Running on its own and the timer must be torn
    /// down.
    pub fn tick(&mut self) -> Option<StepReport> {
        if !self.running {
            return None;
        }
        let report = self.manual_step();
        if report.is_none() {
            self.running = false;
            self.store.append_log(LogEntry::new(
                LogKind::TokenInject,
                "Auto-run stopped: no enabled transitions",
            ));
        }
        report
    }

    /// Step until quiescence or the bound, whichever comes first.
    /// Returns the number of fired steps.
    pub fn run_to_quiescence(&mut self, max_steps: u64) -> u64 {
        let mut fired = 0;
        while fired < max_steps && self.manual_step().is_some() {
            fired += 1;
        }
        fired
    }

    /// Inject a fresh engine-generated token carrying `actors`; returns
    /// its id.
    pub fn inject_token(&mut self, place: PlaceRef, actors: Vec<Actor>) -> String {
        let id = self.store.next_token_id();
        self.inject_existing(place, Token::with_actors(id.clone(), actors));
        id
    }

    /// Inject a caller-supplied token value.
    pub fn inject_existing(&mut self, place: PlaceRef, token: Token) {
        let base = place.base().clone();
        self.store.inject(place, token);
        engine::warn_if_over_capacity(&self.net, &self.store, &base);
    }

    pub fn remove_newest(&mut self, place: &PlaceRef) -> Option<Token> {
        self.store.remove_newest(place)
    }
}
