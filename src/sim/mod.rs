//! Simulation layer: the token store, the outcome resolver, step
//! execution and the Idle/Running controller. The net topology stays
//! read-only for the whole session; everything mutable lives in
//! [`store::TokenStore`] and is driven through [`controller::StepController`].

pub mod controller;
pub mod engine;
pub mod outcome;
pub mod store;

pub use controller::{
    StepController, DEFAULT_STEP_INTERVAL_MS, MAX_STEP_INTERVAL_MS, MIN_STEP_INTERVAL_MS,
};
pub use engine::{StepReport, describe_distribution, execute_step};
pub use outcome::{Outcome, OutcomeProbability, ProbabilityTable};
pub use store::{LogEntry, LogKind, TokenStore};
