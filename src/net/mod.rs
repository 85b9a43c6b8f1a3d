//! # Behavior-net core (place/transition net with token payloads)
//!
//! Let `P` be the set of places and `T` the set of transitions. Each
//! transition `t ∈ T` carries an ordered input list `in(t)` of place or
//! subplace references and an ordered output list `out(t)` of
//! `(place, filter)` pairs. A distribution `D` maps each reference to a
//! FIFO token queue. Then:
//!
//! * `t` is **enabled** under `D` iff `in(t) ≠ ∅` and every `r ∈ in(t)`
//!   has a non-empty queue `D[r]`;
//! * among enabled transitions, selection is the strict total order
//!   (priority desc, last-fired sequence asc, declaration order);
//! * **firing** consumes the head of every `D[r]`, merges the consumed
//!   tokens' actor lists in input order, then for each output narrows the
//!   merged token by the actor-type filter (an empty result skips the
//!   output) and either appends it directly or, for action places, hands
//!   it to outcome resolution.
//!
//! The core API provides:
//! * enabled-set computation and single-transition firing as a pure
//!   `Distribution -> FirePlan` computation;
//! * static connectivity diagnostics;
//! * JSON/RON configuration import with one-time parameter validation.
//!
//! ## Example
//!
//! ```rust
//! use bnet_sim::net::*;
//!
//! let mut net = Net::empty();
//! net.add_place(Place::plain("entry"));
//! net.add_place(Place::plain("buffer"));
//! net.add_transition(Transition::new(
//!     "t0",
//!     vec![PlaceRef::plain("entry")],
//!     vec![OutputArc::to("buffer")],
//! ));
//!
//! let mut dist = Distribution::new();
//! dist.push_back(PlaceRef::plain("entry"), Token::new("token_1"));
//!
//! let enabled = net.enabled_transitions(&dist, &FiringHistory::new());
//! assert_eq!(enabled[0].id, "t0".into());
//! let plan = net.fire_transition(&dist, &"t0".into()).unwrap();
//! assert_eq!(plan.distribution.count(&PlaceRef::plain("buffer")), 1);
//! ```

pub mod core;
pub mod ids;
pub mod io;
pub mod structure;

pub use core::{DiagnosticReport, FireError, FirePlan, FiringHistory, Net, PendingAction};
pub use ids::{PlaceId, PlaceRef, Subplace, TransitionId};
pub use io::{ConfigError, IoError, NetConfig, PlaceSchema, SimulationConfig};
pub use structure::{
    ActionParams, Actor, Distribution, OutputArc, Place, PlaceKind, Priority, Token, Transition,
    DEFAULT_PRIORITY,
};
