//! Token-flow simulation for behavior nets.
//!
//! A behavior net is a Petri-net variant: typed places hold FIFO queues
//! of tokens carrying actor payloads, and transitions consume one token
//! per input, merge the actors, and deliver filtered copies to each
//! output. Action places additionally resolve a probabilistic
//! success/failure/error outcome with a bounded retry loop.
//!
//! The crate splits into three layers:
//! - [`net`]: immutable topology, enablement and the pure firing rule;
//! - [`sim`]: the mutable token store, outcome resolution and the
//!   Idle/Running step controller;
//! - [`runtime`]: the WebSocket protocol and execution server.

pub mod config;
pub mod net;
pub mod options;
pub mod runtime;
pub mod sim;
