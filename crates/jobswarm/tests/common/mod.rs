//! Shared test utilities for jobswarm integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated swarm runs over a temp data home
//! - Builders for configs, portal configs and listings
//! - `ScriptedAdapter`, a portal adapter that replays scripted outcomes

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
