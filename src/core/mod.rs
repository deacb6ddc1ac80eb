//! Core domain models for runline
//!
//! This module defines the fundamental data structures that represent
//! workflows, jobs, steps, triggers, and their configuration.

pub mod config;
pub mod context;
pub mod job;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use job::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
pub use workflow::*;
