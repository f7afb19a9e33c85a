//! Deploy Engine
//!
//! Drives a deploy from submission to a terminal status: groups run in
//! ascending `group_index` order, each gated on its dependency group's CI
//! stage, while a background poller mirrors remote pipelines until every
//! project converged.

pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod plan;
pub mod poller;
pub mod runner;
pub mod waiter;

pub use error::{EngineError, EngineResult};
pub use notifier::{BroadcastNotifier, Notifier};
pub use orchestrator::Orchestrator;
pub use poller::{PollLoopEnd, PollTask};
