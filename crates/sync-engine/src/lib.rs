//! The Reconciliation Engine: the state machine that drives the push and
//! pull phases, plus the host-facing `setup`/`execute`/`dispose` surface.

pub mod engine;
pub mod host;
pub mod pull;
pub mod push;

pub use engine::{Outcome, ReconciliationEngine};
pub use host::{EngineHost, SetupParams};
pub use pull::PullOutcome;
pub use push::PushOutcome;
