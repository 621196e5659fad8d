pub mod insight;
pub mod intent;
pub mod orchestrator;
pub mod sql;
pub mod state;

pub use orchestrator::Orchestrator;
pub use state::*;
