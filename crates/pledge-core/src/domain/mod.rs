//! Domain model (ids, outcomes, status views).

pub mod ids;
pub mod outcome;
pub mod state;

pub use ids::PromiseId;
pub use outcome::{Outcome, OutcomeKind};
pub use state::PromiseStatus;
