pub mod classify;
pub mod equations;
pub(crate) mod iwamoto;
pub mod jacobian;
pub(crate) mod newtonpf;
pub mod solver;
pub mod state;

pub use classify::{BusOrdering, BusType, classify};
pub use newtonpf::{NewtonOutcome, newton_pf};
pub use state::{Setpoints, SolutionState};
