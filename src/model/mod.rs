//! Adaptive Markov transition model
//!
//! Owns the state space and the row-stochastic transition matrix. Pure
//! numeric core; the only I/O is the snapshot round-trip.

pub mod snapshot;
pub mod transition;

pub use snapshot::ModelSnapshot;
pub use transition::TransitionModel;
