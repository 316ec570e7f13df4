//!
//! A crate containing labelled transition systems and the computation of the
//! simulation preorder by partition refinement.
//!
//! This crate does not use unsafe code.

#![forbid(unsafe_code)]

mod labelled_transition_system;
mod random_lts;
mod shared_counter;
mod simulation;
mod state_list;

pub use labelled_transition_system::*;
pub use random_lts::*;
pub use simulation::*;
