//!
//! A crate containing bottom up tree automata and the antichain based
//! decision procedure for upward language inclusion.
//!
//! This crate does not use unsafe code.

#![forbid(unsafe_code)]

mod antichain;
mod inclusion;
mod tree_automaton;

pub use inclusion::*;
pub use tree_automaton::*;
