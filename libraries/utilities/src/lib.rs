//!
//! This crate defines the utility data structures shared by the simulation
//! and inclusion engines.
//!
//! This crate does not use unsafe code.

#![forbid(unsafe_code)]

pub mod binary_relation;
pub mod cache;
pub mod caching_allocator;
pub mod shared_list;
pub mod smart_set;

pub use binary_relation::*;
pub use cache::*;
pub use caching_allocator::*;
pub use shared_list::*;
pub use smart_set::*;
