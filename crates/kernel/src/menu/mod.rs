//! Site navigation menu.
//!
//! A single ordered menu whose positions are always the dense sequence
//! `0..N-1`. Position changes are planned here as pure functions and applied
//! transactionally by [`crate::models::MenuItem`].

pub mod position;

pub use position::{Direction, MenuError, MenuTarget, Slot};
