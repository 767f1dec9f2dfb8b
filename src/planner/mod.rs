//! Comparison of desired and live state.
//!
//! This module handles normalizing live records into their comparable
//! canonical form and computing the three-way diff of each collection.

mod diff;
mod normalize;

pub use diff::{Action, SetDiff, three_way};
pub use normalize::{Canonical, canonical, canonical_value, normalize, normalize_value};
