//! Core primitives.
//!
//! Block geometry and state hashing. No game rules live here.

pub mod geometry;
pub mod hash;

// Re-export core types
pub use geometry::{Orientation, footprint_exit, slot_center, level_height, SLOTS_PER_LEVEL, INITIAL_LEVELS};
pub use hash::{StateHash, StateHasher, hash_hex};
