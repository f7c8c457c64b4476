//! Block Geometry
//!
//! Fixed block dimensions and the mapping from `(level, slot)` to a box in
//! world space. Y is up, the tower is centred on the origin and level 0
//! rests on the ground plane at `y = 0`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Half of a block's long dimension.
pub const BLOCK_HALF_LENGTH: f32 = 1.5;

/// Half of a block's height.
pub const BLOCK_HALF_HEIGHT: f32 = 0.5;

/// Half of a block's depth (the short horizontal dimension).
pub const BLOCK_HALF_DEPTH: f32 = 0.5;

/// Slots per level.
pub const SLOTS_PER_LEVEL: usize = 3;

/// Rows per level. Only row 0 is ever populated.
pub const ROWS_PER_LEVEL: usize = 1;

/// Levels in a freshly built tower.
pub const INITIAL_LEVELS: usize = 18;

/// Blocks in a freshly built tower.
pub const TOTAL_BLOCKS: usize = INITIAL_LEVELS * SLOTS_PER_LEVEL;

/// Half the side of the tower's square footprint.
pub const TOWER_HALF_WIDTH: f32 = BLOCK_HALF_LENGTH;

/// Direction of a level's long axis.
///
/// Derived from level parity, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Even levels: long axis along X, slots spread along Z.
    Horizontal,
    /// Odd levels: long axis along Z, slots spread along X.
    Vertical,
}

impl Orientation {
    /// Orientation of blocks on `level`.
    #[inline]
    pub fn for_level(level: usize) -> Self {
        if level % 2 == 0 {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    /// Unit vector along the block's long axis.
    #[inline]
    pub fn long_axis(self) -> Vec3 {
        match self {
            Orientation::Horizontal => Vec3::X,
            Orientation::Vertical => Vec3::Z,
        }
    }

    /// Unit vector along which the three slots of a level are laid out.
    #[inline]
    pub fn slot_axis(self) -> Vec3 {
        match self {
            Orientation::Horizontal => Vec3::Z,
            Orientation::Vertical => Vec3::X,
        }
    }

    /// Box half-extents of a block in this orientation.
    pub fn half_extents(self) -> Vec3 {
        match self {
            Orientation::Horizontal => {
                Vec3::new(BLOCK_HALF_LENGTH, BLOCK_HALF_HEIGHT, BLOCK_HALF_DEPTH)
            }
            Orientation::Vertical => {
                Vec3::new(BLOCK_HALF_DEPTH, BLOCK_HALF_HEIGHT, BLOCK_HALF_LENGTH)
            }
        }
    }
}

/// Height of the centre of blocks on `level`.
#[inline]
pub fn level_height(level: usize) -> f32 {
    BLOCK_HALF_HEIGHT + level as f32 * (2.0 * BLOCK_HALF_HEIGHT)
}

/// World-space centre of the block sitting in `(level, slot)`.
pub fn slot_center(level: usize, slot: usize) -> Vec3 {
    let orientation = Orientation::for_level(level);
    let offset = (slot as f32 - 1.0) * (2.0 * BLOCK_HALF_DEPTH);
    orientation.slot_axis() * offset + Vec3::Y * level_height(level)
}

/// Distance a box at `center` must travel along the ground-plane unit
/// vector `direction` before it is clear of the tower footprint.
///
/// Clear means separated on X or on Z, so the box can no longer touch
/// any block of any level.
pub fn footprint_exit(center: Vec3, half: Vec3, direction: Vec3) -> f32 {
    let axis_exit = |c: f32, h: f32, d: f32| {
        if d.abs() <= f32::EPSILON {
            f32::INFINITY
        } else {
            ((TOWER_HALF_WIDTH + h - c * d.signum()) / d.abs()).max(0.0)
        }
    };
    let exit = axis_exit(center.x, half.x, direction.x).min(axis_exit(center.z, half.z, direction.z));
    if exit.is_finite() {
        exit
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_alternates() {
        assert_eq!(Orientation::for_level(0), Orientation::Horizontal);
        assert_eq!(Orientation::for_level(1), Orientation::Vertical);
        assert_eq!(Orientation::for_level(17), Orientation::Vertical);
    }

    #[test]
    fn test_slot_centers_touch() {
        // Neighbouring slots share a face.
        let a = slot_center(0, 0);
        let b = slot_center(0, 1);
        let half = Orientation::Horizontal.half_extents();
        assert!(((b - a).z - 2.0 * half.z).abs() < 1e-6);

        // Levels stack without gaps.
        let low = slot_center(0, 1);
        let high = slot_center(1, 1);
        assert!(((high - low).y - 2.0 * BLOCK_HALF_HEIGHT).abs() < 1e-6);
    }

    #[test]
    fn test_footprint_is_square() {
        // Three slots across equals one block length.
        let span = SLOTS_PER_LEVEL as f32 * 2.0 * BLOCK_HALF_DEPTH;
        assert!((span - 2.0 * BLOCK_HALF_LENGTH).abs() < 1e-6);
    }

    #[test]
    fn test_footprint_exit_along_axes() {
        let half = Orientation::Horizontal.half_extents();
        // Middle block pushed along its length: 3 to clear.
        assert!((footprint_exit(slot_center(0, 1), half, Vec3::X) - 3.0).abs() < 1e-6);
        // Edge block pushed outward across the slots: 1 to clear.
        assert!((footprint_exit(slot_center(0, 0), half, Vec3::NEG_Z) - 1.0).abs() < 1e-6);
        // Same block pushed inward has to cross the whole footprint.
        assert!((footprint_exit(slot_center(0, 0), half, Vec3::Z) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_footprint_exit_diagonal_clears_both_axes() {
        let half = Orientation::Horizontal.half_extents();
        let center = slot_center(6, 0);
        let direction = Vec3::new(1.0, 0.0, 1.0).normalize();
        let t = footprint_exit(center, half, direction);
        let moved = center + direction * t;
        let clear_x = moved.x.abs() - half.x >= TOWER_HALF_WIDTH - 1e-4;
        let clear_z = moved.z.abs() - half.z >= TOWER_HALF_WIDTH - 1e-4;
        assert!(clear_x || clear_z, "{moved:?}");
        // Any shorter move still overlaps.
        let short = center + direction * (t - 0.1);
        assert!(short.x.abs() - half.x < TOWER_HALF_WIDTH && short.z.abs() - half.z < TOWER_HALF_WIDTH);
    }
}
