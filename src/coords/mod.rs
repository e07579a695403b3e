//! World coordinate reconstruction.
//!
//! Entity positions arrive as a grid cell index plus a fractional offset
//! inside that cell, per axis. Only the reconstructed float form is ever
//! buffered or persisted.

use serde::{Deserialize, Serialize};

/// Width of one grid cell, as a shift. Must match the producer's grid.
pub const CELL_BITS: u32 = 7;

/// Offset that centres the grid on the world origin.
pub const MAX_COORD_INTEGER: i32 = 16384;

pub const CELL_X: &str = "CBodyComponentBaseAnimatingOverlay.m_cellX";
pub const CELL_Y: &str = "CBodyComponentBaseAnimatingOverlay.m_cellY";
pub const CELL_Z: &str = "CBodyComponentBaseAnimatingOverlay.m_cellZ";
pub const VEC_X: &str = "CBodyComponentBaseAnimatingOverlay.m_vecX";
pub const VEC_Y: &str = "CBodyComponentBaseAnimatingOverlay.m_vecY";
pub const VEC_Z: &str = "CBodyComponentBaseAnimatingOverlay.m_vecZ";

/// The six raw properties that together encode an entity's position.
pub const COORDINATE_PROPERTIES: [&str; 6] = [CELL_X, CELL_Y, CELL_Z, VEC_X, VEC_Y, VEC_Z];

/// A reconstructed world position
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Converts one axis from (cell, fraction) to a world coordinate.
pub fn coord_from_cell(cell: u32, fraction: f32) -> f32 {
    let base = (cell.wrapping_shl(CELL_BITS) as i32).wrapping_sub(MAX_COORD_INTEGER);
    base as f32 + fraction
}

/// Reconstructs a full position from per-axis cells and fractions.
pub fn reconstruct(cells: [u32; 3], fractions: [f32; 3]) -> Vector3 {
    Vector3 {
        x: coord_from_cell(cells[0], fractions[0]),
        y: coord_from_cell(cells[1], fractions[1]),
        z: coord_from_cell(cells[2], fractions[2]),
    }
}

/// Whether `property` is one of the six position components.
pub fn is_coordinate_property(property: &str) -> bool {
    COORDINATE_PROPERTIES.contains(&property)
}
