use crate::coords::{self, Vector3};
use crate::entity::Entity;
use crate::value::PropValue;
use std::fmt;

/// Canonical name all six coordinate components collapse to
pub const POSITION_PROPERTY: &str = "position";

/// Position reconstruction errors
#[derive(Debug, Clone, PartialEq)]
pub enum PositionError {
    /// A coordinate component is absent from the entity's store
    MissingComponent(&'static str),
    /// A coordinate component holds a value of the wrong type
    InvalidComponent(&'static str),
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::MissingComponent(p) => write!(f, "missing position component '{}'", p),
            PositionError::InvalidComponent(p) => {
                write!(f, "position component '{}' has an unexpected type", p)
            }
        }
    }
}

impl std::error::Error for PositionError {}

fn cell(entity: &Entity, property: &'static str) -> Result<u32, PositionError> {
    entity
        .get(property)
        .ok_or(PositionError::MissingComponent(property))?
        .as_u32()
        .ok_or(PositionError::InvalidComponent(property))
}

fn fraction(entity: &Entity, property: &'static str) -> Result<f32, PositionError> {
    entity
        .get(property)
        .ok_or(PositionError::MissingComponent(property))?
        .as_f32()
        .ok_or(PositionError::InvalidComponent(property))
}

/// Reconstructs the entity's current world position from its full store.
pub fn position_of(entity: &Entity) -> Result<Vector3, PositionError> {
    let cells = [
        cell(entity, coords::CELL_X)?,
        cell(entity, coords::CELL_Y)?,
        cell(entity, coords::CELL_Z)?,
    ];
    let fractions = [
        fraction(entity, coords::VEC_X)?,
        fraction(entity, coords::VEC_Y)?,
        fraction(entity, coords::VEC_Z)?,
    ];
    Ok(coords::reconstruct(cells, fractions))
}

/// Maps a raw (property, value) pair to the name and value to buffer.
///
/// Coordinate components ignore `value` and re-read the entity's complete
/// position; everything else passes through.
pub fn transform(
    entity: &Entity,
    property: &str,
    value: &PropValue,
) -> Result<(String, PropValue), PositionError> {
    if coords::is_coordinate_property(property) {
        let position = position_of(entity)?;
        Ok((POSITION_PROPERTY.to_string(), PropValue::Position(position)))
    } else {
        Ok((property.to_string(), value.clone()))
    }
}
