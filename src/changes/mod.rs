// Change detection and property canonicalisation

mod detector;
mod transformer;

pub use detector::{ChangeDetector, DEFAULT_IGNORED_PROPERTIES};
pub use transformer::{position_of, transform, PositionError, POSITION_PROPERTY};

#[cfg(test)]
mod tests;
