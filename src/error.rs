#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Unknown city: {0:?}")]
    UnknownCity(String),

    #[error("Expected a FeatureCollection")]
    NotAFeatureCollection,

    #[error("Feature {index} is missing property {property:?}")]
    MissingProperty { index: usize, property: String },

    #[error("Feature {index}: property {property:?} must be {expected}")]
    BadProperty { index: usize, property: String, expected: &'static str },

    #[error("Feature {index}: {property:?} has {found} entries, expected {expected}")]
    DistributionLength { index: usize, property: String, expected: usize, found: usize },

    #[error("Feature {index} has no polygon geometry")]
    NotAPolygon { index: usize },

    #[error("Venue {index} must be a [lon, lat, count] triple")]
    BadVenue { index: usize },

    #[error("Legend entry {name:?} must be an [r, g, b] triple")]
    BadLegendEntry { name: String },

    #[error("Unknown feature axis {0:?} (expected cat, time or day)")]
    UnknownFeatureAxis(String),
}
