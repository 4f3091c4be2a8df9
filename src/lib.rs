mod dem;
mod error;
mod geo;
mod heightmap;

pub use dem::{Dem, DemError, ElevationGrid};
pub use error::{HeightmapError, HeightmapResult};
pub use geo::{GeoTransform, Projection, ProjectionError};
pub use heightmap::{
    encode_height, encode_heightmap, scan_extremes, EncodeOptions, HeightExtremes, Margins,
    SampleWindow,
};
