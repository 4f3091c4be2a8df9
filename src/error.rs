use crate::dem::DemError;
use crate::geo::ProjectionError;
use crate::heightmap::Margins;
use std::fmt;

pub type HeightmapResult<T> = Result<T, HeightmapError>;

#[derive(Debug)]
pub enum HeightmapError {
    BadDem(DemError),
    BadProjection(ProjectionError),
    InvalidDimensions((u32, u32)),
    InvalidDownsample(u32),
    InvalidMargins(Margins),
    WriteError(image::ImageError),
}

impl fmt::Display for HeightmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for HeightmapError {}

impl From<DemError> for HeightmapError {
    fn from(e: DemError) -> Self {
        HeightmapError::BadDem(e)
    }
}

impl From<ProjectionError> for HeightmapError {
    fn from(e: ProjectionError) -> Self {
        HeightmapError::BadProjection(e)
    }
}

impl From<image::ImageError> for HeightmapError {
    fn from(e: image::ImageError) -> Self {
        HeightmapError::WriteError(e)
    }
}
