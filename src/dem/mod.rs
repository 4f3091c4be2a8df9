use crate::geo::{GeoTransform, ProjectionError};
use num_traits::NumCast;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::debug;

mod grid;

pub use grid::ElevationGrid;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

const PROJECTED_CS_TYPE_KEY: u32 = 3072;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;

#[derive(Debug)]
pub enum DemError {
    BadTiff(TiffError),
    ReadError(io::Error),
    BufferSize((usize, (u32, u32))),
    BadGeoTransform(ProjectionError),
    NotSupported(String),
}

impl fmt::Display for DemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DemError {}

impl From<TiffError> for DemError {
    fn from(e: TiffError) -> Self {
        match e {
            TiffError::IoError(io_error) => DemError::ReadError(io_error),
            tiff_error => DemError::BadTiff(tiff_error),
        }
    }
}

impl From<io::Error> for DemError {
    fn from(e: io::Error) -> Self {
        DemError::ReadError(e)
    }
}

impl From<ProjectionError> for DemError {
    fn from(e: ProjectionError) -> Self {
        DemError::BadGeoTransform(e)
    }
}

/// Georeferenced elevation raster: one decoded band plus the tags needed
/// for the bounds report.
#[derive(Clone, Debug)]
pub struct Dem {
    band: ElevationGrid,
    transform: GeoTransform,
    geo_keys: Vec<u32>,
}

impl Dem {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DemError> {
        let file = File::open(path)?;
        Self::from_stream(BufReader::new(file))
    }

    pub fn from_stream<R: Read + Seek>(stream: R) -> Result<Self, DemError> {
        let mut decoder = Decoder::new(stream)?;
        let dimensions = decoder.dimensions()?;

        let transform = read_geotransform(&mut decoder)?;
        let geo_keys = decoder
            .get_tag_u32_vec(Tag::GeoKeyDirectoryTag)
            .unwrap_or_default();

        let band = read_band(&mut decoder, dimensions)?;
        debug!("decoded {band}");

        Ok(Self {
            band,
            transform,
            geo_keys,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.band.dimensions
    }

    pub fn band(&self) -> &ElevationGrid {
        &self.band
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// EPSG code from the geo key directory, if the raster carries one.
    pub fn epsg(&self) -> Option<u32> {
        // Directory layout: 4-value version header, then 4-value key entries
        // of (key id, tag location, count, value). Location 0 means the value
        // is stored inline.
        self.geo_keys.chunks_exact(4).skip(1).find_map(|entry| {
            match (entry[0], entry[1]) {
                (PROJECTED_CS_TYPE_KEY | GEOGRAPHIC_TYPE_KEY, 0) => Some(entry[3]),
                _ => None,
            }
        })
    }

    /// Model-space corner coordinates, ((left, top), (right, bottom)).
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let (width, height) = self.band.dimensions;
        (
            self.transform.pixel_to_geo(0.0, 0.0),
            self.transform.pixel_to_geo(width as f64, height as f64),
        )
    }
}

impl fmt::Display for Dem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg() {
            Some(code) => write!(f, "Dem({}, EPSG:{code})", self.band),
            None => write!(f, "Dem({}, no EPSG)", self.band),
        }
    }
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform, DemError> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag)?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(DemError::NotSupported(
            "incomplete georeferencing tags".to_string(),
        ));
    }

    // Tiepoint anchors raster (i, j) onto model (x, y); almost always (0, 0)
    let origin = (
        tiepoint[3] - tiepoint[0] * scale[0],
        tiepoint[4] + tiepoint[1] * scale[1],
    );
    Ok(GeoTransform::new(origin, (scale[0], scale[1]))?)
}

fn read_band<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    dimensions: (u32, u32),
) -> Result<ElevationGrid, DemError> {
    let samples = match decoder.read_image()? {
        DecodingResult::U8(buffer) => cast_samples(&buffer),
        DecodingResult::U16(buffer) => cast_samples(&buffer),
        DecodingResult::U32(buffer) => cast_samples(&buffer),
        DecodingResult::I8(buffer) => cast_samples(&buffer),
        DecodingResult::I16(buffer) => cast_samples(&buffer),
        DecodingResult::I32(buffer) => cast_samples(&buffer),
        DecodingResult::F32(buffer) => cast_samples(&buffer),
        DecodingResult::F64(buffer) => buffer,
        _ => {
            return Err(DemError::NotSupported(
                "unsupported elevation sample format".to_string(),
            ))
        }
    };
    ElevationGrid::new(dimensions, samples)
}

fn cast_samples<T: NumCast + Copy>(buffer: &[T]) -> Vec<f64> {
    buffer
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f64::NAN))
        .collect()
}
