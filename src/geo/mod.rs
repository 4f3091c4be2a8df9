use proj4rs::errors::Error as Proj4Error;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

#[derive(Debug)]
pub enum ProjectionError {
    MissingEpsgCode,
    Proj4Error(Proj4Error),
    InvalidOrigin((f64, f64)),
    InvalidScale((f64, f64)),
}

impl From<Proj4Error> for ProjectionError {
    fn from(e: Proj4Error) -> Self {
        ProjectionError::Proj4Error(e)
    }
}

/// Affine pixel to model-space mapping from the ModelTiepoint and
/// ModelPixelScale tags.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    pub origin: (f64, f64),
    pub pixel_scale: (f64, f64),
}

impl GeoTransform {
    pub fn new(origin: (f64, f64), pixel_scale: (f64, f64)) -> Result<Self, ProjectionError> {
        if !origin.0.is_finite() || !origin.1.is_finite() {
            return Err(ProjectionError::InvalidOrigin(origin));
        }
        if !pixel_scale.0.is_normal() || !pixel_scale.1.is_normal() {
            return Err(ProjectionError::InvalidScale(pixel_scale));
        }
        Ok(Self {
            origin,
            pixel_scale,
        })
    }

    /// Model-space coordinates of a pixel corner. Raster y grows downward,
    /// model y grows upward.
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin.0 + col * self.pixel_scale.0,
            self.origin.1 - row * self.pixel_scale.1,
        )
    }
}

/// Dataset CRS, used only for the bounds report.
#[derive(Clone, Debug)]
pub struct Projection {
    pub epsg: u32,
    proj: Proj,
}

impl Projection {
    pub fn from_epsg(epsg: u32) -> Result<Self, ProjectionError> {
        let proj = Proj::from_epsg_code(epsg as u16)?;
        Ok(Self { epsg, proj })
    }

    /// Transform a point in the dataset CRS into geodetic (lat, lon) degrees.
    pub fn to_lat_lon_deg(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let geodetic = Proj::from_epsg_code(4326)?;
        // proj4rs expects angular CRS coordinates in radians
        let mut point = if is_geographic(self.epsg) {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.proj, &geodetic, &mut point)?;
        Ok((point.1.to_degrees(), point.0.to_degrees()))
    }
}

/// Degree-based CRSs live in the 4000-4999 EPSG block.
fn is_geographic(epsg: u32) -> bool {
    (4000..5000).contains(&epsg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_maps_pixel_corners() {
        let transform = GeoTransform::new((500_000.0, 4_100_000.0), (10.0, 10.0)).unwrap();
        assert_eq!(transform.pixel_to_geo(0.0, 0.0), (500_000.0, 4_100_000.0));
        assert_eq!(transform.pixel_to_geo(100.0, 50.0), (501_000.0, 4_099_500.0));
    }

    #[test]
    fn transform_rejects_degenerate_scale() {
        assert!(matches!(
            GeoTransform::new((0.0, 0.0), (0.0, 10.0)),
            Err(ProjectionError::InvalidScale(_))
        ));
        assert!(matches!(
            GeoTransform::new((f64::NAN, 0.0), (10.0, 10.0)),
            Err(ProjectionError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn utm_point_projects_to_lat_lon() {
        let projection = Projection::from_epsg(32610).unwrap();
        // Easting 500km on the central meridian of UTM zone 10N, at the equator
        let (lat, lon) = projection.to_lat_lon_deg(500_000.0, 0.0).unwrap();
        assert!(lat.abs() < 1e-4, "lat was {lat}");
        assert!((lon + 123.0).abs() < 1e-4, "lon was {lon}");
    }

    #[test]
    fn geodetic_crs_is_identity() {
        let projection = Projection::from_epsg(4326).unwrap();
        let (lat, lon) = projection.to_lat_lon_deg(-122.5, 45.5).unwrap();
        assert!((lat - 45.5).abs() < 1e-9);
        assert!((lon + 122.5).abs() < 1e-9);
    }
}
