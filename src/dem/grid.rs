use super::DemError;
use std::fmt::Display;

/// Single band of elevation samples, row major.
#[derive(Clone, Debug)]
pub struct ElevationGrid {
    pub dimensions: (u32, u32),
    samples: Vec<f64>,
}

impl ElevationGrid {
    pub fn new(dimensions: (u32, u32), samples: Vec<f64>) -> Result<Self, DemError> {
        let required = dimensions.0 as usize * dimensions.1 as usize;
        if samples.len() != required {
            Err(DemError::BufferSize((samples.len(), dimensions)))
        } else {
            Ok(Self {
                dimensions,
                samples,
            })
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return None;
        }
        self.samples
            .get(y as usize * self.dimensions.0 as usize + x as usize)
            .copied()
    }
}

impl Display for ElevationGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ElevationGrid({}x{}, {} samples)",
            self.dimensions.0,
            self.dimensions.1,
            self.samples.len()
        )
    }
}
