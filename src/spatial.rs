//! Spatial model: the sampling box, its grid of cells and the master
//! location list drawn from it.

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, round_decimals};

/// Decimal digits kept on sampled coordinates.
pub const COORDINATE_DECIMALS: i32 = 7;

/// Latitude/longitude rectangle, min strictly below max on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, ConfigError> {
        check_axis("latitude", min_lat, max_lat)?;
        check_axis("longitude", min_lon, max_lon)?;
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Square of half-width `delta` degrees centred on a point.
    pub fn around(center_lat: f64, center_lon: f64, delta: f64) -> Result<Self, ConfigError> {
        if !center_lat.is_finite() || !center_lon.is_finite() {
            return Err(ConfigError::NonFinite { name: "center" });
        }
        if !(-90.0..=90.0).contains(&center_lat) || !(-180.0..=180.0).contains(&center_lon) {
            return Err(ConfigError::CenterOutOfRange {
                lat: center_lat,
                lon: center_lon,
            });
        }
        let bounds = Self::new(
            center_lat - delta,
            center_lat + delta,
            center_lon - delta,
            center_lon + delta,
        )?;
        if bounds.min_lat < -90.0
            || bounds.max_lat > 90.0
            || bounds.min_lon < -180.0
            || bounds.max_lon > 180.0
        {
            return Err(ConfigError::BoxOutOfRange {
                min_lat: bounds.min_lat,
                max_lat: bounds.max_lat,
                min_lon: bounds.min_lon,
                max_lon: bounds.max_lon,
            });
        }
        Ok(bounds)
    }

    pub fn lat_extent(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_extent(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Inclusive, with one unit of slack at the last kept coordinate decimal
    /// so rounded samples on an edge still count as inside.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let slack = 10f64.powi(-COORDINATE_DECIMALS);
        (self.min_lat - slack..=self.max_lat + slack).contains(&lat)
            && (self.min_lon - slack..=self.max_lon + slack).contains(&lon)
    }
}

fn check_axis(axis: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    // `!(min < max)` also rejects NaN bounds.
    if !(min < max) || !min.is_finite() || !max.is_finite() {
        return Err(ConfigError::InvalidBoundingBox { axis, min, max });
    }
    Ok(())
}

/// Grid dimensions: `cols` split longitude, `rows` split latitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: u32,
    pub rows: u32,
}

impl GridSpec {
    pub const fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Every cell, column-major, before shuffling.
    pub fn cells(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(self.cell_count());
        for col in 0..self.cols {
            for row in 0..self.rows {
                cells.push(GridCell { col, row });
            }
        }
        cells
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(20, 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub col: u32,
    pub row: u32,
}

/// A fixed sample point. Its identity is its index in the master list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Splits `total` locations over `cells` slots: the first `total % cells`
/// slots take one extra. Cells beyond the remainder get nothing when
/// `total < cells`.
pub fn allocate(total: usize, cells: usize) -> Vec<usize> {
    if cells == 0 {
        return Vec::new();
    }
    let base = total / cells;
    let extra = total % cells;
    (0..cells)
        .map(|slot| if slot < extra { base + 1 } else { base })
        .collect()
}

pub struct GridSampler {
    bounds: BoundingBox,
    grid: GridSpec,
}

impl GridSampler {
    pub fn new(bounds: BoundingBox, grid: GridSpec) -> Self {
        Self { bounds, grid }
    }

    /// Cell width (longitude) and height (latitude) in degrees.
    pub fn cell_size(&self) -> (f64, f64) {
        (
            self.bounds.lon_extent() / self.grid.cols as f64,
            self.bounds.lat_extent() / self.grid.rows as f64,
        )
    }

    pub fn cell_bounds(&self, cell: GridCell) -> BoundingBox {
        let (width, height) = self.cell_size();
        let min_lon = self.bounds.min_lon + cell.col as f64 * width;
        let min_lat = self.bounds.min_lat + cell.row as f64 * height;
        BoundingBox {
            min_lat,
            max_lat: min_lat + height,
            min_lon,
            max_lon: min_lon + width,
        }
    }

    /// Draws exactly `total` locations. The returned order is the canonical
    /// location index for the whole dataset.
    pub fn sample<R: Rng + ?Sized>(&self, total: usize, rng: &mut R) -> Vec<Location> {
        let mut cells = self.grid.cells();
        cells.shuffle(rng);
        let counts = allocate(total, cells.len());

        let mut locations = Vec::with_capacity(total);
        for (cell, count) in cells.into_iter().zip(counts) {
            let rect = self.cell_bounds(cell);
            for _ in 0..count {
                let lon = rng.gen_range(rect.min_lon..=rect.max_lon);
                let lat = rng.gen_range(rect.min_lat..=rect.max_lat);
                locations.push(Location {
                    lat: round_decimals(lat, COORDINATE_DECIMALS),
                    lon: round_decimals(lon, COORDINATE_DECIMALS),
                });
            }
        }
        locations
    }
}
