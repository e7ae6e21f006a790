//! Grid access abstraction shared by the NetCDF and in-memory backends
//!
//! The engine never touches a storage format directly. It opens readers that
//! hand out one row at a time, and writers that accept rows in order and only
//! become visible once committed.

use crate::errors::Result;
use crate::metadata::Provenance;
use std::fmt;

/// Row and column counts of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridRegion {
    pub rows: usize,
    pub cols: usize,
}

impl GridRegion {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for GridRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Element type of a stored grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    /// 32-bit integers, null stored as [`INT_NULL`]
    Int,
    /// 64-bit floats, null stored as NaN
    Float,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

/// Fill value marking a null cell in integer grids
pub const INT_NULL: i32 = i32::MIN;

/// The in-memory null sample
pub const NULL: f64 = f64::NAN;

/// Whether a sample is in the null state
#[inline]
pub fn is_null(value: f64) -> bool {
    value.is_nan()
}

/// Convert a sample to its integer encoding, rounding to nearest
#[allow(clippy::cast_possible_truncation)]
pub fn to_int_cell(value: f64) -> i32 {
    if is_null(value) {
        return INT_NULL;
    }
    let rounded = value.round();
    if rounded <= f64::from(INT_NULL) || rounded > f64::from(i32::MAX) {
        INT_NULL
    } else {
        rounded as i32
    }
}

/// Convert an integer cell back to a sample
pub fn from_int_cell(value: i32) -> f64 {
    if value == INT_NULL {
        NULL
    } else {
        f64::from(value)
    }
}

/// Sequential row reader over one open grid
pub trait GridReader: Send {
    /// Geometry of the grid behind this handle
    fn region(&self) -> GridRegion;

    /// Fill `buf` with row `row`; null cells come back as NaN
    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()>;
}

/// Sequential row writer for one output grid
///
/// Rows are appended in order. Dropping a writer without calling
/// [`GridWriter::commit`] discards everything written so far.
pub trait GridWriter: Send {
    /// Append the next row, encoding nulls according to the cell type
    fn write_row(&mut self, buf: &[f64]) -> Result<()>;

    /// Attach provenance and make the grid visible
    fn commit(self: Box<Self>, provenance: &Provenance) -> Result<()>;
}

/// A namespace of grids addressable by name
pub trait GridStore: Send + Sync {
    /// Geometry of a stored grid without keeping it open
    fn region_of(&self, name: &str) -> Result<GridRegion>;

    /// Open a grid for sequential reading
    fn open_reader(&self, name: &str) -> Result<Box<dyn GridReader>>;

    /// Create a new grid; it is not visible until committed
    fn create_writer(
        &self,
        name: &str,
        cell_type: CellType,
        region: GridRegion,
    ) -> Result<Box<dyn GridWriter>>;
}
