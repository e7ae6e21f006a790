//! rseries: cell-wise aggregation across a series of grids
//!
//! Given N input grids sharing one region and M (output, method) pairs, every
//! output cell is the chosen statistic of the N corresponding input cells.
//! Grids are streamed row by row, so memory use does not depend on the number
//! of rows, and the work within a row is spread across a Rayon pool.
//!
//! ## Key Features
//!
//! - **Many methods**: 23 per-cell statistics from `average` to `kurtosis`
//! - **Per-input weights**: given inline or through a `name|weight` manifest
//! - **Null handling**: skip nulls, or propagate them with a single flag
//! - **Range filtering**: out-of-range samples count as nulls
//! - **Eager or lazy handles**: keep every input open, or open per row
//! - **Staged outputs**: nothing is committed unless the whole run succeeds
//!
//! ## Module Organization
//!
//! - [`config`]: run configuration and its builder
//! - [`inputs`] / [`outputs`]: the input and output sets of a run
//! - [`resources`]: eager and lazy handle management
//! - [`driver`]: the row loop
//! - [`statistics`]: the method catalogue and reductions
//! - [`grid`]: the storage boundary, with [`netcdf_io`] and [`memory`] stores
//! - [`metadata`]: provenance attached to committed outputs
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rseries::prelude::*;
//!
//! # fn main() -> rseries::Result<()> {
//! let store = NetCdfStore::new("/data/series");
//! let config = SeriesConfig::builder()
//!     .inputs(["jan", "feb", "mar"])
//!     .output("q1_mean", "average")
//!     .output("q1_n", "count")
//!     .build()?;
//! let summary = run_series(&store, config)?;
//! println!("{} outputs written", summary.outputs);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod grid;
pub mod inputs;
pub mod memory;
pub mod metadata;
pub mod netcdf_io;
pub mod outputs;
pub mod parallel;
pub mod resources;
pub mod statistics;

pub use config::{InputSpec, ManifestSource, SeriesConfig, ValueRange};
pub use driver::{run_series, RunSummary, SeriesDriver};
pub use errors::{ErrorKind, Result, SeriesError};
pub use grid::{CellType, GridReader, GridRegion, GridStore, GridWriter};
pub use memory::MemoryStore;
pub use netcdf_io::NetCdfStore;
pub use resources::ResourceMode;
pub use statistics::{Method, ResultKind};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::{InputSpec, ManifestSource, SeriesConfig, ValueRange};
    pub use crate::driver::{run_series, RunSummary};
    pub use crate::errors::{Result, SeriesError};
    pub use crate::grid::{is_null, GridRegion, GridStore, NULL};
    pub use crate::memory::MemoryStore;
    pub use crate::netcdf_io::NetCdfStore;
    pub use crate::parallel::ParallelConfig;
    pub use crate::statistics::{Method, Reducer};
}
