//! NetCDF grid store
//!
//! Each grid is a NetCDF file `<name>.nc` in a directory, holding one 2-D
//! variable over dimensions `(y, x)`. Readers honour `_FillValue`. Writers
//! stage into `<name>.nc.partial` and only rename into place on commit, so a
//! failed run never leaves a readable but incomplete output behind.

use crate::errors::{Result, SeriesError};
use crate::grid::{
    to_int_cell, CellType, GridReader, GridRegion, GridStore, GridWriter, INT_NULL, NULL,
};
use crate::metadata::Provenance;
use ndarray::Array2;
use netcdf::{AttributeValue, File, FileMut};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default name of the data variable inside each file
pub const DEFAULT_VARIABLE: &str = "data";

const ROW_DIM: &str = "y";
const COL_DIM: &str = "x";

/// A directory of single-variable NetCDF grids
#[derive(Debug, Clone)]
pub struct NetCdfStore {
    root: PathBuf,
    variable: String,
}

impl NetCdfStore {
    /// Create a store rooted at `root` using the default variable name
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_variable(root, DEFAULT_VARIABLE)
    }

    pub fn with_variable(root: impl Into<PathBuf>, variable: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            variable: variable.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the committed file for grid `name`
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.nc"))
    }

    fn staged_path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.nc.partial"))
    }

    fn open_file(&self, name: &str) -> Result<File> {
        let path = self.path_of(name);
        if !path.exists() {
            return Err(SeriesError::GridNotFound {
                name: name.to_string(),
            });
        }
        netcdf::open(&path).map_err(|e| SeriesError::OpenFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn describe(&self, name: &str, file: &File) -> Result<(GridRegion, Option<f64>)> {
        let var = file
            .variable(&self.variable)
            .ok_or_else(|| SeriesError::OpenFailed {
                name: name.to_string(),
                reason: format!("variable '{}' not found", self.variable),
            })?;

        let shape: Vec<usize> = var.dimensions().iter().map(netcdf::Dimension::len).collect();
        let &[rows, cols] = shape.as_slice() else {
            return Err(SeriesError::OpenFailed {
                name: name.to_string(),
                reason: format!(
                    "variable '{}' has {} dimensions, expected 2",
                    self.variable,
                    shape.len()
                ),
            });
        };

        let fill = var
            .attribute("_FillValue")
            .and_then(|attr| match attr.value().ok()? {
                AttributeValue::Double(v) => Some(v),
                AttributeValue::Float(v) => Some(f64::from(v)),
                AttributeValue::Int(v) => Some(f64::from(v)),
                AttributeValue::Short(v) => Some(f64::from(v)),
                _ => None,
            });

        Ok((GridRegion::new(rows, cols), fill))
    }

    /// Write a whole floating-point grid, replacing any existing one
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_grid(&self, name: &str, data: &Array2<f64>) -> Result<()> {
        let path = self.path_of(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let (rows, cols) = data.dim();
        let mut file = netcdf::create(&path)?;
        file.add_dimension(ROW_DIM, rows)?;
        file.add_dimension(COL_DIM, cols)?;
        let mut var = file.add_variable::<f64>(&self.variable, &[ROW_DIM, COL_DIM])?;
        var.put_attribute("_FillValue", NULL)?;
        var.put(data.view(), ..)?;
        Ok(())
    }

    /// Read a whole committed grid; nulls come back as NaN
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is missing or unreadable.
    pub fn read_grid(&self, name: &str) -> Result<Array2<f64>> {
        let mut reader = self.open_reader(name)?;
        let region = reader.region();
        let mut grid = Array2::from_elem((region.rows, region.cols), NULL);
        let mut row_buf = vec![NULL; region.cols];
        for (row, mut out) in grid.rows_mut().into_iter().enumerate() {
            reader.read_row(row, &mut row_buf)?;
            out.assign(&ndarray::ArrayView1::from(&row_buf));
        }
        Ok(grid)
    }

    /// Global attributes of a committed grid as strings
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is missing or unreadable.
    pub fn text_attribute(&self, name: &str, key: &str) -> Result<Option<String>> {
        let file = self.open_file(name)?;
        let Some(attr) = file.attribute(key) else {
            return Ok(None);
        };
        Ok(match attr.value()? {
            AttributeValue::Str(s) => Some(s),
            other => Some(format!("{other:?}")),
        })
    }
}

impl GridStore for NetCdfStore {
    fn region_of(&self, name: &str) -> Result<GridRegion> {
        let file = self.open_file(name)?;
        Ok(self.describe(name, &file)?.0)
    }

    fn open_reader(&self, name: &str) -> Result<Box<dyn GridReader>> {
        let file = self.open_file(name)?;
        let (region, fill) = self.describe(name, &file)?;
        Ok(Box::new(NetCdfReader {
            name: name.to_string(),
            file,
            variable: self.variable.clone(),
            region,
            fill,
            next_row: 0,
        }))
    }

    fn create_writer(
        &self,
        name: &str,
        cell_type: CellType,
        region: GridRegion,
    ) -> Result<Box<dyn GridWriter>> {
        let create_failed = |e: &dyn std::fmt::Display| SeriesError::CreateFailed {
            name: name.to_string(),
            reason: e.to_string(),
        };

        let staged = self.staged_path_of(name);
        if staged.exists() {
            fs::remove_file(&staged)?;
        }

        let file = netcdf::create(&staged).map_err(|e| create_failed(&e))?;
        let mut writer = NetCdfWriter {
            name: name.to_string(),
            file: Some(file),
            staged,
            target: self.path_of(name),
            variable: self.variable.clone(),
            cell_type,
            region,
            rows: 0,
            int_row: Vec::new(),
        };
        // From here on a failure drops `writer`, which removes the staged file.
        writer.define()?;
        debug!("staging output <{}> at {}", name, writer.staged.display());
        Ok(Box::new(writer))
    }
}

struct NetCdfReader {
    name: String,
    file: File,
    variable: String,
    region: GridRegion,
    fill: Option<f64>,
    next_row: usize,
}

impl GridReader for NetCdfReader {
    fn region(&self) -> GridRegion {
        self.region
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        if row < self.next_row {
            return Err(SeriesError::RowOutOfOrder {
                name: self.name.clone(),
                row,
                next: self.next_row,
            });
        }
        if buf.len() != self.region.cols {
            return Err(SeriesError::RowWidth {
                name: self.name.clone(),
                expected: self.region.cols,
                found: buf.len(),
            });
        }

        let var = self
            .file
            .variable(&self.variable)
            .ok_or_else(|| SeriesError::OpenFailed {
                name: self.name.clone(),
                reason: format!("variable '{}' not found", self.variable),
            })?;
        let values = var.get_values::<f64, _>((row..row + 1, 0..self.region.cols))?;

        for (dst, src) in buf.iter_mut().zip(values) {
            *dst = match self.fill {
                Some(fill) if src == fill => NULL,
                _ => src,
            };
        }
        self.next_row = row + 1;
        Ok(())
    }
}

struct NetCdfWriter {
    name: String,
    file: Option<FileMut>,
    staged: PathBuf,
    target: PathBuf,
    variable: String,
    cell_type: CellType,
    region: GridRegion,
    rows: usize,
    int_row: Vec<i32>,
}

impl NetCdfWriter {
    fn closed(&self) -> SeriesError {
        SeriesError::CreateFailed {
            name: self.name.clone(),
            reason: "output already closed".to_string(),
        }
    }

    fn define(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed());
        };
        file.add_dimension(ROW_DIM, self.region.rows)?;
        file.add_dimension(COL_DIM, self.region.cols)?;
        match self.cell_type {
            CellType::Float => {
                let mut var = file.add_variable::<f64>(&self.variable, &[ROW_DIM, COL_DIM])?;
                var.put_attribute("_FillValue", NULL)?;
            }
            CellType::Int => {
                let mut var = file.add_variable::<i32>(&self.variable, &[ROW_DIM, COL_DIM])?;
                var.put_attribute("_FillValue", INT_NULL)?;
            }
        }
        Ok(())
    }
}

impl GridWriter for NetCdfWriter {
    fn write_row(&mut self, buf: &[f64]) -> Result<()> {
        if buf.len() != self.region.cols {
            return Err(SeriesError::RowWidth {
                name: self.name.clone(),
                expected: self.region.cols,
                found: buf.len(),
            });
        }
        if self.rows >= self.region.rows {
            return Err(SeriesError::IncompleteOutput {
                name: self.name.clone(),
                written: self.rows + 1,
                expected: self.region.rows,
            });
        }

        let extents = (self.rows..self.rows + 1, 0..self.region.cols);
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed());
        };
        let mut var = file
            .variable_mut(&self.variable)
            .ok_or_else(|| SeriesError::CreateFailed {
                name: self.name.clone(),
                reason: format!("variable '{}' missing from staged file", self.variable),
            })?;
        match self.cell_type {
            CellType::Float => var.put_values(buf, extents)?,
            CellType::Int => {
                self.int_row.clear();
                self.int_row.extend(buf.iter().map(|&v| to_int_cell(v)));
                var.put_values(&self.int_row, extents)?;
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn commit(mut self: Box<Self>, provenance: &Provenance) -> Result<()> {
        if self.rows != self.region.rows {
            return Err(SeriesError::IncompleteOutput {
                name: self.name.clone(),
                written: self.rows,
                expected: self.region.rows,
            });
        }

        let Some(mut file) = self.file.take() else {
            return Err(self.closed());
        };
        file.add_attribute("history", provenance.history())?;
        file.add_attribute("source", provenance.source_list())?;
        file.add_attribute("method", provenance.method.as_str())?;
        file.add_attribute("provenance", provenance.to_json().to_string())?;
        drop(file);

        if self.target.exists() {
            fs::remove_file(&self.target)?;
        }
        fs::rename(&self.staged, &self.target)?;
        debug!("committed output <{}> to {}", self.name, self.target.display());
        Ok(())
    }
}

impl Drop for NetCdfWriter {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            if let Err(e) = fs::remove_file(&self.staged) {
                warn!("could not remove staged output {}: {}", self.staged.display(), e);
            } else {
                debug!("discarded staged output <{}>", self.name);
            }
        }
    }
}
