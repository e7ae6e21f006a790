//! In-memory grid store
//!
//! Useful for embedding the engine and for tests. Grids are plain
//! `Array2<f64>` values; integer outputs are rounded through the same cell
//! encoding a file backend would use. The store counts open readers so the
//! effect of the resource policy can be observed, and can simulate a
//! descriptor limit.

use crate::errors::{Result, SeriesError};
use crate::grid::{
    from_int_cell, to_int_cell, CellType, GridReader, GridRegion, GridStore, GridWriter,
};
use crate::metadata::Provenance;
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A committed grid
#[derive(Debug, Clone)]
pub struct StoredGrid {
    pub data: Arc<Array2<f64>>,
    pub cell_type: CellType,
    pub provenance: Option<Provenance>,
}

impl StoredGrid {
    fn region(&self) -> GridRegion {
        let (rows, cols) = self.data.dim();
        GridRegion::new(rows, cols)
    }
}

#[derive(Debug, Default)]
struct Counters {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened_total: AtomicUsize,
}

impl Counters {
    fn acquire(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Thread-safe map of named grids
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    grids: Arc<Mutex<HashMap<String, StoredGrid>>>,
    counters: Arc<Counters>,
    open_limit: Arc<Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn grids(&self) -> MutexGuard<'_, HashMap<String, StoredGrid>> {
        // A poisoned map only means a test thread panicked mid-insert.
        self.grids
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add or replace a floating-point input grid; NaN marks null cells
    pub fn insert(&self, name: &str, data: Array2<f64>) {
        self.grids().insert(
            name.to_string(),
            StoredGrid {
                data: Arc::new(data),
                cell_type: CellType::Float,
                provenance: None,
            },
        );
    }

    /// A committed grid, if present
    pub fn get(&self, name: &str) -> Option<StoredGrid> {
        self.grids().get(name).cloned()
    }

    /// Just the cell values of a committed grid
    pub fn data(&self, name: &str) -> Option<Array2<f64>> {
        self.get(name).map(|g| g.data.as_ref().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.grids().contains_key(name)
    }

    /// Readers currently open
    pub fn open_readers(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open readers so far
    pub fn peak_open_readers(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Readers opened over the store's lifetime
    pub fn total_opens(&self) -> usize {
        self.counters.opened_total.load(Ordering::SeqCst)
    }

    /// Refuse to open more than `limit` readers at once
    pub fn set_open_limit(&self, limit: Option<usize>) {
        *self
            .open_limit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = limit;
    }

    fn check_limit(&self, name: &str) -> Result<()> {
        let limit = *self
            .open_limit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match limit {
            Some(limit) if self.open_readers() >= limit => Err(SeriesError::OpenFailed {
                name: name.to_string(),
                reason: format!("too many open grids (limit {limit})"),
            }),
            _ => Ok(()),
        }
    }
}

impl GridStore for MemoryStore {
    fn region_of(&self, name: &str) -> Result<GridRegion> {
        self.grids()
            .get(name)
            .map(StoredGrid::region)
            .ok_or_else(|| SeriesError::GridNotFound {
                name: name.to_string(),
            })
    }

    fn open_reader(&self, name: &str) -> Result<Box<dyn GridReader>> {
        let grid = self.get(name).ok_or_else(|| SeriesError::GridNotFound {
            name: name.to_string(),
        })?;
        self.check_limit(name)?;
        self.counters.acquire();
        Ok(Box::new(MemoryReader {
            name: name.to_string(),
            data: grid.data,
            next_row: 0,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn create_writer(
        &self,
        name: &str,
        cell_type: CellType,
        region: GridRegion,
    ) -> Result<Box<dyn GridWriter>> {
        if name.trim().is_empty() {
            return Err(SeriesError::CreateFailed {
                name: name.to_string(),
                reason: "empty grid name".to_string(),
            });
        }
        Ok(Box::new(MemoryWriter {
            name: name.to_string(),
            cell_type,
            region,
            cells: Vec::with_capacity(region.cells()),
            rows: 0,
            grids: Arc::clone(&self.grids),
        }))
    }
}

struct MemoryReader {
    name: String,
    data: Arc<Array2<f64>>,
    next_row: usize,
    counters: Arc<Counters>,
}

impl GridReader for MemoryReader {
    fn region(&self) -> GridRegion {
        let (rows, cols) = self.data.dim();
        GridRegion::new(rows, cols)
    }

    fn read_row(&mut self, row: usize, buf: &mut [f64]) -> Result<()> {
        if row < self.next_row {
            return Err(SeriesError::RowOutOfOrder {
                name: self.name.clone(),
                row,
                next: self.next_row,
            });
        }
        let region = self.region();
        if buf.len() != region.cols {
            return Err(SeriesError::RowWidth {
                name: self.name.clone(),
                expected: region.cols,
                found: buf.len(),
            });
        }
        if row >= region.rows {
            return Err(SeriesError::GeometryMismatch {
                name: self.name.clone(),
                expected: GridRegion::new(row + 1, region.cols),
                found: region,
            });
        }
        for (dst, src) in buf.iter_mut().zip(self.data.row(row)) {
            *dst = *src;
        }
        self.next_row = row + 1;
        Ok(())
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.counters.release();
    }
}

struct MemoryWriter {
    name: String,
    cell_type: CellType,
    region: GridRegion,
    cells: Vec<f64>,
    rows: usize,
    grids: Arc<Mutex<HashMap<String, StoredGrid>>>,
}

impl GridWriter for MemoryWriter {
    fn write_row(&mut self, buf: &[f64]) -> Result<()> {
        if buf.len() != self.region.cols {
            return Err(SeriesError::RowWidth {
                name: self.name.clone(),
                expected: self.region.cols,
                found: buf.len(),
            });
        }
        match self.cell_type {
            CellType::Float => self.cells.extend_from_slice(buf),
            CellType::Int => self
                .cells
                .extend(buf.iter().map(|&v| from_int_cell(to_int_cell(v)))),
        }
        self.rows += 1;
        Ok(())
    }

    fn commit(self: Box<Self>, provenance: &Provenance) -> Result<()> {
        let writer = *self;
        if writer.rows != writer.region.rows {
            return Err(SeriesError::IncompleteOutput {
                name: writer.name,
                written: writer.rows,
                expected: writer.region.rows,
            });
        }
        let data = Array2::from_shape_vec((writer.region.rows, writer.region.cols), writer.cells)
            .map_err(|e| SeriesError::CreateFailed {
                name: writer.name.clone(),
                reason: e.to_string(),
            })?;
        writer
            .grids
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                writer.name,
                StoredGrid {
                    data: Arc::new(data),
                    cell_type: writer.cell_type,
                    provenance: Some(provenance.clone()),
                },
            );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{is_null, NULL};
    use ndarray::array;

    fn provenance() -> Provenance {
        Provenance::new("out", "count", None, Vec::new(), "test")
    }

    #[test]
    fn writer_is_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut w = store
            .create_writer("out", CellType::Int, GridRegion::new(1, 3))
            .unwrap();
        w.write_row(&[1.4, NULL, 2.6]).unwrap();
        assert!(!store.contains("out"));
        w.commit(&provenance()).unwrap();

        let grid = store.get("out").unwrap();
        assert_eq!(grid.cell_type, CellType::Int);
        assert_eq!(grid.data[[0, 0]], 1.0);
        assert!(is_null(grid.data[[0, 1]]));
        assert_eq!(grid.data[[0, 2]], 3.0);
        assert_eq!(grid.provenance.unwrap().method, "count");
    }

    #[test]
    fn dropped_writer_leaves_nothing() {
        let store = MemoryStore::new();
        {
            let mut w = store
                .create_writer("out", CellType::Float, GridRegion::new(2, 1))
                .unwrap();
            w.write_row(&[1.0]).unwrap();
        }
        assert!(!store.contains("out"));
    }

    #[test]
    fn short_output_cannot_commit() {
        let store = MemoryStore::new();
        let mut w = store
            .create_writer("out", CellType::Float, GridRegion::new(2, 1))
            .unwrap();
        w.write_row(&[1.0]).unwrap();
        let err = w.commit(&provenance()).unwrap_err();
        assert!(matches!(err, SeriesError::IncompleteOutput { written: 1, expected: 2, .. }));
        assert!(!store.contains("out"));
    }

    #[test]
    fn open_limit_simulates_descriptor_exhaustion() {
        let store = MemoryStore::new();
        store.insert("a", array![[1.0]]);
        store.insert("b", array![[2.0]]);
        store.set_open_limit(Some(1));
        let first = store.open_reader("a").unwrap();
        let err = store.open_reader("b").err().unwrap();
        assert!(matches!(err, SeriesError::OpenFailed { .. }));
        drop(first);
        assert!(store.open_reader("b").is_ok());
        assert_eq!(store.total_opens(), 2);
    }

    #[test]
    fn missing_grid_is_reported() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.region_of("nope"),
            Err(SeriesError::GridNotFound { .. })
        ));
    }
}
