//! Input handle lifetime policies
//!
//! The driver only ever asks for "row R of every input". Whether the handles
//! stay open for the whole run or are reopened per row is decided once here
//! and has no effect on the values read.

use crate::errors::{Result, SeriesError};
use crate::grid::{GridReader, GridRegion, GridStore};
use crate::inputs::InputSource;
use tracing::debug;

/// How input handles are held across rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    /// Open every input before the first row, close after the last
    Eager,
    /// Open, read and close each input on every row
    Lazy,
}

impl ResourceMode {
    pub fn from_lazy_flag(lazy: bool) -> Self {
        if lazy {
            Self::Lazy
        } else {
            Self::Eager
        }
    }
}

/// Strategy for acquiring one row of one input
pub trait RowAcquisition: Send {
    /// Called once before the first row
    fn begin(&mut self, store: &dyn GridStore, inputs: &[InputSource], region: GridRegion)
        -> Result<()>;

    /// Fill `input.buf` with row `row`
    fn acquire(
        &mut self,
        store: &dyn GridStore,
        index: usize,
        input: &mut InputSource,
        row: usize,
        region: GridRegion,
    ) -> Result<()>;

    /// Release anything still held
    fn end(&mut self);

    /// Handles currently held open by the strategy
    fn open_handles(&self) -> usize;
}

fn open_checked(store: &dyn GridStore, name: &str, region: GridRegion) -> Result<Box<dyn GridReader>> {
    let reader = store.open_reader(name)?;
    let found = reader.region();
    if found != region {
        return Err(SeriesError::GeometryMismatch {
            name: name.to_string(),
            expected: region,
            found,
        });
    }
    Ok(reader)
}

/// Keeps one reader per input for the whole run
#[derive(Default)]
pub struct EagerAcquisition {
    readers: Vec<Box<dyn GridReader>>,
}

impl RowAcquisition for EagerAcquisition {
    fn begin(
        &mut self,
        store: &dyn GridStore,
        inputs: &[InputSource],
        region: GridRegion,
    ) -> Result<()> {
        self.readers.clear();
        self.readers.reserve(inputs.len());
        for input in inputs {
            debug!("opening grid <{}>", input.name);
            self.readers.push(open_checked(store, &input.name, region)?);
        }
        Ok(())
    }

    fn acquire(
        &mut self,
        _store: &dyn GridStore,
        index: usize,
        input: &mut InputSource,
        row: usize,
        _region: GridRegion,
    ) -> Result<()> {
        let reader = self
            .readers
            .get_mut(index)
            .ok_or_else(|| SeriesError::OpenFailed {
                name: input.name.clone(),
                reason: "grid was not opened before the first row".to_string(),
            })?;
        reader.read_row(row, &mut input.buf)
    }

    fn end(&mut self) {
        self.readers.clear();
    }

    fn open_handles(&self) -> usize {
        self.readers.len()
    }
}

/// Holds no handles between rows
#[derive(Debug, Default)]
pub struct LazyAcquisition;

impl RowAcquisition for LazyAcquisition {
    fn begin(
        &mut self,
        store: &dyn GridStore,
        inputs: &[InputSource],
        region: GridRegion,
    ) -> Result<()> {
        // Fail on geometry before any output is touched, without holding handles.
        for input in inputs {
            let found = store.region_of(&input.name)?;
            if found != region {
                return Err(SeriesError::GeometryMismatch {
                    name: input.name.clone(),
                    expected: region,
                    found,
                });
            }
        }
        Ok(())
    }

    fn acquire(
        &mut self,
        store: &dyn GridStore,
        _index: usize,
        input: &mut InputSource,
        row: usize,
        region: GridRegion,
    ) -> Result<()> {
        let mut reader = open_checked(store, &input.name, region)?;
        reader.read_row(row, &mut input.buf)
    }

    fn end(&mut self) {}

    fn open_handles(&self) -> usize {
        0
    }
}

/// Owns the input handles on behalf of the driver
pub struct ResourceManager<'s> {
    store: &'s dyn GridStore,
    region: GridRegion,
    strategy: Box<dyn RowAcquisition + 's>,
    started: bool,
}

impl<'s> ResourceManager<'s> {
    pub fn new(store: &'s dyn GridStore, region: GridRegion, mode: ResourceMode) -> Self {
        let strategy: Box<dyn RowAcquisition + 's> = match mode {
            ResourceMode::Eager => Box::<EagerAcquisition>::default(),
            ResourceMode::Lazy => Box::new(LazyAcquisition),
        };
        Self {
            store,
            region,
            strategy,
            started: false,
        }
    }

    /// Acquire whatever the policy holds for the run
    ///
    /// # Errors
    ///
    /// Fails if an input cannot be opened or its geometry differs from the run.
    pub fn open_all(&mut self, inputs: &[InputSource]) -> Result<()> {
        self.strategy.begin(self.store, inputs, self.region)?;
        self.started = true;
        Ok(())
    }

    /// Populate every input's buffer with row `row`
    ///
    /// # Errors
    ///
    /// Propagates open and read failures from the store.
    pub fn refresh_row(&mut self, inputs: &mut [InputSource], row: usize) -> Result<()> {
        if !self.started {
            self.open_all(inputs)?;
        }
        for (index, input) in inputs.iter_mut().enumerate() {
            self.strategy
                .acquire(self.store, index, input, row, self.region)?;
        }
        Ok(())
    }

    /// Release every held handle
    pub fn close_all(&mut self) {
        self.strategy.end();
        self.started = false;
    }

    pub fn open_handles(&self) -> usize {
        self.strategy.open_handles()
    }
}

impl Drop for ResourceManager<'_> {
    fn drop(&mut self) {
        self.strategy.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use ndarray::array;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("a", array![[1.0, 2.0], [3.0, 4.0]]);
        store.insert("b", array![[10.0, 20.0], [30.0, 40.0]]);
        store
    }

    fn inputs() -> Vec<InputSource> {
        let mut v = vec![InputSource::new("a", 1.0), InputSource::new("b", 1.0)];
        for i in &mut v {
            i.buf = vec![0.0; 2];
        }
        v
    }

    #[test]
    fn eager_holds_every_handle_until_closed() {
        let store = store();
        let mut inputs = inputs();
        let mut rm = ResourceManager::new(&store, GridRegion::new(2, 2), ResourceMode::Eager);
        rm.open_all(&inputs).unwrap();
        assert_eq!(store.open_readers(), 2);
        rm.refresh_row(&mut inputs, 0).unwrap();
        rm.refresh_row(&mut inputs, 1).unwrap();
        assert_eq!(inputs[1].buf, vec![30.0, 40.0]);
        rm.close_all();
        assert_eq!(store.open_readers(), 0);
        assert_eq!(store.peak_open_readers(), 2);
    }

    #[test]
    fn lazy_never_holds_more_than_one_handle() {
        let store = store();
        let mut inputs = inputs();
        let mut rm = ResourceManager::new(&store, GridRegion::new(2, 2), ResourceMode::Lazy);
        rm.open_all(&inputs).unwrap();
        assert_eq!(store.open_readers(), 0);
        rm.refresh_row(&mut inputs, 1).unwrap();
        assert_eq!(inputs[0].buf, vec![3.0, 4.0]);
        assert_eq!(store.open_readers(), 0);
        assert_eq!(store.peak_open_readers(), 1);
        assert_eq!(rm.open_handles(), 0);
    }

    #[test]
    fn geometry_mismatch_is_fatal_in_both_modes() {
        let store = store();
        store.insert("wide", array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mut inputs = inputs();
        inputs.push(InputSource::new("wide", 1.0));

        for mode in [ResourceMode::Eager, ResourceMode::Lazy] {
            let mut rm = ResourceManager::new(&store, GridRegion::new(2, 2), mode);
            let err = rm.open_all(&inputs).unwrap_err();
            assert!(matches!(err, SeriesError::GeometryMismatch { ref name, .. } if name == "wide"));
        }
    }

    #[test]
    fn eager_rows_must_ascend() {
        let store = store();
        let mut inputs = inputs();
        let mut rm = ResourceManager::new(&store, GridRegion::new(2, 2), ResourceMode::Eager);
        rm.refresh_row(&mut inputs, 1).unwrap();
        let err = rm.refresh_row(&mut inputs, 0).unwrap_err();
        assert!(matches!(err, SeriesError::RowOutOfOrder { .. }));
    }
}
