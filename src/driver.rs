//! Row-streaming driver
//!
//! For every row: refresh all input buffers through the resource manager,
//! build the weighted and range-filtered sample vector of each column, hand a
//! private copy of it to every output's method, and append the results.
//! Memory stays at one row per input and output plus two column-major scratch
//! rows, independent of the number of rows.

use crate::config::{SeriesConfig, ValueRange};
use crate::errors::Result;
use crate::grid::{is_null, GridRegion, GridStore, NULL};
use crate::inputs::{InputSet, InputSource};
use crate::outputs::{OutputSet, OutputSink};
use crate::parallel::{in_pool, ParallelConfig};
use crate::resources::{ResourceManager, ResourceMode};
use crate::statistics::Reducer;
use rayon::prelude::*;
use tracing::{debug, info};

/// What a completed run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub region: GridRegion,
    pub inputs: usize,
    pub outputs: usize,
    pub mode: ResourceMode,
}

/// Per-row scratch shared by all outputs
///
/// `weighted` holds `cols` chunks of `n` samples, one chunk per column, in
/// input order. Nulls stay in place so methods see input positions.
/// `work` has the same layout and receives the copy each method may reorder.
/// Both are allocated once per run.
#[derive(Debug)]
pub struct ColumnScratch {
    n: usize,
    weighted: Vec<f64>,
    work: Vec<f64>,
    any_null: Vec<bool>,
}

impl ColumnScratch {
    pub fn new(n: usize, cols: usize) -> Self {
        Self {
            n,
            weighted: vec![NULL; n * cols],
            work: vec![NULL; n * cols],
            any_null: vec![false; cols],
        }
    }

    /// Weighted samples of column `col`
    pub fn column(&self, col: usize) -> &[f64] {
        &self.weighted[col * self.n..(col + 1) * self.n]
    }

    /// Whether any raw sample of column `col` was null or out of range
    pub fn has_null(&self, col: usize) -> bool {
        self.any_null[col]
    }

    /// Resolve nulls and the range filter, then apply weights
    pub fn fill(&mut self, sources: &[InputSource], range: Option<ValueRange>) {
        let n = self.n;
        self.weighted
            .par_chunks_mut(n)
            .zip(self.any_null.par_iter_mut())
            .enumerate()
            .for_each(|(col, (values, any_null))| {
                *any_null = false;
                for (slot, input) in values.iter_mut().zip(sources) {
                    let mut v = input.buf[col];
                    if is_null(v) {
                        *any_null = true;
                    } else if range.is_some_and(|r| !r.contains(v)) {
                        v = NULL;
                        *any_null = true;
                    }
                    *slot = v * input.weight;
                }
            });
    }

    /// Run one output's method over every column of the current row
    pub fn reduce_into(&mut self, sink: &mut OutputSink, propagate_nulls: bool) {
        let n = self.n;
        let method = sink.method;
        let parameter = sink.parameter;
        sink.buf
            .par_iter_mut()
            .zip(self.work.par_chunks_mut(n))
            .zip(self.weighted.par_chunks(n))
            .zip(self.any_null.par_iter())
            .for_each(|(((cell, values), column), &any_null)| {
                *cell = if any_null && propagate_nulls {
                    NULL
                } else {
                    values.copy_from_slice(column);
                    method.reduce(values, n, parameter).unwrap_or(NULL)
                };
            });
    }
}

/// Drives one run of the engine against a grid store
pub struct SeriesDriver<'s> {
    store: &'s dyn GridStore,
    config: SeriesConfig,
}

impl<'s> SeriesDriver<'s> {
    pub fn new(store: &'s dyn GridStore, config: SeriesConfig) -> Self {
        Self { store, config }
    }

    /// Execute the run
    ///
    /// Configuration is validated in full before any grid is opened. On any
    /// error, outputs created so far are discarded.
    ///
    /// # Errors
    ///
    /// Any configuration, geometry, resource or storage failure.
    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let mut inputs = InputSet::configure(&config.inputs)?;
        let mut outputs = OutputSet::configure(
            &config.outputs,
            &config.methods,
            config.quantiles.as_deref(),
        )?;
        let pool = ParallelConfig::new(config.threads).build_pool()?;

        let first = inputs.sources()[0].name.as_str();
        let region = self.store.region_of(first)?;
        let mode = ResourceMode::from_lazy_flag(config.lazy);
        info!(
            "processing {} inputs into {} outputs over {} cells ({:?} handles)",
            inputs.len(),
            outputs.len(),
            region,
            mode
        );

        inputs.allocate(region.cols);
        outputs.allocate(region.cols);

        let mut resources = ResourceManager::new(self.store, region, mode);
        resources.open_all(inputs.sources())?;
        outputs.open(self.store, region)?;

        let mut scratch = ColumnScratch::new(inputs.len(), region.cols);
        let step = (region.rows / 10).max(1);

        for row in 0..region.rows {
            if row % step == 0 {
                info!("{}% complete", row * 100 / region.rows);
            }
            resources.refresh_row(inputs.sources_mut(), row)?;

            in_pool(pool.as_ref(), || {
                scratch.fill(inputs.sources(), config.range);
                for sink in outputs.sinks_mut() {
                    scratch.reduce_into(sink, config.propagate_nulls);
                }
            });

            outputs.write_row()?;
        }
        resources.close_all();
        debug!("closed all input grids");

        let committed = outputs.finalize(&inputs.records(), &config.command)?;
        info!("100% complete: {} rows written to {} outputs", region.rows, committed);

        Ok(RunSummary {
            region,
            inputs: inputs.len(),
            outputs: committed,
            mode,
        })
    }
}

/// Convenience wrapper around [`SeriesDriver`]
///
/// # Errors
///
/// See [`SeriesDriver::run`].
pub fn run_series(store: &dyn GridStore, config: SeriesConfig) -> Result<RunSummary> {
    SeriesDriver::new(store, config).run()
}
