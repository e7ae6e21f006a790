//! Output grids, their bound methods and row buffers

use crate::errors::{Result, SeriesError};
use crate::grid::{CellType, GridRegion, GridStore, GridWriter, NULL};
use crate::metadata::{Provenance, SourceRecord};
use crate::statistics::Method;
use std::collections::HashSet;
use tracing::{debug, info};

/// One requested statistic and where it goes
pub struct OutputSink {
    pub name: String,
    pub method: Method,
    /// Method parameter, e.g. the quantile fraction; 0.0 when not given
    pub parameter: f64,
    pub cell_type: CellType,
    /// Current output row; reused for every row
    pub buf: Vec<f64>,
    writer: Option<Box<dyn GridWriter>>,
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("parameter", &self.parameter)
            .field("cell_type", &self.cell_type)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

/// The ordered set of outputs
#[derive(Debug, Default)]
pub struct OutputSet {
    sinks: Vec<OutputSink>,
}

impl OutputSet {
    /// Pair outputs with methods positionally and resolve the methods
    ///
    /// # Errors
    ///
    /// Fails if the lists are empty or differ in length, an output name
    /// repeats, a method is unknown, or a quantile lies outside 0.0-1.0.
    pub fn configure<S, M>(names: &[S], methods: &[M], parameters: Option<&[f64]>) -> Result<Self>
    where
        S: AsRef<str>,
        M: AsRef<str>,
    {
        if names.len() != methods.len() {
            return Err(SeriesError::CountMismatch {
                left: "output",
                right: "method",
                left_len: names.len(),
                right_len: methods.len(),
            });
        }

        if names.is_empty() {
            return Err(SeriesError::NoOutputs);
        }

        let mut seen = HashSet::with_capacity(names.len());
        let mut sinks = Vec::with_capacity(names.len());
        for (i, (name, method)) in names.iter().zip(methods).enumerate() {
            let name = name.as_ref().trim().to_string();
            if !seen.insert(name.clone()) {
                return Err(SeriesError::DuplicateOutput { name });
            }
            let method = Method::from_name(method.as_ref())?;
            let parameter = parameters.and_then(|p| p.get(i).copied()).unwrap_or(0.0);

            if method.takes_parameter() && !(0.0..=1.0).contains(&parameter) {
                return Err(SeriesError::InvalidQuantile {
                    output: name,
                    value: parameter,
                });
            }

            debug!("output <{}> uses method {}", name, method.name());
            sinks.push(OutputSink {
                name,
                method,
                parameter,
                cell_type: method.result_kind().cell_type(),
                buf: Vec::new(),
                writer: None,
            });
        }
        Ok(Self { sinks })
    }

    /// Size every row buffer to the run's column count
    pub fn allocate(&mut self, cols: usize) {
        for sink in &mut self.sinks {
            sink.buf.clear();
            sink.buf.resize(cols, NULL);
        }
    }

    /// Create one writer per output with its declared element type
    ///
    /// # Errors
    ///
    /// Fails if the store cannot create any of the outputs; writers already
    /// created are discarded.
    pub fn open(&mut self, store: &dyn GridStore, region: GridRegion) -> Result<()> {
        for i in 0..self.sinks.len() {
            let sink = &self.sinks[i];
            match store.create_writer(&sink.name, sink.cell_type, region) {
                Ok(writer) => self.sinks[i].writer = Some(writer),
                Err(e) => {
                    self.discard();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Append the current buffers as the next row of every output
    ///
    /// # Errors
    ///
    /// Propagates write failures from the store.
    pub fn write_row(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            let writer = sink.writer.as_mut().ok_or_else(|| SeriesError::CreateFailed {
                name: sink.name.clone(),
                reason: "output was not opened".to_string(),
            })?;
            writer.write_row(&sink.buf)?;
        }
        Ok(())
    }

    /// Commit every output with its provenance
    ///
    /// # Errors
    ///
    /// The first failed commit aborts; outputs not yet committed are discarded.
    pub fn finalize(&mut self, sources: &[SourceRecord], command: &str) -> Result<usize> {
        let mut committed = 0;
        for sink in &mut self.sinks {
            let Some(writer) = sink.writer.take() else {
                continue;
            };
            let quantile = sink.method.takes_parameter().then_some(sink.parameter);
            let provenance = Provenance::new(
                &sink.name,
                sink.method.name(),
                quantile,
                sources.to_vec(),
                command,
            );
            writer.commit(&provenance)?;
            info!("wrote output <{}> ({})", sink.name, sink.method.name());
            committed += 1;
        }
        Ok(committed)
    }

    /// Drop every open writer without committing
    pub fn discard(&mut self) {
        for sink in &mut self.sinks {
            if sink.writer.take().is_some() {
                debug!("discarded output <{}>", sink.name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sinks(&self) -> &[OutputSink] {
        &self.sinks
    }

    pub fn sinks_mut(&mut self) -> &mut [OutputSink] {
        &mut self.sinks
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn outputs_and_methods_must_pair_up() {
        let err = OutputSet::configure(&["a", "b"], &["average"], None).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::CountMismatch {
                left: "output",
                right: "method",
                left_len: 2,
                right_len: 1,
            }
        ));
    }

    #[test]
    fn unknown_method_names_offender() {
        let err = OutputSet::configure(&["a", "b"], &["sum", "meadian"], None).unwrap_err();
        assert_eq!(err.to_string(), "unknown method <meadian>");
    }

    #[test]
    fn repeated_output_name_is_rejected() {
        let err = OutputSet::configure(&["x", " x"], &["sum", "count"], None).unwrap_err();
        assert!(matches!(err, SeriesError::DuplicateOutput { ref name } if name == "x"));
        assert_eq!(err.to_string(), "output <x> is given more than once");
    }

    #[test]
    fn at_least_one_output_is_required() {
        let names: [&str; 0] = [];
        let err = OutputSet::configure(&names, &names, None).unwrap_err();
        assert!(matches!(err, SeriesError::NoOutputs));
        assert!(err.is_configuration());
    }

    #[test]
    fn element_type_follows_method() {
        let set = OutputSet::configure(&["n", "avg"], &["count", "average"], None).unwrap();
        assert_eq!(set.sinks()[0].cell_type, CellType::Int);
        assert_eq!(set.sinks()[1].cell_type, CellType::Float);
    }

    #[test]
    fn missing_parameters_default_to_zero() {
        let set = OutputSet::configure(
            &["q", "p", "r"],
            &["quantile", "quantile", "sum"],
            Some(&[0.3][..]),
        )
        .unwrap();
        let params: Vec<f64> = set.sinks().iter().map(|s| s.parameter).collect();
        assert_eq!(params, vec![0.3, 0.0, 0.0]);
    }

    #[test]
    fn quantile_outside_unit_interval_is_rejected() {
        let err = OutputSet::configure(&["q"], &["quantile"], Some(&[1.5][..])).unwrap_err();
        assert!(matches!(err, SeriesError::InvalidQuantile { .. }));
    }

    #[test]
    fn discard_leaves_no_outputs() {
        let store = MemoryStore::new();
        let mut set = OutputSet::configure(&["a"], &["sum"], None).unwrap();
        set.allocate(2);
        set.open(&store, GridRegion::new(1, 2)).unwrap();
        set.write_row().unwrap();
        drop(set);
        assert!(!store.contains("a"));
    }

    #[test]
    fn finalize_commits_with_provenance() {
        let store = MemoryStore::new();
        let mut set = OutputSet::configure(&["q"], &["quantile"], Some(&[0.9][..])).unwrap();
        set.allocate(1);
        set.open(&store, GridRegion::new(1, 1)).unwrap();
        set.sinks_mut()[0].buf[0] = 4.0;
        set.write_row().unwrap();
        let sources = vec![SourceRecord {
            name: "in".to_string(),
            weight: 1.0,
        }];
        assert_eq!(set.finalize(&sources, "rseries test").unwrap(), 1);

        let grid = store.get("q").unwrap();
        let provenance = grid.provenance.unwrap();
        assert_eq!(provenance.quantile, Some(0.9));
        assert_eq!(provenance.source_list(), "in");
    }
}
