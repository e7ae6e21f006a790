//! Run configuration
//!
//! Everything the driver needs is collected into a [`SeriesConfig`] once, before
//! any grid is opened. Cross-field rules that can be checked without touching
//! storage are enforced here.

use crate::errors::{Result, SeriesError};
use crate::grid::is_null;
use std::path::PathBuf;

/// Where the list of input grids comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InputSpec {
    /// Explicit names with an optional parallel weight list
    Names {
        names: Vec<String>,
        weights: Option<Vec<f64>>,
    },
    /// Line-oriented `name` or `name|weight` records
    Manifest(ManifestSource),
}

impl InputSpec {
    /// Pick the input form, requiring exactly one of the two
    ///
    /// # Errors
    ///
    /// Fails when both or neither of `names` and `manifest` are given, or
    /// when weights accompany a manifest.
    pub fn resolve(
        names: Option<Vec<String>>,
        weights: Option<Vec<f64>>,
        manifest: Option<ManifestSource>,
    ) -> Result<Self> {
        match (names, manifest) {
            (Some(_), Some(_)) => Err(SeriesError::ConflictingInputSources),
            (None, None) => Err(SeriesError::MissingInputSource),
            (Some(names), None) => Ok(Self::Names { names, weights }),
            (None, Some(_)) if weights.is_some() => Err(SeriesError::WeightsWithManifest),
            (None, Some(source)) => Ok(Self::Manifest(source)),
        }
    }
}

/// A manifest location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Path(PathBuf),
    Stdin,
}

impl ManifestSource {
    /// `-` means standard input, anything else is a path
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Stdin => "-".to_string(),
        }
    }
}

/// Closed interval of accepted sample values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    lo: f64,
    hi: f64,
}

impl ValueRange {
    /// # Errors
    ///
    /// Rejects non-finite bounds and `lo > hi`.
    pub fn new(lo: f64, hi: f64) -> Result<Self> {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(SeriesError::InvalidRange {
                lo,
                hi,
                reason: "bounds must be finite",
            });
        }
        if lo > hi {
            return Err(SeriesError::InvalidRange {
                lo,
                hi,
                reason: "lo is greater than hi",
            });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        !is_null(value) && value >= self.lo && value <= self.hi
    }
}

/// Process-wide settings for one run
#[derive(Debug, Clone)]
pub struct SeriesConfig {
    pub inputs: InputSpec,
    pub outputs: Vec<String>,
    pub methods: Vec<String>,
    pub quantiles: Option<Vec<f64>>,
    pub range: Option<ValueRange>,
    /// Any null input forces a null output without calling the method
    pub propagate_nulls: bool,
    /// Open, read and close every input on every row
    pub lazy: bool,
    /// Worker threads for per-row column work; `None` keeps the rayon default
    pub threads: Option<usize>,
    /// Free-form description recorded in output provenance
    pub command: String,
}

impl SeriesConfig {
    pub fn builder() -> SeriesConfigBuilder {
        SeriesConfigBuilder::default()
    }
}

/// Builder mirroring the command-line surface
#[derive(Debug, Default)]
pub struct SeriesConfigBuilder {
    names: Option<Vec<String>>,
    weights: Option<Vec<f64>>,
    manifest: Option<ManifestSource>,
    outputs: Vec<String>,
    methods: Vec<String>,
    quantiles: Option<Vec<f64>>,
    range: Option<(f64, f64)>,
    propagate_nulls: bool,
    lazy: bool,
    threads: Option<usize>,
    command: Option<String>,
}

impl SeriesConfigBuilder {
    pub fn inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn manifest(mut self, source: ManifestSource) -> Self {
        self.manifest = Some(source);
        self
    }

    /// Add one output bound to a method
    pub fn output(mut self, name: impl Into<String>, method: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self.methods.push(method.into());
        self
    }

    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = Some(quantiles);
        self
    }

    pub fn range(mut self, lo: f64, hi: f64) -> Self {
        self.range = Some((lo, hi));
        self
    }

    pub fn propagate_nulls(mut self, on: bool) -> Self {
        self.propagate_nulls = on;
        self
    }

    pub fn lazy(mut self, on: bool) -> Self {
        self.lazy = on;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// # Errors
    ///
    /// Fails on conflicting input forms or an invalid range.
    pub fn build(self) -> Result<SeriesConfig> {
        let inputs = InputSpec::resolve(self.names, self.weights, self.manifest)?;
        let range = self
            .range
            .map(|(lo, hi)| ValueRange::new(lo, hi))
            .transpose()?;
        let command = self
            .command
            .unwrap_or_else(|| format!("rseries method={}", self.methods.join(",")));

        Ok(SeriesConfig {
            inputs,
            outputs: self.outputs,
            methods: self.methods,
            quantiles: self.quantiles,
            range,
            propagate_nulls: self.propagate_nulls,
            lazy: self.lazy,
            threads: self.threads,
            command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NULL;

    #[test]
    fn exactly_one_input_form() {
        let both = InputSpec::resolve(
            Some(vec!["a".to_string()]),
            None,
            Some(ManifestSource::Stdin),
        );
        assert!(matches!(both, Err(SeriesError::ConflictingInputSources)));

        let neither = InputSpec::resolve(None, None, None);
        assert!(matches!(neither, Err(SeriesError::MissingInputSource)));

        let weighted_manifest =
            InputSpec::resolve(None, Some(vec![5.0]), Some(ManifestSource::Stdin));
        assert!(matches!(
            weighted_manifest,
            Err(SeriesError::WeightsWithManifest)
        ));
    }

    #[test]
    fn dash_selects_stdin() {
        assert_eq!(ManifestSource::parse("-"), ManifestSource::Stdin);
        assert_eq!(
            ManifestSource::parse("list.txt"),
            ManifestSource::Path(PathBuf::from("list.txt"))
        );
    }

    #[test]
    fn range_is_closed_and_rejects_null() {
        let r = ValueRange::new(0.0, 10.0).unwrap();
        assert!(r.contains(0.0));
        assert!(r.contains(10.0));
        assert!(!r.contains(10.5));
        assert!(!r.contains(NULL));
        assert!(ValueRange::new(5.0, 1.0).is_err());
        assert!(ValueRange::new(f64::NEG_INFINITY, 1.0).is_err());
    }

    #[test]
    fn builder_pairs_outputs_with_methods() {
        let config = SeriesConfig::builder()
            .inputs(["a", "b"])
            .output("avg", "average")
            .output("n", "count")
            .range(0.0, 1.0)
            .lazy(true)
            .build()
            .unwrap();
        assert_eq!(config.outputs, vec!["avg", "n"]);
        assert_eq!(config.methods, vec!["average", "count"]);
        assert!(config.lazy);
        assert!(!config.propagate_nulls);
        assert_eq!(config.command, "rseries method=average,count");
    }
}
