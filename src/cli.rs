//! Defines command-line interface options using `clap` for the rseries tool.

use crate::config::{InputSpec, ManifestSource, SeriesConfig, ValueRange};
use crate::errors::Result;
use crate::netcdf_io::DEFAULT_VARIABLE;
use clap::Parser;
use std::path::PathBuf;

/// Makes each output cell a function of the corresponding cells of the input grids
#[derive(Parser, Debug)]
#[command(
    version,
    name = "rseries",
    about = "Cell-wise aggregation across a series of NetCDF grids"
)]
pub struct Args {
    /// Input grid names, comma separated
    #[arg(short, long, value_delimiter = ',', conflicts_with = "file")]
    pub input: Option<Vec<String>>,

    /// File with one grid name and optional weight per line (name|weight); `-` reads stdin
    #[arg(short, long)]
    pub file: Option<String>,

    /// Weighting factor per input grid, default 1.0 each
    #[arg(long, value_delimiter = ',', requires = "input")]
    pub weights: Option<Vec<f64>>,

    /// Output grid names, comma separated
    #[arg(short, long, value_delimiter = ',', required_unless_present = "list_methods")]
    pub output: Vec<String>,

    /// Aggregate method per output, comma separated
    #[arg(short, long, value_delimiter = ',', required_unless_present = "list_methods")]
    pub method: Vec<String>,

    /// Quantile per output for method=quantile (0.0-1.0)
    #[arg(short, long, value_delimiter = ',')]
    pub quantile: Option<Vec<f64>>,

    /// Ignore values outside this range, formatted as <lo>,<hi>
    #[arg(long, value_parser = parse_range, allow_hyphen_values = true)]
    pub range: Option<(f64, f64)>,

    /// Propagate nulls: any null input makes the output cell null
    #[arg(short = 'n', long)]
    pub propagate_nulls: bool,

    /// Do not keep input files open between rows
    #[arg(short = 'z', long)]
    pub lazy: bool,

    /// Directory holding the NetCDF grids
    #[arg(short, long, default_value = ".")]
    pub store: PathBuf,

    /// Name of the data variable inside each NetCDF file
    #[arg(long, default_value = DEFAULT_VARIABLE)]
    pub variable: String,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// List the available methods and exit
    #[arg(long)]
    pub list_methods: bool,
}

impl Args {
    /// Turn parsed arguments into a run configuration
    ///
    /// # Errors
    ///
    /// Fails on conflicting or missing input forms and on an invalid range.
    pub fn to_config(&self, command: &str) -> Result<SeriesConfig> {
        let inputs = InputSpec::resolve(
            self.input.clone(),
            self.weights.clone(),
            self.file.as_deref().map(ManifestSource::parse),
        )?;
        let range = self
            .range
            .map(|(lo, hi)| ValueRange::new(lo, hi))
            .transpose()?;

        Ok(SeriesConfig {
            inputs,
            outputs: self.output.clone(),
            methods: self.method.clone(),
            quantiles: self.quantile.clone(),
            range,
            propagate_nulls: self.propagate_nulls,
            lazy: self.lazy,
            threads: self.threads,
            command: command.to_string(),
        })
    }
}

fn parse_range(s: &str) -> std::result::Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    match parts.as_slice() {
        [lo, hi] => {
            let lo = lo
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid lower bound '{lo}'"))?;
            let hi = hi
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid upper bound '{hi}'"))?;
            Ok((lo, hi))
        }
        _ => Err("Invalid format: Expected '<lo>,<hi>'.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SeriesError;

    #[test]
    fn parses_full_invocation() {
        let args = Args::try_parse_from([
            "rseries",
            "--input",
            "a,b,c",
            "--weights",
            "1,2,0.5",
            "--output",
            "avg,q",
            "--method",
            "average,quantile",
            "--quantile",
            "0,0.25",
            "--range",
            "-10,40",
            "-n",
            "-z",
        ])
        .unwrap();

        assert_eq!(args.input.as_deref().unwrap(), &["a", "b", "c"]);
        assert_eq!(args.range, Some((-10.0, 40.0)));
        assert!(args.propagate_nulls && args.lazy);

        let config = args.to_config("rseries test").unwrap();
        assert_eq!(
            config.inputs,
            InputSpec::Names {
                names: vec!["a".into(), "b".into(), "c".into()],
                weights: Some(vec![1.0, 2.0, 0.5]),
            }
        );
        assert_eq!(config.quantiles, Some(vec![0.0, 0.25]));
        assert_eq!(config.range.unwrap().lo(), -10.0);
    }

    #[test]
    fn input_and_file_conflict() {
        let parsed = Args::try_parse_from([
            "rseries", "-i", "a", "-f", "list.txt", "-o", "x", "-m", "sum",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn neither_input_form_is_a_configuration_error() {
        let args = Args::try_parse_from(["rseries", "-o", "x", "-m", "sum"]).unwrap();
        let err = args.to_config("rseries").unwrap_err();
        assert!(matches!(err, SeriesError::MissingInputSource));
    }

    #[test]
    fn stdin_manifest() {
        let args = Args::try_parse_from(["rseries", "-f", "-", "-o", "x", "-m", "sum"]).unwrap();
        let config = args.to_config("rseries").unwrap();
        assert_eq!(config.inputs, InputSpec::Manifest(ManifestSource::Stdin));
    }

    #[test]
    fn list_methods_needs_no_outputs() {
        let args = Args::try_parse_from(["rseries", "--list-methods"]).unwrap();
        assert!(args.list_methods);
    }

    #[test]
    fn range_parser() {
        assert_eq!(parse_range("0,1.5"), Ok((0.0, 1.5)));
        assert!(parse_range("0").is_err());
        assert!(parse_range("a,1").is_err());
    }
}
