//! Input grids, their weights and their row buffers

use crate::config::{InputSpec, ManifestSource};
use crate::errors::{Result, SeriesError};
use crate::metadata::SourceRecord;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::{debug, info};

/// One input grid taking part in the run
#[derive(Debug, Clone)]
pub struct InputSource {
    pub name: String,
    pub weight: f64,
    /// Current row, one sample per column; reused for every row
    pub buf: Vec<f64>,
}

impl InputSource {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            buf: Vec::new(),
        }
    }
}

/// The ordered set of inputs; order is significant to positional methods
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    sources: Vec<InputSource>,
}

impl InputSet {
    /// Build from whichever input form the configuration selected
    ///
    /// # Errors
    ///
    /// See [`InputSet::from_names`] and [`InputSet::from_manifest`].
    pub fn configure(spec: &InputSpec) -> Result<Self> {
        match spec {
            InputSpec::Names { names, weights } => {
                Self::from_names(names.as_slice(), weights.as_deref())
            }
            InputSpec::Manifest(ManifestSource::Stdin) => {
                let stdin = io::stdin();
                Self::from_manifest(stdin.lock(), "-")
            }
            InputSpec::Manifest(ManifestSource::Path(path)) => {
                let file = File::open(path).map_err(|source| SeriesError::ManifestUnreadable {
                    path: path.clone(),
                    source,
                })?;
                Self::from_manifest(BufReader::new(file), &path.display().to_string())
            }
        }
    }

    /// One input per name; weights, if given, pair up positionally
    ///
    /// # Errors
    ///
    /// Fails on an empty name list or a weight list of a different length.
    pub fn from_names<S: AsRef<str>>(names: &[S], weights: Option<&[f64]>) -> Result<Self> {
        if names.is_empty() {
            return Err(SeriesError::NoInputs);
        }
        if let Some(weights) = weights {
            if weights.len() != names.len() {
                return Err(SeriesError::CountMismatch {
                    left: "input",
                    right: "weights",
                    left_len: names.len(),
                    right_len: weights.len(),
                });
            }
        }

        let sources = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let weight = weights.map_or(1.0, |w| w[i]);
                InputSource::new(name.as_ref().trim(), weight)
            })
            .collect();
        Ok(Self::logged(sources))
    }

    /// Parse `name` / `name|weight` records until the source is exhausted
    ///
    /// Blank lines and lines starting with `#` are skipped, as is any record
    /// whose name is empty after trimming.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be read, a weight does not parse, or no
    /// usable record is found.
    pub fn from_manifest<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut sources = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|source| SeriesError::ManifestUnreadable {
                path: source_name.into(),
                source,
            })?;
            if let Some(input) = parse_manifest_line(&line)? {
                sources.push(input);
            }
        }

        if sources.is_empty() {
            return Err(SeriesError::EmptyManifest {
                source_name: source_name.to_string(),
            });
        }
        Ok(Self::logged(sources))
    }

    fn logged(sources: Vec<InputSource>) -> Self {
        for s in &sources {
            debug!("reading grid <{}> with weight {}", s.name, s.weight);
        }
        info!("configured {} input grids", sources.len());
        Self { sources }
    }

    /// Size every row buffer to the run's column count
    pub fn allocate(&mut self, cols: usize) {
        for source in &mut self.sources {
            source.buf.clear();
            source.buf.resize(cols, crate::grid::NULL);
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[InputSource] {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut [InputSource] {
        &mut self.sources
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name.as_str())
    }

    /// Provenance view of the inputs
    pub fn records(&self) -> Vec<SourceRecord> {
        self.sources
            .iter()
            .map(|s| SourceRecord {
                name: s.name.clone(),
                weight: s.weight,
            })
            .collect()
    }
}

/// Parse one manifest line; `Ok(None)` for lines that carry no input
fn parse_manifest_line(line: &str) -> Result<Option<InputSource>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.splitn(2, '|');
    let name = fields.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Ok(None);
    }

    let weight = match fields.next().map(str::trim) {
        None | Some("") => 1.0,
        Some(token) => token
            .parse::<f64>()
            .map_err(|_| SeriesError::InvalidWeight {
                name: name.to_string(),
                token: token.to_string(),
            })?,
    };
    Ok(Some(InputSource::new(name, weight)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn manifest_weights_default_to_one() {
        let text = "mapA|2.5\nmapB\n\n  mapC | 0.5  \n";
        let set = InputSet::from_manifest(Cursor::new(text), "list").unwrap();
        let got: Vec<(&str, f64)> = set
            .sources()
            .iter()
            .map(|s| (s.name.as_str(), s.weight))
            .collect();
        assert_eq!(got, vec![("mapA", 2.5), ("mapB", 1.0), ("mapC", 0.5)]);
    }

    #[test]
    fn manifest_with_only_blank_lines_fails() {
        let err = InputSet::from_manifest(Cursor::new("\n   \n\n"), "list").unwrap_err();
        assert!(matches!(err, SeriesError::EmptyManifest { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn manifest_skips_comments_and_empty_names() {
        let set = InputSet::from_manifest(Cursor::new("# header\n|3.0\nmapA\n"), "list").unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["mapA"]);
    }

    #[test]
    fn manifest_rejects_bad_weight() {
        let err = InputSet::from_manifest(Cursor::new("mapA|heavy\n"), "list").unwrap_err();
        match err {
            SeriesError::InvalidWeight { name, token } => {
                assert_eq!(name, "mapA");
                assert_eq!(token, "heavy");
            }
            other => panic!("expected InvalidWeight, got {other:?}"),
        }
    }

    #[test]
    fn names_and_weights_must_pair_up() {
        let err = InputSet::from_names(&["a", "b", "c"], Some(&[1.0, 2.0][..])).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::CountMismatch {
                left_len: 3,
                right_len: 2,
                ..
            }
        ));

        let set = InputSet::from_names(&["a", "b"], Some(&[0.5, 2.0][..])).unwrap();
        assert_eq!(set.sources()[1].weight, 2.0);

        let unweighted = InputSet::from_names(&["a"], None).unwrap();
        assert_eq!(unweighted.sources()[0].weight, 1.0);
    }

    #[test]
    fn empty_name_list_fails() {
        let names: [&str; 0] = [];
        assert!(matches!(
            InputSet::from_names(&names, None),
            Err(SeriesError::NoInputs)
        ));
    }

    #[test]
    fn missing_manifest_file_is_unreadable() {
        let spec = InputSpec::Manifest(ManifestSource::Path("/no/such/manifest".into()));
        let err = InputSet::configure(&spec).unwrap_err();
        assert!(matches!(err, SeriesError::ManifestUnreadable { .. }));
    }

    #[test]
    fn allocate_sizes_buffers() {
        let mut set = InputSet::from_names(&["a", "b"], None).unwrap();
        set.allocate(7);
        assert!(set.sources().iter().all(|s| s.buf.len() == 7));
    }
}
