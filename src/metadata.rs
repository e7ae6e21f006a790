//! Provenance attached to every output grid
//!
//! Records which inputs (and weights) fed an output, which method produced it
//! and how the run was invoked. Backends store it however suits them; the
//! NetCDF backend writes it as global attributes.

use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};

/// One source grid as it entered the run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub name: String,
    pub weight: f64,
}

/// Description of how an output grid was produced
#[derive(Debug, Clone)]
pub struct Provenance {
    pub output: String,
    pub method: String,
    pub quantile: Option<f64>,
    pub sources: Vec<SourceRecord>,
    pub command: String,
    pub created: DateTime<Utc>,
}

impl Provenance {
    /// Build a provenance record stamped with the current time
    pub fn new(
        output: &str,
        method: &str,
        quantile: Option<f64>,
        sources: Vec<SourceRecord>,
        command: &str,
    ) -> Self {
        Self {
            output: output.to_string(),
            method: method.to_string(),
            quantile,
            sources,
            command: command.to_string(),
            created: Utc::now(),
        }
    }

    /// Short one-line history entry
    pub fn history(&self) -> String {
        format!(
            "Created by rseries on {}: {}",
            self.created.to_rfc3339(),
            self.command
        )
    }

    /// Comma-separated source grid names
    pub fn source_list(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Full provenance as a JSON document
    pub fn to_json(&self) -> JsonValue {
        let sources: Vec<JsonValue> = self
            .sources
            .iter()
            .map(|s| json!({ "name": s.name, "weight": s.weight }))
            .collect();

        json!({
            "output": self.output,
            "method": self.method,
            "quantile": self.quantile,
            "sources": sources,
            "command": self.command,
            "created": self.created.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Provenance {
        Provenance::new(
            "out_avg",
            "average",
            None,
            vec![
                SourceRecord {
                    name: "a".to_string(),
                    weight: 1.0,
                },
                SourceRecord {
                    name: "b".to_string(),
                    weight: 2.5,
                },
            ],
            "rseries input=a,b output=out_avg method=average",
        )
    }

    #[test]
    fn history_mentions_command() {
        let p = sample();
        assert!(p.history().starts_with("Created by rseries on "));
        assert!(p.history().ends_with("method=average"));
        assert_eq!(p.source_list(), "a,b");
    }

    #[test]
    fn json_carries_weights() {
        let doc = sample().to_json();
        assert_eq!(doc["method"], "average");
        assert_eq!(doc["sources"][1]["weight"], 2.5);
        assert!(doc["quantile"].is_null());
    }
}
