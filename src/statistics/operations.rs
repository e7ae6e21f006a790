//! Method catalogue and the reduction contract
//!
//! A method is a pure function over one cell's weighted samples. It receives
//! the full-width vector (nulls included, in input order), the input count and
//! an optional parameter, and decides for itself whether the result is null.

use super::functions;
use crate::errors::{Result, SeriesError};
use crate::grid::CellType;

/// Natural result type of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Integer,
    Floating,
}

impl ResultKind {
    /// Storage type for an output bound to a method of this kind
    pub fn cell_type(self) -> CellType {
        match self {
            Self::Integer => CellType::Int,
            Self::Floating => CellType::Float,
        }
    }
}

/// A single reduction capability
///
/// `values` may be reordered or overwritten by the implementation; callers
/// hand in a scratch copy. A `None` return is a null cell.
pub trait Reducer {
    fn reduce(&self, values: &mut [f64], count: usize, parameter: f64) -> Option<f64>;
}

/// Supported aggregate methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Average,
    Count,
    Median,
    Mode,
    Minimum,
    MinRaster,
    Maximum,
    MaxRaster,
    Stddev,
    Range,
    Sum,
    Variance,
    Diversity,
    Slope,
    Offset,
    DetCoeff,
    TValue,
    Quart1,
    Quart3,
    Perc90,
    Quantile,
    Skewness,
    Kurtosis,
}

const ALL: [Method; 23] = [
    Method::Average,
    Method::Count,
    Method::Median,
    Method::Mode,
    Method::Minimum,
    Method::MinRaster,
    Method::Maximum,
    Method::MaxRaster,
    Method::Stddev,
    Method::Range,
    Method::Sum,
    Method::Variance,
    Method::Diversity,
    Method::Slope,
    Method::Offset,
    Method::DetCoeff,
    Method::TValue,
    Method::Quart1,
    Method::Quart3,
    Method::Perc90,
    Method::Quantile,
    Method::Skewness,
    Method::Kurtosis,
];

impl Method {
    /// Every method in catalogue order
    #[must_use]
    pub const fn all() -> &'static [Method] {
        &ALL
    }

    /// Look a method up by its catalogue name
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownMethod`] naming the token if it is not in
    /// the catalogue.
    pub fn from_name(name: &str) -> Result<Self> {
        let token = name.trim();
        ALL.iter()
            .copied()
            .find(|m| m.name() == token)
            .ok_or_else(|| SeriesError::UnknownMethod {
                name: token.to_string(),
            })
    }

    /// Catalogue name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Count => "count",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Minimum => "minimum",
            Self::MinRaster => "min_raster",
            Self::Maximum => "maximum",
            Self::MaxRaster => "max_raster",
            Self::Stddev => "stddev",
            Self::Range => "range",
            Self::Sum => "sum",
            Self::Variance => "variance",
            Self::Diversity => "diversity",
            Self::Slope => "slope",
            Self::Offset => "offset",
            Self::DetCoeff => "detcoeff",
            Self::TValue => "tvalue",
            Self::Quart1 => "quart1",
            Self::Quart3 => "quart3",
            Self::Perc90 => "perc90",
            Self::Quantile => "quantile",
            Self::Skewness => "skewness",
            Self::Kurtosis => "kurtosis",
        }
    }

    /// Human readable description for help output
    pub fn description(self) -> &'static str {
        match self {
            Self::Average => "average value",
            Self::Count => "count of non-null cells",
            Self::Median => "median value",
            Self::Mode => "most frequently occurring value",
            Self::Minimum => "lowest value",
            Self::MinRaster => "grid with lowest value",
            Self::Maximum => "highest value",
            Self::MaxRaster => "grid with highest value",
            Self::Stddev => "standard deviation",
            Self::Range => "range of values",
            Self::Sum => "sum of values",
            Self::Variance => "statistical variance",
            Self::Diversity => "number of different values",
            Self::Slope => "linear regression slope",
            Self::Offset => "linear regression offset",
            Self::DetCoeff => "linear regression coefficient of determination",
            Self::TValue => "linear regression t-value",
            Self::Quart1 => "first quartile",
            Self::Quart3 => "third quartile",
            Self::Perc90 => "ninetieth percentile",
            Self::Quantile => "arbitrary quantile",
            Self::Skewness => "skewness",
            Self::Kurtosis => "kurtosis",
        }
    }

    pub fn result_kind(self) -> ResultKind {
        match self {
            Self::Count | Self::MinRaster | Self::MaxRaster | Self::Diversity => {
                ResultKind::Integer
            }
            _ => ResultKind::Floating,
        }
    }

    /// Whether the method commutes with a uniform scaling of its inputs
    pub fn is_linear(self) -> bool {
        matches!(self, Self::Sum | Self::Average)
    }

    /// Whether the method reads the per-output parameter
    pub fn takes_parameter(self) -> bool {
        matches!(self, Self::Quantile)
    }
}

impl Reducer for Method {
    fn reduce(&self, values: &mut [f64], count: usize, parameter: f64) -> Option<f64> {
        let len = count.min(values.len());
        let values = &mut values[..len];
        match self {
            Self::Average => functions::average(values),
            Self::Count => Some(functions::count(values)),
            Self::Median => functions::quantile(values, 0.5),
            Self::Mode => functions::mode(values),
            Self::Minimum => functions::minimum(values),
            Self::MinRaster => functions::min_index(values),
            Self::Maximum => functions::maximum(values),
            Self::MaxRaster => functions::max_index(values),
            Self::Stddev => functions::variance(values).map(f64::sqrt),
            Self::Range => functions::range(values),
            Self::Sum => functions::sum(values),
            Self::Variance => functions::variance(values),
            Self::Diversity => functions::diversity(values),
            Self::Slope => functions::regression(values).map(|r| r.slope),
            Self::Offset => functions::regression(values).map(|r| r.offset),
            Self::DetCoeff => functions::regression(values).and_then(|r| r.r_squared),
            Self::TValue => functions::regression(values).and_then(|r| r.t_value),
            Self::Quart1 => functions::quantile(values, 0.25),
            Self::Quart3 => functions::quantile(values, 0.75),
            Self::Perc90 => functions::quantile(values, 0.9),
            Self::Quantile => functions::quantile(values, parameter),
            Self::Skewness => functions::skewness(values),
            Self::Kurtosis => functions::kurtosis(values),
        }
    }
}

/// Comma-separated list of every method name, for help text
pub fn method_names() -> String {
    ALL.iter().map(|m| m.name()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for &method in Method::all() {
            assert_eq!(Method::from_name(method.name()).unwrap(), method);
        }
        assert_eq!(Method::all().len(), 23);
    }

    #[test]
    fn unknown_method_is_rejected_with_its_name() {
        match Method::from_name("avarage") {
            Err(SeriesError::UnknownMethod { name }) => assert_eq!(name, "avarage"),
            other => panic!("expected UnknownMethod, got {other:?}"),
        }
    }

    #[test]
    fn integer_methods_map_to_int_cells() {
        assert_eq!(Method::Count.result_kind().cell_type(), CellType::Int);
        assert_eq!(Method::MaxRaster.result_kind().cell_type(), CellType::Int);
        assert_eq!(Method::Average.result_kind().cell_type(), CellType::Float);
    }

    #[test]
    fn method_list_starts_with_average() {
        let list = method_names();
        assert!(list.starts_with("average,count,median"));
        assert!(list.ends_with("skewness,kurtosis"));
    }

    #[test]
    fn quantile_reads_parameter() {
        let mut values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let q = Method::Quantile.reduce(&mut values, 5, 0.5);
        assert_eq!(q, Some(3.0));
        assert!(Method::Quantile.takes_parameter());
        assert!(!Method::Median.takes_parameter());
    }
}
