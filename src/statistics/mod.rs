//! Per-cell statistical reductions
//!
//! # Organization
//!
//! - [`operations`]: the method catalogue, result kinds and the [`Reducer`] contract
//! - [`functions`]: the reduction bodies themselves

pub mod functions;
pub mod operations;

pub use operations::{method_names, Method, Reducer, ResultKind};
