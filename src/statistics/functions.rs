//! Cell reductions over one column of weighted samples
//!
//! Null samples are NaN and are skipped. Functions that need positional
//! information (index-of-extreme, regression against input order) read the
//! slice as given; the others may compact and sort it in place.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use crate::grid::is_null;
use std::cmp::Ordering;

/// Move non-null samples to the front, keeping their order, and return them
fn compact(values: &mut [f64]) -> &mut [f64] {
    let mut kept = 0;
    for i in 0..values.len() {
        if !is_null(values[i]) {
            values[kept] = values[i];
            kept += 1;
        }
    }
    &mut values[..kept]
}

fn sorted(values: &mut [f64]) -> &mut [f64] {
    let valid = compact(values);
    valid.sort_by(f64::total_cmp);
    valid
}

fn valid(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !is_null(*v))
}

/// Count, mean and sum of squared deviations in one pass (Welford)
fn moments(values: &[f64]) -> Option<(usize, f64, f64)> {
    let mut n = 0_usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for v in valid(values) {
        n += 1;
        let delta = v - mean;
        mean += delta / n as f64;
        m2 += delta * (v - mean);
    }
    (n > 0).then_some((n, mean, m2))
}

pub fn count(values: &[f64]) -> f64 {
    valid(values).count() as f64
}

pub fn sum(values: &[f64]) -> Option<f64> {
    let mut any = false;
    let total = valid(values).fold(0.0, |acc, v| {
        any = true;
        acc + v
    });
    any.then_some(total)
}

pub fn average(values: &[f64]) -> Option<f64> {
    let n = count(values);
    sum(values).map(|s| s / n)
}

pub fn minimum(values: &[f64]) -> Option<f64> {
    valid(values).reduce(f64::min)
}

pub fn maximum(values: &[f64]) -> Option<f64> {
    valid(values).reduce(f64::max)
}

pub fn range(values: &[f64]) -> Option<f64> {
    Some(maximum(values)? - minimum(values)?)
}

/// Index of the extreme sample; the first occurrence wins ties
fn extreme_index(values: &[f64], wanted: Ordering) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if is_null(v) {
            continue;
        }
        match best {
            Some((_, b)) if v.total_cmp(&b) != wanted => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i as f64)
}

pub fn min_index(values: &[f64]) -> Option<f64> {
    extreme_index(values, Ordering::Less)
}

pub fn max_index(values: &[f64]) -> Option<f64> {
    extreme_index(values, Ordering::Greater)
}

/// Population variance
pub fn variance(values: &[f64]) -> Option<f64> {
    moments(values).map(|(n, _, m2)| m2 / n as f64)
}

/// Linearly interpolated quantile at `q * (n - 1)` of the sorted samples
pub fn quantile(values: &mut [f64], q: f64) -> Option<f64> {
    if q.is_nan() {
        return None;
    }
    let sorted = sorted(values);
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Most frequent sample; ties resolve to the smallest value
pub fn mode(values: &mut [f64]) -> Option<f64> {
    let sorted = sorted(values);
    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let v = sorted[i];
        let run = sorted[i..].iter().take_while(|&&x| x == v).count();
        if best.map_or(true, |(_, n)| run > n) {
            best = Some((v, run));
        }
        i += run;
    }
    best.map(|(v, _)| v)
}

/// Number of distinct samples
pub fn diversity(values: &mut [f64]) -> Option<f64> {
    let sorted = sorted(values);
    let first = *sorted.first()?;
    let mut distinct = 1_usize;
    let mut prev = first;
    for &v in sorted.iter().skip(1) {
        if v != prev {
            distinct += 1;
            prev = v;
        }
    }
    Some(distinct as f64)
}

/// Least-squares fit of sample value against input position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub offset: f64,
    pub r_squared: Option<f64>,
    pub t_value: Option<f64>,
}

pub fn regression(values: &[f64]) -> Option<Regression> {
    let (mut n, mut sx, mut sy, mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        if is_null(y) {
            continue;
        }
        let x = i as f64;
        n += 1.0;
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
        syy += y * y;
    }
    if n < 2.0 {
        return None;
    }

    let cov = n * sxy - sx * sy;
    let var_x = n * sxx - sx * sx;
    let var_y = n * syy - sy * sy;
    let slope = cov / var_x;
    let offset = (sy - slope * sx) / n;

    let r_squared = (var_y > 0.0).then(|| (cov * cov) / (var_x * var_y));
    let t_value = r_squared.and_then(|r2| {
        if n <= 2.0 || r2 >= 1.0 {
            return None;
        }
        let r = r2.sqrt().copysign(slope);
        Some(r * ((n - 2.0) / (1.0 - r2)).sqrt())
    });

    Some(Regression {
        slope,
        offset,
        r_squared,
        t_value,
    })
}

/// Third and fourth central moment sums with the sample standard deviation
fn higher_moments(values: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let (n, mean, m2) = moments(values)?;
    if n < 2 {
        return None;
    }
    let n = n as f64;
    let sample_var = m2 / (n - 1.0);
    if sample_var <= 0.0 {
        return None;
    }
    let (m3, m4) = valid(values).fold((0.0, 0.0), |(m3, m4), v| {
        let d = v - mean;
        (m3 + d * d * d, m4 + d * d * d * d)
    });
    Some((n, sample_var, m3, m4))
}

pub fn skewness(values: &[f64]) -> Option<f64> {
    let (n, var, m3, _) = higher_moments(values)?;
    Some(m3 / n / var.powf(1.5))
}

/// Excess kurtosis
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let (n, var, _, m4) = higher_moments(values)?;
    Some(m4 / n / (var * var) - 3.0)
}
