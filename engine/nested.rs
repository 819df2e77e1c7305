//! Closed-form Gaussian models evaluated straight from a [`CountTable`].
//!
//! The three models are nested: intercept-only inside single-locus inside the
//! saturated 3x3 model. Every one of them fits one mean per group of cells and
//! shares the same likelihood formula, differing only in how cells are grouped
//! and in the parameter count used for the residual-variance correction.

use crate::counts::{Cell, CountTable};
use crate::log_scalar::LogScalar;
use crate::stats::Undefined;
use crate::types::Locus;
use std::f64::consts::PI;

pub trait NestedModel {
    /// Nominal number of mean parameters. Differences between two nested
    /// models give the degrees of freedom of their likelihood-ratio test.
    fn parameter_count(&self) -> usize;

    fn name(&self) -> &'static str;

    fn log_likelihood(&self, table: &CountTable) -> Result<LogScalar, Undefined>;
}

/// One mean per genotype combination.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullModel;

/// A single global mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptModel;

/// One mean per genotype of the active locus; the other locus is ignored.
#[derive(Debug, Clone, Copy)]
pub struct SingleLocusModel {
    pub active: Locus,
}

impl SingleLocusModel {
    pub fn new(active: Locus) -> Self {
        Self { active }
    }
}

impl NestedModel for FullModel {
    fn parameter_count(&self) -> usize {
        9
    }

    fn name(&self) -> &'static str {
        "full"
    }

    fn log_likelihood(&self, table: &CountTable) -> Result<LogScalar, Undefined> {
        grouped_log_likelihood(table.cells(), self.parameter_count())
    }
}

impl NestedModel for InterceptModel {
    fn parameter_count(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "intercept"
    }

    fn log_likelihood(&self, table: &CountTable) -> Result<LogScalar, Undefined> {
        let pooled = table.pooled();
        grouped_log_likelihood(std::iter::once(&pooled), self.parameter_count())
    }
}

impl NestedModel for SingleLocusModel {
    fn parameter_count(&self) -> usize {
        3
    }

    fn name(&self) -> &'static str {
        match self.active {
            Locus::First => "single_first",
            Locus::Second => "single_second",
        }
    }

    fn log_likelihood(&self, table: &CountTable) -> Result<LogScalar, Undefined> {
        let margin = table.collapse(self.active);
        grouped_log_likelihood(margin.iter(), self.parameter_count())
    }
}

/// Fits one mean per non-empty group and evaluates the Gaussian likelihood.
///
/// Empty groups have no estimable mean, so they neither add residual nor use
/// up a degree of freedom: the variance correction uses at most `k` but never
/// more than the number of populated groups.
fn grouped_log_likelihood<'a>(
    groups: impl Iterator<Item = &'a Cell>,
    k: usize,
) -> Result<LogScalar, Undefined> {
    let mut n = 0.0;
    let mut residual = 0.0;
    let mut populated = 0usize;
    for group in groups.filter(|g| !g.is_empty()) {
        n += group.count;
        residual += group.residual();
        populated += 1;
    }
    gaussian_log_likelihood(n, residual, k.min(populated))
}

/// `-(n/2) log(2 pi) - (n/2) log(sigma^2) - residual / (2 sigma^2)` with
/// `sigma^2 = residual / (n - k)`.
pub fn gaussian_log_likelihood(n: f64, residual: f64, k: usize) -> Result<LogScalar, Undefined> {
    let dof = n - k as f64;
    if k == 0 || dof <= 0.0 {
        return Err(Undefined::InsufficientSamples {
            samples: n,
            parameters: k,
        });
    }
    let sigma2 = residual / dof;
    if !sigma2.is_finite() || sigma2 <= 0.0 {
        return Err(Undefined::NonPositiveVariance(sigma2));
    }
    let log_l = -(n / 2.0) * (2.0 * PI).ln() - (n / 2.0) * sigma2.ln() - residual / (2.0 * sigma2);
    Ok(LogScalar::from_log(log_l))
}
