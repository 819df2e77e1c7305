//! Closed-form Wald test for genotype-by-genotype interaction.
//!
//! The saturated 3x3 Gaussian model has one mean per cell, so its estimates and
//! their covariance come straight from the [`CountTable`] without iterating.
//! Interaction is measured by the four contrasts
//!
//! `beta(c1, c2) = mu(0,0) - mu(0,c2) - mu(c1,0) + mu(c1,c2)` for `c1, c2` in `{1, 2}`,
//!
//! and the test statistic is `beta' C^-1 beta` over the contrasts whose four
//! cells are all populated.

use crate::counts::CountTable;
use crate::stats::{Undefined, chi_square_sf};
use itertools::iproduct;
use ndarray::{Array1, Array2};
use ndarray_linalg::Inverse;
use serde::{Deserialize, Serialize};

/// Cells with fewer samples than this are treated as empty by default.
pub const DEFAULT_MIN_CELL_SIZE: usize = 10;

/// Parameters of the saturated model; residual variances are divided by
/// `n - SATURATED_PARAMETERS`.
const SATURATED_PARAMETERS: f64 = 9.0;

/// The (locus 1, locus 2) index cell of each contrast, in output order.
const CONTRAST_CELLS: [(usize, usize); 4] = [(1, 1), (1, 2), (2, 1), (2, 2)];

/// Relative size below which a contrast is rounding noise in its cell means.
const CONTRAST_ROUNDING: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceModel {
    /// One residual variance pooled over every retained cell.
    #[default]
    Equal,
    /// A separate residual variance per cell.
    Unequal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaldOptions {
    pub variance: VarianceModel,
    pub min_cell_size: usize,
}

impl Default for WaldOptions {
    fn default() -> Self {
        Self {
            variance: VarianceModel::Equal,
            min_cell_size: DEFAULT_MIN_CELL_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionWald {
    pub statistic: f64,
    pub p_value: f64,
    /// Number of contrasts that entered the test.
    pub df: usize,
    /// Index cells `(c1, c2)` of the contrasts that entered the test.
    pub contrasts: Vec<(usize, usize)>,
    pub beta: Array1<f64>,
    pub covariance: Array2<f64>,
}

/// Per-cell estimates after discarding cells below the size threshold.
struct CellEstimates {
    retained: [[bool; 3]; 3],
    counts: [[f64; 3]; 3],
    means: [[f64; 3]; 3],
    variances: [[f64; 3]; 3],
}

impl CellEstimates {
    fn new(table: &CountTable, options: &WaldOptions) -> Result<Self, Undefined> {
        let mut estimates = CellEstimates {
            retained: [[false; 3]; 3],
            counts: [[0.0; 3]; 3],
            means: [[0.0; 3]; 3],
            variances: [[0.0; 3]; 3],
        };
        let mut residuals = [[0.0; 3]; 3];
        let mut samples = 0.0;
        let mut total_residual = 0.0;

        for (i, j) in iproduct!(0..3, 0..3) {
            let cell = table.cell(i, j);
            if cell.count < options.min_cell_size as f64 || cell.is_empty() {
                continue;
            }
            estimates.retained[i][j] = true;
            estimates.counts[i][j] = cell.count;
            estimates.means[i][j] = cell.sum / cell.count;
            residuals[i][j] = cell.residual();
            samples += cell.count;
            total_residual += residuals[i][j];
        }

        match options.variance {
            VarianceModel::Equal => {
                let dof = samples - SATURATED_PARAMETERS;
                if dof <= 0.0 {
                    return Err(Undefined::InsufficientSamples {
                        samples,
                        parameters: SATURATED_PARAMETERS as usize,
                    });
                }
                let sigma2 = total_residual / dof;
                for (i, j) in iproduct!(0..3, 0..3) {
                    estimates.variances[i][j] = sigma2;
                }
            }
            VarianceModel::Unequal => {
                for (i, j) in iproduct!(0..3, 0..3) {
                    let n = estimates.counts[i][j];
                    if n > SATURATED_PARAMETERS {
                        estimates.variances[i][j] = residuals[i][j] / (n - SATURATED_PARAMETERS);
                    }
                }
            }
        }
        Ok(estimates)
    }

    /// Variance of the mean of cell `(i, j)`.
    fn mean_variance(&self, i: usize, j: usize) -> f64 {
        self.variances[i][j] / self.counts[i][j]
    }
}

/// Whether every contrast is zero up to the rounding of the four means it
/// combines. The bound scales with the means, so rescaling the phenotype never
/// changes the answer.
fn contrasts_vanish(contrasts: &[(usize, usize)], mu: &[[f64; 3]; 3], beta: &Array1<f64>) -> bool {
    contrasts.iter().zip(beta.iter()).all(|(&(c1, c2), b)| {
        let magnitude = mu[0][0].abs() + mu[0][c2].abs() + mu[c1][0].abs() + mu[c1][c2].abs();
        b.abs() <= CONTRAST_ROUNDING * magnitude
    })
}

/// Number of samples in cells that reach the size threshold.
pub fn retained_samples(table: &CountTable, options: &WaldOptions) -> f64 {
    table
        .cells()
        .filter(|c| !c.is_empty() && c.count >= options.min_cell_size as f64)
        .map(|c| c.count)
        .sum()
}

/// Wald test that all estimable interaction contrasts are zero.
pub fn fit(table: &CountTable, options: &WaldOptions) -> Result<InteractionWald, Undefined> {
    let estimates = CellEstimates::new(table, options)?;
    let r = &estimates.retained;

    let contrasts: Vec<(usize, usize)> = CONTRAST_CELLS
        .iter()
        .copied()
        .filter(|&(c1, c2)| r[0][0] && r[0][c2] && r[c1][0] && r[c1][c2])
        .collect();
    log::trace!("interaction contrasts with populated cells: {contrasts:?}");
    if contrasts.is_empty() {
        return Err(Undefined::NoValidContrasts);
    }
    let df = contrasts.len();

    let mu = &estimates.means;
    let beta: Array1<f64> = contrasts
        .iter()
        .map(|&(c1, c2)| mu[0][0] - mu[0][c2] - mu[c1][0] + mu[c1][c2])
        .collect();

    // Contrasts share the reference cell always, cell (0, c2) when they share
    // a column, cell (c1, 0) when they share a row, and everything with themselves.
    let covariance = Array2::from_shape_fn((df, df), |(a, b)| {
        let (c1, c2) = contrasts[a];
        let (o1, o2) = contrasts[b];
        let mut v = estimates.mean_variance(0, 0);
        if c2 == o2 {
            v += estimates.mean_variance(0, c2);
        }
        if c1 == o1 {
            v += estimates.mean_variance(c1, 0);
        }
        if a == b {
            v += estimates.mean_variance(c1, c2);
        }
        v
    });

    let degenerate_variance = options.variance == VarianceModel::Equal
        && !(estimates.variances[0][0].is_finite() && estimates.variances[0][0] > 0.0);
    let precision = if degenerate_variance {
        None
    } else {
        covariance.inv().ok().filter(|p| p.iter().all(|v| v.is_finite()))
    };

    let Some(precision) = precision else {
        // Without residual variance the only defined outcome is a contrast
        // vector that vanishes, which has a zero statistic under any
        // generalized inverse.
        if contrasts_vanish(&contrasts, mu, &beta) {
            return Ok(InteractionWald {
                statistic: 0.0,
                p_value: 1.0,
                df,
                contrasts,
                beta,
                covariance,
            });
        }
        return Err(if degenerate_variance {
            Undefined::NonPositiveVariance(estimates.variances[0][0])
        } else {
            Undefined::SingularCovariance
        });
    };
    let statistic = beta.dot(&precision.dot(&beta));
    let p_value = chi_square_sf(statistic, df)?;

    Ok(InteractionWald {
        statistic,
        p_value,
        df,
        contrasts,
        beta,
        covariance,
    })
}
