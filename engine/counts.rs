//! Sufficient statistics of a phenotype split by the 3x3 genotype grid of a SNP pair.
//!
//! This is the only part of a per-pair scan that touches every sample, so the
//! table is a fixed-size value with no heap allocation.

use crate::types::{GenotypeRow, Locus};
use itertools::iproduct;
use ndarray::ArrayView1;
use std::ops::AddAssign;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountError {
    #[error("genotype rows have {first} and {second} samples; they must match")]
    MismatchedRows { first: usize, second: usize },

    #[error("phenotype has {found} values but the genotype rows have {expected} samples")]
    MismatchedPhenotype { found: usize, expected: usize },

    #[error("missing-sample mask has {found} entries but there are {expected} samples")]
    MismatchedMask { found: usize, expected: usize },
}

/// Count, sum and sum of squares of the phenotype within one genotype combination.
/// Multiple of `n * eps * s2` below which a residual is indistinguishable from
/// rounding in the accumulated sums.
const RESIDUAL_ROUNDING: f64 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    pub count: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Cell {
    pub fn new(count: f64, sum: f64, sum_sq: f64) -> Self {
        Self { count, sum, sum_sq }
    }

    pub fn push(&mut self, y: f64) {
        self.count += 1.0;
        self.sum += y;
        self.sum_sq += y * y;
    }

    pub fn is_empty(&self) -> bool {
        self.count <= 0.0
    }

    /// Cell mean, or `None` for an empty cell.
    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sum / self.count)
    }

    /// Residual sum of squares around `mu`: `n*mu^2 - 2*mu*s1 + s2`.
    pub fn residual_around(&self, mu: f64) -> f64 {
        self.count * mu * mu - 2.0 * mu * self.sum + self.sum_sq
    }

    /// Residual sum of squares around the cell's own mean; zero for an empty cell.
    ///
    /// `s2 - s1^2 / n` cancels catastrophically when every value is equal, so
    /// anything within the accumulated rounding of `s2` is reported as exactly 0.
    pub fn residual(&self) -> f64 {
        let Some(mu) = self.mean() else {
            return 0.0;
        };
        let residual = self.residual_around(mu);
        if residual <= RESIDUAL_ROUNDING * self.count * f64::EPSILON * self.sum_sq {
            0.0
        } else {
            residual
        }
    }
}

impl AddAssign for Cell {
    fn add_assign(&mut self, rhs: Cell) {
        self.count += rhs.count;
        self.sum += rhs.sum;
        self.sum_sq += rhs.sum_sq;
    }
}

/// Per-cell sufficient statistics, indexed `[genotype of first SNP][genotype of second SNP]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CountTable {
    cells: [[Cell; 3]; 3],
}

impl CountTable {
    pub fn from_cells(cells: [[Cell; 3]; 3]) -> Self {
        Self { cells }
    }

    /// Builds a table where every sample in cell `(i, j)` has phenotype
    /// `means[i][j]`. Handy for exercising degenerate, zero-variance layouts.
    pub fn from_counts_and_means(counts: [[f64; 3]; 3], means: [[f64; 3]; 3]) -> Self {
        let mut table = Self::default();
        for (i, j) in iproduct!(0..3, 0..3) {
            let n = counts[i][j];
            let mu = means[i][j];
            table.cells[i][j] = Cell::new(n, n * mu, n * mu * mu);
        }
        table
    }

    /// Aggregates a SNP pair. A sample is skipped when either genotype is
    /// missing or when `missing` flags it; every other sample lands in exactly
    /// one cell.
    pub fn from_pair<A, B>(
        row1: &A,
        row2: &B,
        phenotype: ArrayView1<f64>,
        missing: Option<&[bool]>,
    ) -> Result<Self, CountError>
    where
        A: GenotypeRow + ?Sized,
        B: GenotypeRow + ?Sized,
    {
        let n = row1.len();
        if row2.len() != n {
            return Err(CountError::MismatchedRows {
                first: n,
                second: row2.len(),
            });
        }
        if phenotype.len() != n {
            return Err(CountError::MismatchedPhenotype {
                found: phenotype.len(),
                expected: n,
            });
        }
        if let Some(mask) = missing {
            if mask.len() != n {
                return Err(CountError::MismatchedMask {
                    found: mask.len(),
                    expected: n,
                });
            }
        }

        let mut table = Self::default();
        for (i, &y) in phenotype.iter().enumerate() {
            if missing.is_some_and(|mask| mask[i]) {
                continue;
            }
            if let (Some(g1), Some(g2)) = (row1.category(i), row2.category(i)) {
                table.cells[g1][g2].push(y);
            }
        }
        Ok(table)
    }

    pub fn cell(&self, i: usize, j: usize) -> &Cell {
        &self.cells[i][j]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    /// All nine cells pooled together.
    pub fn pooled(&self) -> Cell {
        let mut total = Cell::default();
        for cell in self.cells() {
            total += *cell;
        }
        total
    }

    /// Number of samples that contributed to the table.
    pub fn samples(&self) -> f64 {
        self.pooled().count
    }

    /// Marginal table of one locus, summing over the other locus's genotypes.
    pub fn collapse(&self, active: Locus) -> [Cell; 3] {
        let mut margin = [Cell::default(); 3];
        for (i, j) in iproduct!(0..3, 0..3) {
            let target = match active {
                Locus::First => i,
                Locus::Second => j,
            };
            margin[target] += self.cells[i][j];
        }
        margin
    }
}
