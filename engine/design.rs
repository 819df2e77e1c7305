use crate::types::GenotypeRow;
use ndarray::{Array2, ArrayView2, s};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DesignError {
    #[error("design has {expected} rows but a genotype row has {found} samples")]
    RowLength { expected: usize, found: usize },

    #[error("missing-sample mask has {found} entries but the design has {expected} rows")]
    MaskLength { expected: usize, found: usize },
}

/// Null and alternative design matrices rebuilt for every SNP pair.
///
/// Implementations own their matrices and overwrite the genotype-dependent
/// columns in place on each [`DesignMatrix::update`], so a scan allocates them
/// once. The null design must be nested in the alternative.
pub trait DesignMatrix {
    /// Fills the genotype columns for a new pair and flags every sample with a
    /// missing genotype in `missing`. Flags already set are left alone.
    fn update(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
        missing: &mut [bool],
    ) -> Result<(), DesignError>;

    fn alternative(&self) -> ArrayView2<'_, f64>;

    fn null(&self) -> ArrayView2<'_, f64>;

    /// Degrees of freedom separating the alternative from the null.
    fn num_df(&self) -> usize {
        self.alternative().ncols() - self.null().ncols()
    }
}

/// Intercept, covariates and additive genotype codes; the alternative adds
/// their product as a single interaction column.
///
/// Column layout: `[1, covariates.., g1, g2, g1 * g2]`.
#[derive(Debug, Clone)]
pub struct AdditiveInteraction {
    alt: Array2<f64>,
    genotype_offset: usize,
}

impl AdditiveInteraction {
    pub fn new(covariates: ArrayView2<f64>) -> Self {
        let (n, c) = covariates.dim();
        let mut alt = Array2::zeros((n, c + 4));
        alt.column_mut(0).fill(1.0);
        alt.slice_mut(s![.., 1..=c]).assign(&covariates);
        Self {
            alt,
            genotype_offset: c + 1,
        }
    }

    /// Design without covariates: intercept and genotype columns only.
    pub fn without_covariates(samples: usize) -> Self {
        Self::new(Array2::<f64>::zeros((samples, 0)).view())
    }

    pub fn samples(&self) -> usize {
        self.alt.nrows()
    }
}

impl DesignMatrix for AdditiveInteraction {
    fn update(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
        missing: &mut [bool],
    ) -> Result<(), DesignError> {
        let n = self.samples();
        for row in [row1, row2] {
            if row.len() != n {
                return Err(DesignError::RowLength {
                    expected: n,
                    found: row.len(),
                });
            }
        }
        if missing.len() != n {
            return Err(DesignError::MaskLength {
                expected: n,
                found: missing.len(),
            });
        }

        let g = self.genotype_offset;
        for (i, flag) in missing.iter_mut().enumerate() {
            let (a, b) = match (row1.category(i), row2.category(i)) {
                (Some(a), Some(b)) => (a as f64, b as f64),
                _ => {
                    *flag = true;
                    (0.0, 0.0)
                }
            };
            self.alt[[i, g]] = a;
            self.alt[[i, g + 1]] = b;
            self.alt[[i, g + 2]] = a * b;
        }
        Ok(())
    }

    fn alternative(&self) -> ArrayView2<'_, f64> {
        self.alt.view()
    }

    fn null(&self) -> ArrayView2<'_, f64> {
        self.alt.slice(s![.., ..self.genotype_offset + 2])
    }
}
