//! Chi-square primitives shared by the IRLS engine, the interaction Wald test
//! and the nested-model comparisons, plus the sentinel reasons a statistic can
//! be undefined.

use crate::log_scalar::LogScalar;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Why a statistic could not be computed for a pair.
///
/// These are not failures of the caller: an undefined statistic is reported as
/// [`crate::types::RESULT_MISSING`] in the output row and the scan moves on.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Undefined {
    #[error("{samples} informative samples cannot support {parameters} parameters")]
    InsufficientSamples { samples: f64, parameters: usize },

    #[error("residual variance {0} is not a positive finite number")]
    NonPositiveVariance(f64),

    #[error("no interaction contrast has all four of its cells populated")]
    NoValidContrasts,

    #[error("the covariance matrix of the estimates is singular")]
    SingularCovariance,

    #[error("{statistic} is outside the domain of the chi-square CDF with {df} degrees of freedom")]
    OutsideCdfDomain { statistic: f64, df: usize },
}

/// Lower-tail chi-square probability `P(X <= x)` for `df` degrees of freedom.
///
/// Unlike the raw distribution object this refuses non-finite or negative
/// statistics instead of quietly returning a number for them.
pub fn chi_square_cdf(x: f64, df: usize) -> Result<f64, Undefined> {
    Ok(1.0 - chi_square_sf(x, df)?)
}

/// Upper-tail chi-square probability `P(X > x)`, i.e. the p-value of `x`.
pub fn chi_square_sf(x: f64, df: usize) -> Result<f64, Undefined> {
    if df == 0 || !x.is_finite() || x < 0.0 {
        return Err(Undefined::OutsideCdfDomain { statistic: x, df });
    }
    let dist = ChiSquared::new(df as f64)
        .map_err(|_| Undefined::OutsideCdfDomain { statistic: x, df })?;
    let p = dist.sf(x);
    if p.is_finite() {
        Ok(p.clamp(0.0, 1.0))
    } else {
        Err(Undefined::OutsideCdfDomain { statistic: x, df })
    }
}

/// Outcome of comparing two nested models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodRatio {
    pub statistic: f64,
    pub p_value: f64,
    pub df: usize,
}

/// Likelihood-ratio test of `null` nested inside `alternative`.
///
/// The statistic is `2 * (log L_alt - log L_null)`. Rounding can push it a
/// hair below zero when the two fits coincide, so it is floored at zero.
pub fn likelihood_ratio_test(
    alternative: LogScalar,
    null: LogScalar,
    df: usize,
) -> Result<LikelihoodRatio, Undefined> {
    let statistic = (2.0 * (alternative.log_value() - null.log_value())).max(0.0);
    let p_value = chi_square_sf(statistic, df)?;
    Ok(LikelihoodRatio {
        statistic,
        p_value,
        df,
    })
}
