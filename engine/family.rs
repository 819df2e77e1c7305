use ndarray::{ArrayView1, Zip};
use std::f64::consts::PI;

/// A response distribution together with its link, as seen by the IRLS engine.
///
/// Every method taking a `missing` mask must ignore the flagged samples
/// entirely; their `y` and `mu` entries may hold arbitrary values.
pub trait GlmFamily {
    fn name(&self) -> &'static str;

    /// The link, `eta = g(mu)`.
    fn eta(&self, mu: f64) -> f64;

    /// The inverse link, `mu = g^-1(eta)`.
    fn mean(&self, eta: f64) -> f64;

    /// `d eta / d mu` evaluated at `mu`.
    fn link_derivative(&self, mu: f64) -> f64;

    /// `d mu / d eta` evaluated at `mu`.
    fn mean_derivative(&self, mu: f64) -> f64 {
        1.0 / self.link_derivative(mu)
    }

    /// Variance function `V(mu)`.
    fn variance(&self, mu: f64) -> f64;

    /// Whether `mu` lies in the family's mean domain.
    fn is_valid_mean(&self, mu: f64) -> bool;

    /// Log-likelihood of the non-missing samples. `None` uses a unit dispersion.
    fn log_likelihood(
        &self,
        mu: ArrayView1<f64>,
        y: ArrayView1<f64>,
        missing: &[bool],
        dispersion: Option<f64>,
    ) -> f64;

    /// Dispersion estimate for a fit with `parameters` coefficients.
    fn dispersion(
        &self,
        mu: ArrayView1<f64>,
        y: ArrayView1<f64>,
        missing: &[bool],
        parameters: usize,
    ) -> f64;
}

/// Normal response with the identity link.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianIdentity;

/// Bernoulli response with the logit link.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialLogit;

fn residual_sum_of_squares(mu: ArrayView1<f64>, y: ArrayView1<f64>, missing: &[bool]) -> (f64, f64) {
    let mut n = 0.0;
    let mut rss = 0.0;
    Zip::from(&mu).and(&y).and(missing).for_each(|&m, &yi, &skip| {
        if !skip {
            n += 1.0;
            rss += (yi - m) * (yi - m);
        }
    });
    (n, rss)
}

impl GlmFamily for GaussianIdentity {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn eta(&self, mu: f64) -> f64 {
        mu
    }

    fn mean(&self, eta: f64) -> f64 {
        eta
    }

    fn link_derivative(&self, _: f64) -> f64 {
        1.0
    }

    fn variance(&self, _: f64) -> f64 {
        1.0
    }

    fn is_valid_mean(&self, mu: f64) -> bool {
        mu.is_finite()
    }

    fn log_likelihood(
        &self,
        mu: ArrayView1<f64>,
        y: ArrayView1<f64>,
        missing: &[bool],
        dispersion: Option<f64>,
    ) -> f64 {
        let sigma2 = dispersion.unwrap_or(1.0);
        let (n, rss) = residual_sum_of_squares(mu, y, missing);
        -(n / 2.0) * (2.0 * PI * sigma2).ln() - rss / (2.0 * sigma2)
    }

    fn dispersion(
        &self,
        mu: ArrayView1<f64>,
        y: ArrayView1<f64>,
        missing: &[bool],
        parameters: usize,
    ) -> f64 {
        let (n, rss) = residual_sum_of_squares(mu, y, missing);
        rss / (n - parameters as f64)
    }
}

impl GlmFamily for BinomialLogit {
    fn name(&self) -> &'static str {
        "binomial"
    }

    fn eta(&self, mu: f64) -> f64 {
        (mu / (1.0 - mu)).ln()
    }

    fn mean(&self, eta: f64) -> f64 {
        1.0 / (1.0 + (-eta).exp())
    }

    fn link_derivative(&self, mu: f64) -> f64 {
        1.0 / (mu * (1.0 - mu))
    }

    fn variance(&self, mu: f64) -> f64 {
        mu * (1.0 - mu)
    }

    fn is_valid_mean(&self, mu: f64) -> bool {
        mu > 0.0 && mu < 1.0
    }

    fn log_likelihood(
        &self,
        mu: ArrayView1<f64>,
        y: ArrayView1<f64>,
        missing: &[bool],
        _: Option<f64>,
    ) -> f64 {
        let mut log_l = 0.0;
        Zip::from(&mu).and(&y).and(missing).for_each(|&m, &yi, &skip| {
            if !skip {
                log_l += yi * m.ln() + (1.0 - yi) * (1.0 - m).ln();
            }
        });
        log_l
    }

    fn dispersion(&self, _: ArrayView1<f64>, _: ArrayView1<f64>, _: &[bool], _: usize) -> f64 {
        1.0
    }
}
