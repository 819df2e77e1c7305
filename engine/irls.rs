//! Iteratively reweighted least squares for any [`GlmFamily`].
//!
//! The engine is stateless: tolerances and iteration limits arrive in an
//! [`IrlsConfig`] on every call and everything it allocates is returned to, or
//! dropped before returning to, the caller. Numerical trouble inside a fit is
//! reported through [`FitStatus`] rather than as an `Err`; `Err` is reserved for
//! inputs that could never be fitted (mismatched dimensions).

use crate::family::GlmFamily;
use crate::stats::chi_square_sf;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{Inverse, LeastSquaresSvd, Solve};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How each weighted least-squares subproblem is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
    /// SVD of the weighted design with an explicit numerical-rank check.
    /// Tolerates near-collinear columns and refuses rank-deficient ones.
    #[default]
    Robust,
    /// LU solve of the normal equations. Faster, but squares the condition
    /// number and may return a poor solution for nearly collinear designs.
    Fast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrlsConfig {
    pub max_iterations: usize,
    /// Bound on `|l - l_old| / (0.1 + |l|)` between successive log-likelihoods.
    pub tolerance: f64,
    pub solve_mode: SolveMode,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-7,
            solve_mode: SolveMode::Robust,
        }
    }
}

/// Inputs that cannot be fitted at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FitError {
    #[error("design matrix has {rows} rows but the response has {found} values")]
    ResponseLength { rows: usize, found: usize },

    #[error("missing-sample mask has {found} entries but the design matrix has {rows} rows")]
    MaskLength { rows: usize, found: usize },

    #[error("design matrix has no columns")]
    EmptyDesign,
}

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("weighted design has numerical rank {rank} but {columns} columns")]
    RankDeficient { rank: usize, columns: usize },

    #[error("linear solve failed: {0}")]
    Linalg(#[from] LinalgError),

    #[error("solution contains non-finite coefficients")]
    NonFinite,
}

/// How an IRLS fit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Converged and all statistics were computed.
    Converged,
    /// The iteration budget ran out before the log-likelihood settled.
    DidNotConverge,
    /// A weighted least-squares subproblem was rank deficient or singular.
    SolveFailed,
    /// The fitted mean left the family's domain even after one damped step.
    InvalidMean,
    /// Converged, but `X' W X` was not finite or not invertible.
    SingularInformation,
    /// Converged, but the dispersion estimate was not a finite non-negative number.
    UndefinedDispersion,
}

/// Wald test of a single coefficient against zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientTest {
    pub estimate: f64,
    pub standard_error: Option<f64>,
    pub chi_square: Option<f64>,
    /// `None` when the chi-square statistic falls outside the CDF's domain.
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FitStatistics {
    pub coefficients: Vec<CoefficientTest>,
    /// `X' W X` at the final weights.
    pub information: Array2<f64>,
    /// Inverse of the information matrix, not yet scaled by the dispersion.
    pub covariance: Array2<f64>,
    pub mu: Array1<f64>,
    pub dispersion: f64,
    /// Log-likelihood at the estimated dispersion; `None` if it is not finite,
    /// as happens for a Gaussian fit with zero residual.
    pub log_likelihood: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct IrlsFit {
    pub beta: Array1<f64>,
    pub status: FitStatus,
    pub iterations: usize,
    pub statistics: Option<FitStatistics>,
}

impl IrlsFit {
    fn failed(status: FitStatus, iterations: usize, beta: Array1<f64>) -> Self {
        Self {
            beta,
            status,
            iterations,
            statistics: None,
        }
    }

    pub fn converged(&self) -> bool {
        self.status == FitStatus::Converged
    }
}

/// Scales every row of `x` and entry of `z` by `sqrt(w)`. Rows with zero weight
/// are zeroed outright so that non-finite values in excluded samples cannot leak.
fn weighted_system(
    x: ArrayView2<f64>,
    z: ArrayView1<f64>,
    w: ArrayView1<f64>,
) -> (Array2<f64>, Array1<f64>) {
    let sqrt_w = w.mapv(f64::sqrt);
    let mut a = x.to_owned();
    for (mut row, &s) in a.rows_mut().into_iter().zip(sqrt_w.iter()) {
        if s == 0.0 {
            row.fill(0.0);
        } else {
            row *= s;
        }
    }
    let rhs = Zip::from(&z)
        .and(&sqrt_w)
        .map_collect(|&zi, &s| if s == 0.0 { 0.0 } else { zi * s });
    (a, rhs)
}

/// Minimizes `|| diag(sqrt(w)) (X b - z) ||` over `b`.
pub fn weighted_least_squares(
    x: ArrayView2<f64>,
    z: ArrayView1<f64>,
    w: ArrayView1<f64>,
    mode: SolveMode,
) -> Result<Array1<f64>, SolveError> {
    let (a, rhs) = weighted_system(x, z, w);
    let columns = a.ncols();

    let beta = match mode {
        SolveMode::Robust => {
            let result = a.least_squares(&rhs)?;
            let largest = result
                .singular_values
                .iter()
                .copied()
                .fold(0.0_f64, f64::max);
            let cutoff = largest * a.nrows().max(columns) as f64 * f64::EPSILON;
            let rank = result
                .singular_values
                .iter()
                .filter(|&&s| s > cutoff)
                .count();
            if rank < columns {
                return Err(SolveError::RankDeficient { rank, columns });
            }
            result.solution
        }
        SolveMode::Fast => {
            let gram = a.t().dot(&a);
            let moment = a.t().dot(&rhs);
            gram.solve(&moment)?
        }
    };

    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(SolveError::NonFinite)
    }
}

fn relative_change(log_l: f64, previous: f64) -> f64 {
    (log_l - previous).abs() / (0.1 + log_l.abs())
}

/// IRLS weights `1 / (V(mu) * g'(mu)^2)`, zero for missing samples.
fn working_weights<F: GlmFamily + ?Sized>(
    family: &F,
    mu: ArrayView1<f64>,
    link_derivative: ArrayView1<f64>,
    missing: &[bool],
) -> Array1<f64> {
    Zip::from(&mu)
        .and(&link_derivative)
        .and(missing)
        .map_collect(|&m, &d, &skip| {
            if skip {
                0.0
            } else {
                1.0 / (family.variance(m) * d * d)
            }
        })
}

fn mean_is_valid<F: GlmFamily + ?Sized>(family: &F, mu: ArrayView1<f64>, missing: &[bool]) -> bool {
    mu.iter()
        .zip(missing)
        .all(|(&m, &skip)| skip || family.is_valid_mean(m))
}

/// Fits a GLM by IRLS. `missing[i] == true` removes sample `i` from every
/// weight, residual and likelihood term; its design row and response are
/// never read into the arithmetic.
///
/// The starting point is the weighted least-squares fit of
/// `g((y + 0.5) / 3)`, which keeps the initial mean inside the domain of the
/// logit link for 0/1 responses.
pub fn fit<F: GlmFamily + ?Sized>(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    missing: &[bool],
    family: &F,
    config: &IrlsConfig,
) -> Result<IrlsFit, FitError> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(FitError::ResponseLength {
            rows: n,
            found: y.len(),
        });
    }
    if missing.len() != n {
        return Err(FitError::MaskLength {
            rows: n,
            found: missing.len(),
        });
    }
    if p == 0 {
        return Err(FitError::EmptyDesign);
    }

    let prior: Array1<f64> = missing.iter().map(|&m| if m { 0.0 } else { 1.0 }).collect();
    let start: Array1<f64> = y
        .iter()
        .zip(missing)
        .map(|(&yi, &m)| if m { 0.0 } else { family.eta((yi + 0.5) / 3.0) })
        .collect();

    let mut beta = match weighted_least_squares(x, start.view(), prior.view(), config.solve_mode) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("IRLS initialization failed for {} model: {e}", family.name());
            return Ok(IrlsFit::failed(FitStatus::SolveFailed, 0, Array1::zeros(p)));
        }
    };
    let mut eta = x.dot(&beta);
    let mut mu = eta.mapv(|e| family.mean(e));
    let mut log_l = family.log_likelihood(mu.view(), y, missing, None);
    let mut damped = false;
    let mut iterations = 0;
    let mut converged = false;

    while !converged && iterations < config.max_iterations {
        let link_derivative = mu.mapv(|m| family.link_derivative(m));
        let weights = working_weights(family, mu.view(), link_derivative.view(), missing);
        let mut z = &eta + &(&link_derivative * &(&y - &mu));
        Zip::from(&mut z).and(missing).for_each(|zi, &skip| {
            if skip {
                *zi = 0.0;
            }
        });

        let mut proposal = match weighted_least_squares(x, z.view(), weights.view(), config.solve_mode) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("IRLS iteration {} could not solve the weighted system: {e}", iterations + 1);
                return Ok(IrlsFit::failed(FitStatus::SolveFailed, iterations, beta));
            }
        };

        // At most one damped retry per fit.
        loop {
            let next_eta = x.dot(&proposal);
            let next_mu = next_eta.mapv(|e| family.mean(e));
            if mean_is_valid(family, next_mu.view(), missing) {
                eta = next_eta;
                mu = next_mu;
                break;
            }
            if damped {
                log::warn!(
                    "IRLS iteration {}: fitted mean left the {} domain after a damped step",
                    iterations + 1,
                    family.name()
                );
                return Ok(IrlsFit::failed(FitStatus::InvalidMean, iterations, proposal));
            }
            log::debug!("IRLS iteration {}: invalid mean, halving the step", iterations + 1);
            damped = true;
            proposal = 0.5 * &beta + 0.5 * &proposal;
        }

        beta = proposal;
        let previous_log_l = log_l;
        log_l = family.log_likelihood(mu.view(), y, missing, None);
        iterations += 1;
        let change = relative_change(log_l, previous_log_l);
        converged = change < config.tolerance;

        log::debug!("[IRLS Iter #{iterations}] log-likelihood {log_l:.8e}, relative change {change:.3e}");
    }

    if !converged {
        log::warn!(
            "IRLS did not converge within {} iterations (last log-likelihood {log_l:.6e}).",
            config.max_iterations
        );
        return Ok(IrlsFit::failed(FitStatus::DidNotConverge, iterations, beta));
    }

    // Fisher information at the converged mean.
    let link_derivative = mu.mapv(|m| family.link_derivative(m));
    let weights = working_weights(family, mu.view(), link_derivative.view(), missing);
    let (a, _) = weighted_system(x, eta.view(), weights.view());
    let information = a.t().dot(&a);
    if !information.iter().all(|v| v.is_finite()) {
        return Ok(IrlsFit::failed(FitStatus::SingularInformation, iterations, beta));
    }
    let covariance = match information.inv() {
        Ok(c) if c.iter().all(|v| v.is_finite()) => c,
        _ => return Ok(IrlsFit::failed(FitStatus::SingularInformation, iterations, beta)),
    };

    let dispersion = family.dispersion(mu.view(), y, missing, p);
    if !dispersion.is_finite() || dispersion < 0.0 {
        return Ok(IrlsFit::failed(FitStatus::UndefinedDispersion, iterations, beta));
    }

    let coefficients = beta
        .iter()
        .zip(covariance.diag())
        .map(|(&estimate, &variance)| {
            let standard_error = Some((dispersion * variance).sqrt()).filter(|se| se.is_finite());
            let chi_square = standard_error
                .map(|se| (estimate / se).powi(2))
                .filter(|c| c.is_finite());
            let p_value = chi_square.and_then(|c| chi_square_sf(c, 1).ok());
            CoefficientTest {
                estimate,
                standard_error,
                chi_square,
                p_value,
            }
        })
        .collect();

    let log_likelihood =
        Some(family.log_likelihood(mu.view(), y, missing, Some(dispersion))).filter(|l| l.is_finite());

    Ok(IrlsFit {
        beta,
        status: FitStatus::Converged,
        iterations,
        statistics: Some(FitStatistics {
            coefficients,
            information,
            covariance,
            mu,
            dispersion,
            log_likelihood,
        }),
    })
}

/// [`fit`] with every sample present.
pub fn fit_complete<F: GlmFamily + ?Sized>(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    family: &F,
    config: &IrlsConfig,
) -> Result<IrlsFit, FitError> {
    let missing = vec![false; y.len()];
    fit(x, y, &missing, family, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{BinomialLogit, GaussianIdentity};
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn design_with_intercept(columns: &[Vec<f64>]) -> Array2<f64> {
        let n = columns[0].len();
        Array2::from_shape_fn((n, columns.len() + 1), |(i, j)| {
            if j == 0 { 1.0 } else { columns[j - 1][i] }
        })
    }

    #[test]
    fn gaussian_fit_recovers_exact_linear_relationship() {
        let x1: Vec<f64> = (0..30).map(|i| i as f64 / 3.0).collect();
        let x2: Vec<f64> = (0..30).map(|i| ((i * 7) % 11) as f64).collect();
        let x = design_with_intercept(&[x1, x2]);
        let truth = arr1(&[1.5, -0.75, 0.25]);
        let y = x.dot(&truth);

        let fit = fit_complete(x.view(), y.view(), &GaussianIdentity, &IrlsConfig::default()).unwrap();

        assert!(fit.converged());
        // Convergence compares successive log-likelihoods, so the solution
        // reached by the first step is only confirmed by the second.
        assert_eq!(fit.iterations, 2);
        for (b, t) in fit.beta.iter().zip(truth.iter()) {
            assert_abs_diff_eq!(*b, *t, epsilon = 1e-9);
        }
        assert!(fit.statistics.unwrap().dispersion < 1e-20);

        let one_step = IrlsConfig {
            max_iterations: 1,
            ..IrlsConfig::default()
        };
        let fit = fit_complete(x.view(), y.view(), &GaussianIdentity, &one_step).unwrap();
        assert_eq!(fit.status, FitStatus::DidNotConverge);
        assert_eq!(fit.iterations, 1);
        for (b, t) in fit.beta.iter().zip(truth.iter()) {
            assert_abs_diff_eq!(*b, *t, epsilon = 1e-9);
        }
    }

    #[test]
    fn saturated_gaussian_fit_has_undefined_dispersion() {
        let x = arr2(&[[1.0, 0.0], [1.0, 1.0]]);
        let y = arr1(&[1.0, 3.0]);

        let fit = fit_complete(x.view(), y.view(), &GaussianIdentity, &IrlsConfig::default()).unwrap();
        assert_eq!(fit.status, FitStatus::UndefinedDispersion);
        assert!(fit.statistics.is_none());
        assert_abs_diff_eq!(fit.beta[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.beta[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn gaussian_standard_errors_match_ordinary_least_squares() {
        let x = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0], [1.0, 4.0]]);
        let y = arr1(&[0.1, 0.9, 2.2, 2.8, 4.1]);

        for solve_mode in [SolveMode::Robust, SolveMode::Fast] {
            let config = IrlsConfig {
                solve_mode,
                ..IrlsConfig::default()
            };
            let fit = fit_complete(x.view(), y.view(), &GaussianIdentity, &config).unwrap();
            assert!(fit.converged(), "{solve_mode:?}");
            assert_ordinary_least_squares(&fit, &y);
        }
    }

    fn assert_ordinary_least_squares(fit: &IrlsFit, y: &Array1<f64>) {
        let stats = fit.statistics.as_ref().unwrap();

        // Closed form: slope = Sxy / Sxx, sigma^2 = RSS / (n - 2), se(slope) = sqrt(sigma^2 / Sxx).
        let slope = 9.9 / 10.0;
        let intercept = 2.02 - slope * 2.0;
        assert_abs_diff_eq!(fit.beta[1], slope, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.beta[0], intercept, epsilon = 1e-10);
        let rss: f64 = (0..5)
            .map(|i| {
                let r = y[i] - intercept - slope * i as f64;
                r * r
            })
            .sum();
        let sigma2 = rss / 3.0;
        assert_abs_diff_eq!(stats.dispersion, sigma2, epsilon = 1e-10);
        let se_slope = stats.coefficients[1].standard_error.unwrap();
        assert_abs_diff_eq!(se_slope, (sigma2 / 10.0).sqrt(), epsilon = 1e-10);
        assert!(stats.coefficients[1].p_value.unwrap() < 1e-3);
    }

    #[test]
    fn duplicated_column_is_a_solve_failure() {
        let base: Vec<f64> = (0..20).map(|i| (i % 5) as f64).collect();
        let x = design_with_intercept(&[base.clone(), base]);
        let y: Array1<f64> = (0..20).map(|i| i as f64 * 0.1).collect();

        let fit = fit_complete(x.view(), y.view(), &GaussianIdentity, &IrlsConfig::default()).unwrap();
        assert_eq!(fit.status, FitStatus::SolveFailed);
        assert!(fit.statistics.is_none());
    }

    #[test]
    fn robust_solver_reports_rank() {
        let x = arr2(&[[1.0, 0.0, 1.0], [1.0, 1.0, 2.0], [1.0, 2.0, 3.0], [1.0, 3.0, 4.0]]);
        let z = arr1(&[0.1, 0.2, 0.3, 0.4]);
        let w = arr1(&[1.0, 1.0, 1.0, 1.0]);
        match weighted_least_squares(x.view(), z.view(), w.view(), SolveMode::Robust) {
            Err(SolveError::RankDeficient { rank, columns }) => {
                assert_eq!(rank, 2);
                assert_eq!(columns, 3);
            }
            other => panic!("expected rank deficiency, got {other:?}"),
        }
    }

    #[test]
    fn fast_and_robust_solvers_agree_on_well_conditioned_data() {
        let x = arr2(&[[1.0, 0.5], [1.0, 1.5], [1.0, 2.0], [1.0, 3.5], [1.0, 4.0]]);
        let z = arr1(&[1.0, 2.1, 2.9, 4.2, 5.1]);
        let w = arr1(&[1.0, 2.0, 0.5, 1.0, 0.0]);
        let robust = weighted_least_squares(x.view(), z.view(), w.view(), SolveMode::Robust).unwrap();
        let fast = weighted_least_squares(x.view(), z.view(), w.view(), SolveMode::Fast).unwrap();
        for (r, f) in robust.iter().zip(fast.iter()) {
            assert_abs_diff_eq!(*r, *f, epsilon = 1e-9);
        }
    }

    #[test]
    fn missing_samples_are_excluded_even_with_garbage_values() {
        let x = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, f64::NAN], [1.0, 3.0]]);
        let y = arr1(&[1.0, 3.0, 5.0, f64::NAN, 7.0]);
        let missing = [false, false, false, true, false];

        let fit = fit(x.view(), y.view(), &missing, &GaussianIdentity, &IrlsConfig::default()).unwrap();
        assert!(fit.converged());
        assert_abs_diff_eq!(fit.beta[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.beta[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn logistic_fit_converges_and_finds_the_effect() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 2000;
        let x1: Vec<f64> = (0..n).map(|_| rng.gen_range(0..3) as f64).collect();
        let y: Array1<f64> = x1
            .iter()
            .map(|&g| {
                let p = 1.0 / (1.0 + (-(-1.0 + 0.8 * g)).exp());
                if rng.r#gen::<f64>() < p { 1.0 } else { 0.0 }
            })
            .collect();
        let x = design_with_intercept(&[x1]);

        let fit = fit_complete(x.view(), y.view(), &BinomialLogit, &IrlsConfig::default()).unwrap();
        assert!(fit.converged());
        assert!(fit.iterations < 25);
        assert!((fit.beta[1] - 0.8).abs() < 0.2, "slope {}", fit.beta[1]);
        let stats = fit.statistics.unwrap();
        assert_eq!(stats.dispersion, 1.0);
        assert!(stats.coefficients[1].p_value.unwrap() < 1e-10);
        assert!(stats.log_likelihood.unwrap() < 0.0);
    }

    /// Identity-link Gaussian with adjustable failure modes.
    struct TestGaussian {
        /// Means at or above this are invalid.
        ceiling: f64,
        /// Means above this get infinite variance, hence zero weight.
        weightless_above: f64,
        dispersion: Option<f64>,
        /// Constant log-likelihood, so the first step always converges.
        flat: bool,
    }

    impl Default for TestGaussian {
        fn default() -> Self {
            Self {
                ceiling: f64::INFINITY,
                weightless_above: f64::INFINITY,
                dispersion: None,
                flat: false,
            }
        }
    }

    impl GlmFamily for TestGaussian {
        fn name(&self) -> &'static str {
            "test-gaussian"
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
        fn variance(&self, mu: f64) -> f64 {
            if mu > self.weightless_above { f64::INFINITY } else { 1.0 }
        }
        fn is_valid_mean(&self, mu: f64) -> bool {
            mu < self.ceiling
        }
        fn log_likelihood(
            &self,
            mu: ArrayView1<f64>,
            y: ArrayView1<f64>,
            missing: &[bool],
            dispersion: Option<f64>,
        ) -> f64 {
            if self.flat {
                0.0
            } else {
                GaussianIdentity.log_likelihood(mu, y, missing, dispersion)
            }
        }
        fn dispersion(
            &self,
            mu: ArrayView1<f64>,
            y: ArrayView1<f64>,
            missing: &[bool],
            parameters: usize,
        ) -> f64 {
            self.dispersion
                .unwrap_or_else(|| GaussianIdentity.dispersion(mu, y, missing, parameters))
        }
    }

    #[test]
    fn information_without_weight_on_a_column_is_singular() {
        // Group b starts near 3.5 and lands on 10 after one step, where it carries no weight.
        let group: Vec<f64> = (0..10).map(|i| if i < 5 { 0.0 } else { 1.0 }).collect();
        let y: Array1<f64> = group.iter().map(|&g| if g == 0.0 { 1.0 } else { 10.0 }).collect();
        let x = design_with_intercept(&[group]);
        let family = TestGaussian {
            weightless_above: 5.0,
            flat: true,
            ..TestGaussian::default()
        };

        for solve_mode in [SolveMode::Robust, SolveMode::Fast] {
            let config = IrlsConfig {
                solve_mode,
                ..IrlsConfig::default()
            };
            let fit = fit_complete(x.view(), y.view(), &family, &config).unwrap();
            assert_eq!(fit.status, FitStatus::SingularInformation, "{solve_mode:?}");
            assert_eq!(fit.iterations, 1);
            assert!(fit.statistics.is_none());
            assert_abs_diff_eq!(fit.beta[1], 9.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn overflowing_coefficient_statistic_leaves_the_others_tested() {
        // Centered slope with a symmetric response: the slope estimate is zero
        // up to rounding while the intercept is 1000.
        let x = design_with_intercept(&[vec![-2.0, -1.0, 0.0, 1.0, 2.0]]);
        let y = arr1(&[1000.0, 1001.0, 999.0, 1001.0, 1000.0]);
        let family = TestGaussian {
            dispersion: Some(f64::MIN_POSITIVE),
            ..TestGaussian::default()
        };

        let fit = fit_complete(x.view(), y.view(), &family, &IrlsConfig::default()).unwrap();
        assert!(fit.converged());
        let stats = fit.statistics.unwrap();
        let intercept = &stats.coefficients[0];
        assert!(intercept.standard_error.is_some());
        assert_eq!(intercept.chi_square, None);
        assert_eq!(intercept.p_value, None);
        let slope = &stats.coefficients[1];
        assert!(slope.chi_square.is_some());
        assert!(slope.p_value.is_some());
    }

    fn ramp() -> (Array2<f64>, Array1<f64>) {
        // Least squares puts the largest fitted value at 18; the starting point at about 6.2.
        let x = design_with_intercept(&[(0..10).map(|i| i as f64).collect()]);
        let y: Array1<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        (x, y)
    }

    #[test]
    fn invalid_mean_after_damped_step_fails_the_fit() {
        let (x, y) = ramp();
        // Full step reaches 18, the half step about 12.1: both invalid.
        let family = TestGaussian {
            ceiling: 11.0,
            ..TestGaussian::default()
        };
        let fit = fit_complete(x.view(), y.view(), &family, &IrlsConfig::default()).unwrap();
        assert_eq!(fit.status, FitStatus::InvalidMean);
        assert_eq!(fit.iterations, 0);
        assert!(fit.statistics.is_none());
    }

    #[test]
    fn only_one_damped_step_is_allowed_per_fit() {
        let (x, y) = ramp();
        // The half step is accepted, then the next full step is invalid again.
        let family = TestGaussian {
            ceiling: 13.0,
            ..TestGaussian::default()
        };
        let fit = fit_complete(x.view(), y.view(), &family, &IrlsConfig::default()).unwrap();
        assert_eq!(fit.status, FitStatus::InvalidMean);
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let x1: Vec<f64> = (0..100).map(|_| noise.sample(&mut rng)).collect();
        let y: Array1<f64> = x1
            .iter()
            .map(|&v| if v + noise.sample(&mut rng) > 0.0 { 1.0 } else { 0.0 })
            .collect();
        let x = design_with_intercept(&[x1]);
        let config = IrlsConfig {
            max_iterations: 1,
            ..IrlsConfig::default()
        };

        let fit = fit_complete(x.view(), y.view(), &BinomialLogit, &config).unwrap();
        assert_eq!(fit.status, FitStatus::DidNotConverge);
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn dimension_mismatches_are_errors() {
        let x = Array2::<f64>::ones((4, 2));
        let y = arr1(&[1.0, 2.0, 3.0]);
        assert_eq!(
            fit_complete(x.view(), y.view(), &GaussianIdentity, &IrlsConfig::default()).unwrap_err(),
            FitError::ResponseLength { rows: 4, found: 3 }
        );
        let y = arr1(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            fit(x.view(), y.view(), &[false], &GaussianIdentity, &IrlsConfig::default()).unwrap_err(),
            FitError::MaskLength { rows: 4, found: 1 }
        );
        let empty = Array2::<f64>::zeros((4, 0));
        assert_eq!(
            fit_complete(empty.view(), y.view(), &GaussianIdentity, &IrlsConfig::default()).unwrap_err(),
            FitError::EmptyDesign
        );
    }
}
