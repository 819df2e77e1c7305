use std::cmp::Ordering;
use std::ops::{Add, Div, Mul};

/// A non-negative quantity held as its natural logarithm.
///
/// Likelihoods of a few thousand samples underflow `f64` long before they become
/// uninteresting, so they are combined here without ever leaving log space.
/// Products and quotients add and subtract logs; sums use log-sum-exp.
/// [`LogScalar::value`] is the only way back to the linear domain and is meant
/// for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScalar {
    log: f64,
}

impl LogScalar {
    pub fn from_log(log: f64) -> Self {
        Self { log }
    }

    /// Wraps a linear-domain value. Negative inputs have no logarithm and map to NaN.
    pub fn from_value(value: f64) -> Self {
        Self { log: value.ln() }
    }

    pub fn zero() -> Self {
        Self {
            log: f64::NEG_INFINITY,
        }
    }

    pub fn one() -> Self {
        Self { log: 0.0 }
    }

    pub fn log_value(&self) -> f64 {
        self.log
    }

    pub fn value(&self) -> f64 {
        self.log.exp()
    }

    pub fn is_zero(&self) -> bool {
        self.log == f64::NEG_INFINITY
    }
}

impl Add for LogScalar {
    type Output = LogScalar;

    fn add(self, rhs: LogScalar) -> LogScalar {
        let (hi, lo) = if self.log >= rhs.log {
            (self.log, rhs.log)
        } else {
            (rhs.log, self.log)
        };
        if lo == f64::NEG_INFINITY {
            return LogScalar::from_log(hi);
        }
        LogScalar::from_log(hi + (lo - hi).exp().ln_1p())
    }
}

impl Mul for LogScalar {
    type Output = LogScalar;

    fn mul(self, rhs: LogScalar) -> LogScalar {
        LogScalar::from_log(self.log + rhs.log)
    }
}

impl Div for LogScalar {
    type Output = LogScalar;

    fn div(self, rhs: LogScalar) -> LogScalar {
        LogScalar::from_log(self.log - rhs.log)
    }
}

impl PartialOrd for LogScalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.log.partial_cmp(&other.log)
    }
}
