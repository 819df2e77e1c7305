//! Per-pair analysis methods and the sequential driver that walks SNP pairs.
//!
//! A method is built once per scan around the shared [`MethodData`] and then
//! called for every pair. Each call returns a row of values whose layout is
//! given by [`PairMethod::header`]; entries that could not be computed hold
//! [`RESULT_MISSING`].

use crate::counts::{CountError, CountTable};
use crate::design::{DesignError, DesignMatrix};
use crate::family::GlmFamily;
use crate::irls::{self, FitError, IrlsConfig};
use crate::log_scalar::LogScalar;
use crate::nested::{FullModel, InterceptModel, NestedModel, SingleLocusModel};
use crate::stats::{Undefined, likelihood_ratio_test};
use crate::types::{GenotypeRow, Locus, RESULT_MISSING};
use crate::wald::{self, WaldOptions};
use ndarray::Array1;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MethodError {
    #[error("phenotype has {phenotype} samples but the missing-sample mask has {mask}")]
    MaskLength { phenotype: usize, mask: usize },

    #[error(transparent)]
    Counts(#[from] CountError),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Read-only inputs shared by every pair of a scan.
#[derive(Debug, Clone)]
pub struct MethodData {
    pub phenotype: Array1<f64>,
    /// Samples excluded from every fit. Non-finite phenotypes are always flagged.
    pub missing: Vec<bool>,
}

impl MethodData {
    pub fn new(phenotype: Array1<f64>, missing: Option<Vec<bool>>) -> Result<Self, MethodError> {
        let mut missing = missing.unwrap_or_else(|| vec![false; phenotype.len()]);
        if missing.len() != phenotype.len() {
            return Err(MethodError::MaskLength {
                phenotype: phenotype.len(),
                mask: missing.len(),
            });
        }
        for (flag, y) in missing.iter_mut().zip(phenotype.iter()) {
            *flag |= !y.is_finite();
        }
        Ok(Self { phenotype, missing })
    }

    pub fn samples(&self) -> usize {
        self.phenotype.len()
    }
}

/// Result of running a method on one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    /// One entry per header column.
    pub values: Vec<f64>,
    /// Value compared against a scan threshold, when defined.
    pub statistic: Option<f64>,
    /// Samples that contributed to the fit.
    pub samples: usize,
}

impl PairOutcome {
    fn missing(columns: usize, samples: usize) -> Self {
        Self {
            values: vec![RESULT_MISSING; columns],
            statistic: None,
            samples,
        }
    }
}

pub trait PairMethod {
    fn header(&self) -> Vec<String>;

    fn run(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
    ) -> Result<PairOutcome, MethodError>;
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn log_or_missing(value: &Result<LogScalar, Undefined>) -> f64 {
    value.as_ref().map_or(RESULT_MISSING, |l| l.log_value())
}

/// Closed-form Wald test of the 2x2 interaction contrasts in a linear model.
#[derive(Debug, Clone)]
pub struct WaldLmMethod {
    data: Arc<MethodData>,
    options: WaldOptions,
}

impl WaldLmMethod {
    pub fn new(data: Arc<MethodData>, options: WaldOptions) -> Self {
        Self { data, options }
    }
}

impl PairMethod for WaldLmMethod {
    fn header(&self) -> Vec<String> {
        columns(&["LR", "P", "df"])
    }

    fn run(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
    ) -> Result<PairOutcome, MethodError> {
        let table = CountTable::from_pair(
            row1,
            row2,
            self.data.phenotype.view(),
            Some(self.data.missing.as_slice()),
        )?;
        let samples = wald::retained_samples(&table, &self.options) as usize;
        let mut outcome = PairOutcome::missing(3, samples);

        match wald::fit(&table, &self.options) {
            Ok(test) => {
                outcome.values = vec![test.statistic, test.p_value, test.df as f64];
                outcome.statistic = Some(test.p_value);
            }
            Err(reason) => log::debug!("Wald interaction test undefined: {reason}"),
        }
        Ok(outcome)
    }
}

/// Likelihoods of the nested Gaussian models and the saturated-versus-intercept
/// likelihood-ratio test.
#[derive(Debug, Clone)]
pub struct StepwiseMethod {
    data: Arc<MethodData>,
}

impl StepwiseMethod {
    pub fn new(data: Arc<MethodData>) -> Self {
        Self { data }
    }
}

impl PairMethod for StepwiseMethod {
    fn header(&self) -> Vec<String> {
        columns(&["LL_full", "LL_intercept", "LL_single1", "LL_single2", "LR", "P"])
    }

    fn run(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
    ) -> Result<PairOutcome, MethodError> {
        let table = CountTable::from_pair(
            row1,
            row2,
            self.data.phenotype.view(),
            Some(self.data.missing.as_slice()),
        )?;
        let mut outcome = PairOutcome::missing(6, table.samples() as usize);

        let full = FullModel.log_likelihood(&table);
        let intercept = InterceptModel.log_likelihood(&table);
        let first = SingleLocusModel::new(Locus::First).log_likelihood(&table);
        let second = SingleLocusModel::new(Locus::Second).log_likelihood(&table);
        outcome.values[0] = log_or_missing(&full);
        outcome.values[1] = log_or_missing(&intercept);
        outcome.values[2] = log_or_missing(&first);
        outcome.values[3] = log_or_missing(&second);

        if let (Ok(full), Ok(intercept)) = (full, intercept) {
            let df = FullModel.parameter_count() - InterceptModel.parameter_count();
            match likelihood_ratio_test(full, intercept, df) {
                Ok(lr) => {
                    outcome.values[4] = lr.statistic;
                    outcome.values[5] = lr.p_value;
                    outcome.statistic = Some(lr.p_value);
                }
                Err(reason) => log::debug!("stepwise likelihood ratio undefined: {reason}"),
            }
        }
        Ok(outcome)
    }
}

/// IRLS fits of the null and alternative designs for an arbitrary family.
/// Reports the last alternative coefficient, which carries the interaction.
pub struct GlmMethod<F: GlmFamily> {
    data: Arc<MethodData>,
    family: F,
    design: Box<dyn DesignMatrix>,
    config: IrlsConfig,
    mask: Vec<bool>,
}

impl<F: GlmFamily> GlmMethod<F> {
    pub fn new(
        data: Arc<MethodData>,
        family: F,
        design: Box<dyn DesignMatrix>,
        config: IrlsConfig,
    ) -> Self {
        let mask = data.missing.clone();
        Self {
            data,
            family,
            design,
            config,
            mask,
        }
    }
}

impl<F: GlmFamily> PairMethod for GlmMethod<F> {
    fn header(&self) -> Vec<String> {
        columns(&["beta", "SE", "LR", "P"])
    }

    fn run(
        &mut self,
        row1: &dyn GenotypeRow,
        row2: &dyn GenotypeRow,
    ) -> Result<PairOutcome, MethodError> {
        self.mask.copy_from_slice(&self.data.missing);
        self.design.update(row1, row2, &mut self.mask)?;

        let y = self.data.phenotype.view();
        let null = irls::fit(self.design.null(), y, &self.mask, &self.family, &self.config)?;
        let alt = irls::fit(self.design.alternative(), y, &self.mask, &self.family, &self.config)?;

        let samples = self.mask.iter().filter(|&&m| !m).count();
        let mut outcome = PairOutcome::missing(4, samples);

        let Some(alt_stats) = alt.statistics.as_ref() else {
            log::debug!("{} alternative fit failed: {:?}", self.family.name(), alt.status);
            return Ok(outcome);
        };
        if let Some(interaction) = alt_stats.coefficients.last() {
            outcome.values[0] = interaction.estimate;
            outcome.values[1] = interaction.standard_error.unwrap_or(RESULT_MISSING);
        }

        let null_log_l = null.statistics.as_ref().and_then(|s| s.log_likelihood);
        if let (Some(alt_log_l), Some(null_log_l)) = (alt_stats.log_likelihood, null_log_l) {
            let lr = likelihood_ratio_test(
                LogScalar::from_log(alt_log_l),
                LogScalar::from_log(null_log_l),
                self.design.num_df(),
            );
            match lr {
                Ok(lr) => {
                    outcome.values[2] = lr.statistic;
                    outcome.values[3] = lr.p_value;
                    outcome.statistic = Some(lr.p_value);
                }
                Err(reason) => log::debug!("GLM likelihood ratio undefined: {reason}"),
            }
        }
        Ok(outcome)
    }
}

/// Named genotype rows available to a scan.
pub trait GenotypeSource {
    fn row(&self, name: &str) -> Option<&dyn GenotypeRow>;
}

impl<R: GenotypeRow> GenotypeSource for HashMap<String, R> {
    fn row(&self, name: &str) -> Option<&dyn GenotypeRow> {
        self.get(name).map(|r| r as &dyn GenotypeRow)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub first: String,
    pub second: String,
    /// The method's values followed by the contributing sample count.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResults {
    pub header: Vec<String>,
    pub rows: Vec<PairResult>,
}

/// Runs `method` over `pairs` in order.
///
/// Pairs naming an unknown SNP are skipped. With a threshold, a pair is kept
/// only when its statistic is defined and does not exceed it.
pub fn run_pairs<'a, M, S, I>(
    method: &mut M,
    source: &S,
    pairs: I,
    threshold: Option<f64>,
) -> Result<ScanResults, MethodError>
where
    M: PairMethod + ?Sized,
    S: GenotypeSource + ?Sized,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut header = method.header();
    header.push("N".to_string());

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (first, second) in pairs {
        let (Some(row1), Some(row2)) = (source.row(first), source.row(second)) else {
            skipped += 1;
            continue;
        };
        let outcome = method.run(row1, row2)?;
        if let Some(limit) = threshold {
            if outcome.statistic.is_none_or(|s| s > limit) {
                continue;
            }
        }
        let mut values = outcome.values;
        values.push(outcome.samples as f64);
        rows.push(PairResult {
            first: first.to_string(),
            second: second.to_string(),
            values,
        });
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} pairs naming SNPs without genotypes");
    }
    Ok(ScanResults { header, rows })
}
