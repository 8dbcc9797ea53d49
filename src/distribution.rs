//! Error distributions turn the residuals of a problem into a log-likelihood.
//!
//! The sampler only relies on the [`ErrorDistribution`] trait. The families
//! that come with the crate are all served by [`StandardDistribution`],
//! selected by a [`DistributionKind`].

use std::{
    fmt::Debug,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use statrs::function::gamma::ln_gamma;

use crate::{
    error::NestedError,
    math::{sum, weighted_sum},
    prior::Prior,
    problem::Problem,
};

/// A parameter of the error distribution, like the noise scale.
///
/// A hyperparameter takes part in the fit only if it is not fixed and has a
/// prior.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperParameter {
    pub name: &'static str,
    pub value: f64,
    pub prior: Option<Prior>,
    pub fixed: bool,
}

impl HyperParameter {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self {
            name,
            value,
            prior: None,
            fixed: true,
        }
    }

    pub fn is_free(&self) -> bool {
        !self.fixed && self.prior.is_some()
    }
}

/// Computes the log-likelihood of a problem at given parameters.
///
/// Implementations must be safe for concurrent evaluation, walkers are
/// explored in parallel.
pub trait ErrorDistribution: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// The hyperparameters, in the order they follow the model parameters.
    fn hyperpars(&self) -> &[HyperParameter];

    /// The log-likelihood for model parameters `params` and hyperparameter
    /// values `hypars`.
    fn log_likelihood_of(&self, problem: &Problem, params: &[f64], hypars: &[f64]) -> f64;

    /// Counter of likelihood evaluations.
    fn call_counter(&self) -> &AtomicU64;

    fn nphypar(&self) -> usize {
        self.hyperpars().len()
    }

    /// The log-likelihood at `allpars`, the model parameters followed by the
    /// hyperparameters.
    fn log_likelihood(&self, problem: &Problem, allpars: &[f64]) -> f64 {
        self.call_counter().fetch_add(1, Ordering::Relaxed);
        let npars = problem.npars();
        self.log_likelihood_of(problem, &allpars[..npars], &allpars[npars..])
    }

    fn ncalls(&self) -> u64 {
        self.call_counter().load(Ordering::Relaxed)
    }

    fn reset_calls(&self) {
        self.call_counter().store(0, Ordering::Relaxed);
    }

    fn hyper_domain_to_unit(&self, value: f64, index: usize) -> f64 {
        self.hyperpars()[index]
            .prior
            .map_or(value, |prior| prior.domain_to_unit(value))
    }

    fn hyper_unit_to_domain(&self, unit: f64, index: usize) -> f64 {
        self.hyperpars()[index]
            .prior
            .map_or(unit, |prior| prior.unit_to_domain(unit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    Gauss,
    Laplace,
    Poisson,
    Cauchy,
    Uniform,
    GenGauss,
}

impl FromStr for DistributionKind {
    type Err = NestedError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "gauss" | "gaussian" => Ok(DistributionKind::Gauss),
            "laplace" => Ok(DistributionKind::Laplace),
            "poisson" => Ok(DistributionKind::Poisson),
            "cauchy" => Ok(DistributionKind::Cauchy),
            "uniform" => Ok(DistributionKind::Uniform),
            "gengauss" | "generalized-gaussian" => Ok(DistributionKind::GenGauss),
            _ => Err(NestedError::UnknownDistribution(name.to_string())),
        }
    }
}

impl DistributionKind {
    pub fn name(&self) -> &'static str {
        match self {
            DistributionKind::Gauss => "GaussErrorDistribution",
            DistributionKind::Laplace => "LaplaceErrorDistribution",
            DistributionKind::Poisson => "PoissonErrorDistribution",
            DistributionKind::Cauchy => "CauchyErrorDistribution",
            DistributionKind::Uniform => "UniformErrorDistribution",
            DistributionKind::GenGauss => "GenGaussErrorDistribution",
        }
    }
}

/// The error distributions of the crate.
///
/// All but Poisson carry a `scale` hyperparameter; the generalized Gaussian
/// also has a `power`.
#[derive(Debug)]
pub struct StandardDistribution {
    kind: DistributionKind,
    hyperpars: Vec<HyperParameter>,
    ncalls: AtomicU64,
}

impl StandardDistribution {
    pub fn new(kind: DistributionKind, scale: f64, power: f64) -> Self {
        let hyperpars = match kind {
            DistributionKind::Poisson => vec![],
            DistributionKind::GenGauss => vec![
                HyperParameter::new("scale", scale),
                HyperParameter::new("power", power),
            ],
            _ => vec![HyperParameter::new("scale", scale)],
        };
        Self {
            kind,
            hyperpars,
            ncalls: AtomicU64::new(0),
        }
    }

    pub fn gauss(scale: f64) -> Self {
        Self::new(DistributionKind::Gauss, scale, 2.)
    }

    pub fn kind(&self) -> DistributionKind {
        self.kind
    }

    /// Let the hyperparameter called `name` take part in the fit.
    pub fn with_prior(mut self, name: &str, prior: Prior) -> Result<Self, NestedError> {
        let hyper = self
            .hyperpars
            .iter_mut()
            .find(|hyper| hyper.name == name)
            .ok_or_else(|| {
                NestedError::InvalidSettings(format!(
                    "{} has no hyperparameter {}",
                    self.kind.name(),
                    name
                ))
            })?;
        hyper.prior = Some(prior);
        hyper.fixed = false;
        Ok(self)
    }

    fn weighted(&self, problem: &Problem, terms: &[f64]) -> f64 {
        match &problem.data.weights {
            Some(weights) => weighted_sum(terms, weights),
            None => sum(terms),
        }
    }
}

impl ErrorDistribution for StandardDistribution {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn hyperpars(&self) -> &[HyperParameter] {
        &self.hyperpars
    }

    fn call_counter(&self) -> &AtomicU64 {
        &self.ncalls
    }

    fn log_likelihood_of(&self, problem: &Problem, params: &[f64], hypars: &[f64]) -> f64 {
        let nsum = problem.data.sum_weights();
        let scale = hypars.first().copied().unwrap_or(1.);
        if self.kind != DistributionKind::Poisson && !(scale > 0.) {
            return f64::NEG_INFINITY;
        }

        match self.kind {
            DistributionKind::Gauss => {
                let terms: Vec<f64> = problem
                    .residuals(params)
                    .into_iter()
                    .map(|r| {
                        let z = r / scale;
                        z * z
                    })
                    .collect();
                -0.5 * self.weighted(problem, &terms)
                    - nsum * (scale.ln() + 0.5 * (2. * std::f64::consts::PI).ln())
            }
            DistributionKind::Laplace => {
                let terms: Vec<f64> = problem
                    .residuals(params)
                    .into_iter()
                    .map(|r| (r / scale).abs())
                    .collect();
                -self.weighted(problem, &terms) - nsum * (2. * scale).ln()
            }
            DistributionKind::Cauchy => {
                let terms: Vec<f64> = problem
                    .residuals(params)
                    .into_iter()
                    .map(|r| (r / scale).powi(2).ln_1p())
                    .collect();
                -self.weighted(problem, &terms) - nsum * (std::f64::consts::PI * scale).ln()
            }
            DistributionKind::Uniform => {
                let inside = problem
                    .residuals(params)
                    .into_iter()
                    .all(|r| r.abs() <= scale);
                if inside {
                    -nsum * (2. * scale).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            DistributionKind::GenGauss => {
                let power = hypars.get(1).copied().unwrap_or(2.);
                if !(power > 0.) {
                    return f64::NEG_INFINITY;
                }
                let terms: Vec<f64> = problem
                    .residuals(params)
                    .into_iter()
                    .map(|r| (r / scale).abs().powf(power))
                    .collect();
                -self.weighted(problem, &terms)
                    + nsum * (power.ln() - (2. * scale).ln() - ln_gamma(1. / power))
            }
            DistributionKind::Poisson => {
                let mock = problem.result(params);
                let mut terms = Vec::with_capacity(mock.len());
                for (&m, &y) in mock.iter().zip(problem.data.ydata.iter()) {
                    if m < 0. || (m == 0. && y > 0.) {
                        return f64::NEG_INFINITY;
                    }
                    let log_term = if y > 0. { y * m.ln() } else { 0. };
                    terms.push(log_term - m - ln_gamma(y + 1.));
                }
                self.weighted(problem, &terms)
            }
        }
    }
}
