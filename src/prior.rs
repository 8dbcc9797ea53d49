//! Prior distributions of single parameters.
//!
//! Every sampler move happens in unit space: a parameter value is mapped to
//! `[0, 1]` through the cumulative distribution of its prior and back
//! through the inverse.

use statrs::{
    distribution::{Cauchy, ContinuousCDF, Exp, Laplace, Uniform},
    statistics::{Max, Min},
};

use crate::error::NestedError;

const UNIT_EPS: f64 = 1e-12;

/// The prior of a single (hyper)parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prior {
    /// Flat between two limits.
    Uniform(Uniform),
    /// Flat in `ln(x)`; the wrapped distribution lives on the log scale.
    Jeffreys(Uniform),
    /// Exponential on `[0, inf)`.
    Exponential(Exp),
    Laplace(Laplace),
    Cauchy(Cauchy),
}

fn invalid(what: &str, err: impl std::fmt::Display) -> NestedError {
    NestedError::InvalidPrior(format!("{}: {}", what, err))
}

impl Prior {
    pub fn uniform(low: f64, high: f64) -> Result<Self, NestedError> {
        Uniform::new(low, high)
            .map(Prior::Uniform)
            .map_err(|err| invalid("uniform", err))
    }

    /// Both limits have to be positive.
    pub fn jeffreys(low: f64, high: f64) -> Result<Self, NestedError> {
        if !(low > 0.) {
            return Err(invalid("jeffreys", format!("lower limit {} is not positive", low)));
        }
        Uniform::new(low.ln(), high.ln())
            .map(Prior::Jeffreys)
            .map_err(|err| invalid("jeffreys", err))
    }

    pub fn exponential(scale: f64) -> Result<Self, NestedError> {
        Exp::new(1. / scale)
            .map(Prior::Exponential)
            .map_err(|err| invalid("exponential", err))
    }

    pub fn laplace(center: f64, scale: f64) -> Result<Self, NestedError> {
        Laplace::new(center, scale)
            .map(Prior::Laplace)
            .map_err(|err| invalid("laplace", err))
    }

    pub fn cauchy(center: f64, scale: f64) -> Result<Self, NestedError> {
        Cauchy::new(center, scale)
            .map(Prior::Cauchy)
            .map_err(|err| invalid("cauchy", err))
    }

    /// The domain limits of the prior, infinite where it is unbounded.
    pub fn limits(&self) -> (f64, f64) {
        match self {
            Prior::Uniform(dist) => (dist.min(), dist.max()),
            Prior::Jeffreys(dist) => (dist.min().exp(), dist.max().exp()),
            Prior::Exponential(_) => (0., f64::INFINITY),
            Prior::Laplace(_) | Prior::Cauchy(_) => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// Inverse cumulative distribution.
    pub fn unit_to_domain(&self, unit: f64) -> f64 {
        match self {
            Prior::Uniform(dist) => dist.inverse_cdf(unit.clamp(0., 1.)),
            Prior::Jeffreys(dist) => dist.inverse_cdf(unit.clamp(0., 1.)).exp(),
            Prior::Exponential(dist) => dist.inverse_cdf(unit.clamp(0., 1. - UNIT_EPS)),
            Prior::Laplace(dist) => dist.inverse_cdf(unit.clamp(UNIT_EPS, 1. - UNIT_EPS)),
            Prior::Cauchy(dist) => dist.inverse_cdf(unit.clamp(UNIT_EPS, 1. - UNIT_EPS)),
        }
    }

    /// Cumulative distribution.
    pub fn domain_to_unit(&self, value: f64) -> f64 {
        let unit = match self {
            Prior::Uniform(dist) => dist.cdf(value),
            Prior::Jeffreys(dist) => {
                if value <= 0. {
                    0.
                } else {
                    dist.cdf(value.ln())
                }
            }
            Prior::Exponential(dist) => dist.cdf(value),
            Prior::Laplace(dist) => dist.cdf(value),
            Prior::Cauchy(dist) => dist.cdf(value),
        };
        unit.clamp(0., 1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn priors() -> Vec<Prior> {
        vec![
            Prior::uniform(-2., 3.).unwrap(),
            Prior::jeffreys(0.01, 100.).unwrap(),
            Prior::exponential(2.).unwrap(),
            Prior::laplace(1., 0.5).unwrap(),
            Prior::cauchy(-1., 2.).unwrap(),
        ]
    }

    proptest! {
        #[test]
        fn unit_domain_inverse(unit in 0.001f64..0.999f64) {
            for prior in priors() {
                let value = prior.unit_to_domain(unit);
                let (low, high) = prior.limits();
                prop_assert!(value >= low && value <= high);
                prop_assert!((prior.domain_to_unit(value) - unit).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn medians() {
        let median = |prior: Prior| prior.unit_to_domain(0.5);
        assert_abs_diff_eq!(median(Prior::uniform(-2., 2.).unwrap()), 0., epsilon = 1e-4);
        assert_abs_diff_eq!(median(Prior::jeffreys(0.01, 100.).unwrap()), 1., epsilon = 1e-4);
        assert_abs_diff_eq!(
            median(Prior::exponential(1.).unwrap()),
            2f64.ln(),
            epsilon = 1e-4
        );
        assert_abs_diff_eq!(median(Prior::cauchy(3., 1.).unwrap()), 3., epsilon = 1e-4);
    }

    #[test]
    fn clamped_outside_support() {
        let prior = Prior::uniform(0., 1.).unwrap();
        assert_eq!(prior.domain_to_unit(-1.), 0.);
        assert_eq!(prior.domain_to_unit(2.), 1.);
        assert_eq!(Prior::jeffreys(1., 10.).unwrap().domain_to_unit(-1.), 0.);
        assert!(Prior::cauchy(0., 1.).unwrap().unit_to_domain(0.).is_finite());
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            Prior::uniform(2., 1.),
            Err(NestedError::InvalidPrior(_))
        ));
        assert!(Prior::jeffreys(0., 1.).is_err());
        assert!(Prior::exponential(-1.).is_err());
        assert!(Prior::cauchy(0., 0.).is_err());
    }
}
