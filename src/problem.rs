use std::sync::Arc;

use crate::{error::NestedError, model::Model};

/// The data to be fitted. It is shared by all walkers.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub xdata: Vec<f64>,
    pub ydata: Vec<f64>,
    pub weights: Option<Vec<f64>>,
}

impl Dataset {
    pub fn new(
        xdata: Vec<f64>,
        ydata: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, NestedError> {
        if ydata.is_empty() {
            return Err(NestedError::EmptyData);
        }
        if xdata.len() != ydata.len() {
            return Err(NestedError::DataMismatch {
                what: "xdata",
                expected: ydata.len(),
                found: xdata.len(),
            });
        }
        if let Some(weights) = &weights {
            if weights.len() != ydata.len() {
                return Err(NestedError::DataMismatch {
                    what: "weights",
                    expected: ydata.len(),
                    found: weights.len(),
                });
            }
        }
        Ok(Self {
            xdata,
            ydata,
            weights,
        })
    }

    pub fn len(&self) -> usize {
        self.ydata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ydata.is_empty()
    }

    /// The effective number of data points: the sum of the weights.
    pub fn sum_weights(&self) -> f64 {
        match &self.weights {
            Some(weights) => crate::math::sum(weights),
            None => self.len() as f64,
        }
    }
}

/// A model bound to a dataset.
#[derive(Debug, Clone)]
pub struct Problem {
    pub model: Model,
    pub data: Arc<Dataset>,
}

impl Problem {
    pub fn new(model: Model, data: Arc<Dataset>) -> Self {
        Self { model, data }
    }

    pub fn npars(&self) -> usize {
        self.model.npars()
    }

    /// The model evaluated at all x values.
    pub fn result(&self, params: &[f64]) -> Vec<f64> {
        self.model.result(&self.data.xdata, params)
    }

    /// Residuals `y - model` for the given model parameters.
    pub fn residuals(&self, params: &[f64]) -> Vec<f64> {
        self.data
            .xdata
            .iter()
            .zip(self.data.ydata.iter())
            .map(|(&x, &y)| y - self.model.evaluate(x, params))
            .collect()
    }

    /// Map the k-th model parameter from domain to unit space. Parameters
    /// without a prior are passed through unchanged.
    pub fn domain_to_unit(&self, value: f64, k: usize) -> f64 {
        self.model
            .prior(k)
            .map_or(value, |prior| prior.domain_to_unit(value))
    }

    pub fn unit_to_domain(&self, unit: f64, k: usize) -> f64 {
        self.model
            .prior(k)
            .map_or(unit, |prior| prior.unit_to_domain(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::Polynomial, prior::Prior};
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn dataset_validation() {
        assert!(matches!(
            Dataset::new(vec![], vec![], None),
            Err(NestedError::EmptyData)
        ));
        assert!(matches!(
            Dataset::new(vec![1.], vec![1., 2.], None),
            Err(NestedError::DataMismatch { what: "xdata", .. })
        ));
        assert!(matches!(
            Dataset::new(vec![1., 2.], vec![1., 2.], Some(vec![1.])),
            Err(NestedError::DataMismatch { what: "weights", .. })
        ));
        let data = Dataset::new(vec![1., 2.], vec![1., 2.], Some(vec![2., 3.])).unwrap();
        assert_eq!(data.sum_weights(), 5.);
    }

    #[test]
    fn residuals_and_mapping() {
        let data = Arc::new(Dataset::new(vec![0., 1.], vec![1., 3.], None).unwrap());
        let model = Model::new(Polynomial::new(1).with_prior(Prior::uniform(-4., 4.).unwrap()));
        let problem = Problem::new(model, data);
        assert_eq!(problem.residuals(&[1., 1.]), vec![0., 1.]);
        assert_eq!(problem.result(&[1., 1.]), vec![1., 2.]);
        assert_abs_diff_eq!(problem.domain_to_unit(0., 1), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(problem.unit_to_domain(0.75, 0), 2., epsilon = 1e-4);
    }
}
