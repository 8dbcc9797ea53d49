//! Core abstractions for the models the sampler fits.
//!
//! A [`Model`] is an ordered list of [`Component`]s whose results are added.
//! Each component owns a contiguous span of the parameter vector; the spans
//! are described by cumulative offsets that are recomputed whenever a
//! [`Dynamic`] component changes its size.

use std::fmt::Debug;

use crate::{engine::EngineRng, prior::Prior};

/// A building block of a [`Model`].
///
/// Components only describe structure. Parameter values live in the walkers,
/// so a component is cheap to clone for every member of the ensemble.
pub trait Component: Debug + Send + Sync {
    /// Short name used in reports.
    fn name(&self) -> String;

    /// The number of parameters the component currently consumes.
    fn npars(&self) -> usize;

    /// The value of the component at `x` for its own slice of parameters.
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    /// The prior of the k-th parameter of this component.
    fn prior(&self, k: usize) -> Option<&Prior>;

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        None
    }

    fn as_dynamic_mut(&mut self) -> Option<&mut dyn Dynamic> {
        None
    }

    fn boxed_clone(&self) -> Box<dyn Component>;
}

/// A component whose number of sub-components can change at runtime.
///
/// `grow` and `shrink` act on the component's own parameters and always
/// add or remove the trailing ones.
pub trait Dynamic {
    /// The number of sub-components presently in use.
    fn ncomp(&self) -> usize;

    /// Prior on the number of sub-components. It gates birth and death.
    fn grow_prior(&self) -> &Prior;

    /// Append one sub-component with parameters drawn from their priors.
    ///
    /// Returns false if the component is at its maximum size.
    fn grow(&mut self, params: &mut Vec<f64>, rng: &mut EngineRng) -> bool;

    /// Remove the trailing sub-component.
    ///
    /// Returns false if the component is at its minimum size.
    fn shrink(&mut self, params: &mut Vec<f64>, rng: &mut EngineRng) -> bool;

    /// Reorder the parameters so that the sub-component to be removed is the
    /// trailing one.
    fn shuffle(&self, _params: &mut [f64], _rng: &mut EngineRng) {}
}

/// The span of model parameters that was inserted or removed by a
/// structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub start: usize,
    pub count: usize,
}

/// A sum of components with precomputed parameter offsets.
#[derive(Debug)]
pub struct Model {
    components: Vec<Box<dyn Component>>,
    offsets: Vec<usize>,
}

impl Clone for Model {
    fn clone(&self) -> Self {
        Model {
            components: self.components.iter().map(|c| c.boxed_clone()).collect(),
            offsets: self.offsets.clone(),
        }
    }
}

impl Model {
    pub fn new(component: impl Component + 'static) -> Self {
        let mut model = Model {
            components: vec![Box::new(component)],
            offsets: vec![],
        };
        model.refresh_offsets();
        model
    }

    /// Append another component; the model becomes the sum of both.
    pub fn add_component(mut self, component: impl Component + 'static) -> Self {
        self.components.push(Box::new(component));
        self.refresh_offsets();
        self
    }

    fn refresh_offsets(&mut self) {
        self.offsets.clear();
        let mut offset = 0;
        for component in self.components.iter() {
            self.offsets.push(offset);
            offset += component.npars();
        }
        self.offsets.push(offset);
    }

    pub fn components(&self) -> &[Box<dyn Component>] {
        &self.components
    }

    /// The parameter offset of the i-th component.
    pub fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    pub fn npars(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    pub fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        assert!(params.len() == self.npars());
        self.components
            .iter()
            .zip(self.offsets.windows(2))
            .map(|(component, span)| component.evaluate(x, &params[span[0]..span[1]]))
            .sum()
    }

    /// Evaluate the model at every x value.
    pub fn result(&self, xdata: &[f64], params: &[f64]) -> Vec<f64> {
        xdata.iter().map(|&x| self.evaluate(x, params)).collect()
    }

    /// The prior of the k-th model parameter.
    pub fn prior(&self, k: usize) -> Option<&Prior> {
        let index = self.offsets[1..].partition_point(|&end| end <= k);
        let component = self.components.get(index)?;
        component.prior(k - self.offsets[index])
    }

    pub fn has_priors(&self) -> bool {
        (0..self.npars()).all(|k| self.prior(k).is_some())
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_component().is_some()
    }

    /// Index and parameter offset of the first dynamic component.
    pub fn dynamic_component(&self) -> Option<(usize, usize)> {
        self.components
            .iter()
            .position(|c| c.as_dynamic().is_some())
            .map(|index| (index, self.offsets[index]))
    }

    pub fn dynamic(&self) -> Option<&dyn Dynamic> {
        let (index, _) = self.dynamic_component()?;
        self.components[index].as_dynamic()
    }

    /// Grow the dynamic component by one sub-component, inserting the new
    /// parameters into `params`.
    pub(crate) fn grow_dynamic(
        &mut self,
        params: &mut Vec<f64>,
        rng: &mut EngineRng,
    ) -> Option<Resize> {
        let (index, offset) = self.dynamic_component()?;
        let npars = self.components[index].npars();
        let mut own = params[offset..offset + npars].to_vec();
        if !self.components[index].as_dynamic_mut()?.grow(&mut own, rng) {
            return None;
        }
        let resize = Resize {
            start: offset + npars,
            count: own.len() - npars,
        };
        params.splice(offset..offset + npars, own);
        self.refresh_offsets();
        Some(resize)
    }

    /// Remove one sub-component of the dynamic component from `params`.
    pub(crate) fn shrink_dynamic(
        &mut self,
        params: &mut Vec<f64>,
        rng: &mut EngineRng,
    ) -> Option<Resize> {
        let (index, offset) = self.dynamic_component()?;
        let npars = self.components[index].npars();
        let mut own = params[offset..offset + npars].to_vec();
        let dynamic = self.components[index].as_dynamic_mut()?;
        dynamic.shuffle(&mut own, rng);
        if !dynamic.shrink(&mut own, rng) {
            return None;
        }
        let resize = Resize {
            start: offset + own.len(),
            count: npars - own.len(),
        };
        params.splice(offset..offset + npars, own);
        self.refresh_offsets();
        Some(resize)
    }

    pub fn name(&self) -> String {
        self.components.iter().map(|c| c.name()).collect::<Vec<_>>().join(" + ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DynamicPolynomial, Polynomial};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[test]
    fn offsets_and_priors() {
        let model = Model::new(Polynomial::new(1).with_prior(Prior::uniform(-1., 1.).unwrap()))
            .add_component(Polynomial::new(2).with_prior(Prior::uniform(-5., 5.).unwrap()));
        assert_eq!(model.npars(), 5);
        assert_eq!(model.offset(1), 2);
        assert_eq!(model.prior(1), Some(&Prior::uniform(-1., 1.).unwrap()));
        assert_eq!(model.prior(2), Some(&Prior::uniform(-5., 5.).unwrap()));
        assert_eq!(model.prior(5), None);
        assert!(model.has_priors());
        assert!(!model.is_dynamic());

        // (1 + 2x) + (0 + 1x + 1x^2) at x = 2
        let value = model.evaluate(2., &[1., 2., 0., 1., 1.]);
        assert_eq!(value, 11.);
    }

    #[test]
    fn grow_and_shrink_keep_offsets() {
        let flat = Prior::uniform(-1., 1.).unwrap();
        let mut model = Model::new(Polynomial::new(0).with_prior(flat)).add_component(
            DynamicPolynomial::new(1, Prior::exponential(1.).unwrap()).with_prior(flat),
        );
        let mut rng = EngineRng::seed_from_u64(3);
        let mut params = vec![0.5, 0.1, 0.2];

        let resize = model.grow_dynamic(&mut params, &mut rng).unwrap();
        assert_eq!(resize, Resize { start: 3, count: 1 });
        assert_eq!(params.len(), 4);
        assert_eq!(model.npars(), 4);

        let resize = model.shrink_dynamic(&mut params, &mut rng).unwrap();
        assert_eq!(resize, Resize { start: 3, count: 1 });
        assert_eq!(params, vec![0.5, 0.1, 0.2]);
        assert_eq!(model.dynamic().map(|d| d.ncomp()), Some(2));
    }
}
