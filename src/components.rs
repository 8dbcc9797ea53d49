use rand::Rng;

use crate::{
    engine::EngineRng,
    model::{Component, Dynamic},
    prior::Prior,
};

/// Draw a value from an optional prior; without one the unit draw is used.
fn draw(prior: Option<&Prior>, rng: &mut EngineRng) -> f64 {
    let unit: f64 = rng.random();
    prior.map_or(unit, |prior| prior.unit_to_domain(unit))
}

fn horner(x: f64, coefs: &[f64]) -> f64 {
    coefs.iter().rev().fold(0., |acc, c| acc * x + c)
}

/// Polynomial of fixed degree, `sum_k p_k x^k`.
#[derive(Debug, Clone)]
pub struct Polynomial {
    degree: usize,
    prior: Option<Prior>,
}

impl Polynomial {
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            prior: None,
        }
    }

    /// Use the same prior for all coefficients.
    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = Some(prior);
        self
    }
}

impl Component for Polynomial {
    fn name(&self) -> String {
        format!("Polynomial: degree = {}", self.degree)
    }

    fn npars(&self) -> usize {
        self.degree + 1
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        horner(x, params)
    }

    fn prior(&self, k: usize) -> Option<&Prior> {
        if k < self.npars() {
            self.prior.as_ref()
        } else {
            None
        }
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

/// Polynomial whose degree is sampled along with its coefficients.
#[derive(Debug, Clone)]
pub struct DynamicPolynomial {
    degree: usize,
    min_degree: usize,
    max_degree: Option<usize>,
    prior: Option<Prior>,
    grow_prior: Prior,
}

impl DynamicPolynomial {
    pub fn new(degree: usize, grow_prior: Prior) -> Self {
        Self {
            degree,
            min_degree: 0,
            max_degree: None,
            prior: None,
            grow_prior,
        }
    }

    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn with_limits(mut self, min_degree: usize, max_degree: Option<usize>) -> Self {
        self.min_degree = min_degree;
        self.max_degree = max_degree;
        self
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl Component for DynamicPolynomial {
    fn name(&self) -> String {
        format!("DynamicPolynomial: degree = {}", self.degree)
    }

    fn npars(&self) -> usize {
        self.degree + 1
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        horner(x, params)
    }

    fn prior(&self, k: usize) -> Option<&Prior> {
        if k < self.npars() {
            self.prior.as_ref()
        } else {
            None
        }
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }

    fn as_dynamic_mut(&mut self) -> Option<&mut dyn Dynamic> {
        Some(self)
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

impl Dynamic for DynamicPolynomial {
    fn ncomp(&self) -> usize {
        self.degree + 1
    }

    fn grow_prior(&self) -> &Prior {
        &self.grow_prior
    }

    fn grow(&mut self, params: &mut Vec<f64>, rng: &mut EngineRng) -> bool {
        if self.max_degree.is_some_and(|max| self.degree >= max) {
            return false;
        }
        params.push(draw(self.prior.as_ref(), rng));
        self.degree += 1;
        true
    }

    fn shrink(&mut self, params: &mut Vec<f64>, _rng: &mut EngineRng) -> bool {
        if self.degree <= self.min_degree {
            return false;
        }
        params.pop();
        self.degree -= 1;
        true
    }
}

/// A variable number of Gaussian bumps, each with amplitude, center and
/// width.
#[derive(Debug, Clone)]
pub struct RepeatingGauss {
    ncomp: usize,
    min_comp: usize,
    max_comp: Option<usize>,
    priors: [Option<Prior>; 3],
    grow_prior: Prior,
}

impl RepeatingGauss {
    const NPBASE: usize = 3;

    pub fn new(ncomp: usize, grow_prior: Prior) -> Self {
        Self {
            ncomp,
            min_comp: 1,
            max_comp: None,
            priors: [None; 3],
            grow_prior,
        }
    }

    /// Priors for the amplitude, center and width of every bump.
    pub fn with_priors(mut self, amplitude: Prior, center: Prior, width: Prior) -> Self {
        self.priors = [Some(amplitude), Some(center), Some(width)];
        self
    }

    pub fn with_limits(mut self, min_comp: usize, max_comp: Option<usize>) -> Self {
        self.min_comp = min_comp.max(1);
        self.max_comp = max_comp;
        self
    }
}

impl Component for RepeatingGauss {
    fn name(&self) -> String {
        format!("RepeatingGauss: {} bumps", self.ncomp)
    }

    fn npars(&self) -> usize {
        self.ncomp * Self::NPBASE
    }

    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        params
            .chunks_exact(Self::NPBASE)
            .map(|bump| {
                let z = (x - bump[1]) / bump[2];
                bump[0] * (-0.5 * z * z).exp()
            })
            .sum()
    }

    fn prior(&self, k: usize) -> Option<&Prior> {
        if k < self.npars() {
            self.priors[k % Self::NPBASE].as_ref()
        } else {
            None
        }
    }

    fn as_dynamic(&self) -> Option<&dyn Dynamic> {
        Some(self)
    }

    fn as_dynamic_mut(&mut self) -> Option<&mut dyn Dynamic> {
        Some(self)
    }

    fn boxed_clone(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

impl Dynamic for RepeatingGauss {
    fn ncomp(&self) -> usize {
        self.ncomp
    }

    fn grow_prior(&self) -> &Prior {
        &self.grow_prior
    }

    fn grow(&mut self, params: &mut Vec<f64>, rng: &mut EngineRng) -> bool {
        if self.max_comp.is_some_and(|max| self.ncomp >= max) {
            return false;
        }
        for prior in self.priors.iter() {
            params.push(draw(prior.as_ref(), rng));
        }
        self.ncomp += 1;
        true
    }

    fn shrink(&mut self, params: &mut Vec<f64>, _rng: &mut EngineRng) -> bool {
        if self.ncomp <= self.min_comp {
            return false;
        }
        params.truncate(params.len() - Self::NPBASE);
        self.ncomp -= 1;
        true
    }

    fn shuffle(&self, params: &mut [f64], rng: &mut EngineRng) {
        if self.ncomp < 2 {
            return;
        }
        let last = self.ncomp - 1;
        let pick = rng.random_range(0..self.ncomp);
        if pick == last {
            return;
        }
        for k in 0..Self::NPBASE {
            params.swap(pick * Self::NPBASE + k, last * Self::NPBASE + k);
        }
    }
}
