//! The weighted posterior samples collected during a run.

use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    math::{log_sum_exp, mean_and_stdev},
    model::Model,
    walker::Walker,
};

/// A walker as it was when it was discarded.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: usize,
    pub parent: Option<usize>,
    /// The model at the time; dynamic models differ between samples.
    pub model: Model,
    pub parameters: Vec<f64>,
    pub hypars: Vec<f64>,
    pub log_l: f64,
    pub log_w: f64,
}

impl Sample {
    pub fn from_walker(walker: &Walker) -> Self {
        Self {
            id: walker.id,
            parent: walker.parent,
            model: walker.problem.model.clone(),
            parameters: walker.parameters().to_vec(),
            hypars: walker.hypars().to_vec(),
            log_l: walker.log_l,
            log_w: walker.log_w,
        }
    }

    pub fn npars(&self) -> usize {
        self.parameters.len()
    }
}

fn model_pars(sample: &Sample) -> &[f64] {
    &sample.parameters
}

fn hyper_pars(sample: &Sample) -> &[f64] {
    &sample.hypars
}

/// Samples in the order they were taken, with the evidence and information
/// of the run.
#[derive(Debug, Clone)]
pub struct SampleList {
    samples: Vec<Sample>,
    log_z: f64,
    info: f64,
}

impl Default for SampleList {
    fn default() -> Self {
        Self {
            samples: vec![],
            log_z: f64::NEG_INFINITY,
            info: 0.,
        }
    }
}

impl SampleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn log_z(&self) -> f64 {
        self.log_z
    }

    pub fn info(&self) -> f64 {
        self.info
    }

    pub(crate) fn set_evidence(&mut self, log_z: f64, info: f64) {
        self.log_z = log_z;
        self.info = info;
    }

    /// Drop the lowest-weight samples until at most `max_size` are left.
    /// The order of the remaining ones is kept.
    pub fn weed(&mut self, max_size: usize) {
        if self.samples.len() <= max_size {
            return;
        }
        let ndrop = self.samples.len() - max_size;
        let mut drop = vec![false; self.samples.len()];
        self.samples
            .iter()
            .enumerate()
            .sorted_by(|(_, a), (_, b)| a.log_w.total_cmp(&b.log_w))
            .take(ndrop)
            .for_each(|(i, _)| drop[i] = true);
        let mut drop = drop.into_iter();
        self.samples.retain(|_| !drop.next().unwrap_or(false));
    }

    /// Shift the log weights so that the weights add up to one.
    pub fn normalize(&mut self) {
        let norm = log_sum_exp(self.samples.iter().map(|s| s.log_w));
        if !norm.is_finite() {
            return;
        }
        for sample in self.samples.iter_mut() {
            sample.log_w -= norm;
        }
    }

    pub fn weights(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.log_w.exp()).collect()
    }

    fn modal_dim(&self, value: impl Fn(&Sample) -> &[f64]) -> usize {
        let counts: HashMap<usize, usize> = self.samples.iter().map(|s| value(s).len()).counts();
        counts
            .into_iter()
            .max_by_key(|&(len, count)| (count, std::cmp::Reverse(len)))
            .map_or(0, |(len, _)| len)
    }

    fn moments(&self, value: impl Fn(&Sample) -> &[f64] + Copy) -> (Vec<f64>, Vec<f64>) {
        let dim = self.modal_dim(value);
        let selected = self
            .samples
            .iter()
            .filter(|s| value(s).len() == dim)
            .collect_vec();
        let weights = selected.iter().map(|s| s.log_w.exp()).collect_vec();
        (0..dim)
            .map(|k| {
                let values = selected.iter().map(|s| value(s)[k]).collect_vec();
                mean_and_stdev(&values, &weights)
            })
            .unzip()
    }

    /// Weighted mean of the model parameters.
    ///
    /// For dynamic models only the samples with the most frequent number of
    /// parameters take part.
    pub fn parameters(&self) -> Vec<f64> {
        self.moments(model_pars).0
    }

    pub fn stdevs(&self) -> Vec<f64> {
        self.moments(model_pars).1
    }

    pub fn hypars(&self) -> Vec<f64> {
        self.moments(hyper_pars).0
    }

    pub fn stdev_hypars(&self) -> Vec<f64> {
        self.moments(hyper_pars).1
    }

    /// The most frequent number of model parameters among the samples.
    pub fn modal_dimension(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.modal_dim(model_pars))
    }

    /// The sample with the highest likelihood.
    pub fn max_likelihood_sample(&self) -> Option<&Sample> {
        self.samples.iter().max_by(|a, b| a.log_l.total_cmp(&b.log_l))
    }

    pub fn max_likelihood_parameters(&self) -> Option<&[f64]> {
        self.max_likelihood_sample().map(|s| s.parameters.as_slice())
    }

    /// The k-th model parameter over the samples, NaN where a sample has
    /// fewer parameters.
    pub fn parameter_evolution(&self, k: usize) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.parameters.get(k).copied().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn log_l_evolution(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.log_l).collect()
    }

    pub fn log_w_evolution(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.log_w).collect()
    }

    /// Posterior-weighted average of the sampled models at `xdata`.
    pub fn average(&self, xdata: &[f64]) -> Vec<f64> {
        let mut total = vec![0.; xdata.len()];
        let mut sum_weights = 0.;
        for sample in self.samples.iter() {
            let weight = sample.log_w.exp();
            if weight == 0. {
                continue;
            }
            sum_weights += weight;
            for (acc, x) in total.iter_mut().zip(xdata) {
                *acc += weight * sample.model.evaluate(*x, &sample.parameters);
            }
        }
        if sum_weights > 0. {
            total.iter_mut().for_each(|acc| *acc /= sum_weights);
        }
        total
    }
}
