//! Walkers, the fit index and the unit-range bookkeeping of the ensemble.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{distribution::ErrorDistribution, model::Resize, problem::Problem};

/// Position of a parameter in the combined vector of a walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParIndex {
    /// The k-th model parameter.
    Model(usize),
    /// The h-th hyperparameter of the error distribution.
    Hyper(usize),
}

/// The parameters that are free to vary, model entries first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitIndex {
    entries: Vec<ParIndex>,
}

impl FitIndex {
    /// All model parameters plus the free hyperparameters, minus everything
    /// in `keep`.
    pub fn new(
        npars: usize,
        free_hypars: impl IntoIterator<Item = usize>,
        keep: &BTreeMap<ParIndex, f64>,
    ) -> Self {
        let entries = (0..npars)
            .map(ParIndex::Model)
            .chain(free_hypars.into_iter().map(ParIndex::Hyper))
            .filter(|index| !keep.contains_key(index))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ParIndex] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParIndex> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the model parameters in the removed span and shift the ones
    /// behind it.
    pub(crate) fn remove_span(&mut self, resize: Resize) {
        let end = resize.start + resize.count;
        self.entries.retain(|index| match index {
            ParIndex::Model(k) => *k < resize.start || *k >= end,
            ParIndex::Hyper(_) => true,
        });
        for index in self.entries.iter_mut() {
            if let ParIndex::Model(k) = index {
                if *k >= end {
                    *k -= resize.count;
                }
            }
        }
    }

    /// Make room for an inserted span of model parameters, all of them free.
    pub(crate) fn insert_span(&mut self, resize: Resize) {
        for index in self.entries.iter_mut() {
            if let ParIndex::Model(k) = index {
                if *k >= resize.start {
                    *k += resize.count;
                }
            }
        }
        self.entries
            .extend((resize.start..resize.start + resize.count).map(ParIndex::Model));
        self.entries.sort_unstable();
    }
}

/// One member of the ensemble.
#[derive(Debug, Clone)]
pub struct Walker {
    /// The ensemble slot the walker lives in.
    pub id: usize,
    pub problem: Problem,
    /// Model parameters followed by the hyperparameters.
    pub allpars: Vec<f64>,
    pub fit_index: FitIndex,
    pub log_l: f64,
    /// Only meaningful once the walker was stored as a sample.
    pub log_w: f64,
    /// The slot this walker was copied from.
    pub parent: Option<usize>,
}

impl Walker {
    pub fn new(id: usize, problem: Problem, allpars: Vec<f64>, fit_index: FitIndex) -> Self {
        Self {
            id,
            problem,
            allpars,
            fit_index,
            log_l: f64::NEG_INFINITY,
            log_w: f64::NEG_INFINITY,
            parent: None,
        }
    }

    pub fn npars(&self) -> usize {
        self.problem.npars()
    }

    pub fn parameters(&self) -> &[f64] {
        &self.allpars[..self.npars()]
    }

    pub fn hypars(&self) -> &[f64] {
        &self.allpars[self.npars()..]
    }

    /// Position of `index` in `allpars`.
    pub fn slot(&self, index: ParIndex) -> usize {
        match index {
            ParIndex::Model(k) => k,
            ParIndex::Hyper(h) => self.npars() + h,
        }
    }

    pub fn value(&self, index: ParIndex) -> f64 {
        self.allpars[self.slot(index)]
    }

    pub fn to_unit(&self, index: ParIndex, distribution: &dyn ErrorDistribution) -> f64 {
        let value = self.value(index);
        match index {
            ParIndex::Model(k) => self.problem.domain_to_unit(value, k),
            ParIndex::Hyper(h) => distribution.hyper_domain_to_unit(value, h),
        }
    }

    pub fn from_unit(
        &self,
        unit: f64,
        index: ParIndex,
        distribution: &dyn ErrorDistribution,
    ) -> f64 {
        match index {
            ParIndex::Model(k) => self.problem.unit_to_domain(unit, k),
            ParIndex::Hyper(h) => distribution.hyper_unit_to_domain(unit, h),
        }
    }

    /// Re-evaluate the log-likelihood at the current parameters.
    pub fn evaluate(&mut self, distribution: &dyn ErrorDistribution) {
        self.log_l = distribution.log_likelihood(&self.problem, &self.allpars);
    }

    /// Turn this walker into a copy of `other`, keeping its own slot.
    pub(crate) fn copy_from(&mut self, other: &Walker) {
        let id = self.id;
        self.clone_from(other);
        self.id = id;
        self.parent = Some(other.id);
    }
}

/// The `discard` worst walkers among the first `ensemble` slots, in
/// ascending order of likelihood, and the likelihood floor they define.
pub fn find_worst(walkers: &[Walker], ensemble: usize, discard: usize) -> (Vec<usize>, f64) {
    let worst = (0..ensemble)
        .sorted_by(|&a, &b| walkers[a].log_l.total_cmp(&walkers[b].log_l))
        .take(discard)
        .collect_vec();
    let low_lhood = worst
        .last()
        .map_or(f64::NEG_INFINITY, |&slot| walkers[slot].log_l);
    (worst, low_lhood)
}

/// Extent of the ensemble in unit space, per parameter.
///
/// Indices the ensemble does not cover get the full range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitRange {
    model_range: Vec<f64>,
    model_min: Vec<f64>,
    hyper_range: Vec<f64>,
    hyper_min: Vec<f64>,
}

impl UnitRange {
    pub fn range(&self, index: ParIndex) -> f64 {
        match index {
            ParIndex::Model(k) => self.model_range.get(k),
            ParIndex::Hyper(h) => self.hyper_range.get(h),
        }
        .copied()
        .unwrap_or(1.)
    }

    pub fn min(&self, index: ParIndex) -> f64 {
        match index {
            ParIndex::Model(k) => self.model_min.get(k),
            ParIndex::Hyper(h) => self.hyper_min.get(h),
        }
        .copied()
        .unwrap_or(0.)
    }

    /// Range and minimum of every parameter over the walkers.
    ///
    /// A parameter that is not present in all walkers, or that has collapsed
    /// to a single value, gets range 1 and minimum 0.
    pub fn calculate(walkers: &[Walker], distribution: &dyn ErrorDistribution) -> Self {
        let npars = walkers.iter().map(|w| w.npars()).max().unwrap_or(0);
        let nhyper = distribution.nphypar();
        let mut unit_range = UnitRange {
            model_range: vec![1.; npars],
            model_min: vec![0.; npars],
            hyper_range: vec![1.; nhyper],
            hyper_min: vec![0.; nhyper],
        };
        if walkers.is_empty() {
            return unit_range;
        }

        for k in 0..npars {
            if let Some((lo, hi)) = extent(walkers, ParIndex::Model(k), distribution) {
                unit_range.model_range[k] = hi - lo;
                unit_range.model_min[k] = lo;
            }
        }
        for h in 0..nhyper {
            if let Some((lo, hi)) = extent(walkers, ParIndex::Hyper(h), distribution) {
                unit_range.hyper_range[h] = hi - lo;
                unit_range.hyper_min[h] = lo;
            }
        }
        unit_range
    }
}

fn extent(
    walkers: &[Walker],
    index: ParIndex,
    distribution: &dyn ErrorDistribution,
) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for walker in walkers {
        if walker.slot(index) >= walker.allpars.len() {
            return None;
        }
        if let ParIndex::Model(k) = index {
            if k >= walker.npars() {
                return None;
            }
        }
        let unit = walker.to_unit(index, distribution);
        lo = lo.min(unit);
        hi = hi.max(unit);
    }
    (hi > lo).then_some((lo, hi))
}
