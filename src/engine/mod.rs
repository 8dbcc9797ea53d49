//! Engines move a walker around under a likelihood floor.
//!
//! All moves happen in unit space. An engine only touches the entries of the
//! walker's fit index and only commits a new state once its likelihood
//! reaches the floor, so a failed attempt leaves the walker untouched.

use std::{fmt::Debug, ops::AddAssign, str::FromStr};

use rand_chacha::ChaCha8Rng;

use crate::{
    distribution::ErrorDistribution,
    error::NestedError,
    walker::{UnitRange, Walker},
};

mod birth;
mod death;
mod galilean;
mod gibbs;
mod start;
mod step;

pub use birth::BirthEngine;
pub use death::DeathEngine;
pub use galilean::GalileanEngine;
pub use gibbs::GibbsEngine;
pub use start::StartEngine;
pub use step::StepEngine;

/// The random generator handed to engines.
pub type EngineRng = ChaCha8Rng;

/// Shared, read-only state of one exploration.
#[derive(Debug, Clone, Copy)]
pub struct EngineContext<'a> {
    pub distribution: &'a dyn ErrorDistribution,
    pub unit_range: &'a UnitRange,
    pub rate: f64,
    pub max_trials: usize,
}

/// Counters of an engine over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Calls that moved the walker.
    pub success: u64,
    /// Trial states that fell below the floor.
    pub reject: u64,
    /// Calls that did not move the walker.
    pub failed: u64,
    /// Moves that produced a new best walker.
    pub best: u64,
    pub calls: u64,
}

impl AddAssign for EngineReport {
    fn add_assign(&mut self, other: Self) {
        self.success += other.success;
        self.reject += other.reject;
        self.failed += other.failed;
        self.best += other.best;
        self.calls += other.calls;
    }
}

impl EngineReport {
    pub(crate) fn finish(&mut self, moves: usize) -> usize {
        if moves > 0 {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        moves
    }
}

/// The best walker state passed through while exploring.
#[derive(Debug, Clone)]
pub struct BestWalker {
    log_l: f64,
    walker: Option<Walker>,
}

impl Default for BestWalker {
    fn default() -> Self {
        Self::new(f64::NEG_INFINITY)
    }
}

impl BestWalker {
    /// Only states above `log_l` are kept.
    pub fn new(log_l: f64) -> Self {
        Self { log_l, walker: None }
    }

    pub fn log_l(&self) -> f64 {
        self.log_l
    }

    /// Keep a copy of `walker` if it beats every state offered so far.
    pub fn offer(&mut self, walker: &Walker) -> bool {
        if walker.log_l > self.log_l {
            self.log_l = walker.log_l;
            self.walker = Some(walker.clone());
            true
        } else {
            false
        }
    }

    pub fn walker(&self) -> Option<&Walker> {
        self.walker.as_ref()
    }

    pub fn into_walker(self) -> Option<Walker> {
        self.walker
    }
}

pub trait Engine: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Try to move `walker` to a new state with `log_l >= low_lhood`.
    ///
    /// Every accepted state is offered to `best`. Returns the number of
    /// parameter changes, zero if the walker was left as it was.
    fn execute(
        &self,
        walker: &mut Walker,
        low_lhood: f64,
        ctx: &EngineContext<'_>,
        rng: &mut EngineRng,
        report: &mut EngineReport,
        best: &mut BestWalker,
    ) -> usize;
}

/// The engines that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Galilean,
    Gibbs,
    Step,
    Birth,
    Death,
}

impl FromStr for EngineKind {
    type Err = NestedError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "galilean" => Ok(EngineKind::Galilean),
            "gibbs" => Ok(EngineKind::Gibbs),
            "step" => Ok(EngineKind::Step),
            "birth" => Ok(EngineKind::Birth),
            "death" => Ok(EngineKind::Death),
            _ => Err(NestedError::UnknownEngine(name.to_string())),
        }
    }
}

impl EngineKind {
    pub fn build(&self) -> Box<dyn Engine> {
        match self {
            EngineKind::Galilean => Box::new(GalileanEngine::default()),
            EngineKind::Gibbs => Box::new(GibbsEngine),
            EngineKind::Step => Box::new(StepEngine),
            EngineKind::Birth => Box::new(BirthEngine),
            EngineKind::Death => Box::new(DeathEngine),
        }
    }

    /// Whether the engine changes the number of parameters.
    pub fn is_structural(&self) -> bool {
        matches!(self, EngineKind::Birth | EngineKind::Death)
    }
}

/// The unit-space coordinates of the free entries of `walker`.
pub(crate) fn unit_point(walker: &Walker, ctx: &EngineContext<'_>) -> Vec<f64> {
    walker
        .fit_index
        .iter()
        .map(|&index| walker.to_unit(index, ctx.distribution))
        .collect()
}

/// Parameters and log-likelihood of `walker` with its free entries placed at
/// `units`.
pub(crate) fn trial_state(
    walker: &Walker,
    units: &[f64],
    ctx: &EngineContext<'_>,
) -> (Vec<f64>, f64) {
    let mut allpars = walker.allpars.clone();
    for (&index, &unit) in walker.fit_index.iter().zip(units) {
        allpars[walker.slot(index)] = walker.from_unit(unit, index, ctx.distribution);
    }
    let log_l = ctx
        .distribution
        .log_likelihood(&walker.problem, &allpars);
    (allpars, log_l)
}
