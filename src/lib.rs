//! Nested sampling for Bayesian model fitting.
//!
//! A [`NestedSampler`] keeps an ensemble of walkers drawn from the prior.
//! In every iteration the worst walkers are stored as weighted posterior
//! samples and replaced by copies of survivors, which the engines then move
//! around above the rising likelihood floor. The evidence and the
//! information are accumulated along the way.
//!
//! ```no_run
//! use nested_rs::{Dataset, Model, NestedSampler, NestedSamplerSettings, Polynomial, Prior};
//!
//! let xdata: Vec<f64> = (0..50).map(|i| i as f64 / 10.).collect();
//! let ydata: Vec<f64> = xdata.iter().map(|x| 1. + 0.5 * x).collect();
//! let data = Dataset::new(xdata, ydata, None).unwrap();
//! let model = Model::new(Polynomial::new(1).with_prior(Prior::uniform(-5., 5.).unwrap()));
//!
//! let settings = NestedSamplerSettings {
//!     scale: 0.1,
//!     ..Default::default()
//! };
//! let mut sampler = NestedSampler::new(data, model, settings).unwrap();
//! let evidence = sampler.sample().unwrap();
//! println!("log10 Z = {evidence} +- {}", sampler.precision());
//! println!("parameters {:?}", sampler.parameters());
//! ```

mod components;
mod distribution;
mod engine;
mod error;
mod explorer;
pub(crate) mod math;
mod model;
mod prior;
mod problem;
mod restart;
mod sampler;
mod samples;
mod storage;
mod walker;

pub use components::{DynamicPolynomial, Polynomial, RepeatingGauss};
pub use distribution::{
    DistributionKind, ErrorDistribution, HyperParameter, StandardDistribution,
};
pub use engine::{
    BestWalker, BirthEngine, DeathEngine, Engine, EngineContext, EngineKind, EngineReport,
    EngineRng, GalileanEngine, GibbsEngine, StartEngine, StepEngine,
};
pub use error::{NestedError, Result};
pub use explorer::Explorer;
pub use model::{Component, Dynamic, Model, Resize};
pub use prior::Prior;
pub use problem::{Dataset, Problem};
pub use restart::{Checkpoint, MemoryRestart, Restart};
pub use sampler::{NestedSampler, NestedSamplerSettings, Progress, ProgressCallback};
pub use samples::{Sample, SampleList};
pub use walker::{find_worst, FitIndex, ParIndex, UnitRange, Walker};
