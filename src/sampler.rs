use std::{
    collections::BTreeMap,
    f64::consts::LN_10,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    distribution::{DistributionKind, ErrorDistribution, StandardDistribution},
    engine::{
        BestWalker, Engine, EngineContext, EngineKind, EngineReport, EngineRng, StartEngine,
    },
    error::NestedError,
    explorer::Explorer,
    math::logaddexp,
    model::Model,
    prior::Prior,
    problem::{Dataset, Problem},
    restart::{Checkpoint, Restart},
    samples::{Sample, SampleList},
    walker::{find_worst, FitIndex, ParIndex, UnitRange, Walker},
};

/// Settings for the nested sampler
#[derive(Debug, Clone)]
pub struct NestedSamplerSettings {
    /// The number of walkers in the ensemble.
    pub ensemble: usize,
    /// The number of walkers replaced in every iteration.
    pub discard: usize,
    pub seed: u64,
    /// Scales the step sizes of the engines and the number of moves a walker
    /// needs per iteration.
    pub rate: f64,
    /// The run stops once the iteration count exceeds
    /// `end_factor * ensemble * information / discard`.
    pub end_factor: f64,
    pub min_iterations: usize,
    pub max_iterations: Option<usize>,
    /// Weed the sample list down to this size while running.
    pub max_size: Option<usize>,
    /// Trials per engine call, and rounds of engines per walker.
    pub max_trials: usize,
    /// Explore the walkers of an iteration on a thread pool.
    pub threads: bool,
    /// Size of the thread pool. Defaults to the number of cores.
    pub num_threads: Option<usize>,
    /// 0: silent, 1: header and final report, 2: every 100th iteration,
    /// 3: every iteration.
    pub verbose: u8,
    /// Name of the error distribution, Gauss if unset.
    pub distribution: Option<String>,
    /// Scale of the named distribution.
    pub scale: f64,
    /// Power of the generalized Gaussian.
    pub power: f64,
    /// Fit the scale as well, with a Jeffreys prior between these limits.
    pub scale_limits: Option<(f64, f64)>,
    /// Engine names, galilean when empty. Birth and death are added for
    /// dynamic models.
    pub engines: Vec<String>,
    /// Parameters pinned at a value; they are left out of the fit.
    pub keep: BTreeMap<ParIndex, f64>,
}

impl Default for NestedSamplerSettings {
    fn default() -> Self {
        Self {
            ensemble: 100,
            discard: 1,
            seed: 80409,
            rate: 1.,
            end_factor: 2.,
            min_iterations: 100,
            max_iterations: None,
            max_size: None,
            max_trials: 5,
            threads: false,
            num_threads: None,
            verbose: 0,
            distribution: None,
            scale: 1.,
            power: 2.,
            scale_limits: None,
            engines: vec![],
            keep: BTreeMap::new(),
        }
    }
}

/// A snapshot of a running sampler, handed to the progress callback.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub iteration: usize,
    pub log_z: f64,
    pub information: f64,
    pub low_lhood: f64,
    pub ncalls: u64,
}

pub struct ProgressCallback {
    pub callback: Box<dyn FnMut(Duration, Progress) + Send>,
    pub rate: Duration,
}

/// Nested sampling of a model against a dataset.
///
/// The ensemble holds `ensemble` walkers plus one extra slot at the end that
/// keeps the best walker found so far.
pub struct NestedSampler {
    settings: NestedSamplerSettings,
    problem: Problem,
    distribution: Box<dyn ErrorDistribution>,
    explorer: Explorer,
    walkers: Vec<Walker>,
    samples: SampleList,
    unit_range: UnitRange,
    rng: ChaCha8Rng,
    log_z: f64,
    info: f64,
    log_width: f64,
    range_info: f64,
    iteration: usize,
    progress: Option<ProgressCallback>,
}

fn check_keep(
    keep: &BTreeMap<ParIndex, f64>,
    npars: usize,
    nhyper: usize,
) -> Result<(), NestedError> {
    for index in keep.keys() {
        match *index {
            ParIndex::Model(k) if k >= npars => {
                return Err(NestedError::KeepOutOfRange { index: k, npars });
            }
            ParIndex::Hyper(h) if h >= nhyper => {
                return Err(NestedError::KeepOutOfRange {
                    index: h,
                    npars: nhyper,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// The engines named in `names`, galilean if there are none. Dynamic models
/// always get birth and death.
fn engine_kinds(names: &[String], model: &Model) -> Result<Vec<EngineKind>, NestedError> {
    let mut kinds = if names.is_empty() {
        vec![EngineKind::Galilean]
    } else {
        names
            .iter()
            .map(|name| name.parse::<EngineKind>())
            .collect::<Result<Vec<_>, _>>()?
    };
    if model.is_dynamic() {
        for structural in [EngineKind::Birth, EngineKind::Death] {
            if !kinds.contains(&structural) {
                kinds.push(structural);
            }
        }
    }
    Ok(kinds)
}

impl NestedSampler {
    pub fn new(
        data: Dataset,
        model: Model,
        settings: NestedSamplerSettings,
    ) -> Result<Self, NestedError> {
        if settings.ensemble == 0 {
            return Err(NestedError::InvalidSettings(
                "the ensemble needs at least one walker".to_string(),
            ));
        }
        if settings.discard == 0 || settings.discard >= settings.ensemble {
            return Err(NestedError::InvalidSettings(format!(
                "discard must be between 1 and {}, found {}",
                settings.ensemble - 1,
                settings.discard
            )));
        }

        let kind: DistributionKind = match &settings.distribution {
            Some(name) => name.parse()?,
            None => DistributionKind::Gauss,
        };
        let mut distribution = StandardDistribution::new(kind, settings.scale, settings.power);
        if let Some((low, high)) = settings.scale_limits {
            distribution = distribution.with_prior("scale", Prior::jeffreys(low, high)?)?;
        }

        let kinds = engine_kinds(&settings.engines, &model)?;
        if !model.is_dynamic() && kinds.iter().any(|kind| kind.is_structural()) {
            warn!("Birth and death engines have no effect on a model without a dynamic component");
        }
        let engines = kinds.iter().map(|kind| kind.build()).collect_vec();

        check_keep(&settings.keep, model.npars(), distribution.nphypar())?;
        if !model.has_priors() {
            warn!(
                "Not all parameters of {} have a prior; their unit values are used as they are",
                model.name()
            );
        }

        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let explorer = Explorer::new(engines, &mut rng, settings.rate, settings.max_trials);

        Ok(Self {
            problem: Problem::new(model, Arc::new(data)),
            distribution: Box::new(distribution),
            explorer,
            walkers: vec![],
            samples: SampleList::new(),
            unit_range: UnitRange::default(),
            rng,
            log_z: -f64::MAX,
            info: 0.,
            log_width: 0.,
            range_info: 0.,
            iteration: 0,
            progress: None,
            settings,
        })
    }

    /// Use `distribution` instead of the named one.
    pub fn with_distribution(
        mut self,
        distribution: Box<dyn ErrorDistribution>,
    ) -> Result<Self, NestedError> {
        check_keep(
            &self.settings.keep,
            self.problem.npars(),
            distribution.nphypar(),
        )?;
        self.distribution = distribution;
        Ok(self)
    }

    /// Use `engines` instead of the named ones. Birth and death are added
    /// for a dynamic model when missing.
    pub fn with_engines(mut self, mut engines: Vec<Box<dyn Engine>>) -> Self {
        if self.problem.model.is_dynamic() {
            for structural in [EngineKind::Birth, EngineKind::Death] {
                let engine = structural.build();
                if engines.iter().all(|e| e.name() != engine.name()) {
                    engines.push(engine);
                }
            }
        }
        self.explorer = Explorer::new(
            engines,
            &mut self.rng,
            self.settings.rate,
            self.settings.max_trials,
        );
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the sampler and return the log10 of the evidence.
    pub fn sample(&mut self) -> Result<f64> {
        self.run(None)
    }

    /// Like [`NestedSampler::sample`], but restores from `restart` if it
    /// asks for it and saves to it every 100 iterations.
    pub fn sample_with_restart(&mut self, restart: &mut dyn Restart) -> Result<f64> {
        self.run(Some(restart))
    }

    fn run(&mut self, mut restart: Option<&mut dyn Restart>) -> Result<f64> {
        let start_time = Instant::now();
        let pool = if self.settings.threads {
            Some(self.build_pool()?)
        } else {
            None
        };

        let restored = match restart.as_deref_mut() {
            Some(restart) if restart.want_restore() => restart
                .restore()
                .context("Could not restore the sampler")?,
            _ => None,
        };
        match restored {
            Some(checkpoint) => self.resume(checkpoint),
            None => self.initialize(),
        }
        if self.settings.verbose >= 1 {
            self.log_header();
        }

        let ensemble = self.settings.ensemble;
        let discard = self.settings.discard;
        let mut last_progress = Instant::now();

        while self.keep_going() {
            let (worst, low_lhood) = find_worst(&self.walkers, ensemble, discard);
            self.store_samples(&worst, low_lhood);
            self.update_evidence(self.log_width + low_lhood, low_lhood);
            if let Some(max_size) = self.settings.max_size {
                self.samples.weed(max_size);
            }

            self.copy_walkers(&worst);
            self.explorer.explore(
                &mut self.walkers,
                &worst,
                low_lhood,
                self.iteration,
                self.distribution.as_ref(),
                &self.unit_range,
                pool.as_ref(),
            );

            self.log_width -= discard as f64 / ensemble as f64;
            if self.info > self.range_info + 1. {
                self.unit_range =
                    UnitRange::calculate(&self.walkers[..ensemble], self.distribution.as_ref());
                self.range_info = self.info;
            }
            self.iteration += 1;
            self.log_iteration(low_lhood);

            let progress = self.progress_info(low_lhood);
            if let Some(ProgressCallback { callback, rate }) = &mut self.progress {
                if last_progress.elapsed() >= *rate {
                    callback(start_time.elapsed(), progress);
                    last_progress = Instant::now();
                }
            }

            if self.iteration % 100 == 0 {
                if let Some(restart) = restart.as_deref_mut() {
                    if restart.want_save() {
                        restart
                            .save(&self.checkpoint())
                            .context("Could not save the sampler")?;
                    }
                }
            }
        }

        self.add_ensemble_to_samples();
        if self.settings.verbose >= 1 {
            self.log_report(start_time.elapsed());
        }
        Ok(self.evidence())
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("nested-worker-{}", i));
        if let Some(num_threads) = self.settings.num_threads {
            builder = builder.num_threads(num_threads);
        }
        builder.build().context("Could not start thread pool")
    }

    fn keep_going(&self) -> bool {
        let settings = &self.settings;
        if settings
            .max_iterations
            .is_some_and(|max| self.iteration >= max)
        {
            return false;
        }
        let needed =
            settings.end_factor * settings.ensemble as f64 * self.info / settings.discard as f64;
        let needed = (needed.max(0.) as usize).max(settings.min_iterations);
        self.iteration < needed
    }

    /// A walker with all free entries still to be drawn.
    fn template_walker(&self) -> Walker {
        let npars = self.problem.npars();
        let hyperpars = self.distribution.hyperpars();
        let mut allpars = vec![0.; npars];
        allpars.extend(hyperpars.iter().map(|hyper| hyper.value));
        for (&index, &value) in self.settings.keep.iter() {
            let slot = match index {
                ParIndex::Model(k) => k,
                ParIndex::Hyper(h) => npars + h,
            };
            allpars[slot] = value;
        }
        let free_hypars = hyperpars
            .iter()
            .positions(|hyper| hyper.is_free())
            .collect_vec();
        let fit_index = FitIndex::new(npars, free_hypars, &self.settings.keep);
        Walker::new(0, self.problem.clone(), allpars, fit_index)
    }

    fn initialize(&mut self) {
        self.distribution.reset_calls();
        self.explorer.reset_reports();
        let ensemble = self.settings.ensemble;
        let template = self.template_walker();
        let start_seed: u64 = self.rng.random();
        let empty_range = UnitRange::default();
        let ctx = EngineContext {
            distribution: self.distribution.as_ref(),
            unit_range: &empty_range,
            rate: self.settings.rate,
            max_trials: self.settings.max_trials,
        };

        let mut report = EngineReport::default();
        let mut best = BestWalker::default();
        let mut walkers = (0..ensemble)
            .map(|slot| {
                let mut walker = template.clone();
                walker.id = slot;
                let mut rng = EngineRng::seed_from_u64(start_seed);
                rng.set_stream(slot as u64);
                StartEngine.execute(
                    &mut walker,
                    f64::NEG_INFINITY,
                    &ctx,
                    &mut rng,
                    &mut report,
                    &mut best,
                );
                walker
            })
            .collect_vec();
        if report.failed > 0 {
            warn!(
                "{} walkers started without a finite likelihood",
                report.failed
            );
        }

        let mut best = best
            .into_walker()
            .or_else(|| walkers.last().cloned())
            .unwrap_or(template);
        best.parent = Some(best.id);
        best.id = ensemble;
        walkers.push(best);

        self.unit_range = UnitRange::calculate(&walkers[..ensemble], self.distribution.as_ref());
        self.walkers = walkers;
        self.samples = SampleList::new();
        self.log_z = -f64::MAX;
        self.info = 0.;
        self.range_info = 0.;
        let shrink = self.settings.discard as f64 / ensemble as f64;
        self.log_width = (-(-shrink).exp()).ln_1p();
        self.iteration = 0;
    }

    fn resume(&mut self, checkpoint: Checkpoint) {
        self.iteration = checkpoint.iteration;
        self.log_z = checkpoint.log_z;
        self.info = checkpoint.info;
        self.log_width = checkpoint.log_width;
        self.range_info = checkpoint.range_info;
        self.walkers = checkpoint.walkers;
        self.samples = checkpoint.samples;
        self.rng = checkpoint.rng;
        self.unit_range = checkpoint.unit_range;
        debug!("Resumed at iteration {}", self.iteration);
    }

    /// The current state, as handed to [`Restart::save`].
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            iteration: self.iteration,
            log_z: self.log_z,
            info: self.info,
            log_width: self.log_width,
            range_info: self.range_info,
            unit_range: self.unit_range.clone(),
            walkers: self.walkers.clone(),
            samples: self.samples.clone(),
            rng: self.rng.clone(),
        }
    }

    fn store_samples(&mut self, worst: &[usize], low_lhood: f64) {
        let log_w = self.log_width + low_lhood - (self.settings.discard as f64).ln();
        for &slot in worst {
            let walker = &mut self.walkers[slot];
            walker.log_w = log_w;
            self.samples.add(Sample::from_walker(walker));
        }
    }

    fn update_evidence(&mut self, log_weight: f64, log_l: f64) {
        let log_z_new = logaddexp(self.log_z, log_weight);
        let from_floor = if log_l.is_finite() {
            (log_weight - log_z_new).exp() * log_l
        } else {
            0.
        };
        let info =
            from_floor + (self.log_z - log_z_new).exp() * (self.info + self.log_z) - log_z_new;
        self.info = if info.is_nan() { 0. } else { info };
        self.log_z = log_z_new;
    }

    /// Replace every discarded walker by a copy of a random survivor.
    fn copy_walkers(&mut self, worst: &[usize]) {
        let sorted = worst.iter().copied().sorted().collect_vec();
        let nsurvivors = self.settings.ensemble + 1 - sorted.len();
        for &slot in worst {
            let mut source = self.rng.random_range(0..nsurvivors);
            for &skip in sorted.iter() {
                if source >= skip {
                    source += 1;
                }
            }
            let origin = self.walkers[source].clone();
            self.walkers[slot].copy_from(&origin);
        }
    }

    /// Fold the remaining walkers, worst first, into the samples.
    fn add_ensemble_to_samples(&mut self) {
        let ensemble = self.settings.ensemble;
        let order = (0..ensemble)
            .sorted_by(|&a, &b| self.walkers[a].log_l.total_cmp(&self.walkers[b].log_l))
            .collect_vec();
        for slot in order {
            let log_l = self.walkers[slot].log_l;
            let log_weight = self.log_width + log_l;
            self.walkers[slot].log_w = log_weight;
            self.samples.add(Sample::from_walker(&self.walkers[slot]));
            self.update_evidence(log_weight, log_l);
        }
        self.samples.set_evidence(self.log_z, self.info);
        self.samples.normalize();
    }

    fn progress_info(&self, low_lhood: f64) -> Progress {
        Progress {
            iteration: self.iteration,
            log_z: self.log_z,
            information: self.info,
            low_lhood,
            ncalls: self.ncalls(),
        }
    }

    fn log_header(&self) {
        info!("Fit {} with {}", self.problem.model.name(), self.distribution.name());
        info!(
            "Ensemble {}, discard {}, {} free parameters, engines: {}",
            self.settings.ensemble,
            self.settings.discard,
            self.walkers.first().map_or(0, |walker| walker.fit_index.len()),
            self.explorer
                .engines()
                .iter()
                .map(|engine| engine.name())
                .join(", ")
        );
    }

    fn log_iteration(&self, low_lhood: f64) {
        let every = match self.settings.verbose {
            0 | 1 => return,
            2 => 100,
            _ => 1,
        };
        if self.iteration % every != 0 {
            return;
        }
        let best = &self.walkers[self.settings.ensemble];
        info!(
            "{:>8} log L {:>12.4e} log Z {:>12.4e} info {:>8.2} npars {:>3} best {:?}",
            self.iteration,
            low_lhood,
            self.log_z,
            self.info,
            best.npars(),
            best.parameters()
        );
    }

    fn log_report(&self, elapsed: Duration) {
        info!(
            "{:<20}{:>10}{:>10}{:>10}{:>10}{:>10}",
            "Engines", "success", "reject", "failed", "best", "calls"
        );
        for (name, report) in self.explorer.reports() {
            info!(
                "{:<20}{:>10}{:>10}{:>10}{:>10}{:>10}",
                name, report.success, report.reject, report.failed, report.best, report.calls
            );
        }
        info!("Calls to LogL {:>10}", self.ncalls());
        info!("Samples {:>10}", self.samples.len());
        info!(
            "Evidence {:.3} +- {:.3} (log10) after {} iterations in {:.1?}",
            self.evidence(),
            self.precision(),
            self.iteration,
            elapsed
        );
    }

    /// Log10 of the evidence.
    pub fn evidence(&self) -> f64 {
        self.log_z / LN_10
    }

    /// Natural log of the evidence.
    pub fn log_z(&self) -> f64 {
        self.log_z
    }

    pub fn log_z_precision(&self) -> f64 {
        (self.info.max(0.) * self.settings.discard as f64 / self.settings.ensemble as f64).sqrt()
    }

    /// The precision of [`NestedSampler::evidence`].
    pub fn precision(&self) -> f64 {
        self.log_z_precision() / LN_10
    }

    pub fn information(&self) -> f64 {
        self.info
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn parameters(&self) -> Vec<f64> {
        self.samples.parameters()
    }

    pub fn stdevs(&self) -> Vec<f64> {
        self.samples.stdevs()
    }

    pub fn hypars(&self) -> Vec<f64> {
        self.samples.hypars()
    }

    pub fn stdev_hypars(&self) -> Vec<f64> {
        self.samples.stdev_hypars()
    }

    /// The noise scale: its posterior mean when fitted, the fixed value
    /// otherwise. None for distributions without a scale.
    pub fn scale(&self) -> Option<f64> {
        let hyperpars = self.distribution.hyperpars();
        let index = hyperpars.iter().position(|hyper| hyper.name == "scale")?;
        if hyperpars[index].is_free() && !self.samples.is_empty() {
            self.samples.hypars().get(index).copied()
        } else {
            Some(hyperpars[index].value)
        }
    }

    pub fn max_likelihood_parameters(&self) -> Option<&[f64]> {
        self.samples.max_likelihood_parameters()
    }

    /// The posterior-averaged model at the x values of the data.
    pub fn yfit(&self) -> Vec<f64> {
        self.samples.average(&self.problem.data.xdata)
    }

    pub fn samples(&self) -> &SampleList {
        &self.samples
    }

    /// The ensemble; the last walker is the best one seen.
    pub fn walkers(&self) -> &[Walker] {
        &self.walkers
    }

    pub fn engine_reports(&self) -> impl Iterator<Item = (&str, &EngineReport)> + '_ {
        self.explorer.reports()
    }

    pub fn ncalls(&self) -> u64 {
        self.distribution.ncalls()
    }

    pub fn distribution(&self) -> &dyn ErrorDistribution {
        self.distribution.as_ref()
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn settings(&self) -> &NestedSamplerSettings {
        &self.settings
    }
}
