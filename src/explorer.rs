//! Runs the engines over the walkers that replaced the discarded ones.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rayon::{prelude::*, ThreadPool};

use crate::{
    distribution::ErrorDistribution,
    engine::{BestWalker, Engine, EngineContext, EngineReport, EngineRng},
    walker::{UnitRange, Walker},
};

/// The engines of a run together with their seeds and reports.
#[derive(Debug)]
pub struct Explorer {
    engines: Vec<Box<dyn Engine>>,
    seeds: Vec<u64>,
    order_seed: u64,
    reports: Vec<EngineReport>,
    rate: f64,
    max_trials: usize,
}

/// The result of exploring one walker.
struct Outcome {
    reports: Vec<EngineReport>,
    /// The best state passed through, if it beats the best walker.
    best: Option<Walker>,
    /// The engine that produced `best`.
    best_engine: Option<usize>,
}

impl Explorer {
    /// Seeds for the engines are drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(
        engines: Vec<Box<dyn Engine>>,
        rng: &mut R,
        rate: f64,
        max_trials: usize,
    ) -> Self {
        let seeds = engines.iter().map(|_| rng.random()).collect();
        let reports = vec![EngineReport::default(); engines.len()];
        Self {
            engines,
            seeds,
            order_seed: rng.random(),
            reports,
            rate,
            max_trials,
        }
    }

    pub fn engines(&self) -> &[Box<dyn Engine>] {
        &self.engines
    }

    pub fn reports(&self) -> impl Iterator<Item = (&str, &EngineReport)> + '_ {
        self.engines
            .iter()
            .map(|engine| engine.name())
            .zip(self.reports.iter())
    }

    pub fn reset_reports(&mut self) {
        self.reports.fill(EngineReport::default());
    }

    /// Explore the walkers at `slots` under `low_lhood`.
    ///
    /// The last walker is the best one; it is replaced by any state an engine
    /// accepted on the way that beats it. Each walker gets generators that only depend on the
    /// iteration and its slot, so the outcome does not depend on `pool`.
    #[allow(clippy::too_many_arguments)]
    pub fn explore(
        &mut self,
        walkers: &mut [Walker],
        slots: &[usize],
        low_lhood: f64,
        iteration: usize,
        distribution: &dyn ErrorDistribution,
        unit_range: &UnitRange,
        pool: Option<&ThreadPool>,
    ) {
        let width = walkers.len();
        let best_slot = width - 1;
        let best_log_l = walkers[best_slot].log_l;
        let ctx = EngineContext {
            distribution,
            unit_range,
            rate: self.rate,
            max_trials: self.max_trials,
        };

        let mut work: Vec<Walker> = slots.iter().map(|&slot| walkers[slot].clone()).collect();
        let this = &*self;
        let run = |walker: &mut Walker| {
            let stream = (iteration * width + walker.id) as u64;
            this.explore_walker(walker, low_lhood, best_log_l, stream, &ctx)
        };
        let outcomes: Vec<Outcome> = match pool {
            Some(pool) => pool.install(|| work.par_iter_mut().map(run).collect()),
            None => work.iter_mut().map(run).collect(),
        };

        for (walker, outcome) in work.into_iter().zip(outcomes) {
            for (total, part) in self.reports.iter_mut().zip(outcome.reports) {
                *total += part;
            }
            if let Some(best) = outcome.best {
                if best.log_l > walkers[best_slot].log_l {
                    if let Some(engine) = outcome.best_engine {
                        self.reports[engine].best += 1;
                    }
                    walkers[best_slot].copy_from(&best);
                }
            }
            let slot = walker.id;
            walkers[slot] = walker;
        }
    }

    fn explore_walker(
        &self,
        walker: &mut Walker,
        low_lhood: f64,
        best_log_l: f64,
        stream: u64,
        ctx: &EngineContext<'_>,
    ) -> Outcome {
        let mut rngs: Vec<EngineRng> = self
            .seeds
            .iter()
            .map(|&seed| {
                let mut rng = EngineRng::seed_from_u64(seed);
                rng.set_stream(stream);
                rng
            })
            .collect();
        let mut order_rng = EngineRng::seed_from_u64(self.order_seed);
        order_rng.set_stream(stream);

        let mut reports = vec![EngineReport::default(); self.engines.len()];
        let mut order: Vec<usize> = (0..self.engines.len()).collect();
        let target = ((self.rate * walker.fit_index.len() as f64).ceil() as usize).max(1);
        let mut best = BestWalker::new(best_log_l);
        let mut best_engine = None;
        let mut moves = 0;

        for _ in 0..self.max_trials {
            order.shuffle(&mut order_rng);
            for &e in order.iter() {
                reports[e].calls += 1;
                let before = best.log_l();
                moves += self.engines[e].execute(
                    walker,
                    low_lhood,
                    ctx,
                    &mut rngs[e],
                    &mut reports[e],
                    &mut best,
                );
                if best.log_l() > before {
                    best_engine = Some(e);
                }
            }
            if moves >= target {
                break;
            }
        }
        Outcome {
            reports,
            best: best.into_walker(),
            best_engine,
        }
    }
}
