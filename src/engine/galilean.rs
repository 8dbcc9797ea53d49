use rand::Rng;
use rand_distr::StandardNormal;

use super::{
    trial_state, unit_point, BestWalker, Engine, EngineContext, EngineReport, EngineRng,
};
use crate::{math::fold_unit, walker::Walker};

/// Straight-line moves in unit space.
///
/// Every step follows a fresh random velocity, scaled by the unit range of
/// the ensemble. A step that lands below the floor is discarded and the next
/// one starts from the same point in a new direction. The velocity is never
/// shrunk.
#[derive(Debug, Clone)]
pub struct GalileanEngine {
    pub max_steps: usize,
}

impl Default for GalileanEngine {
    fn default() -> Self {
        Self { max_steps: 5 }
    }
}

impl GalileanEngine {
    fn velocity(walker: &Walker, ctx: &EngineContext<'_>, rng: &mut EngineRng) -> Vec<f64> {
        walker
            .fit_index
            .iter()
            .map(|&index| {
                let z: f64 = rng.sample(StandardNormal);
                z * ctx.unit_range.range(index) * ctx.rate
            })
            .collect()
    }
}

impl Engine for GalileanEngine {
    fn name(&self) -> &str {
        "GalileanEngine"
    }

    fn execute(
        &self,
        walker: &mut Walker,
        low_lhood: f64,
        ctx: &EngineContext<'_>,
        rng: &mut EngineRng,
        report: &mut EngineReport,
        best: &mut BestWalker,
    ) -> usize {
        let nfit = walker.fit_index.len();
        if nfit == 0 {
            return report.finish(0);
        }

        let mut units = unit_point(walker, ctx);
        let mut steps = 0;
        let mut trials = 0;
        while steps < self.max_steps && trials < ctx.max_trials {
            let velocity = Self::velocity(walker, ctx, rng);
            let proposal: Vec<f64> = units
                .iter()
                .zip(velocity.iter())
                .map(|(u, v)| fold_unit(u + v))
                .collect();
            let (allpars, log_l) = trial_state(walker, &proposal, ctx);
            if log_l >= low_lhood {
                units = proposal;
                walker.allpars = allpars;
                walker.log_l = log_l;
                best.offer(walker);
                steps += 1;
            } else {
                report.reject += 1;
                trials += 1;
            }
        }
        report.finish(steps * nfit)
    }
}
