use rand::Rng;
use rand_distr::StandardNormal;

use super::{
    trial_state, unit_point, BestWalker, Engine, EngineContext, EngineReport, EngineRng,
};
use crate::{math::fold_unit, walker::Walker};

/// Moves all free parameters at once along a random direction.
///
/// A rejected trial draws a new direction of the same scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepEngine;

impl Engine for StepEngine {
    fn name(&self) -> &str {
        "StepEngine"
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

        let units = unit_point(walker, ctx);
        for _ in 0..ctx.max_trials {
            let proposal: Vec<f64> = walker
                .fit_index
                .iter()
                .zip(units.iter())
                .map(|(&index, u)| {
                    let z: f64 = rng.sample(StandardNormal);
                    fold_unit(u + z * ctx.unit_range.range(index) * ctx.rate)
                })
                .collect();
            let (allpars, log_l) = trial_state(walker, &proposal, ctx);
            if log_l >= low_lhood {
                walker.allpars = allpars;
                walker.log_l = log_l;
                best.offer(walker);
                return report.finish(nfit);
            }
            report.reject += 1;
        }
        report.finish(0)
    }
}
