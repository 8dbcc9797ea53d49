use rand::Rng;

use super::{BestWalker, Engine, EngineContext, EngineReport, EngineRng};
use crate::walker::Walker;

/// Removes one sub-component from the dynamic component of the model.
///
/// The removal is gated by the growth prior: a threshold is drawn from it
/// and the walker only shrinks while it holds more sub-components than the
/// threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeathEngine;

impl Engine for DeathEngine {
    fn name(&self) -> &str {
        "DeathEngine"
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
        let Some(dynamic) = walker.problem.model.dynamic() else {
            return report.finish(0);
        };
        let threshold = dynamic.grow_prior().unit_to_domain(rng.random());
        if !(dynamic.ncomp() as f64 > threshold) {
            return report.finish(0);
        }

        let mut trial = walker.clone();
        let npars = trial.npars();
        let mut params = trial.allpars[..npars].to_vec();
        let Some(resize) = trial.problem.model.shrink_dynamic(&mut params, rng) else {
            return report.finish(0);
        };
        trial.fit_index.remove_span(resize);
        params.extend_from_slice(walker.hypars());
        trial.allpars = params;
        trial.evaluate(ctx.distribution);

        if trial.log_l >= low_lhood {
            *walker = trial;
            best.offer(walker);
            report.finish(resize.count)
        } else {
            report.reject += 1;
            report.finish(0)
        }
    }
}
