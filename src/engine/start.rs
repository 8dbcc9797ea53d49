use rand::Rng;

use super::{trial_state, BestWalker, Engine, EngineContext, EngineReport, EngineRng};
use crate::walker::Walker;

/// Places a new walker by drawing its free entries from their priors.
///
/// The floor is ignored; the engine only looks for a finite likelihood. When
/// none turns up within the trial cap the last draw is kept anyway, the
/// walker is then the first to be discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartEngine;

impl Engine for StartEngine {
    fn name(&self) -> &str {
        "StartEngine"
    }

    fn execute(
        &self,
        walker: &mut Walker,
        _low_lhood: f64,
        ctx: &EngineContext<'_>,
        rng: &mut EngineRng,
        report: &mut EngineReport,
        best: &mut BestWalker,
    ) -> usize {
        let nfit = walker.fit_index.len();
        for _ in 0..ctx.max_trials.max(1) {
            let units: Vec<f64> = (0..nfit).map(|_| rng.random::<f64>()).collect();
            let (allpars, log_l) = trial_state(walker, &units, ctx);
            walker.allpars = allpars;
            walker.log_l = log_l;
            if log_l.is_finite() {
                best.offer(walker);
                return report.finish(nfit);
            }
            report.reject += 1;
        }
        report.finish(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distribution::StandardDistribution, engine::test_support, walker::UnitRange,
    };
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[test]
    fn draws_inside_prior() {
        let dist = StandardDistribution::gauss(0.1);
        let unit_range = UnitRange::default();
        let ctx = EngineContext {
            distribution: &dist,
            unit_range: &unit_range,
            rate: 1.,
            max_trials: 5,
        };
        let mut rng = EngineRng::seed_from_u64(5);
        let mut report = EngineReport::default();
        let mut best = BestWalker::default();
        let mut walker = test_support::linear_walker(&dist);
        let moves = StartEngine.execute(
            &mut walker,
            f64::NEG_INFINITY,
            &ctx,
            &mut rng,
            &mut report,
            &mut best,
        );
        assert_eq!(moves, 2);
        assert!(walker.parameters().iter().all(|p| p.abs() <= 2.));
        assert!(walker.log_l.is_finite());
        assert_eq!(report.success, 1);
    }
}
