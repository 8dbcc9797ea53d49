use rand::{seq::SliceRandom, Rng};

use super::{
    trial_state, unit_point, BestWalker, Engine, EngineContext, EngineReport, EngineRng,
};
use crate::{math::fold_unit, walker::Walker};

/// Moves one free parameter at a time, in random order.
///
/// Each trial draws a new offset within the full unit range of the
/// parameter; the width is not narrowed after a rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GibbsEngine;

impl Engine for GibbsEngine {
    fn name(&self) -> &str {
        "GibbsEngine"
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
        let mut units = unit_point(walker, ctx);
        let mut order: Vec<usize> = (0..units.len()).collect();
        order.shuffle(rng);

        let mut moves = 0;
        for pos in order {
            let index = walker.fit_index.entries()[pos];
            let width = ctx.unit_range.range(index) * ctx.rate;
            for _ in 0..ctx.max_trials {
                let mut proposal = units.clone();
                let offset = width * (2. * rng.random::<f64>() - 1.);
                proposal[pos] = fold_unit(units[pos] + offset);
                let (allpars, log_l) = trial_state(walker, &proposal, ctx);
                if log_l >= low_lhood {
                    units = proposal;
                    walker.allpars = allpars;
                    walker.log_l = log_l;
                    best.offer(walker);
                    moves += 1;
                    break;
                }
                report.reject += 1;
            }
        }
        report.finish(moves)
    }
}
