use rand::Rng;

use super::{BestWalker, Engine, EngineContext, EngineReport, EngineRng};
use crate::walker::Walker;

/// Adds one sub-component to the dynamic component of the model, with
/// parameters drawn from their priors.
///
/// The walker only grows while it holds fewer sub-components than a
/// threshold drawn from the growth prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct BirthEngine;

impl Engine for BirthEngine {
    fn name(&self) -> &str {
        "BirthEngine"
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
        if !((dynamic.ncomp() as f64) < threshold) {
            return report.finish(0);
        }

        let mut trial = walker.clone();
        let npars = trial.npars();
        let mut params = trial.allpars[..npars].to_vec();
        let Some(resize) = trial.problem.model.grow_dynamic(&mut params, rng) else {
            return report.finish(0);
        };
        trial.fit_index.insert_span(resize);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distribution::{ErrorDistribution, StandardDistribution},
        engine::{test_support, DeathEngine},
        walker::UnitRange,
    };
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    #[test]
    fn death_then_birth_restores_size() {
        let dist = StandardDistribution::gauss(1.);
        let unit_range = UnitRange::default();
        let ctx = EngineContext {
            distribution: &dist,
            unit_range: &unit_range,
            rate: 1.,
            max_trials: 5,
        };
        let mut rng = EngineRng::seed_from_u64(11);
        let mut report = EngineReport::default();
        let mut best = BestWalker::default();
        let original = test_support::dynamic_walker(&dist, 3);
        let mut walker = original.clone();

        let mut removed = 0;
        for _ in 0..100 {
            removed = DeathEngine.execute(
                &mut walker,
                f64::NEG_INFINITY,
                &ctx,
                &mut rng,
                &mut report,
                &mut best,
            );
            if removed > 0 {
                break;
            }
        }
        assert_eq!(removed, 1);
        assert_eq!(walker.npars(), 3);
        assert_eq!(walker.allpars.len(), 4);
        assert_eq!(walker.fit_index.len(), 3);
        assert_eq!(walker.hypars(), &[1.]);

        let mut added = 0;
        for _ in 0..100 {
            added = BirthEngine.execute(
                &mut walker,
                f64::NEG_INFINITY,
                &ctx,
                &mut rng,
                &mut report,
                &mut best,
            );
            if added > 0 {
                break;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(walker.npars(), original.npars());
        assert_eq!(walker.fit_index, original.fit_index);
        assert_eq!(&walker.allpars[..3], &original.allpars[..3]);
        assert_eq!(
            walker.log_l,
            dist.log_likelihood(&walker.problem, &walker.allpars)
        );
    }

    #[test]
    fn rejected_birth_leaves_walker() {
        let dist = StandardDistribution::gauss(0.01);
        let unit_range = UnitRange::default();
        let ctx = EngineContext {
            distribution: &dist,
            unit_range: &unit_range,
            rate: 1.,
            max_trials: 5,
        };
        let mut rng = EngineRng::seed_from_u64(3);
        let mut report = EngineReport::default();
        let mut best = BestWalker::default();
        let mut walker = test_support::dynamic_walker(&dist, 1);
        let before = walker.clone();
        // the current walker fits exactly; any extra term is worse
        let floor = before.log_l;
        for _ in 0..20 {
            let added = BirthEngine.execute(
                &mut walker,
                floor,
                &ctx,
                &mut rng,
                &mut report,
                &mut best,
            );
            if added == 0 {
                assert_eq!(walker.allpars, before.allpars);
                assert_eq!(walker.npars(), before.npars());
            } else {
                assert!(walker.log_l >= floor);
                walker = before.clone();
            }
        }
        assert!(report.reject > 0);
    }
}
