use nested_rs::{
    Dataset, DynamicPolynomial, ErrorDistribution, Model, NestedSampler, NestedSamplerSettings,
    Polynomial, Prior, RepeatingGauss,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

fn quadratic_data() -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let noise = Normal::new(0., 0.05).unwrap();
    let xdata: Vec<f64> = (0..40).map(|i| i as f64 / 10.).collect();
    let ydata = xdata
        .iter()
        .map(|x| 1. + 0.5 * x - 0.3 * x * x + noise.sample(&mut rng))
        .collect();
    Dataset::new(xdata, ydata, None).unwrap()
}

fn check_walkers(sampler: &NestedSampler) {
    for walker in sampler.walkers() {
        assert_eq!(walker.fit_index.len(), walker.npars());
        assert_eq!(walker.allpars.len(), walker.npars() + 1);
        assert_eq!(
            walker.log_l,
            sampler
                .distribution()
                .log_likelihood(&walker.problem, &walker.allpars)
        );
    }
}

#[test]
fn polynomial_degree_is_sampled() -> anyhow::Result<()> {
    let model = Model::new(
        DynamicPolynomial::new(0, Prior::exponential(3.)?)
            .with_prior(Prior::uniform(-2., 2.)?)
            .with_limits(0, Some(5)),
    );
    let mut sampler = NestedSampler::new(
        quadratic_data(),
        model,
        NestedSamplerSettings {
            ensemble: 50,
            scale: 0.05,
            ..Default::default()
        },
    )?;
    sampler.sample()?;

    check_walkers(&sampler);
    assert!(sampler
        .walkers()
        .iter()
        .all(|w| (1..=6).contains(&w.npars())));

    let names: Vec<&str> = sampler.engine_reports().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["GalileanEngine", "BirthEngine", "DeathEngine"]);
    for (_, report) in sampler.engine_reports() {
        assert!(report.calls > 0);
        assert!(report.success > 0);
    }

    // a straight line cannot follow the curvature
    let modal = sampler.samples().modal_dimension().unwrap();
    assert!(modal >= 3, "modal number of parameters {}", modal);
    assert_eq!(sampler.parameters().len(), modal);

    let total: f64 = sampler.samples().weights().iter().sum();
    assert!((total - 1.).abs() < 1e-6);
    Ok(())
}

#[test]
fn dynamic_component_after_fixed_one() -> anyhow::Result<()> {
    let xdata: Vec<f64> = (0..60).map(|i| i as f64 / 10.).collect();
    let ydata = xdata
        .iter()
        .map(|x| 0.2 + 2. * (-0.5 * ((x - 3.) / 0.5f64).powi(2)).exp())
        .collect();
    let data = Dataset::new(xdata, ydata, None)?;
    let model = Model::new(Polynomial::new(0).with_prior(Prior::uniform(-1., 1.)?)).add_component(
        RepeatingGauss::new(1, Prior::exponential(1.)?)
            .with_priors(
                Prior::uniform(0., 5.)?,
                Prior::uniform(0., 6.)?,
                Prior::uniform(0.1, 2.)?,
            )
            .with_limits(1, Some(3)),
    );
    let mut sampler = NestedSampler::new(
        data,
        model,
        NestedSamplerSettings {
            ensemble: 30,
            scale: 0.1,
            max_iterations: Some(400),
            ..Default::default()
        },
    )?;
    sampler.sample()?;

    check_walkers(&sampler);
    for walker in sampler.walkers() {
        assert_eq!((walker.npars() - 1) % 3, 0);
        assert!(walker.problem.model.prior(0).is_some());
    }
    Ok(())
}
