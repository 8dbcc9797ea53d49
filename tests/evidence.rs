use std::f64::consts::PI;

use arrow::array::Array;
use nested_rs::{
    Dataset, ErrorDistribution, Model, NestedSampler, NestedSamplerSettings, Polynomial, Prior,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

const SIGMA: f64 = 0.1;
const PRIOR_WIDTH: f64 = 4.;

fn noisy_constant(n: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.2, SIGMA).unwrap();
    let ydata: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let xdata = (0..n).map(|i| i as f64).collect();
    Dataset::new(xdata, ydata, None).unwrap()
}

fn constant_model() -> Model {
    Model::new(Polynomial::new(0).with_prior(Prior::uniform(-2., 2.).unwrap()))
}

/// Evidence of a constant under a flat prior and Gaussian noise of known
/// scale, with the posterior well inside the prior.
fn analytic_log_z(ydata: &[f64]) -> f64 {
    let n = ydata.len() as f64;
    let mean = ydata.iter().sum::<f64>() / n;
    let chisq: f64 = ydata.iter().map(|y| (y - mean) * (y - mean)).sum();
    -chisq / (2. * SIGMA * SIGMA) - n * (SIGMA * (2. * PI).sqrt()).ln()
        + (SIGMA * (2. * PI / n).sqrt()).ln()
        - PRIOR_WIDTH.ln()
}

fn settings(seed: u64) -> NestedSamplerSettings {
    NestedSamplerSettings {
        seed,
        scale: SIGMA,
        ..Default::default()
    }
}

#[test]
fn constant_model_evidence() -> anyhow::Result<()> {
    let data = noisy_constant(100, 1);
    let ydata = data.ydata.clone();
    let expected = analytic_log_z(&ydata);
    let mean = ydata.iter().sum::<f64>() / ydata.len() as f64;
    let stdev = SIGMA / (ydata.len() as f64).sqrt();

    let mut deviations = vec![];
    for seed in [80409, 1, 2, 3, 5, 8, 13, 17, 2024, 4711] {
        let mut sampler = NestedSampler::new(data.clone(), constant_model(), settings(seed))?;
        let evidence = sampler.sample()?;

        let deviation = (sampler.log_z() - expected) / sampler.log_z_precision();
        assert!(
            deviation.abs() < 4.,
            "seed {}: log Z {} expected {} precision {}",
            seed,
            sampler.log_z(),
            expected,
            sampler.log_z_precision()
        );
        deviations.push(deviation);
        assert!((evidence * std::f64::consts::LN_10 - sampler.log_z()).abs() < 1e-9);

        let total: f64 = sampler.samples().weights().iter().sum();
        assert!((total - 1.).abs() < 1e-6);

        let parameters = sampler.parameters();
        let stdevs = sampler.stdevs();
        assert!((parameters[0] - mean).abs() < 3. * stdev);
        assert!(stdevs[0] > 0.5 * stdev && stdevs[0] < 2. * stdev);

        let best = sampler.max_likelihood_parameters().unwrap();
        assert!((best[0] - mean).abs() < 3. * stdev);

        let yfit = sampler.yfit();
        assert_eq!(yfit.len(), ydata.len());
        assert!(yfit.iter().all(|y| (y - parameters[0]).abs() < 1e-9));

        assert!(sampler.ncalls() >= sampler.samples().len() as u64);
        assert_eq!(sampler.ncalls(), sampler.distribution().ncalls());
    }
    // no bias beyond the scatter of single runs
    let bias = deviations.iter().sum::<f64>() / deviations.len() as f64;
    assert!(bias.abs() < 1., "mean deviation {} in units of the precision", bias);
    Ok(())
}

#[test]
fn threads_do_not_change_the_result() -> anyhow::Result<()> {
    let data = noisy_constant(50, 3);
    let run = |threads: bool| -> anyhow::Result<NestedSampler> {
        let mut sampler = NestedSampler::new(
            data.clone(),
            constant_model(),
            NestedSamplerSettings {
                ensemble: 30,
                discard: 3,
                threads,
                num_threads: Some(3),
                engines: vec!["galilean".to_string(), "gibbs".to_string()],
                ..settings(5)
            },
        )?;
        sampler.sample()?;
        Ok(sampler)
    };
    let serial = run(false)?;
    let parallel = run(true)?;

    assert_eq!(serial.log_z().to_bits(), parallel.log_z().to_bits());
    assert_eq!(serial.iteration(), parallel.iteration());
    assert_eq!(serial.parameters(), parallel.parameters());
    let serial_reports: Vec<_> = serial.engine_reports().map(|(_, r)| *r).collect();
    let parallel_reports: Vec<_> = parallel.engine_reports().map(|(_, r)| *r).collect();
    assert_eq!(serial_reports, parallel_reports);
    Ok(())
}

#[test]
fn fitted_scale_and_export() -> anyhow::Result<()> {
    let data = noisy_constant(100, 8);
    let mut sampler = NestedSampler::new(
        data,
        constant_model(),
        NestedSamplerSettings {
            ensemble: 50,
            scale_limits: Some((0.01, 10.)),
            max_size: Some(400),
            ..settings(11)
        },
    )?;
    sampler.sample()?;

    let scale = sampler.scale().unwrap();
    assert!(scale > 0.07 && scale < 0.14, "scale {}", scale);
    assert_eq!(sampler.hypars().len(), 1);
    assert!(sampler.stdev_hypars()[0] > 0.);
    assert!(sampler.walkers().iter().all(|w| w.fit_index.len() == 2));
    // the live walkers are added after the last weeding
    assert!(sampler.samples().len() <= 400 + 50);

    let batch = sampler.samples().to_record_batch()?;
    assert_eq!(batch.num_rows(), sampler.samples().len());
    let log_w = batch.column_by_name("log_w").unwrap();
    assert_eq!(log_w.null_count(), 0);
    Ok(())
}
