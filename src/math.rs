use itertools::izip;
use multiversion::multiversion;

#[inline]
pub(crate) fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

/// Log of the sum of `exp(values)`, `-inf` for an empty slice.
pub(crate) fn log_sum_exp(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .fold(f64::NEG_INFINITY, |acc, val| {
            if acc == f64::NEG_INFINITY {
                val
            } else if val == f64::NEG_INFINITY {
                acc
            } else {
                logaddexp(acc, val)
            }
        })
}

/// Fold a value onto [0, 1] by mirroring at the edges.
#[inline]
pub(crate) fn fold_unit(value: f64) -> f64 {
    let folded = value.rem_euclid(2.);
    if folded > 1. {
        2. - folded
    } else {
        folded
    }
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
pub(crate) fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
    assert!(values.len() == weights.len());
    izip!(values, weights).map(|(v, w)| v * w).sum()
}

/// Weighted mean and standard deviation.
pub(crate) fn mean_and_stdev(values: &[f64], weights: &[f64]) -> (f64, f64) {
    let total = sum(weights);
    if total <= 0. {
        return (f64::NAN, f64::NAN);
    }
    let mean = weighted_sum(values, weights) / total;
    let var = izip!(values, weights)
        .map(|(v, w)| w * (v - mean) * (v - mean))
        .sum::<f64>()
        / total;
    (mean, var.max(0.).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn check_logaddexp(x in -10f64..10f64, y in -10f64..10f64) {
            let a = (x.exp() + y.exp()).ln();
            let b = logaddexp(x, y);
            let neginf = f64::NEG_INFINITY;
            let nan = f64::NAN;
            prop_assert!((a - b).abs() < 1e-10);
            prop_assert_eq!(b, logaddexp(y, x));
            prop_assert_eq!(x, logaddexp(x, neginf));
            prop_assert_eq!(logaddexp(neginf, neginf), neginf);
            prop_assert!(logaddexp(nan, x).is_nan());
        }

        #[test]
        fn check_fold_unit(x in -5f64..5f64) {
            let folded = fold_unit(x);
            prop_assert!((0. ..=1.).contains(&folded));
        }
    }

    #[test]
    fn check_neginf() {
        assert_eq!(logaddexp(f64::NEG_INFINITY, 2.), 2.);
        assert_eq!(logaddexp(2., f64::NEG_INFINITY), 2.);
        assert_eq!(logaddexp(-f64::MAX, 2.), 2.);
    }

    #[test]
    fn check_log_sum_exp() {
        assert_eq!(log_sum_exp(Vec::<f64>::new()), f64::NEG_INFINITY);
        let values = [-1., 0.5, 2.];
        let direct = values.iter().map(|v: &f64| v.exp()).sum::<f64>().ln();
        assert_abs_diff_eq!(log_sum_exp(values), direct, epsilon = 1e-12);
    }

    #[test]
    fn check_fold_edges() {
        assert_eq!(fold_unit(0.25), 0.25);
        assert_abs_diff_eq!(fold_unit(1.25), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(fold_unit(-0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn check_mean_and_stdev() {
        let (mean, std) = mean_and_stdev(&[1., 3.], &[0.5, 0.5]);
        assert_eq!(mean, 2.);
        assert_eq!(std, 1.);
    }
}
