#![crate_name = "mhe_util"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Sampling utilities for the `mhe` multiparty homomorphic encryption
//! library.

use rand::{CryptoRng, RngCore};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

/// The errors that can occur in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested distribution parameter is out of the supported range.
    #[error("{0}")]
    InvalidDistribution(String),
}

/// The result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Sample a vector of independent centered binomial distributions of a given
/// variance. Supports integer variances between 1 and 16.
pub fn sample_vec_cbd<R: RngCore + CryptoRng>(
    vector_size: usize,
    variance: usize,
    rng: &mut R,
) -> Result<Vec<i64>> {
    if !(1..=16).contains(&variance) {
        return Err(Error::InvalidDistribution(
            "The variance should be between 1 and 16".to_string(),
        ));
    }
    sample_vec_cbd_f32(vector_size, variance as f32, rng)
}

/// Sample a vector of independent centered binomial distributions of a given
/// variance. Supports variances between 0.25 and 16; the variance is rounded
/// to the nearest multiple of 1/2.
pub fn sample_vec_cbd_f32<R: RngCore + CryptoRng>(
    vector_size: usize,
    variance: f32,
    rng: &mut R,
) -> Result<Vec<i64>> {
    if !(0.25..=16.0).contains(&variance) {
        return Err(Error::InvalidDistribution(
            "The variance should be between 0.25 and 16".to_string(),
        ));
    }

    // A centered binomial distribution summing k coin pairs has variance k / 2.
    let k = (2.0 * variance).round() as u32;
    debug_assert!(k >= 1 && k <= 32);
    let mask = if k == 32 { u64::MAX >> 32 } else { (1u64 << k) - 1 };

    let mut out = Vec::with_capacity(vector_size);
    for _ in 0..vector_size {
        let r = rng.next_u64();
        let a = (r & mask).count_ones() as i64;
        let b = ((r >> 32) & mask).count_ones() as i64;
        out.push(a - b);
    }
    Ok(out)
}

/// Sample a vector of independent rounded Gaussians with the given standard
/// deviation, truncated at six standard deviations.
pub fn sample_vec_normal<R: RngCore + CryptoRng>(
    vector_size: usize,
    std_dev: f64,
    rng: &mut R,
) -> Result<Vec<i64>> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(Error::InvalidDistribution(
            "The standard deviation should be finite and non-negative".to_string(),
        ));
    }
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| Error::InvalidDistribution(e.to_string()))?;
    let bound = 6.0 * std_dev;

    let mut out = Vec::with_capacity(vector_size);
    while out.len() != vector_size {
        let x = normal.sample(rng);
        if x.abs() <= bound {
            out.push(x.round() as i64);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{sample_vec_cbd, sample_vec_cbd_f32, sample_vec_normal};
    use rand::thread_rng;

    #[test]
    fn cbd_bounds_and_moments() {
        let mut rng = thread_rng();
        for variance in 1..=16 {
            let v = sample_vec_cbd(8192, variance, &mut rng).unwrap();
            let bound = 2 * variance as i64;
            assert!(v.iter().all(|vi| vi.abs() <= bound));

            let mean = v.iter().sum::<i64>() as f64 / v.len() as f64;
            let var = v.iter().map(|vi| (*vi as f64 - mean).powi(2)).sum::<f64>()
                / v.len() as f64;
            assert!(mean.abs() < 0.5);
            assert!((var - variance as f64).abs() < variance as f64 / 2.0);
        }
    }

    #[test]
    fn cbd_ternary() {
        let mut rng = thread_rng();
        let v = sample_vec_cbd_f32(8192, 0.5, &mut rng).unwrap();
        assert!(v.iter().all(|vi| vi.abs() <= 1));
        assert!(v.iter().any(|vi| *vi == 1));
        assert!(v.iter().any(|vi| *vi == -1));
    }

    #[test]
    fn cbd_rejects_invalid_variance() {
        let mut rng = thread_rng();
        assert!(sample_vec_cbd(16, 0, &mut rng).is_err());
        assert!(sample_vec_cbd(16, 17, &mut rng).is_err());
        assert!(sample_vec_cbd_f32(16, 0.1, &mut rng).is_err());
    }

    #[test]
    fn normal_truncated() {
        let mut rng = thread_rng();
        let sigma = 3.2;
        let v = sample_vec_normal(8192, sigma, &mut rng).unwrap();
        let bound = (6.0 * sigma).ceil() as i64;
        assert!(v.iter().all(|vi| vi.abs() <= bound));

        let mean = v.iter().sum::<i64>() as f64 / v.len() as f64;
        assert!(mean.abs() < 0.5);
    }

    #[test]
    fn normal_zero_sigma() {
        let mut rng = thread_rng();
        let v = sample_vec_normal(64, 0.0, &mut rng).unwrap();
        assert!(v.iter().all(|vi| *vi == 0));
        assert!(sample_vec_normal(64, -1.0, &mut rng).is_err());
        assert!(sample_vec_normal(64, f64::NAN, &mut rng).is_err());
    }
}
