use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Field, Line};

// ======================================================================
// MACROS - CRATE

macro_rules! assert_near {
    ($got:expr, $expected:expr, $tol:expr $(,)?) => {{
        let got = $got;
        let expected = $expected;
        let tol = $tol;
        assert!(
            (got - expected).abs() <= tol,
            "assert_near failed: got {}, expected {} (tolerance {})",
            got,
            expected,
            tol,
        );
    }};
}

// ======================================================================
// FUNCTIONS - CRATE

pub(crate) fn rng(seed: u8) -> ChaCha8Rng {
    ChaCha8Rng::from_seed([seed; 32])
}

pub(crate) fn random_values(n: usize, seed: u8) -> Vec<f64> {
    let mut rng = rng(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

pub(crate) fn random_field(xres: usize, yres: usize, seed: u8) -> Field {
    let mut field = Field::new(xres, yres, 1.0, 1.0);
    field.data_mut().copy_from_slice(&random_values(xres * yres, seed));
    field
}

pub(crate) fn random_line(res: usize, seed: u8) -> Line {
    let mut line = Line::new(res, 1.0);
    line.data_mut().copy_from_slice(&random_values(res, seed));
    line
}

/// Sum of Gaussians evaluated on 0, 1, 2, … as a sampled curve.
pub(crate) fn gaussian_mixture(
    n: usize,
    components: &[(f64, f64, f64)], // (center, height, sigma)
) -> (Vec<f64>, Vec<f64>) {
    let xdata: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ydata = xdata
        .iter()
        .map(|&x| {
            components
                .iter()
                .map(|&(c, h, s)| h * (-0.5 * ((x - c) / s) * ((x - c) / s)).exp())
                .sum()
        })
        .collect();
    (xdata, ydata)
}
