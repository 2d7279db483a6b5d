//! Defect repair: interpolating rectangular holes in a field.
//!
//! All four methods rewrite the interior of `[ximin, ximax) × [yimin,
//! yimax)` from the one-pixel border around it; every pixel outside the
//! interior, the border included, is left bit-identical.
//!
//! - [`hyperbolic_flatten`]: closed-form blend of two per-axis
//!   hyperbolic interpolants.
//! - [`pseudo_laplace`]: inverse-square-distance weighting of all
//!   border pixels.
//! - [`laplace`]: pseudo-Laplace seed refined by a damped Jacobi
//!   iteration of the discrete Laplace equation.
//! - [`fractal`]: bilinear patch plus a seeded midpoint-displacement
//!   detail whose roughness matches the surroundings.

use fixedbitset::FixedBitSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Error, Field, ProgressFn};

// ======================================================================
// CONST - PRIVATE

/// Relaxation factor of the Jacobi iteration.
const LAPLACE_RELAX: f64 = 0.2;

/// Iteration cap of [`laplace`].
const LAPLACE_MAX_ITER: usize = 1000;

// ======================================================================
// FUNCTIONS - PUBLIC

/// Repairs the interior by blending hyperbolic interpolants along both
/// axes.
///
/// # Panics
///
/// If the rectangle is empty or does not leave a one-pixel border inside
/// the field.
pub fn hyperbolic_flatten(
    field: &mut Field,
    ximin: usize,
    yimin: usize,
    ximax: usize,
    yimax: usize,
) {
    check_rect(field, ximin, yimin, ximax, yimax);

    let rowstride = field.xres();
    let data = field.data_mut();

    for i in yimin..yimax {
        let px = data[i * rowstride + ximin - 1];
        let qx = data[i * rowstride + ximax];
        let y = (i - yimin + 1) as f64 / (yimax - yimin + 1) as f64;
        let wx = 1.0 / y + 1.0 / (1.0 - y);

        for j in ximin..ximax {
            let py = data[(yimin - 1) * rowstride + j];
            let qy = data[yimax * rowstride + j];
            let x = (j - ximin + 1) as f64 / (ximax - ximin + 1) as f64;
            let vy = px / x + qx / (1.0 - x);
            let vx = py / y + qy / (1.0 - y);
            let wy = 1.0 / x + 1.0 / (1.0 - x);

            data[i * rowstride + j] = (vx + vy) / (wx + wy);
        }
    }
}

/// Repairs the interior by inverse-square-distance weighting of all
/// border pixels.
///
/// # Panics
///
/// If the rectangle is empty or does not leave a one-pixel border inside
/// the field.
pub fn pseudo_laplace(field: &mut Field, ximin: usize, yimin: usize, ximax: usize, yimax: usize) {
    check_rect(field, ximin, yimin, ximax, yimax);

    let rowstride = field.xres();
    let data = field.data_mut();

    // Table of weights between grid points at all occurring offsets.
    let width = ximax - ximin + 1;
    let height = yimax - yimin + 1;
    let mut disttable = vec![0.0; width * height];
    for i in 0..height {
        for j in 0..width {
            disttable[i * width + j] = 1.0 / ((i * i + j * j) as f64 + 1e-16);
        }
    }

    for i in yimin..yimax {
        for j in ximin..ximax {
            let mut w = 0.0;
            let mut s = 0.0;

            for k in yimin - 1..yimax + 1 {
                let di = i.abs_diff(k);

                let ww = disttable[di * width + (j - ximin + 1)];
                w += ww;
                s += ww * data[k * rowstride + ximin - 1];

                let ww = disttable[di * width + (ximax - j)];
                w += ww;
                s += ww * data[k * rowstride + ximax];
            }

            for k in ximin - 1..ximax + 1 {
                let dj = j.abs_diff(k);

                let ww = disttable[(i - yimin + 1) * width + dj];
                w += ww;
                s += ww * data[(yimin - 1) * rowstride + k];

                let ww = disttable[(yimax - i) * width + dj];
                w += ww;
                s += ww * data[yimax * rowstride + k];
            }

            data[i * rowstride + j] = s / w;
        }
    }
}

/// Repairs the interior by solving the discrete Laplace equation.
///
/// The region is seeded with the pseudo-Laplace result, then relaxed by
/// a damped Jacobi iteration until the largest update falls below 1/1000
/// of the field RMS or 1000 iterations were done.  This is the only
/// repair method that reports progress.
///
/// # Errors
///
/// [`Error::Cancelled`] when the progress callback returns `false`; the
/// interior keeps the state of the last completed iteration.
///
/// # Panics
///
/// If the rectangle is empty or does not leave a one-pixel border inside
/// the field.
pub fn laplace(
    field: &mut Field,
    ximin: usize,
    yimin: usize,
    ximax: usize,
    yimax: usize,
    mut progress: Option<&mut ProgressFn>,
) -> Result<(), Error> {
    // Pseudo-Laplace as the first step to make it converge faster.
    pseudo_laplace(field, ximin, yimin, ximax, yimax);

    let xres = field.xres();
    let yres = field.yres();
    let mut pinned = FixedBitSet::with_capacity(xres * yres);
    pinned.set_range(.., true);
    for i in yimin..yimax {
        for j in ximin..ximax {
            pinned.set(i * xres + j, false);
        }
    }

    let maxer = field.rms() / 1.0e3;
    let mut buffer = field.data().to_vec();
    let data = field.data_mut();

    for iteration in 0..LAPLACE_MAX_ITER {
        let error = laplace_iteration(data, &mut buffer, xres, &pinned, LAPLACE_RELAX);

        if let Some(progress) = progress.as_mut() {
            if !progress((iteration + 1) as f64 / LAPLACE_MAX_ITER as f64) {
                return Err(Error::Cancelled);
            }
        }
        if error < maxer {
            log::debug!("laplace repair converged after {} iterations", iteration + 1);
            break;
        }
    }

    Ok(())
}

/// Repairs the interior with a fractal surface matching the local
/// roughness, laid over a bilinear reconstruction of the hole.
///
/// The synthetic detail is generated by midpoint displacement from a
/// deterministic generator; the same `seed` reproduces the same repair.
///
/// # Panics
///
/// If the rectangle is empty or does not leave a one-pixel border inside
/// the field.
pub fn fractal(
    field: &mut Field,
    ximin: usize,
    yimin: usize,
    ximax: usize,
    yimax: usize,
    seed: u64,
) {
    check_rect(field, ximin, yimin, ximax, yimax);

    let rowstride = field.xres();
    let width = ximax - ximin;
    let height = yimax - yimin;

    // ROUGHNESS OF THE SURROUNDING RING
    //
    // RMS of successive differences along the border ring; this is the
    // step amplitude the synthetic detail reproduces.

    let ring = border_ring(field.data(), rowstride, ximin, yimin, ximax, yimax);
    let mut ss = 0.0;
    for k in 0..ring.len() {
        let d = ring[(k + 1) % ring.len()] - ring[k];
        ss += d * d;
    }
    let sigma = (ss / ring.len() as f64).sqrt();

    // MIDPOINT-DISPLACEMENT DETAIL
    //
    // Zero on the lattice boundary so the bilinear base, which matches
    // the border exactly, stays untouched there.

    let mut m = 1usize;
    while m < width.max(height) {
        m *= 2;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let detail = midpoint_displacement(m, sigma, &mut rng);

    // COMPOSE

    let data = field.data_mut();
    for i in yimin..yimax {
        let v = (i - yimin + 1) as f64 / (height + 1) as f64;
        for j in ximin..ximax {
            let u = (j - ximin + 1) as f64 / (width + 1) as f64;

            let left = data[i * rowstride + ximin - 1];
            let right = data[i * rowstride + ximax];
            let top = data[(yimin - 1) * rowstride + j];
            let bottom = data[yimax * rowstride + j];
            let c00 = data[(yimin - 1) * rowstride + ximin - 1];
            let c10 = data[(yimin - 1) * rowstride + ximax];
            let c01 = data[yimax * rowstride + ximin - 1];
            let c11 = data[yimax * rowstride + ximax];

            let base = (1.0 - u) * left + u * right + (1.0 - v) * top + v * bottom
                - ((1.0 - u) * (1.0 - v) * c00
                    + u * (1.0 - v) * c10
                    + (1.0 - u) * v * c01
                    + u * v * c11);

            data[i * rowstride + j] = base + sample_bilinear(&detail, m, u, v);
        }
    }
}

// ======================================================================
// FUNCTIONS - CRATE

/// One damped Jacobi sweep over the unpinned pixels; returns the largest
/// absolute update.
///
/// `buffer` must have the same length as `data` and is used as the
/// write target of the sweep before being copied back.
pub(crate) fn laplace_iteration(
    data: &mut [f64],
    buffer: &mut [f64],
    xres: usize,
    pinned: &FixedBitSet,
    relax: f64,
) -> f64 {
    debug_assert_eq!(data.len(), buffer.len());

    let mut error = 0.0f64;
    for k in 0..data.len() {
        if pinned.contains(k) {
            continue;
        }
        let avg = 0.25 * (data[k - 1] + data[k + 1] + data[k - xres] + data[k + xres]);
        let update = relax * (avg - data[k]);
        buffer[k] = data[k] + update;
        error = error.max(update.abs());
    }
    for k in 0..data.len() {
        if !pinned.contains(k) {
            data[k] = buffer[k];
        }
    }
    error
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn check_rect(field: &Field, ximin: usize, yimin: usize, ximax: usize, yimax: usize) {
    assert!(ximin < ximax && yimin < yimax, "repair rectangle is empty");
    assert!(
        ximin >= 1 && yimin >= 1 && ximax <= field.xres() - 1 && yimax <= field.yres() - 1,
        "repair rectangle must leave a one-pixel border inside the field"
    );
}

/// Border values clockwise around the hole, starting at the top-left
/// corner pixel.
fn border_ring(
    data: &[f64],
    rowstride: usize,
    ximin: usize,
    yimin: usize,
    ximax: usize,
    yimax: usize,
) -> Vec<f64> {
    let mut ring = Vec::new();
    for j in ximin - 1..=ximax {
        ring.push(data[(yimin - 1) * rowstride + j]);
    }
    for i in yimin..yimax {
        ring.push(data[i * rowstride + ximax]);
    }
    for j in (ximin - 1..=ximax).rev() {
        ring.push(data[yimax * rowstride + j]);
    }
    for i in (yimin..yimax).rev() {
        ring.push(data[i * rowstride + ximin - 1]);
    }
    ring
}

/// Midpoint displacement on an `(m+1) × (m+1)` lattice with zero
/// boundary; `m` must be a power of two.  The amplitude halves per
/// generation (Hurst exponent 0.5).
fn midpoint_displacement(m: usize, sigma: f64, rng: &mut ChaCha8Rng) -> Vec<f64> {
    let stride = m + 1;
    let mut z = vec![0.0; stride * stride];
    if sigma == 0.0 {
        return z;
    }

    let mut step = m;
    let mut amplitude = sigma;
    while step > 1 {
        let half = step / 2;

        // DIAMOND

        for i in (half..m).step_by(step) {
            for j in (half..m).step_by(step) {
                let s = z[(i - half) * stride + (j - half)]
                    + z[(i - half) * stride + (j + half)]
                    + z[(i + half) * stride + (j - half)]
                    + z[(i + half) * stride + (j + half)];
                z[i * stride + j] = 0.25 * s + rng.gen_range(-amplitude..amplitude);
            }
        }

        // SQUARE - interior lattice points only, the boundary stays zero

        for i in (0..=m).step_by(half) {
            let odd_row = (i / half) % 2 == 1;
            let start = if odd_row { 0 } else { half };
            for j in (start..=m).step_by(step) {
                if i == 0 || i == m || j == 0 || j == m {
                    continue;
                }
                let mut s = 0.0;
                let mut count = 0.0;
                if i >= half {
                    s += z[(i - half) * stride + j];
                    count += 1.0;
                }
                if i + half <= m {
                    s += z[(i + half) * stride + j];
                    count += 1.0;
                }
                if j >= half {
                    s += z[i * stride + (j - half)];
                    count += 1.0;
                }
                if j + half <= m {
                    s += z[i * stride + (j + half)];
                    count += 1.0;
                }
                z[i * stride + j] = s / count + rng.gen_range(-amplitude..amplitude);
            }
        }

        step = half;
        amplitude *= 0.5;
    }

    z
}

/// Bilinear sample of the detail lattice at fractional position
/// `(u, v)` in the unit square.
fn sample_bilinear(z: &[f64], m: usize, u: f64, v: f64) -> f64 {
    let stride = m + 1;
    let x = u * m as f64;
    let y = v * m as f64;
    let j = (x.floor() as usize).min(m - 1);
    let i = (y.floor() as usize).min(m - 1);
    let fx = x - j as f64;
    let fy = y - i as f64;

    z[i * stride + j] * (1.0 - fx) * (1.0 - fy)
        + z[i * stride + j + 1] * fx * (1.0 - fy)
        + z[(i + 1) * stride + j] * (1.0 - fx) * fy
        + z[(i + 1) * stride + j + 1] * fx * fy
}

// ======================================================================
// TESTS
