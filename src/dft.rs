//! Mixed-radix in-place DFT and windowing.
//!
//! [`transform`] works on complex sequences given as separate real and
//! imaginary arrays with arbitrary (equal for real/imaginary) strides, for
//! all lengths whose prime factors are in {2, 3, 5, 7}.  Both directions
//! are normalised by 1/√n, so a forward/backward pair reproduces the
//! input up to rounding errors.
//!
//! [`Windowing`] provides the usual window families for spectral
//! estimation; [`window_samples`], [`window_line`] and [`window_field`]
//! apply them to slices, [`Line`](crate::Line)s and
//! [`Field`](crate::Field) rows or columns.

use std::cell::RefCell;

use crate::Error;

pub use self::window::{window_field, window_line, window_samples, Windowing};

mod passes;
mod window;

// ======================================================================
// Direction - PUBLIC

/// Transform direction.
///
/// Forward uses the `e^{-2πi…}` kernel, backward `e^{+2πi…}`; both are
/// normalised by 1/√n.  Backward is implemented by swapping the real and
/// imaginary arrays of both input and output, there is no separate code
/// path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// `e^{-2πi…}` kernel.
    Forward,
    /// `e^{+2πi…}` kernel.
    Backward,
}

// ======================================================================
// THREAD STATE - PRIVATE

thread_local! {
    // Ping-pong scratch of 2n doubles, lazily grown, never shrunk.
    static SCRATCH: RefCell<Vec<f64>> = const { RefCell::new(Vec::new()) };
}

// ======================================================================
// BUFFER SIDE - PRIVATE

struct Side<'a> {
    re: &'a mut [f64],
    im: &'a mut [f64],
    stride: usize,
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Returns `true` when `n` is a supported transform length, i.e. its
/// prime factors are all in {2, 3, 5, 7}.
pub fn is_supported_size(n: usize) -> bool {
    factor_parity(n).is_ok()
}

/// Performs the DFT of a complex sequence.
///
/// Strides are distances between consecutive samples in the input and
/// output arrays; use 1 for dense arrays.  For interleaved complex data
/// pass stride 2 with the imaginary slice starting one element after the
/// real one.
///
/// # Errors
///
/// [`Error::UnsupportedSize`] when `n` contains a prime factor outside
/// {2, 3, 5, 7}.
///
/// # Panics
///
/// If `n` is zero, a stride is zero, or any array is shorter than
/// `stride·(n−1) + 1`.
///
/// # Examples
///
/// ```rust
/// use scanprobe::dft::{self, Direction};
///
/// let re_in = [1.0, 0.0, 0.0, 0.0];
/// let im_in = [0.0; 4];
/// let mut re = [0.0; 4];
/// let mut im = [0.0; 4];
/// dft::transform(Direction::Forward, 4, 1, &re_in, &im_in, 1, &mut re, &mut im)?;
///
/// for k in 0..4 {
///     assert!((re[k] - 0.5).abs() < 1e-15);
///     assert!(im[k].abs() < 1e-15);
/// }
/// # Ok::<(), scanprobe::Error>(())
/// ```
#[allow(clippy::too_many_arguments)]
pub fn transform(
    direction: Direction,
    n: usize,
    istride: usize,
    in_re: &[f64],
    in_im: &[f64],
    ostride: usize,
    out_re: &mut [f64],
    out_im: &mut [f64],
) -> Result<(), Error> {
    assert!(n > 0, "transform length must be positive");
    assert!(istride > 0 && ostride > 0, "strides must be positive");
    assert!(in_re.len() >= istride * (n - 1) + 1);
    assert!(in_im.len() >= istride * (n - 1) + 1);
    assert!(out_re.len() >= ostride * (n - 1) + 1);
    assert!(out_im.len() >= ostride * (n - 1) + 1);

    // Backward is the same transform on swapped re/im.
    let (in_re, in_im, out_re, out_im) = match direction {
        Direction::Forward => (in_im, in_re, out_im, out_re),
        Direction::Backward => (in_re, in_im, out_re, out_im),
    };

    let swapped = factor_parity(n)?;

    SCRATCH.with(|scratch| {
        let mut scratch = scratch.borrow_mut();
        if scratch.len() < 2 * n {
            scratch.resize(2 * n, 0.0);
        }
        let (buf_re, buf_im) = scratch.split_at_mut(n);

        let mut cur = Side {
            re: out_re,
            im: out_im,
            stride: ostride,
        };
        let mut alt = Side {
            re: buf_re,
            im: buf_im,
            stride: 1,
        };

        // Start in the side that makes the last butterfly land in the
        // caller's output arrays.
        if swapped && n > 1 {
            std::mem::swap(&mut cur, &mut alt);
        }

        let norm = 1.0 / (n as f64).sqrt();
        for m in 0..n {
            cur.re[cur.stride * m] = norm * in_re[istride * m];
            cur.im[cur.stride * m] = norm * in_im[istride * m];
        }

        let mut m = 1;
        while m < n {
            let k = n / m;
            let (p, butterfly): (usize, passes::Butterfly) = if k % 4 == 0 {
                (4, passes::pass4)
            } else if k % 5 == 0 {
                (5, passes::pass5)
            } else if k % 2 == 0 {
                (2, passes::pass2)
            } else if k % 3 == 0 {
                (3, passes::pass3)
            } else {
                (7, passes::pass7)
            };

            if m > 1 {
                passes::shuffle_and_twiddle(
                    n,
                    m * p,
                    p,
                    alt.stride,
                    alt.re,
                    alt.im,
                    cur.stride,
                    cur.re,
                    cur.im,
                );
            }
            butterfly(n, cur.stride, cur.re, cur.im);
            std::mem::swap(&mut cur, &mut alt);

            m *= p;
        }
    });

    Ok(())
}

// ======================================================================
// FUNCTIONS - PRIVATE

/// Validates the factorisation of `n` and returns the pass-count parity
/// used to choose the initial ping-pong side.
fn factor_parity(n: usize) -> Result<bool, Error> {
    let mut swapped = true;
    let mut m = 1;
    while m < n {
        let k = n / m;
        let p = if k % 4 == 0 {
            4
        } else if k % 5 == 0 {
            5
        } else if k % 2 == 0 {
            2
        } else if k % 3 == 0 {
            3
        } else if k % 7 == 0 {
            7
        } else {
            return Err(Error::UnsupportedSize {
                size: n,
                remainder: k,
            });
        };
        swapped = !swapped;
        m *= p;
    }
    Ok(swapped)
}

// ======================================================================
// TESTS
