// Window families for spectral estimation.

use std::f64::consts::PI;

use crate::{Field, Line, Orientation};

// ======================================================================
// Windowing - PUBLIC

/// Window applied to data before a spectral transform.
///
/// `None` leaves data untouched.  `Rect` weights the two edge samples by
/// 0.5 and leaves the interior alone.  `Kaiser25` is the Kaiser window
/// with α = 2.5.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Windowing {
    #[default]
    None,
    Hann,
    Hamming,
    Blackman,
    Lanczos,
    Welch,
    Rect,
    Nuttall,
    FlatTop,
    Kaiser25,
}

// ======================================================================
// DISPATCH TABLE - PRIVATE

type WindowFn = fn(usize, usize) -> f64;

// The order must match the Windowing enum.
static WINDOWINGS: [Option<WindowFn>; 10] = [
    None, // none
    Some(window_hann),
    Some(window_hamming),
    Some(window_blackman),
    Some(window_lanczos),
    Some(window_welch),
    Some(window_rect),
    Some(window_nuttall),
    Some(window_flat_top),
    Some(window_kaiser25),
];

impl Windowing {
    fn function(self) -> Option<WindowFn> {
        WINDOWINGS[self as usize]
    }

    /// Returns the window coefficient for sample `i` of `n`.
    pub fn coeff(self, i: usize, n: usize) -> f64 {
        match self.function() {
            Some(window) => window(i, n),
            None => 1.0,
        }
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Multiplies samples by the window coefficients.
pub fn window_samples(data: &mut [f64], windowing: Windowing) {
    let window = match windowing.function() {
        Some(window) => window,
        None => return,
    };
    let n = data.len();
    for (i, z) in data.iter_mut().enumerate() {
        *z *= window(i, n);
    }
}

/// Multiplies a line by the window coefficients.
pub fn window_line(line: &mut Line, windowing: Windowing) {
    window_samples(line.data_mut(), windowing);
}

/// Performs windowing of a field in the given direction: horizontal
/// windows each row over the columns, vertical weights whole rows by the
/// window over the row index.
pub fn window_field(field: &mut Field, orientation: Orientation, windowing: Windowing) {
    let window = match windowing.function() {
        Some(window) => window,
        None => return,
    };
    let xres = field.xres();
    let yres = field.yres();

    match orientation {
        Orientation::Horizontal => {
            let w: Vec<f64> = (0..xres).map(|col| window(col, xres)).collect();
            for row in 0..yres {
                for (z, &q) in field.row_mut(row).iter_mut().zip(w.iter()) {
                    *z *= q;
                }
            }
        }
        Orientation::Vertical => {
            for row in 0..yres {
                let q = window(row, yres);
                for z in field.row_mut(row) {
                    *z *= q;
                }
            }
        }
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE - window families

fn window_hann(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64;

    0.5 - 0.5 * x.cos()
}

fn window_hamming(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64;

    0.54 - 0.46 * x.cos()
}

fn window_blackman(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64;

    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}

fn window_lanczos(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64 - PI;

    if x.abs() < 1e-20 {
        1.0
    } else {
        x.sin() / x
    }
}

fn window_welch(i: usize, n: usize) -> f64 {
    let x = 2.0 * i as f64 / n as f64 - 1.0;

    1.0 - x * x
}

fn window_rect(i: usize, n: usize) -> f64 {
    if i == 0 || i == n - 1 {
        0.5
    } else {
        1.0
    }
}

fn window_nuttall(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64;

    0.355768 - 0.487396 * x.cos() + 0.144232 * (2.0 * x).cos() - 0.012604 * (3.0 * x).cos()
}

fn window_flat_top(i: usize, n: usize) -> f64 {
    let x = 2.0 * PI * i as f64 / n as f64;

    (1.0 - 1.93 * x.cos() + 1.29 * (2.0 * x).cos() - 0.388 * (3.0 * x).cos()
        + 0.032 * (4.0 * x).cos())
        / 4.0
}

fn bessel_i0(x: f64) -> f64 {
    let y = x * x / 4.0;
    let mut t = y;
    let mut s = 1.0;
    let mut i = 1u64;

    loop {
        s += t;
        i += 1;
        t *= y / (i * i) as f64;
        if t <= 1e-7 * s {
            break;
        }
    }

    s + t
}

fn window_kaiser(i: usize, n: usize, alpha: f64) -> f64 {
    let x = 2.0 * i as f64 / (n as f64 - 1.0) - 1.0;

    bessel_i0(PI * alpha * (1.0 - x * x).sqrt())
}

fn window_kaiser25(i: usize, n: usize) -> f64 {
    window_kaiser(i, n, 2.5) / 373.0206312536293446480
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // COEFFICIENTS

    #[test]
    fn hann_length_8() {
        let expected = [
            0.0, 0.146447, 0.500000, 0.853553, 1.0, 0.853553, 0.500000, 0.146447,
        ];
        for (i, &e) in expected.iter().enumerate() {
            assert_near!(Windowing::Hann.coeff(i, 8), e, 5e-7);
        }
    }

    #[test]
    fn rect_weights_edges_only() {
        let mut data = [2.0; 6];
        window_samples(&mut data, Windowing::Rect);
        assert_eq!(data, [1.0, 2.0, 2.0, 2.0, 2.0, 1.0]);

        // Twice equals once composed with 0.25x at the endpoints.
        window_samples(&mut data, Windowing::Rect);
        assert_eq!(data, [0.5, 2.0, 2.0, 2.0, 2.0, 0.5]);
    }

    #[test]
    fn none_is_identity() {
        let mut data = [1.5, -2.5, 3.5];
        window_samples(&mut data, Windowing::None);
        assert_eq!(data, [1.5, -2.5, 3.5]);
    }

    #[test]
    fn kaiser25_is_normalised_at_centre() {
        // Odd length has a sample exactly at the window centre.
        assert_near!(Windowing::Kaiser25.coeff(8, 17), 1.0, 1e-6);
        assert!(Windowing::Kaiser25.coeff(0, 17) < 0.01);
    }

    #[test]
    fn interior_maxima_of_cosine_windows() {
        for w in [
            Windowing::Hann,
            Windowing::Hamming,
            Windowing::Blackman,
            Windowing::Nuttall,
        ] {
            let n = 64;
            let mid = w.coeff(n / 2, n);
            assert!(mid > w.coeff(1, n));
            assert!(mid > w.coeff(n - 1, n));
        }
    }

    // ============================================================
    // FIELD WINDOWING

    #[test]
    fn field_horizontal_windows_columns() {
        let mut field = Field::new(8, 3, 1.0, 1.0);
        field.fill(1.0);
        window_field(&mut field, Orientation::Horizontal, Windowing::Hann);

        for row in 0..3 {
            assert_near!(field.get(2, row), 0.5, 1e-12);
            assert_near!(field.get(4, row), 1.0, 1e-12);
        }
    }

    #[test]
    fn field_vertical_windows_rows() {
        let mut field = Field::new(3, 8, 1.0, 1.0);
        field.fill(1.0);
        window_field(&mut field, Orientation::Vertical, Windowing::Hann);

        for col in 0..3 {
            assert_near!(field.get(col, 2), 0.5, 1e-12);
            assert_near!(field.get(col, 4), 1.0, 1e-12);
        }
    }
}
