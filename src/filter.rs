//! 1-D FFT band filtering of fields.
//!
//! [`fft_filter_1d`] transforms every row (or column) of a field, scales
//! the spectrum by a weight profile over the half-spectrum, and
//! transforms back.  With all-one weights the filter is
//! information-preserving; any other profile is a linear band gate.
//!
//! The weight profile is typically built from marked frequency bands
//! with [`suppress_weights`] or [`preserve_weights`], after inspecting
//! the averaged power spectral density from [`psdf_1d`].

use crate::{
    dft::{self, Direction, Windowing},
    Error, Field, Interpolation, Line, Orientation,
};

// ======================================================================
// SuppressMode - PUBLIC

/// How marked bands are attenuated by [`suppress_weights`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SuppressMode {
    /// Marked bands are zeroed.
    Null,
    /// Marked bands are softened to 0.3 instead of being zeroed.
    Neighbourhood,
}

// ======================================================================
// FUNCTIONS - PUBLIC

/// Filters a field by scaling the 1-D spectra of its rows or columns.
///
/// `weights` is interpreted as a band-gain profile over the half-spectrum
/// and is resampled to half the transform length with `interpolation`;
/// the mirror half of the spectrum gets identical gains.  The filtered
/// field is returned; the input is left untouched.
///
/// # Errors
///
/// [`Error::UnsupportedSize`] when the row (or column) length contains a
/// prime factor outside {2, 3, 5, 7}; resample the field to a supported
/// size first.
pub fn fft_filter_1d(
    field: &Field,
    weights: &Line,
    orientation: Orientation,
    interpolation: Interpolation,
) -> Result<Field, Error> {
    let (len, count) = match orientation {
        Orientation::Horizontal => (field.xres(), field.yres()),
        Orientation::Vertical => (field.yres(), field.xres()),
    };

    let half = (len / 2).max(1);
    let mut gains = weights.clone();
    gains.resample(half, interpolation);
    let gains = gains.data();

    let mut result = Field::new_alike(field);
    let mut re = vec![0.0; len];
    let mut im = vec![0.0; len];
    let mut re_t = vec![0.0; len];
    let mut im_t = vec![0.0; len];

    for index in 0..count {
        // GATHER

        match orientation {
            Orientation::Horizontal => re.copy_from_slice(field.row(index)),
            Orientation::Vertical => {
                for (i, z) in re.iter_mut().enumerate() {
                    *z = field.get(index, i);
                }
            }
        }
        im.fill(0.0);

        // FORWARD, GATE, BACKWARD

        dft::transform(Direction::Forward, len, 1, &re, &im, 1, &mut re_t, &mut im_t)?;

        for k in 0..len {
            let idx = k.min(len - k).min(half - 1);
            re_t[k] *= gains[idx];
            im_t[k] *= gains[idx];
        }

        dft::transform(Direction::Backward, len, 1, &re_t, &im_t, 1, &mut re, &mut im)?;

        // SCATTER THE REAL PART

        match orientation {
            Orientation::Horizontal => result.row_mut(index).copy_from_slice(&re),
            Orientation::Vertical => {
                for (i, &z) in re.iter().enumerate() {
                    result.set(index, i, z);
                }
            }
        }
    }

    Ok(result)
}

/// Estimates the one-dimensional power spectral density of a field,
/// averaged over its rows or columns.
///
/// Each row (or column) is windowed, transformed, and the one-sided
/// power accumulated over the half-spectrum.  The result integrates to
/// the mean square of the windowed data over the frequency axis; its
/// abscissa spans the half-spectrum in angular spatial frequency with
/// the reciprocal lateral unit.
///
/// # Errors
///
/// [`Error::UnsupportedSize`] when the row (or column) length contains a
/// prime factor outside {2, 3, 5, 7}.
pub fn psdf_1d(
    field: &Field,
    orientation: Orientation,
    windowing: Windowing,
) -> Result<Line, Error> {
    let (len, count, real) = match orientation {
        Orientation::Horizontal => (field.xres(), field.yres(), field.xreal()),
        Orientation::Vertical => (field.yres(), field.xres(), field.yreal()),
    };
    let half = (len / 2).max(1);

    let mut samples = vec![0.0; len];
    let mut zero = vec![0.0; len];
    let mut re = vec![0.0; len];
    let mut im = vec![0.0; len];
    let mut power = vec![0.0; half];

    for index in 0..count {
        match orientation {
            Orientation::Horizontal => samples.copy_from_slice(field.row(index)),
            Orientation::Vertical => {
                for (i, z) in samples.iter_mut().enumerate() {
                    *z = field.get(index, i);
                }
            }
        }
        dft::window_samples(&mut samples, windowing);
        zero.fill(0.0);

        dft::transform(Direction::Forward, len, 1, &samples, &zero, 1, &mut re, &mut im)?;

        for (k, p) in power.iter_mut().enumerate() {
            let direct = re[k] * re[k] + im[k] * im[k];
            let mirror = if k > 0 && len - k != k {
                re[len - k] * re[len - k] + im[len - k] * im[len - k]
            } else {
                0.0
            };
            *p += direct + mirror;
        }
    }

    // One-sided density in angular spatial frequency; the abscissa runs
    // up to the Nyquist frequency pi/dx.
    let factor = real / (2.0 * std::f64::consts::PI * len as f64 * count as f64);
    let mut psdf = Line::new(half, std::f64::consts::PI * len as f64 / real);
    for (z, &p) in psdf.data_mut().iter_mut().zip(power.iter()) {
        *z = p * factor;
    }
    psdf.set_si_unit_x(field.si_unit_xy().power(-1));
    psdf.set_si_unit_y(
        field
            .si_unit_z()
            .multiply(field.si_unit_z())
            .multiply(field.si_unit_xy()),
    );
    Ok(psdf)
}

/// Builds a weight line that suppresses the marked bands.
///
/// The profile is filled with ones; every band `(begin, end)`, given as
/// fractions of the half-spectrum in `0.0 ..= 1.0`, is then zeroed (or
/// softened to 0.3 in [`SuppressMode::Neighbourhood`]).
///
/// # Panics
///
/// If `res` is zero.
pub fn suppress_weights(res: usize, bands: &[(f64, f64)], mode: SuppressMode) -> Line {
    let mut weights = Line::new(res, res as f64);
    weights.fill(1.0);

    let value = match mode {
        SuppressMode::Null => 0.0,
        SuppressMode::Neighbourhood => 0.3,
    };
    fill_bands(&mut weights, bands, value);
    weights
}

/// Builds a weight line that preserves only the marked bands.
///
/// The profile is filled with zeroes; every band `(begin, end)`, given as
/// fractions of the half-spectrum in `0.0 ..= 1.0`, is set to one.
///
/// # Panics
///
/// If `res` is zero.
pub fn preserve_weights(res: usize, bands: &[(f64, f64)]) -> Line {
    let mut weights = Line::new(res, res as f64);
    fill_bands(&mut weights, bands, 1.0);
    weights
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn fill_bands(weights: &mut Line, bands: &[(f64, f64)], value: f64) {
    let res = weights.res();
    for &(begin, end) in bands {
        let from = ((res as f64 * begin).max(0.0) as usize).min(res);
        let to = ((res as f64 * end).max(0.0) as usize).min(res);
        if from < to {
            weights.part_fill(from, to, value);
        }
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    // ============================================================
    // FILTER

    #[test]
    fn unit_weights_preserve_information() {
        let field = test_util::random_field(16, 8, 21);
        let mut weights = Line::new(8, 8.0);
        weights.fill(1.0);

        let filtered =
            fft_filter_1d(&field, &weights, Orientation::Horizontal, Interpolation::Round)
                .unwrap();

        for (a, b) in field.data().iter().zip(filtered.data().iter()) {
            assert_near!(*b, *a, 1e-12);
        }
    }

    #[test]
    fn zero_weights_remove_everything() {
        let field = test_util::random_field(8, 8, 22);
        let weights = Line::new(4, 4.0); // zero-filled

        let filtered =
            fft_filter_1d(&field, &weights, Orientation::Vertical, Interpolation::Round).unwrap();

        for &z in filtered.data() {
            assert_near!(z, 0.0, 1e-12);
        }
    }

    #[test]
    fn band_gate_removes_marked_frequency() {
        // Rows carry a DC term plus a bin-4 cosine; gating bin 4 away
        // must leave the DC term.
        let n = 16;
        let mut field = Field::new(n, 2, 1.0, 1.0);
        for row in 0..2 {
            for col in 0..n {
                let x = 2.0 * std::f64::consts::PI * 4.0 * col as f64 / n as f64;
                field.set(col, row, 2.0 + x.cos());
            }
        }

        // Half-spectrum profile of length 8: suppress around bin 4.
        let weights = suppress_weights(8, &[(0.4, 0.7)], SuppressMode::Null);

        let filtered =
            fft_filter_1d(&field, &weights, Orientation::Horizontal, Interpolation::Round)
                .unwrap();

        for &z in filtered.data() {
            assert_near!(z, 2.0, 1e-10);
        }
    }

    #[test]
    fn unsupported_row_length_is_reported() {
        let field = Field::new(11, 4, 1.0, 1.0);
        let weights = Line::new(5, 5.0);
        let result =
            fft_filter_1d(&field, &weights, Orientation::Horizontal, Interpolation::Round);
        assert!(matches!(result, Err(Error::UnsupportedSize { size: 11, .. })));
    }

    // ============================================================
    // PSDF

    #[test]
    fn psdf_peaks_at_the_carried_frequency() {
        // Rows carry a bin-4 cosine; the density must peak there.
        let n = 32;
        let mut field = Field::new(n, 4, 1.0, 1.0);
        for row in 0..4 {
            for col in 0..n {
                let x = 2.0 * std::f64::consts::PI * 4.0 * col as f64 / n as f64;
                field.set(col, row, x.cos());
            }
        }

        let psdf = psdf_1d(&field, Orientation::Horizontal, Windowing::None).unwrap();
        assert_eq!(psdf.res(), 16);

        let peak = psdf
            .data()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, 4);
    }

    #[test]
    fn psdf_integrates_to_the_mean_square() {
        let n = 16;
        let mut field = Field::new(n, 3, 2.0, 1.0);
        for row in 0..3 {
            for col in 0..n {
                let x = 2.0 * std::f64::consts::PI * 3.0 * col as f64 / n as f64;
                field.set(col, row, 1.5 * x.sin());
            }
        }

        let psdf = psdf_1d(&field, Orientation::Horizontal, Windowing::None).unwrap();
        let dk = psdf.real() / psdf.res() as f64;
        let integral: f64 = psdf.data().iter().map(|&p| p * dk).sum();

        let mean_square: f64 =
            field.data().iter().map(|&z| z * z).sum::<f64>() / field.data().len() as f64;
        assert_near!(integral, mean_square, 1e-10);
    }

    #[test]
    fn psdf_units_are_reciprocal_and_density() {
        let mut field = Field::new(8, 8, 1.0, 1.0);
        field.set_si_unit_xy(crate::SiUnit::meter());
        field.set_si_unit_z(crate::SiUnit::meter());

        let psdf = psdf_1d(&field, Orientation::Vertical, Windowing::Hann).unwrap();
        assert_eq!(psdf.si_unit_x(), &crate::SiUnit::parse("1/m").unwrap());
        assert_eq!(psdf.si_unit_y(), &crate::SiUnit::parse("m^3").unwrap());
    }

    // ============================================================
    // WEIGHT BUILDERS

    #[test]
    fn suppress_weights_zero_marked_bands() {
        let weights = suppress_weights(10, &[(0.2, 0.5)], SuppressMode::Null);
        assert_eq!(
            weights.data(),
            &[1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn suppress_weights_neighbourhood_softens() {
        let weights = suppress_weights(10, &[(0.0, 0.2)], SuppressMode::Neighbourhood);
        assert_eq!(
            weights.data(),
            &[0.3, 0.3, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn preserve_weights_keep_marked_bands_only() {
        let weights = preserve_weights(10, &[(0.8, 1.0)]);
        assert_eq!(
            weights.data(),
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]
        );
    }
}
