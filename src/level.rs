//! Polynomial background fitting and removal.
//!
//! Two parameterisations are available: independent per-axis degrees in a
//! scaled Legendre basis ([`fit_legendre`]), and total-degree-limited
//! monomials ([`fit_poly_max`]).  Both have exact subtraction
//! counterparts, and a generic masked form ([`fit_poly`]) solves the
//! normal equations for an arbitrary term list.
//!
//! The fit is a linear projection: fitting and subtracting once leaves a
//! residual that a second fit maps to zero coefficients (up to rounding).
//!
//! [`polynomial_background`] wraps the variants into the usual
//! level-and-extract operation.

use crate::{math, Error, Field};

// ======================================================================
// MaskingMode - PUBLIC

/// How a mask field steers which pixels participate in a fit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MaskingMode {
    /// The mask is not consulted at all.
    #[default]
    Ignore,
    /// Only pixels with a positive mask value participate.
    Include,
    /// Only pixels with a non-positive mask value participate.
    Exclude,
}

// ======================================================================
// Degrees - PUBLIC

/// Polynomial parameterisation of [`polynomial_background`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Degrees {
    /// Basis `P_i(x)·P_j(y)` with `i ≤ col_degree`, `j ≤ row_degree`.
    Independent {
        /// Maximum degree along rows (in the x coordinate).
        col_degree: usize,
        /// Maximum degree along columns (in the y coordinate).
        row_degree: usize,
    },
    /// Monomials `x^i y^j` with `i + j ≤ max_degree`.
    TotalMax(usize),
}

// ======================================================================
// FUNCTIONS - PUBLIC - Legendre basis

/// Fits a `P_i(x)·P_j(y)` Legendre background, ignoring any mask.
///
/// The returned coefficients have the layout
/// `coeffs[i·(row_degree+1) + j]` where `i` is the x-degree.
///
/// The grid is a full tensor product, so the normal matrix factors into
/// two small per-axis Gram matrices; only those are accumulated and
/// solved.
pub fn fit_legendre(field: &Field, col_degree: usize, row_degree: usize) -> Vec<f64> {
    let xres = field.xres();
    let yres = field.yres();
    let nx = col_degree + 1;
    let ny = row_degree + 1;

    let px = legendre_table(xres, col_degree);
    let py = legendre_table(yres, row_degree);

    // PER-AXIS GRAM MATRICES

    let gx = gram(&px, nx, xres);
    let gy = gram(&py, ny, yres);

    // MOMENTS

    let mut b = vec![0.0; nx * ny];
    let mut row_moments = vec![0.0; nx];
    for row in 0..yres {
        let data = field.row(row);
        row_moments.fill(0.0);
        for (col, &z) in data.iter().enumerate() {
            for i in 0..nx {
                row_moments[i] += px[i * xres + col] * z;
            }
        }
        for i in 0..nx {
            for j in 0..ny {
                b[i * ny + j] += py[j * yres + row] * row_moments[i];
            }
        }
    }

    // SOLVE THE SEPARATED SYSTEMS

    let mut gx_chol = gx;
    if !math::cholesky_decompose(&mut gx_chol, nx) {
        log::warn!("degenerate Legendre fit in x, returning zero background");
        return vec![0.0; nx * ny];
    }
    let mut gy_chol = gy;
    if !math::cholesky_decompose(&mut gy_chol, ny) {
        log::warn!("degenerate Legendre fit in y, returning zero background");
        return vec![0.0; nx * ny];
    }

    let mut column = vec![0.0; nx];
    for j in 0..ny {
        for i in 0..nx {
            column[i] = b[i * ny + j];
        }
        math::cholesky_solve(&gx_chol, &mut column, nx);
        for i in 0..nx {
            b[i * ny + j] = column[i];
        }
    }
    let mut row_vec = vec![0.0; ny];
    for i in 0..nx {
        row_vec.copy_from_slice(&b[i * ny..(i + 1) * ny]);
        math::cholesky_solve(&gy_chol, &mut row_vec, ny);
        b[i * ny..(i + 1) * ny].copy_from_slice(&row_vec);
    }

    b
}

/// Subtracts a `P_i(x)·P_j(y)` Legendre background in place.
///
/// # Panics
///
/// If `coeffs` does not have `(col_degree+1)·(row_degree+1)` elements.
pub fn subtract_legendre(field: &mut Field, col_degree: usize, row_degree: usize, coeffs: &[f64]) {
    let xres = field.xres();
    let yres = field.yres();
    let nx = col_degree + 1;
    let ny = row_degree + 1;
    assert_eq!(coeffs.len(), nx * ny);

    let px = legendre_table(xres, col_degree);
    let py = legendre_table(yres, row_degree);

    for row in 0..yres {
        let data = field.row_mut(row);
        for (col, z) in data.iter_mut().enumerate() {
            let mut s = 0.0;
            for i in 0..nx {
                let mut sy = 0.0;
                for j in 0..ny {
                    sy += coeffs[i * ny + j] * py[j * yres + row];
                }
                s += sy * px[i * xres + col];
            }
            *z -= s;
        }
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC - total-degree basis

/// Returns the term powers `(i, j)` of the total-degree basis, x-major,
/// `i + j ≤ max_degree`.
pub fn poly_max_terms(max_degree: usize) -> Vec<(usize, usize)> {
    let mut terms = Vec::with_capacity((max_degree + 1) * (max_degree + 2) / 2);
    for i in 0..=max_degree {
        for j in 0..=max_degree - i {
            terms.push((i, j));
        }
    }
    terms
}

/// Fits a total-degree-limited monomial background, ignoring any mask.
///
/// Coefficients follow the [`poly_max_terms`] order.
pub fn fit_poly_max(field: &Field, max_degree: usize) -> Vec<f64> {
    fit_poly(field, None, &poly_max_terms(max_degree), false)
}

/// Subtracts a total-degree-limited monomial background in place.
///
/// # Panics
///
/// If `coeffs` does not match the [`poly_max_terms`] count.
pub fn subtract_poly_max(field: &mut Field, max_degree: usize, coeffs: &[f64]) {
    subtract_poly(field, &poly_max_terms(max_degree), coeffs);
}

// ======================================================================
// FUNCTIONS - PUBLIC - generic term list

/// Fits an arbitrary monomial term list by normal equations.
///
/// With a mask, only pixels with a positive mask value participate, or
/// only the others when `exclude` is set.  Coordinates are scaled to
/// (−1, 1) per axis for numerical sanity; [`subtract_poly`] uses the same
/// scaling, so fit/subtract pairs are exact.
///
/// A degenerate system (too few participating pixels for the term count)
/// yields all-zero coefficients.
///
/// # Panics
///
/// If the mask dimensions differ from the field dimensions.
pub fn fit_poly(
    field: &Field,
    mask: Option<&Field>,
    term_powers: &[(usize, usize)],
    exclude: bool,
) -> Vec<f64> {
    if let Some(mask) = mask {
        assert_eq!(mask.xres(), field.xres());
        assert_eq!(mask.yres(), field.yres());
    }

    let xres = field.xres();
    let yres = field.yres();
    let nterms = term_powers.len();

    let mut normal = vec![0.0; nterms * (nterms + 1) / 2];
    let mut rhs = vec![0.0; nterms];
    let mut terms = vec![0.0; nterms];

    for row in 0..yres {
        let ty = scaled_coord(row, yres);
        let data = field.row(row);
        for col in 0..xres {
            if let Some(mask) = mask {
                let masked_in = mask.get(col, row) > 0.0;
                if masked_in == exclude {
                    continue;
                }
            }

            let tx = scaled_coord(col, xres);
            for (k, &(i, j)) in term_powers.iter().enumerate() {
                terms[k] = tx.powi(i as i32) * ty.powi(j as i32);
            }

            let z = data[col];
            for k in 0..nterms {
                for l in 0..=k {
                    normal[k * (k + 1) / 2 + l] += terms[k] * terms[l];
                }
                rhs[k] += terms[k] * z;
            }
        }
    }

    if !math::cholesky_decompose(&mut normal, nterms) {
        log::warn!("degenerate polynomial fit, returning zero background");
        return vec![0.0; nterms];
    }
    math::cholesky_solve(&normal, &mut rhs, nterms);
    rhs
}

/// Subtracts an arbitrary monomial term list in place, with the same
/// coordinate scaling as [`fit_poly`].
///
/// # Panics
///
/// If `coeffs` and `term_powers` lengths differ.
pub fn subtract_poly(field: &mut Field, term_powers: &[(usize, usize)], coeffs: &[f64]) {
    assert_eq!(coeffs.len(), term_powers.len());

    let xres = field.xres();
    let yres = field.yres();

    for row in 0..yres {
        let ty = scaled_coord(row, yres);
        let data = field.row_mut(row);
        for (col, z) in data.iter_mut().enumerate() {
            let tx = scaled_coord(col, xres);
            let mut s = 0.0;
            for (&(i, j), &c) in term_powers.iter().zip(coeffs.iter()) {
                s += c * tx.powi(i as i32) * ty.powi(j as i32);
            }
            *z -= s;
        }
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC - level-and-extract

/// Levels a field by a polynomial background, optionally returning the
/// reconstructed background.
///
/// With a mask and a masking mode other than ignore, the generic masked
/// fit is used for either parameterisation.  The background field is
/// produced by subtracting the negated coefficients from a zero field.
///
/// # Errors
///
/// [`Error::SizeMismatch`] when mask and field dimensions differ,
/// [`Error::UnitIncompatibility`] when their lateral units differ.
pub fn polynomial_background(
    field: &mut Field,
    mask: Option<&Field>,
    masking: MaskingMode,
    degrees: Degrees,
    extract: bool,
) -> Result<Option<Field>, Error> {
    if let Some(mask) = mask {
        if mask.xres() != field.xres() || mask.yres() != field.yres() {
            return Err(Error::SizeMismatch {
                expected: field.xres() * field.yres(),
                got: mask.xres() * mask.yres(),
            });
        }
        if mask.si_unit_xy() != field.si_unit_xy() {
            return Err(Error::UnitIncompatibility {
                expected: field.si_unit_xy().clone(),
                got: mask.si_unit_xy().clone(),
            });
        }
    }

    let mut background = extract.then(|| {
        let mut bg = Field::new_alike(field);
        bg.clear();
        bg
    });

    match (mask, masking) {
        (Some(mask), MaskingMode::Include) | (Some(mask), MaskingMode::Exclude) => {
            let terms = match degrees {
                Degrees::Independent {
                    col_degree,
                    row_degree,
                } => {
                    let mut terms = Vec::with_capacity((col_degree + 1) * (row_degree + 1));
                    for i in 0..=col_degree {
                        for j in 0..=row_degree {
                            terms.push((i, j));
                        }
                    }
                    terms
                }
                Degrees::TotalMax(max_degree) => poly_max_terms(max_degree),
            };
            let mut coeffs = fit_poly(field, Some(mask), &terms, masking == MaskingMode::Exclude);
            subtract_poly(field, &terms, &coeffs);
            if let Some(bg) = background.as_mut() {
                for c in coeffs.iter_mut() {
                    *c = -*c;
                }
                subtract_poly(bg, &terms, &coeffs);
            }
        }

        _ => match degrees {
            Degrees::Independent {
                col_degree,
                row_degree,
            } => {
                let mut coeffs = fit_legendre(field, col_degree, row_degree);
                subtract_legendre(field, col_degree, row_degree, &coeffs);
                if let Some(bg) = background.as_mut() {
                    for c in coeffs.iter_mut() {
                        *c = -*c;
                    }
                    subtract_legendre(bg, col_degree, row_degree, &coeffs);
                }
            }
            Degrees::TotalMax(max_degree) => {
                let mut coeffs = fit_poly_max(field, max_degree);
                subtract_poly_max(field, max_degree, &coeffs);
                if let Some(bg) = background.as_mut() {
                    for c in coeffs.iter_mut() {
                        *c = -*c;
                    }
                    subtract_poly_max(bg, max_degree, &coeffs);
                }
            }
        },
    }

    field.data_changed();
    Ok(background)
}

// ======================================================================
// FUNCTIONS - PRIVATE

/// Pixel-centre coordinate scaled symmetrically into (−1, 1).
#[inline(always)]
fn scaled_coord(index: usize, res: usize) -> f64 {
    (2.0 * index as f64 + 1.0 - res as f64) / res as f64
}

/// Legendre polynomials P_0..P_degree evaluated at every scaled pixel
/// coordinate; layout `table[k*res + index]`.
fn legendre_table(res: usize, degree: usize) -> Vec<f64> {
    let mut table = vec![0.0; (degree + 1) * res];
    for index in 0..res {
        let t = scaled_coord(index, res);
        table[index] = 1.0;
        if degree >= 1 {
            table[res + index] = t;
        }
        for k in 2..=degree {
            let pk1 = table[(k - 1) * res + index];
            let pk2 = table[(k - 2) * res + index];
            table[k * res + index] =
                ((2 * k - 1) as f64 * t * pk1 - (k - 1) as f64 * pk2) / k as f64;
        }
    }
    table
}

fn gram(table: &[f64], n: usize, res: usize) -> Vec<f64> {
    let mut g = vec![0.0; n * (n + 1) / 2];
    for k in 0..n {
        for l in 0..=k {
            let mut s = 0.0;
            for index in 0..res {
                s += table[k * res + index] * table[l * res + index];
            }
            g[k * (k + 1) / 2 + l] = s;
        }
    }
    g
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    fn legendre_plane(xres: usize, yres: usize, c00: f64, c10: f64, c01: f64) -> Field {
        let mut field = Field::new(xres, yres, 1.0, 1.0);
        for row in 0..yres {
            let ty = scaled_coord(row, yres);
            for col in 0..xres {
                let tx = scaled_coord(col, xres);
                field.set(col, row, c00 + c10 * tx + c01 * ty);
            }
        }
        field
    }

    // ============================================================
    // LEGENDRE

    #[test]
    fn plane_coefficients_are_recovered() {
        let mut field = legendre_plane(16, 16, 1.0, 2.0, 3.0);

        let coeffs = fit_legendre(&field, 1, 1);
        assert_near!(coeffs[0], 1.0, 1e-10); // (0, 0)
        assert_near!(coeffs[1], 3.0, 1e-10); // (0, 1)
        assert_near!(coeffs[2], 2.0, 1e-10); // (1, 0)
        assert_near!(coeffs[3], 0.0, 1e-10); // (1, 1)

        subtract_legendre(&mut field, 1, 1, &coeffs);
        for &z in field.data() {
            assert_near!(z, 0.0, 1e-10);
        }
    }

    #[test]
    fn fit_is_a_projection() {
        let mut field = test_util::random_field(24, 18, 5);

        let coeffs = fit_legendre(&field, 3, 2);
        subtract_legendre(&mut field, 3, 2, &coeffs);

        let residual_coeffs = fit_legendre(&field, 3, 2);
        for &c in residual_coeffs.iter() {
            assert_near!(c, 0.0, 1e-9);
        }
    }

    // ============================================================
    // TOTAL DEGREE

    #[test]
    fn total_degree_exact_on_quadratic() {
        let xres = 20;
        let yres = 20;
        let mut field = Field::new(xres, yres, 1.0, 1.0);
        for row in 0..yres {
            let ty = scaled_coord(row, yres);
            for col in 0..xres {
                let tx = scaled_coord(col, xres);
                field.set(col, row, 0.5 - tx + 2.0 * ty + 0.25 * tx * ty - ty * ty);
            }
        }

        let coeffs = fit_poly_max(&field, 2);
        subtract_poly_max(&mut field, 2, &coeffs);
        for &z in field.data() {
            assert_near!(z, 0.0, 1e-9);
        }
    }

    #[test]
    fn poly_max_terms_count() {
        assert_eq!(poly_max_terms(0), [(0, 0)]);
        assert_eq!(poly_max_terms(2).len(), 6);
        assert_eq!(poly_max_terms(12).len(), 91);
    }

    // ============================================================
    // MASKED FIT

    #[test]
    fn excluded_pixels_do_not_disturb_the_fit() {
        let mut field = legendre_plane(16, 16, 1.0, 2.0, 3.0);
        let mut mask = Field::new(16, 16, 1.0, 1.0);

        // Corrupt a blob and mark it.
        mask.area_fill(4, 4, 5, 5, 1.0);
        for row in 4..9 {
            for col in 4..9 {
                field.set(col, row, 1000.0);
            }
        }

        let terms = [(0, 0), (1, 0), (0, 1)];
        let coeffs = fit_poly(&field, Some(&mask), &terms, true);
        subtract_poly(&mut field, &terms, &coeffs);

        for row in 0..16 {
            for col in 0..16 {
                if (4..9).contains(&col) && (4..9).contains(&row) {
                    continue;
                }
                assert_near!(field.get(col, row), 0.0, 1e-9);
            }
        }
    }

    #[test]
    fn degenerate_fit_returns_zeroes() {
        // One participating pixel cannot determine three terms.
        let field = test_util::random_field(8, 8, 9);
        let mut mask = Field::new(8, 8, 1.0, 1.0);
        mask.set(3, 3, 1.0);

        let coeffs = fit_poly(&field, Some(&mask), &[(0, 0), (1, 0), (0, 1)], false);
        assert_eq!(coeffs, [0.0, 0.0, 0.0]);
    }

    // ============================================================
    // LEVEL-AND-EXTRACT

    #[test]
    fn background_plus_leveled_is_original() {
        let field = test_util::random_field(16, 12, 11);
        let mut leveled = field.clone();

        let bg = polynomial_background(
            &mut leveled,
            None,
            MaskingMode::Ignore,
            Degrees::Independent {
                col_degree: 2,
                row_degree: 2,
            },
            true,
        )
        .unwrap()
        .unwrap();

        for ((&orig, &lev), &b) in field
            .data()
            .iter()
            .zip(leveled.data().iter())
            .zip(bg.data().iter())
        {
            assert_near!(lev + b, orig, 1e-10);
        }
    }

    #[test]
    fn mask_unit_mismatch_is_reported() {
        let mut field = Field::new(8, 8, 1.0, 1.0);
        let mut mask = Field::new(8, 8, 1.0, 1.0);
        field.set_si_unit_xy(crate::SiUnit::meter());
        mask.set_si_unit_xy(crate::SiUnit::second());

        let result = polynomial_background(
            &mut field,
            Some(&mask),
            MaskingMode::Include,
            Degrees::TotalMax(1),
            false,
        );
        assert!(matches!(result, Err(Error::UnitIncompatibility { .. })));
    }

    #[test]
    fn mask_size_mismatch_is_reported() {
        let mut field = Field::new(8, 8, 1.0, 1.0);
        let mask = Field::new(4, 8, 1.0, 1.0);

        let result = polynomial_background(
            &mut field,
            Some(&mask),
            MaskingMode::Include,
            Degrees::TotalMax(1),
            false,
        );
        assert!(matches!(result, Err(Error::SizeMismatch { .. })));
    }
}
