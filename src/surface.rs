use std::cell::Cell;

use crate::{math, Error, Field, ProgressFn, SiUnit};

// ======================================================================
// Xyz - PUBLIC

/// One scattered surface point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Xyz {
    /// Lateral x coordinate.
    pub x: f64,
    /// Lateral y coordinate.
    pub y: f64,
    /// Height value.
    pub z: f64,
}

impl Xyz {
    /// Creates a point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ======================================================================
// Surface - PUBLIC

/// Unordered set of `(x, y, z)` samples with units and cached lateral
/// bounds.
///
/// The bounds cache is valid only while the point set is unchanged; any
/// mutation drops it.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    points: Vec<Xyz>,
    si_unit_xy: SiUnit,
    si_unit_z: SiUnit,
    bounds: Cell<Option<(f64, f64, f64, f64)>>,
}

impl Surface {
    /// Creates an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a surface from a point list.
    pub fn from_points(points: Vec<Xyz>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Creates a surface holding the points of another surface whose
    /// lateral coordinates lie within the given ranges (inclusive).
    pub fn new_part(&self, xfrom: f64, xto: f64, yfrom: f64, yto: f64) -> Surface {
        let mut part = Surface {
            points: Vec::new(),
            si_unit_xy: self.si_unit_xy.clone(),
            si_unit_z: self.si_unit_z.clone(),
            bounds: Cell::new(None),
        };
        if xfrom > xto || yfrom > yto {
            return part;
        }
        part.points = self
            .points
            .iter()
            .filter(|pt| pt.x >= xfrom && pt.x <= xto && pt.y >= yfrom && pt.y <= yto)
            .copied()
            .collect();
        part
    }

    /// Creates a surface from a field; a lossless reshape.
    ///
    /// Point `(col, row)` takes `x = (col+0.5)·dx + xoff`,
    /// `y = (row+0.5)·dy + yoff` and the field value as `z`.
    pub fn from_field(field: &Field) -> Surface {
        let mut surface = Surface::new();
        surface.set_from_field(field);
        surface
    }

    /// Replaces the points and units of this surface by a reshape of a
    /// field; see [`Surface::from_field`].
    pub fn set_from_field(&mut self, field: &Field) {
        let xres = field.xres();
        let yres = field.yres();
        let dx = field.dx();
        let dy = field.dy();
        let xoff = 0.5 * dx + field.xoff();
        let yoff = 0.5 * dy + field.yoff();

        self.points.clear();
        self.points.reserve(xres * yres);
        for row in 0..yres {
            let data = field.row(row);
            for (col, &z) in data.iter().enumerate() {
                self.points
                    .push(Xyz::new(dx * col as f64 + xoff, dy * row as f64 + yoff, z));
            }
        }
        self.si_unit_xy = field.si_unit_xy().clone();
        self.si_unit_z = field.si_unit_z().clone();

        self.bounds.set(Some((
            xoff,
            dx * (xres - 1) as f64 + xoff,
            yoff,
            dy * (yres - 1) as f64 + yoff,
        )));
    }

    /// Returns the number of points.
    pub fn n(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` when the surface holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the points.
    pub fn points(&self) -> &[Xyz] {
        &self.points
    }

    /// Returns the points mutably, dropping the bounds cache.
    pub fn points_mut(&mut self) -> &mut [Xyz] {
        self.bounds.set(None);
        &mut self.points
    }

    /// Appends a point, dropping the bounds cache.
    pub fn push(&mut self, point: Xyz) {
        self.bounds.set(None);
        self.points.push(point);
    }

    /// Drops the bounds cache.
    pub fn invalidate(&mut self) {
        self.bounds.set(None);
    }

    /// Returns the lateral unit.
    pub fn si_unit_xy(&self) -> &SiUnit {
        &self.si_unit_xy
    }

    /// Returns the value unit.
    pub fn si_unit_z(&self) -> &SiUnit {
        &self.si_unit_z
    }

    /// Sets the lateral unit.
    pub fn set_si_unit_xy(&mut self, unit: SiUnit) {
        self.si_unit_xy = unit;
    }

    /// Sets the value unit.
    pub fn set_si_unit_z(&mut self, unit: SiUnit) {
        self.si_unit_z = unit;
    }

    /// Returns the lateral x range, `(0, 0)` for an empty surface.
    pub fn xrange(&self) -> (f64, f64) {
        let (xmin, xmax, _, _) = self.ranges();
        (xmin, xmax)
    }

    /// Returns the lateral y range, `(0, 0)` for an empty surface.
    pub fn yrange(&self) -> (f64, f64) {
        let (_, _, ymin, ymax) = self.ranges();
        (ymin, ymax)
    }

    /// Returns the value range, `(0, 0)` for an empty surface.
    pub fn min_max(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for pt in self.points.iter() {
            min = min.min(pt.z);
            max = max.max(pt.z);
        }
        if self.points.is_empty() {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }

    // ============================================================
    // REGULARISATION

    /// Regularises the entire surface onto a grid; see
    /// [`Surface::regularize`].
    pub fn regularize_full(
        &self,
        xres: usize,
        yres: usize,
        progress: Option<&mut ProgressFn>,
    ) -> Result<Option<Field>, Error> {
        if self.points.is_empty() {
            return Ok(None);
        }
        let (xmin, xmax, ymin, ymax) = self.ranges();
        self.regularize_rect(xmin, xmax, ymin, ymax, xres, yres, progress)
    }

    /// Regularises the surface onto a regular grid over the given
    /// lateral rectangle.
    ///
    /// Pass zero for `xres` or `yres` to derive the resolution from the
    /// point count and the aspect ratio of the rectangle.  Points are
    /// binned into pixels and averaged; empty pixels are filled by
    /// Laplace propagation from the initialised ones.  Returns `None`
    /// for an empty surface.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when the progress callback returns `false`.
    ///
    /// # Panics
    ///
    /// If `xto < xfrom` or `yto < yfrom`.
    #[allow(clippy::too_many_arguments)]
    pub fn regularize(
        &self,
        xfrom: f64,
        xto: f64,
        yfrom: f64,
        yto: f64,
        xres: usize,
        yres: usize,
        progress: Option<&mut ProgressFn>,
    ) -> Result<Option<Field>, Error> {
        assert!(xto >= xfrom && yto >= yfrom);
        if self.points.is_empty() {
            return Ok(None);
        }
        self.regularize_rect(xfrom, xto, yfrom, yto, xres, yres, progress)
    }
}

// ======================================================================
// Surface - PRIVATE

impl Surface {
    fn ranges(&self) -> (f64, f64, f64, f64) {
        if let Some(bounds) = self.bounds.get() {
            return bounds;
        }
        if self.points.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let mut xmin = f64::INFINITY;
        let mut xmax = f64::NEG_INFINITY;
        let mut ymin = f64::INFINITY;
        let mut ymax = f64::NEG_INFINITY;
        for pt in self.points.iter() {
            xmin = xmin.min(pt.x);
            xmax = xmax.max(pt.x);
            ymin = ymin.min(pt.y);
            ymax = ymax.max(pt.y);
        }
        self.bounds.set(Some((xmin, xmax, ymin, ymax)));
        (xmin, xmax, ymin, ymax)
    }

    #[allow(clippy::too_many_arguments)]
    fn regularize_rect(
        &self,
        xfrom: f64,
        xto: f64,
        yfrom: f64,
        yto: f64,
        mut xres: usize,
        mut yres: usize,
        progress: Option<&mut ProgressFn>,
    ) -> Result<Option<Field>, Error> {
        let n = self.points.len();
        let xlen = xto - xfrom;
        let ylen = yto - yfrom;

        // AUTOMATIC RESOLUTION
        //
        // Split n points between the axes according to the aspect ratio,
        // then use the implied point spacing p.

        if xres == 0 || yres == 0 {
            let alpha = xlen / ylen;
            let alpha1 = 1.0 - alpha;
            let sqrt_d = (4.0 * alpha * n as f64 + alpha1 * alpha1).sqrt();
            let xresfull = 0.5 * (alpha1 + sqrt_d);
            let yresfull = 0.5 * (sqrt_d - alpha1) / alpha;
            let p = (xlen * ylen / (xresfull - 1.0) / (yresfull - 1.0)).sqrt();

            if xres == 0 {
                xres = if p == 0.0 || p.is_nan() || xlen == 0.0 {
                    1
                } else {
                    math::round(xlen / p + 1.0).clamp(1, n)
                };
            }
            if yres == 0 {
                yres = if p == 0.0 || p.is_nan() || ylen == 0.0 {
                    1
                } else {
                    math::round(ylen / p + 1.0).clamp(1, n)
                };
            }
        }

        // FIELD GEOMETRY
        //
        // Pixel centres of the outermost pixels sit on the rectangle
        // edges; degenerate axes get a fallback extent.

        let xreal = if xres == 1 || xlen == 0.0 {
            if xfrom != 0.0 {
                xfrom.abs()
            } else {
                1.0
            }
        } else {
            xlen * xres as f64 / (xres as f64 - 1.0)
        };
        let yreal = if yres == 1 || ylen == 0.0 {
            if yfrom != 0.0 {
                yfrom.abs()
            } else {
                1.0
            }
        } else {
            ylen * yres as f64 / (yres as f64 - 1.0)
        };

        let mut field = Field::new(xres, yres, xreal, yreal);
        field.set_offsets(
            xfrom - 0.5 * field.dx(),
            yfrom - 0.5 * field.dy(),
        );
        field.set_si_unit_xy(self.si_unit_xy.clone());
        field.set_si_unit_z(self.si_unit_z.clone());

        self.preview_into(&mut field, progress)?;
        Ok(Some(field))
    }

    /// Bins points into the field, averages hit pixels and fills the
    /// rest by Laplace propagation.
    fn preview_into(
        &self,
        field: &mut Field,
        mut progress: Option<&mut ProgressFn>,
    ) -> Result<(), Error> {
        let xres = field.xres();
        let yres = field.yres();
        let dx = field.dx();
        let dy = field.dy();
        let xoff = field.xoff();
        let yoff = field.yoff();

        let mut counters = vec![0u32; xres * yres];
        let mut totalcount = 0usize;
        field.clear();
        {
            let data = field.data_mut();
            for pt in self.points.iter() {
                let j = ((pt.x - xoff) / dx).floor();
                let i = ((pt.y - yoff) / dy).floor();
                if j < 0.0 || j >= xres as f64 || i < 0.0 || i >= yres as f64 {
                    continue;
                }
                let k = i as usize * xres + j as usize;
                if counters[k] == 0 {
                    totalcount += 1;
                }
                counters[k] += 1;
                data[k] += pt.z;
            }

            if totalcount == 0 {
                // Nothing was hit; the zero field is the result.
                return Ok(());
            }

            // Hit pixels take the mean value and are fixed (counter 0);
            // the rest is to be interpolated.
            for (z, counter) in data.iter_mut().zip(counters.iter_mut()) {
                if *counter != 0 {
                    *z /= *counter as f64;
                    *counter = 0;
                } else {
                    *counter = u32::MAX;
                }
            }
        }

        let mut todo = xres * yres - totalcount;
        if todo == 0 {
            return Ok(());
        }

        let total_pixels = xres * yres;
        let mut current: Vec<f64> = field.data().to_vec();
        let mut other: Vec<f64> = current.clone();

        let mut iter: u32 = 0;
        while todo > 0 {
            // Interpolate in the already initialised area.
            for i in 0..yres {
                for j in 0..xres {
                    let k = i * xres + j;
                    if counters[k] != 0 && counters[k] != u32::MAX && counters[k] <= iter {
                        if let Some(value) =
                            propagate_laplace(&current, &counters, xres, yres, j, i, iter)
                        {
                            other[k] = value;
                        }
                    }
                }
            }
            std::mem::swap(&mut current, &mut other);

            // Propagate already initialised values to the uninitialised
            // area; freshly filled pixels do not propagate within the
            // same iteration.
            for i in 0..yres {
                for j in 0..xres {
                    let k = i * xres + j;
                    if counters[k] > iter {
                        if let Some(value) =
                            propagate_laplace(&current, &counters, xres, yres, j, i, iter)
                        {
                            other[k] = value;
                            counters[k] = iter + 1;
                            todo -= 1;
                        }
                    }
                }
            }
            std::mem::swap(&mut current, &mut other);

            if let Some(progress) = progress.as_mut() {
                let fraction = (total_pixels - todo) as f64 / total_pixels as f64;
                if !progress(fraction) {
                    field.data_mut().copy_from_slice(&current);
                    return Err(Error::Cancelled);
                }
            }
            iter += 1;
        }

        field.data_mut().copy_from_slice(&current);
        Ok(())
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

/// Mean of the already-initialised 8-neighbours of `(j, i)`, or `None`
/// when no neighbour is initialised yet.
fn propagate_laplace(
    src: &[f64],
    counters: &[u32],
    xres: usize,
    yres: usize,
    j: usize,
    i: usize,
    iter: u32,
) -> Option<f64> {
    let mut s = 0u32;
    let mut z = 0.0;
    let k = i * xres + j;

    if i > 0 && j > 0 && counters[k - xres - 1] <= iter {
        z += src[k - xres - 1];
        s += 1;
    }
    if i > 0 && counters[k - xres] <= iter {
        z += src[k - xres];
        s += 1;
    }
    if i > 0 && j < xres - 1 && counters[k - xres + 1] <= iter {
        z += src[k - xres + 1];
        s += 1;
    }
    if j > 0 && counters[k - 1] <= iter {
        z += src[k - 1];
        s += 1;
    }
    if j < xres - 1 && counters[k + 1] <= iter {
        z += src[k + 1];
        s += 1;
    }
    if i < yres - 1 && j > 0 && counters[k + xres - 1] <= iter {
        z += src[k + xres - 1];
        s += 1;
    }
    if i < yres - 1 && counters[k + xres] <= iter {
        z += src[k + xres];
        s += 1;
    }
    if i < yres - 1 && j < xres - 1 && counters[k + xres + 1] <= iter {
        z += src[k + xres + 1];
        s += 1;
    }

    (s > 0).then(|| z / s as f64)
}

// ======================================================================
// TESTS
