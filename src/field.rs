use crate::{
    line::{cached, resample_samples, sample_avg, sample_max, sample_min, sample_rms, StatsCache},
    SiUnit,
};

// ======================================================================
// Orientation - PUBLIC

/// Row or column orientation of a one-dimensional operation on a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Orientation {
    /// Operate along rows.
    Horizontal,
    /// Operate along columns.
    Vertical,
}

// ======================================================================
// Interpolation - PUBLIC

/// Interpolation used when resampling fields and lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interpolation {
    /// Nearest-neighbour.
    Round,
    /// Linear between the two (or four) nearest samples.
    Bilinear,
}

// ======================================================================
// Field - PUBLIC

/// Two-dimensional grid of samples with real dimensions and units.
///
/// Data is stored in row-major order, `yres` rows of `xres` samples.
/// Offsets are pure metadata; algorithms use `xreal/xres` and
/// `yreal/yres` as the pixel pitch.
#[derive(Clone, Debug)]
pub struct Field {
    xres: usize,
    yres: usize,
    xreal: f64,
    yreal: f64,
    xoff: f64,
    yoff: f64,
    data: Vec<f64>,
    si_unit_xy: SiUnit,
    si_unit_z: SiUnit,
    cache: StatsCache,
    version: u64,
}

impl Field {
    /// Creates a new zero-filled field.
    ///
    /// # Panics
    ///
    /// If a resolution is zero or a real dimension is not a positive
    /// number.
    pub fn new(xres: usize, yres: usize, xreal: f64, yreal: f64) -> Self {
        assert!(xres > 0 && yres > 0, "field resolutions must be positive");
        assert!(
            xreal > 0.0 && yreal > 0.0,
            "field real dimensions must be positive"
        );

        Self {
            xres,
            yres,
            xreal,
            yreal,
            xoff: 0.0,
            yoff: 0.0,
            data: vec![0.0; xres * yres],
            si_unit_xy: SiUnit::none(),
            si_unit_z: SiUnit::none(),
            cache: StatsCache::default(),
            version: 0,
        }
    }

    /// Creates a new zero-filled field with the geometry and units of
    /// `model`.
    pub fn new_alike(model: &Field) -> Self {
        let mut field = Self::new(model.xres, model.yres, model.xreal, model.yreal);
        field.xoff = model.xoff;
        field.yoff = model.yoff;
        field.si_unit_xy = model.si_unit_xy.clone();
        field.si_unit_z = model.si_unit_z.clone();
        field
    }

    // ============================================================
    // GEOMETRY

    /// Returns the number of columns.
    pub fn xres(&self) -> usize {
        self.xres
    }

    /// Returns the number of rows.
    pub fn yres(&self) -> usize {
        self.yres
    }

    /// Returns the real horizontal dimension.
    pub fn xreal(&self) -> f64 {
        self.xreal
    }

    /// Returns the real vertical dimension.
    pub fn yreal(&self) -> f64 {
        self.yreal
    }

    /// Sets the real dimensions.
    ///
    /// # Panics
    ///
    /// If either dimension is not a positive number.
    pub fn set_real(&mut self, xreal: f64, yreal: f64) {
        assert!(
            xreal > 0.0 && yreal > 0.0,
            "field real dimensions must be positive"
        );
        self.xreal = xreal;
        self.yreal = yreal;
    }

    /// Returns the horizontal offset.
    pub fn xoff(&self) -> f64 {
        self.xoff
    }

    /// Returns the vertical offset.
    pub fn yoff(&self) -> f64 {
        self.yoff
    }

    /// Sets the offsets.
    pub fn set_offsets(&mut self, xoff: f64, yoff: f64) {
        self.xoff = xoff;
        self.yoff = yoff;
    }

    /// Returns the horizontal pixel pitch.
    pub fn dx(&self) -> f64 {
        self.xreal / self.xres as f64
    }

    /// Returns the vertical pixel pitch.
    pub fn dy(&self) -> f64 {
        self.yreal / self.yres as f64
    }

    /// Converts a real vertical coordinate (relative to the field start)
    /// to a row index, which may lie outside the field.
    pub fn rtoi(&self, y: f64) -> isize {
        (y / self.dy()).floor() as isize
    }

    /// Converts a real horizontal coordinate (relative to the field start)
    /// to a column index, which may lie outside the field.
    pub fn rtoj(&self, x: f64) -> isize {
        (x / self.dx()).floor() as isize
    }

    // ============================================================
    // DATA ACCESS

    /// Returns all samples in row-major order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Returns all samples mutably, dropping cached statistics.
    pub fn data_mut(&mut self) -> &mut [f64] {
        self.invalidate();
        &mut self.data
    }

    /// Returns one sample.
    ///
    /// # Panics
    ///
    /// If the position is out of range.
    pub fn get(&self, col: usize, row: usize) -> f64 {
        assert!(col < self.xres && row < self.yres);
        self.data[row * self.xres + col]
    }

    /// Sets one sample.
    ///
    /// # Panics
    ///
    /// If the position is out of range.
    pub fn set(&mut self, col: usize, row: usize, value: f64) {
        assert!(col < self.xres && row < self.yres);
        self.invalidate();
        self.data[row * self.xres + col] = value;
    }

    /// Returns one row of samples.
    ///
    /// # Panics
    ///
    /// If `row` is out of range.
    pub fn row(&self, row: usize) -> &[f64] {
        assert!(row < self.yres);
        &self.data[row * self.xres..(row + 1) * self.xres]
    }

    /// Returns one row of samples mutably, dropping cached statistics.
    ///
    /// # Panics
    ///
    /// If `row` is out of range.
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        assert!(row < self.yres);
        self.invalidate();
        let xres = self.xres;
        &mut self.data[row * xres..(row + 1) * xres]
    }

    // ============================================================
    // UNITS

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

    // ============================================================
    // MUTATING OPS

    /// Fills the whole field with a value.
    pub fn fill(&mut self, value: f64) {
        self.data_mut().fill(value);
    }

    /// Fills the whole field with zeroes.
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Fills the rectangle of `width × height` samples at
    /// `(col, row)` with a value.
    ///
    /// # Panics
    ///
    /// If the rectangle does not fit inside the field.
    pub fn area_fill(&mut self, col: usize, row: usize, width: usize, height: usize, value: f64) {
        assert!(col + width <= self.xres && row + height <= self.yres);
        self.invalidate();
        for i in row..row + height {
            self.data[i * self.xres + col..i * self.xres + col + width].fill(value);
        }
    }

    /// Copies the rectangle of `width × height` samples at
    /// `(col, row)` of `src` to `(destcol, destrow)` of this field.
    ///
    /// # Panics
    ///
    /// If either rectangle does not fit inside its field.
    #[allow(clippy::too_many_arguments)]
    pub fn area_copy(
        &mut self,
        src: &Field,
        col: usize,
        row: usize,
        width: usize,
        height: usize,
        destcol: usize,
        destrow: usize,
    ) {
        assert!(col + width <= src.xres && row + height <= src.yres);
        assert!(destcol + width <= self.xres && destrow + height <= self.yres);
        self.invalidate();
        for i in 0..height {
            let s = (row + i) * src.xres + col;
            let d = (destrow + i) * self.xres + destcol;
            self.data[d..d + width].copy_from_slice(&src.data[s..s + width]);
        }
    }

    /// Resamples the field to a new resolution, keeping the real
    /// dimensions.
    ///
    /// # Panics
    ///
    /// If a resolution is zero.
    pub fn resample(&mut self, xres: usize, yres: usize, interpolation: Interpolation) {
        assert!(xres > 0 && yres > 0, "field resolutions must be positive");
        if xres == self.xres && yres == self.yres {
            return;
        }

        // ROWS FIRST, THEN COLUMNS

        let rows: Vec<Vec<f64>> = (0..self.yres)
            .map(|i| resample_samples(self.row(i), xres, interpolation))
            .collect();

        let mut column = vec![0.0; self.yres];
        let mut data = vec![0.0; xres * yres];
        for j in 0..xres {
            for (i, row) in rows.iter().enumerate() {
                column[i] = row[j];
            }
            let resampled = resample_samples(&column, yres, interpolation);
            for (i, z) in resampled.into_iter().enumerate() {
                data[i * xres + j] = z;
            }
        }

        self.data = data;
        self.xres = xres;
        self.yres = yres;
        self.invalidate();
    }

    // ============================================================
    // STATISTICS

    /// Returns the minimum sample value.
    pub fn min(&self) -> f64 {
        cached!(self, min, sample_min)
    }

    /// Returns the maximum sample value.
    pub fn max(&self) -> f64 {
        cached!(self, max, sample_max)
    }

    /// Returns the mean sample value.
    pub fn avg(&self) -> f64 {
        cached!(self, avg, sample_avg)
    }

    /// Returns the root mean square of sample deviations from the mean.
    pub fn rms(&self) -> f64 {
        cached!(self, rms, sample_rms)
    }

    /// Drops all cached statistics.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    // ============================================================
    // CHANGE TRACKING

    /// Marks the data as changed, bumping the data version.
    ///
    /// Owners forward this through a [`notify`](crate::notify) hub to
    /// interested parties.
    pub fn data_changed(&mut self) {
        self.invalidate();
        self.version += 1;
    }

    /// Returns the data version, incremented by [`Field::data_changed`].
    pub fn version(&self) -> u64 {
        self.version
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zero_filled() {
        let field = Field::new(4, 3, 2.0, 1.5);
        assert_eq!(field.xres(), 4);
        assert_eq!(field.yres(), 3);
        assert_eq!(field.data().len(), 12);
        assert_near!(field.dx(), 0.5, 1e-15);
        assert_near!(field.dy(), 0.5, 1e-15);
    }

    #[test]
    #[should_panic]
    fn new_rejects_nonpositive_real() {
        let _ = Field::new(4, 4, 0.0, 1.0);
    }

    #[test]
    fn rtoi_rtoj() {
        let field = Field::new(10, 10, 10.0, 10.0);
        assert_eq!(field.rtoi(3.7), 3);
        assert_eq!(field.rtoj(9.999), 9);
        assert_eq!(field.rtoj(-0.5), -1);
    }

    #[test]
    fn area_fill_and_copy() {
        let mut a = Field::new(6, 6, 1.0, 1.0);
        a.area_fill(1, 2, 3, 2, 7.0);
        assert_eq!(a.get(1, 2), 7.0);
        assert_eq!(a.get(3, 3), 7.0);
        assert_eq!(a.get(4, 2), 0.0);

        let mut b = Field::new(4, 4, 1.0, 1.0);
        b.area_copy(&a, 1, 2, 3, 2, 0, 0);
        assert_eq!(b.get(0, 0), 7.0);
        assert_eq!(b.get(2, 1), 7.0);
        assert_eq!(b.get(3, 0), 0.0);
    }

    #[test]
    fn stats_cache_dropped_on_mutation() {
        let mut field = crate::test_util::random_field(8, 8, 3);
        let min = field.min();
        field.data_mut()[0] = min - 10.0;
        assert_eq!(field.min(), min - 10.0);
    }

    #[test]
    fn resample_constant_stays_constant() {
        let mut field = Field::new(7, 5, 1.0, 1.0);
        field.fill(-2.5);
        field.resample(11, 13, Interpolation::Bilinear);
        assert_eq!(field.xres(), 11);
        assert_eq!(field.yres(), 13);
        for &z in field.data() {
            assert_near!(z, -2.5, 1e-15);
        }
    }

    #[test]
    fn data_changed_bumps_version() {
        let mut field = Field::new(2, 2, 1.0, 1.0);
        assert_eq!(field.version(), 0);
        field.data_changed();
        field.data_changed();
        assert_eq!(field.version(), 2);
    }
}
