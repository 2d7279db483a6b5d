//! Peak location, ranking and characterisation in sampled curves.
//!
//! [`Peaks`] finds strict interior maxima of a sampled curve, refines
//! them to sub-sample position by a parabolic fit, and derives five
//! scalars per peak: prominence, abscissa, height, area and width
//! (dispersion).
//!
//! ```rust
//! use scanprobe::peaks::{PeakBackground, PeakQuantity, Peaks};
//!
//! let xdata: Vec<f64> = (0..11).map(|i| i as f64).collect();
//! let ydata = [0.0, 1.0, 4.0, 9.0, 4.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0];
//!
//! let mut peaks = Peaks::new();
//! peaks.set_background(PeakBackground::BilateralMinimum);
//! let n = peaks.analyze(&xdata, &ydata, usize::MAX);
//! assert_eq!(n, 2);
//!
//! let mut prominence = vec![0.0; n];
//! peaks.quantity(PeakQuantity::Prominence, &mut prominence);
//! assert_eq!(prominence, [9.0, 4.0]);
//! ```

// ======================================================================
// PeakBackground - PUBLIC

/// Baseline subtracted from a peak before deriving its quantities.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PeakBackground {
    /// The baseline is zero.
    Zero,
    /// The minimum of the left and right valleys bounding the peak.
    #[default]
    BilateralMinimum,
}

// ======================================================================
// PeakOrder - PUBLIC

/// Order of the peaks reported by [`Peaks::analyze`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PeakOrder {
    /// Ascending by position.
    Abscissa,
    /// Descending by prominence.
    #[default]
    Prominence,
}

// ======================================================================
// PeakQuantity - PUBLIC

/// Scalar derived for each found peak.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeakQuantity {
    /// Refined height above the background.
    Prominence,
    /// Refined sub-sample position.
    Abscissa,
    /// Refined peak value.
    Height,
    /// Background-subtracted area over the bounded interval.
    Area,
    /// Square root of the second central moment over the interval.
    Width,
}

// ======================================================================
// Peak - PUBLIC

/// One found peak.
#[derive(Clone, Copy, Debug)]
pub struct Peak {
    /// Refined height above the background.
    pub prominence: f64,
    /// Refined sub-sample position.
    pub abscissa: f64,
    /// Refined peak value.
    pub height: f64,
    /// Background-subtracted area over the bounded interval.
    pub area: f64,
    /// Square root of the second central moment over the interval.
    pub dispersion: f64,
    /// Index of the unrefined maximum in the source data.
    pub i: usize,
}

// ======================================================================
// Peaks - PUBLIC

/// Peak analyser.
///
/// Boundary samples are never considered peaks; candidates are strict
/// interior maxima only.
#[derive(Clone, Debug, Default)]
pub struct Peaks {
    background: PeakBackground,
    order: PeakOrder,
    peaks: Vec<Peak>,
}

impl Peaks {
    /// Creates a new analyser with bilateral-minimum background and
    /// prominence ordering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the background type used by subsequent [`Peaks::analyze`].
    pub fn set_background(&mut self, background: PeakBackground) {
        self.background = background;
    }

    /// Sets the order of reported peaks.
    pub fn set_order(&mut self, order: PeakOrder) {
        self.order = order;
    }

    /// Analyses a curve and keeps at most `maxpeaks` strongest peaks.
    ///
    /// All found peaks are ranked by descending prominence first; the
    /// kept top `maxpeaks` are then re-sorted according to the configured
    /// order.  Returns the number of kept peaks.
    ///
    /// # Panics
    ///
    /// If `xdata` and `ydata` lengths differ or are shorter than 5
    /// samples.
    pub fn analyze(&mut self, xdata: &[f64], ydata: &[f64], maxpeaks: usize) -> usize {
        assert_eq!(xdata.len(), ydata.len());
        assert!(xdata.len() >= 5, "peak analysis needs at least 5 samples");

        self.peaks.clear();
        let n = ydata.len();

        for i in 1..n - 1 {
            if !(ydata[i] > ydata[i - 1] && ydata[i] > ydata[i + 1]) {
                continue;
            }
            self.peaks.push(analyse_one(xdata, ydata, i, self.background));
        }

        self.peaks
            .sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
        self.peaks.truncate(maxpeaks);

        if self.order == PeakOrder::Abscissa {
            self.peaks
                .sort_by(|a, b| a.abscissa.total_cmp(&b.abscissa));
        }

        self.peaks.len()
    }

    /// Returns the number of peaks kept by the last analysis.
    pub fn n_peaks(&self) -> usize {
        self.peaks.len()
    }

    /// Returns the kept peaks in the configured order.
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Fills `out` with one derived quantity of every kept peak.
    ///
    /// # Panics
    ///
    /// If `out` is shorter than the number of kept peaks.
    pub fn quantity(&self, quantity: PeakQuantity, out: &mut [f64]) {
        assert!(out.len() >= self.peaks.len());
        for (o, peak) in out.iter_mut().zip(self.peaks.iter()) {
            *o = match quantity {
                PeakQuantity::Prominence => peak.prominence,
                PeakQuantity::Abscissa => peak.abscissa,
                PeakQuantity::Height => peak.height,
                PeakQuantity::Area => peak.area,
                PeakQuantity::Width => peak.dispersion,
            };
        }
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn analyse_one(xdata: &[f64], ydata: &[f64], i: usize, background: PeakBackground) -> Peak {
    let n = ydata.len();

    // SUB-SAMPLE REFINEMENT
    //
    // Parabola through the maximum and its two neighbours; the strict
    // maximum guarantees a negative curvature denominator.

    let ym = ydata[i - 1];
    let y0 = ydata[i];
    let yp = ydata[i + 1];
    let d = 0.5 * (ym - yp) / (ym - 2.0 * y0 + yp);
    let height = y0 - 0.25 * (ym - yp) * d;
    let abscissa = if d >= 0.0 {
        xdata[i] + d * (xdata[i + 1] - xdata[i])
    } else {
        xdata[i] + d * (xdata[i] - xdata[i - 1])
    };

    // BOUNDING VALLEYS

    let mut left = i;
    while left > 0 && ydata[left - 1] < ydata[left] {
        left -= 1;
    }
    let mut right = i;
    while right < n - 1 && ydata[right + 1] < ydata[right] {
        right += 1;
    }

    let background = match background {
        PeakBackground::Zero => 0.0,
        PeakBackground::BilateralMinimum => ydata[left].min(ydata[right]),
    };

    // AREA AND DISPERSION

    let mut area = 0.0;
    for j in left..right {
        area += 0.5 * (ydata[j] + ydata[j + 1] - 2.0 * background) * (xdata[j + 1] - xdata[j]);
    }

    let mut m0 = 0.0;
    let mut m1 = 0.0;
    let mut m2 = 0.0;
    for j in left..=right {
        let w = (ydata[j] - background).max(0.0);
        m0 += w;
        m1 += w * xdata[j];
        m2 += w * xdata[j] * xdata[j];
    }
    let dispersion = if m0 > 0.0 {
        let mean = m1 / m0;
        (m2 / m0 - mean * mean).max(0.0).sqrt()
    } else {
        0.0
    };

    Peak {
        prominence: height - background,
        abscissa,
        height,
        area,
        dispersion,
        i,
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;

    // ============================================================
    // REFERENCE SCENARIO

    #[test]
    fn two_parabolic_peaks() {
        let xdata: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let ydata = [0.0, 1.0, 4.0, 9.0, 4.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0];

        let mut peaks = Peaks::new();
        peaks.set_background(PeakBackground::BilateralMinimum);
        let n = peaks.analyze(&xdata, &ydata, usize::MAX);
        assert_eq!(n, 2);

        // Prominence order: the strong peak first.
        let first = peaks.peaks()[0];
        assert_near!(first.abscissa, 3.0, 1e-12);
        assert_near!(first.height, 9.0, 1e-12);
        assert_near!(first.prominence, 9.0, 1e-12);

        let second = peaks.peaks()[1];
        assert_near!(second.abscissa, 8.0, 1e-12);
        assert_near!(second.height, 4.0, 1e-12);
        assert_near!(second.prominence, 4.0, 1e-12);
    }

    #[test]
    fn abscissa_order_resorts_kept_peaks() {
        // Strongest peak on the right; keep both, report by position.
        let xdata: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let ydata = [0.0, 4.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 4.0, 9.0, 0.0];

        let mut peaks = Peaks::new();
        peaks.set_order(PeakOrder::Abscissa);
        peaks.analyze(&xdata, &ydata, usize::MAX);

        let positions: Vec<f64> = peaks.peaks().iter().map(|p| p.abscissa).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn keep_top_n_by_prominence() {
        let xdata: Vec<f64> = (0..13).map(|i| i as f64).collect();
        let ydata = [0.0, 2.0, 0.0, 5.0, 0.0, 1.0, 0.0, 9.0, 0.0, 3.0, 0.0, 4.0, 0.0];

        let mut peaks = Peaks::new();
        let n = peaks.analyze(&xdata, &ydata, 2);
        assert_eq!(n, 2);
        assert_near!(peaks.peaks()[0].height, 9.0, 1e-12);
        assert_near!(peaks.peaks()[1].height, 5.0, 1e-12);
    }

    // ============================================================
    // DETECTION DETAILS

    #[test]
    fn gaussian_mixture_positions() {
        let (xdata, ydata) = test_util::gaussian_mixture(64, &[(16.0, 1.0, 2.5), (45.0, 2.0, 3.0)]);

        let mut peaks = Peaks::new();
        peaks.set_order(PeakOrder::Abscissa);
        let n = peaks.analyze(&xdata, &ydata, usize::MAX);

        assert_eq!(n, 2);
        assert!((peaks.peaks()[0].abscissa - 16.0).abs() <= 1.0);
        assert!((peaks.peaks()[1].abscissa - 45.0).abs() <= 1.0);
    }

    #[test]
    fn boundary_samples_are_not_peaks() {
        let xdata: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let ydata = [9.0, 1.0, 0.0, 0.0, 1.0, 9.0];

        let mut peaks = Peaks::new();
        assert_eq!(peaks.analyze(&xdata, &ydata, usize::MAX), 0);
    }

    #[test]
    fn plateau_is_not_a_strict_maximum() {
        let xdata: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let ydata = [0.0, 1.0, 2.0, 2.0, 1.0, 0.0, 0.0];

        let mut peaks = Peaks::new();
        assert_eq!(peaks.analyze(&xdata, &ydata, usize::MAX), 0);
    }

    #[test]
    fn zero_background_prominence_equals_height() {
        let xdata: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let ydata = [5.0, 6.0, 8.0, 6.0, 5.0, 5.5, 5.0];

        let mut peaks = Peaks::new();
        peaks.set_background(PeakBackground::Zero);
        peaks.analyze(&xdata, &ydata, usize::MAX);

        let peak = peaks.peaks()[0];
        assert_near!(peak.prominence, peak.height, 1e-12);
    }

    #[test]
    #[should_panic]
    fn analyze_rejects_short_input() {
        let mut peaks = Peaks::new();
        peaks.analyze(&[0.0; 4], &[0.0; 4], usize::MAX);
    }
}
