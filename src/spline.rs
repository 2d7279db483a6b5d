use std::ops::{Add, Mul, Sub};

// ======================================================================
// CONST - PRIVATE

/// Largest allowed deviation of the sampled polyline from the cubic, in
/// drawing-target pixels.
const SAMPLE_TOLERANCE: f64 = 0.1;

/// Subdivision depth cap; 2^12 segments per span is far below the
/// tolerance for any sane input.
const MAX_DEPTH: u32 = 12;

/// Tangent scale making slackness 1/√2 the Catmull-Rom spline.
const SQRT2: f64 = std::f64::consts::SQRT_2;

// ======================================================================
// XY - PUBLIC

/// A point of a sampled or control polyline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct XY {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl XY {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn dist(self, other: XY) -> f64 {
        ((self.x - other.x) * (self.x - other.x) + (self.y - other.y) * (self.y - other.y)).sqrt()
    }
}

impl Add for XY {
    type Output = XY;
    fn add(self, rhs: XY) -> XY {
        XY::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for XY {
    type Output = XY;
    fn sub(self, rhs: XY) -> XY {
        XY::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for XY {
    type Output = XY;
    fn mul(self, rhs: f64) -> XY {
        XY::new(self.x * rhs, self.y * rhs)
    }
}

// ======================================================================
// Spline - PUBLIC

/// Catmull-like cubic spline path with configurable slackness and
/// closure.
///
/// Slackness scales the tangent magnitude at every knot: 0 produces the
/// corner-preserving chain of straight segments, 1/√2 (the default) the
/// Catmull-Rom spline.  [`Spline::sample_naturally`] returns an
/// adaptively subdivided polyline suitable for rasterisation; the result
/// is cached and regenerated whenever control points, slackness or
/// closure change.
///
/// ```rust
/// use scanprobe::{Spline, XY};
///
/// let mut spline = Spline::new();
/// spline.set_points(&[XY::new(0.0, 0.0), XY::new(10.0, 0.0), XY::new(10.0, 10.0)]);
///
/// let samples = spline.sample_naturally().to_vec();
/// assert_eq!(samples.first(), Some(&XY::new(0.0, 0.0)));
/// assert_eq!(samples.last(), Some(&XY::new(10.0, 10.0)));
/// ```
#[derive(Clone, Debug)]
pub struct Spline {
    points: Vec<XY>,
    slackness: f64,
    closed: bool,
    samples: Vec<XY>,
    dirty: bool,
}

impl Spline {
    /// Creates an empty open spline with slackness 1/√2.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            slackness: 1.0 / SQRT2,
            closed: false,
            samples: Vec::new(),
            dirty: true,
        }
    }

    /// Replaces the control points.
    pub fn set_points(&mut self, points: &[XY]) {
        self.points.clear();
        self.points.extend_from_slice(points);
        self.dirty = true;
    }

    /// Returns the control points.
    pub fn points(&self) -> &[XY] {
        &self.points
    }

    /// Returns the slackness parameter.
    pub fn slackness(&self) -> f64 {
        self.slackness
    }

    /// Sets the slackness parameter.
    ///
    /// # Panics
    ///
    /// If `slackness` is not within `0.0 ..= 1.0`.
    pub fn set_slackness(&mut self, slackness: f64) {
        assert!(
            (0.0..=1.0).contains(&slackness),
            "slackness must be within [0, 1]"
        );
        if slackness == self.slackness {
            return;
        }
        self.slackness = slackness;
        self.dirty = true;
    }

    /// Returns whether the path is closed.
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Sets whether the path is closed.
    pub fn set_closed(&mut self, closed: bool) {
        if closed == self.closed {
            return;
        }
        self.closed = closed;
        self.dirty = true;
    }

    /// Returns the adaptively sampled polyline.
    ///
    /// An open path starts at the first and ends at the last control
    /// point; a closed path is cyclic with the first point repeated at
    /// the end.  Consecutive samples deviate from the underlying cubic
    /// by less than a fixed sub-pixel tolerance.
    pub fn sample_naturally(&mut self) -> &[XY] {
        if self.dirty {
            self.samples = self.resample();
            self.dirty = false;
        }
        &self.samples
    }
}

impl Default for Spline {
    fn default() -> Self {
        Self::new()
    }
}

// ======================================================================
// Spline - PRIVATE

impl Spline {
    fn resample(&self) -> Vec<XY> {
        let n = self.points.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![self.points[0]];
        }

        let tangents = self.tangents();
        let nseg = if self.closed { n } else { n - 1 };

        let mut samples = vec![self.points[0]];
        for seg in 0..nseg {
            let i0 = seg;
            let i1 = (seg + 1) % n;
            sample_cubic(
                self.points[i0],
                tangents[i0],
                self.points[i1],
                tangents[i1],
                &mut samples,
            );
        }
        samples
    }

    /// Knot tangents: symmetric differences at interior knots, one-sided
    /// at the open ends, scaled so slackness 1/√2 is Catmull-Rom.
    fn tangents(&self) -> Vec<XY> {
        let n = self.points.len();
        let scale = self.slackness * SQRT2;

        (0..n)
            .map(|i| {
                if self.closed {
                    let prev = self.points[(i + n - 1) % n];
                    let next = self.points[(i + 1) % n];
                    (next - prev) * (0.5 * scale)
                } else if i == 0 {
                    (self.points[1] - self.points[0]) * scale
                } else if i == n - 1 {
                    (self.points[n - 1] - self.points[n - 2]) * scale
                } else {
                    (self.points[i + 1] - self.points[i - 1]) * (0.5 * scale)
                }
            })
            .collect()
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn hermite(p0: XY, m0: XY, p1: XY, m1: XY, t: f64) -> XY {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    p0 * h00 + m0 * h10 + p1 * h01 + m1 * h11
}

/// Appends samples of one cubic span, subdividing until every chord
/// stays within the tolerance of the curve.  The span start is assumed
/// to be already emitted.
fn sample_cubic(p0: XY, m0: XY, p1: XY, m1: XY, samples: &mut Vec<XY>) {
    subdivide(p0, m0, p1, m1, 0.0, 1.0, 0, samples);
}

#[allow(clippy::too_many_arguments)]
fn subdivide(
    p0: XY,
    m0: XY,
    p1: XY,
    m1: XY,
    t0: f64,
    t1: f64,
    depth: u32,
    samples: &mut Vec<XY>,
) {
    let a = hermite(p0, m0, p1, m1, t0);
    let b = hermite(p0, m0, p1, m1, t1);
    let tm = 0.5 * (t0 + t1);
    let mid = hermite(p0, m0, p1, m1, tm);
    let chord_mid = (a + b) * 0.5;

    if depth >= MAX_DEPTH || mid.dist(chord_mid) < SAMPLE_TOLERANCE {
        samples.push(b);
    } else {
        subdivide(p0, m0, p1, m1, t0, tm, depth + 1, samples);
        subdivide(p0, m0, p1, m1, tm, t1, depth + 1, samples);
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> Vec<XY> {
        vec![
            XY::new(0.0, 0.0),
            XY::new(20.0, 5.0),
            XY::new(40.0, -5.0),
            XY::new(60.0, 0.0),
        ]
    }

    // ============================================================
    // ENDPOINTS AND CLOSURE

    #[test]
    fn open_path_hits_both_end_knots() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());

        let samples = spline.sample_naturally();
        assert_eq!(samples[0], XY::new(0.0, 0.0));
        assert_eq!(*samples.last().unwrap(), XY::new(60.0, 0.0));
    }

    #[test]
    fn closed_path_is_cyclic() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());
        spline.set_closed(true);

        let samples = spline.sample_naturally();
        assert_eq!(samples[0], *samples.last().unwrap());
    }

    #[test]
    fn single_point_and_empty() {
        let mut spline = Spline::new();
        assert!(spline.sample_naturally().is_empty());

        spline.set_points(&[XY::new(1.0, 2.0)]);
        assert_eq!(spline.sample_naturally(), [XY::new(1.0, 2.0)]);
    }

    // ============================================================
    // SLACKNESS

    #[test]
    fn zero_slackness_is_the_control_polyline() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());
        spline.set_slackness(0.0);

        assert_eq!(spline.sample_naturally(), &zigzag()[..]);
    }

    #[test]
    fn catmull_rom_interpolates_knots() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());

        let knots = zigzag();
        let samples = spline.sample_naturally();
        for knot in knots {
            assert!(samples.iter().any(|s| s.dist(knot) < 1e-9));
        }
    }

    #[test]
    fn smoother_curve_needs_more_samples() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());

        spline.set_slackness(0.0);
        let straight = spline.sample_naturally().len();
        spline.set_slackness(1.0);
        let smooth = spline.sample_naturally().len();

        assert!(smooth > straight);
    }

    // ============================================================
    // ADAPTIVITY AND CACHING

    #[test]
    fn chords_stay_close_to_the_curve() {
        // Neighbour samples must be close together relative to the path
        // scale wherever the curve bends.
        let mut spline = Spline::new();
        spline.set_points(&[
            XY::new(0.0, 0.0),
            XY::new(10.0, 20.0),
            XY::new(20.0, 0.0),
        ]);

        let samples = spline.sample_naturally();
        assert!(samples.len() > 10);
        for pair in samples.windows(2) {
            assert!(pair[0].dist(pair[1]) < 5.0);
        }
    }

    #[test]
    fn cache_regenerates_on_change() {
        let mut spline = Spline::new();
        spline.set_points(&zigzag());
        let smooth = spline.sample_naturally().to_vec();

        spline.set_slackness(0.0);
        let straight = spline.sample_naturally().to_vec();
        assert_ne!(smooth, straight);

        spline.set_closed(true);
        let closed = spline.sample_naturally().to_vec();
        assert_ne!(straight, closed);
    }

    #[test]
    #[should_panic]
    fn slackness_out_of_range_is_rejected() {
        let mut spline = Spline::new();
        spline.set_slackness(1.5);
    }
}
