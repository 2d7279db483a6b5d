use crate::{math, Line, SiUnit};

// ======================================================================
// Spectra - PUBLIC

/// Ordered collection of point spectra: curves measured at lateral
/// `(x, y)` positions, with a shared lateral unit and a title.
#[derive(Clone, Debug, Default)]
pub struct Spectra {
    title: String,
    si_unit_xy: SiUnit,
    spectra: Vec<(f64, f64, Line)>,
}

impl Spectra {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection with a title.
    pub fn with_title(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            ..Self::default()
        }
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the title.
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_owned();
    }

    /// Returns the lateral unit of the measurement positions.
    pub fn si_unit_xy(&self) -> &SiUnit {
        &self.si_unit_xy
    }

    /// Sets the lateral unit of the measurement positions.
    pub fn set_si_unit_xy(&mut self, unit: SiUnit) {
        self.si_unit_xy = unit;
    }

    /// Appends a spectrum measured at `(x, y)` and returns its index.
    pub fn add(&mut self, x: f64, y: f64, line: Line) -> usize {
        self.spectra.push((x, y, line));
        self.spectra.len() - 1
    }

    /// Returns the number of spectra.
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Returns `true` when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Returns the spectrum at `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn get(&self, i: usize) -> &Line {
        &self.spectra[i].2
    }

    /// Returns the measurement position of spectrum `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn position(&self, i: usize) -> (f64, f64) {
        (self.spectra[i].0, self.spectra[i].1)
    }

    /// Removes the spectrum at `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn remove(&mut self, i: usize) -> Line {
        self.spectra.remove(i).2
    }

    /// Returns the index of the spectrum measured nearest to `(x, y)`,
    /// or `None` when the collection is empty.
    pub fn nearest(&self, x: f64, y: f64) -> Option<usize> {
        let coords: Vec<f64> = self
            .spectra
            .iter()
            .flat_map(|&(px, py, _)| [px, py])
            .collect();
        math::find_nearest_point(x, y, &coords).map(|(i, _)| i)
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove() {
        let mut spectra = Spectra::with_title("force curves");
        spectra.add(1.0, 2.0, Line::new(8, 1.0));
        spectra.add(3.0, 4.0, Line::new(16, 1.0));

        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra.title(), "force curves");
        assert_eq!(spectra.get(1).res(), 16);
        assert_eq!(spectra.position(0), (1.0, 2.0));

        let removed = spectra.remove(0);
        assert_eq!(removed.res(), 8);
        assert_eq!(spectra.len(), 1);
        assert_eq!(spectra.position(0), (3.0, 4.0));
    }

    #[test]
    fn nearest_position() {
        let mut spectra = Spectra::new();
        spectra.add(0.0, 0.0, Line::new(4, 1.0));
        spectra.add(10.0, 10.0, Line::new(4, 1.0));
        spectra.add(2.0, 2.0, Line::new(4, 1.0));

        assert_eq!(spectra.nearest(2.5, 2.5), Some(2));
        assert_eq!(spectra.nearest(100.0, 100.0), Some(1));
        assert_eq!(Spectra::new().nearest(0.0, 0.0), None);
    }
}
