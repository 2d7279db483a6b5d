use crate::Orientation;

// ======================================================================
// SelectionShape - PUBLIC

/// Shape of the objects held by a [`Selection`].
///
/// Every shape fixes its per-object coordinate count: a point is (x, y),
/// a line (x0, y0, x1, y1), a rectangle and an ellipse two corners, a
/// path one (x, y) knot per object, a lattice two spanning vectors and
/// an axis a single position along its orientation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectionShape {
    /// Isolated (x, y) points.
    Point,
    /// Line segments (x0, y0, x1, y1).
    Line,
    /// Axis-aligned rectangles (x0, y0, x1, y1).
    Rectangle,
    /// Ellipses given by their bounding box (x0, y0, x1, y1).
    Ellipse,
    /// Knots of a single spline path; carries slackness and closure.
    Path,
    /// Two lattice vectors (xa, ya, xb, yb) relative to the origin.
    Lattice,
    /// Positions of axis-parallel lines.
    Axis,
}

impl SelectionShape {
    /// Returns the number of coordinates per object.
    pub fn object_size(self) -> usize {
        match self {
            SelectionShape::Point | SelectionShape::Path => 2,
            SelectionShape::Line
            | SelectionShape::Rectangle
            | SelectionShape::Ellipse
            | SelectionShape::Lattice => 4,
            SelectionShape::Axis => 1,
        }
    }
}

// ======================================================================
// Selection - PUBLIC

/// A set of selected shapes on a field, stored as a dense
/// `count × object_size` coordinate matrix with a capacity.
///
/// The number of stored objects never exceeds `max_objects`.
#[derive(Clone, Debug)]
pub struct Selection {
    shape: SelectionShape,
    max_objects: usize,
    data: Vec<f64>,
    orientation: Orientation,
    slackness: f64,
    closed: bool,
}

impl Selection {
    /// Creates an empty selection.
    ///
    /// # Panics
    ///
    /// If `max_objects` is zero.
    pub fn new(shape: SelectionShape, max_objects: usize) -> Self {
        assert!(max_objects > 0, "selection capacity must be positive");
        Self {
            shape,
            max_objects,
            data: Vec::new(),
            orientation: Orientation::Vertical,
            slackness: 1.0 / std::f64::consts::SQRT_2,
            closed: false,
        }
    }

    /// Creates an empty axis selection with the given line orientation.
    ///
    /// # Panics
    ///
    /// If `max_objects` is zero.
    pub fn new_axis(orientation: Orientation, max_objects: usize) -> Self {
        let mut selection = Self::new(SelectionShape::Axis, max_objects);
        selection.orientation = orientation;
        selection
    }

    /// Returns the shape.
    pub fn shape(&self) -> SelectionShape {
        self.shape
    }

    /// Returns the number of coordinates per object.
    pub fn object_size(&self) -> usize {
        self.shape.object_size()
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.data.len() / self.object_size()
    }

    /// Returns `true` when no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` when no more objects can be added.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_objects
    }

    /// Returns the capacity.
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Changes the capacity, discarding objects beyond it.
    ///
    /// # Panics
    ///
    /// If `max_objects` is zero.
    pub fn set_max_objects(&mut self, max_objects: usize) {
        assert!(max_objects > 0, "selection capacity must be positive");
        self.max_objects = max_objects;
        let size = self.object_size();
        if self.len() > max_objects {
            self.data.truncate(max_objects * size);
        }
    }

    /// Returns the orientation of an axis selection.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    // ============================================================
    // OBJECT ACCESS

    /// Copies object `i` into `out`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range or `out` is shorter than the object size.
    pub fn get(&self, i: usize, out: &mut [f64]) {
        let size = self.object_size();
        assert!(i < self.len(), "selection index out of range");
        out[..size].copy_from_slice(&self.data[i * size..(i + 1) * size]);
    }

    /// Returns object `i` as a slice.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn object(&self, i: usize) -> &[f64] {
        let size = self.object_size();
        assert!(i < self.len(), "selection index out of range");
        &self.data[i * size..(i + 1) * size]
    }

    /// Overwrites object `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range or `object` has the wrong length.
    pub fn set(&mut self, i: usize, object: &[f64]) {
        let size = self.object_size();
        assert!(i < self.len(), "selection index out of range");
        assert_eq!(object.len(), size);
        self.data[i * size..(i + 1) * size].copy_from_slice(object);
    }

    /// Appends an object, returning its index, or `None` when the
    /// selection is full.
    ///
    /// # Panics
    ///
    /// If `object` has the wrong length.
    pub fn add(&mut self, object: &[f64]) -> Option<usize> {
        assert_eq!(object.len(), self.object_size());
        if self.is_full() {
            return None;
        }
        self.data.extend_from_slice(object);
        Some(self.len() - 1)
    }

    /// Removes object `i`, shifting the following objects down.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn remove(&mut self, i: usize) {
        let size = self.object_size();
        assert!(i < self.len(), "selection index out of range");
        self.data.drain(i * size..(i + 1) * size);
    }

    /// Removes all objects.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    // ============================================================
    // BULK OPERATIONS

    /// Keeps only the objects for which the predicate returns `true`.
    pub fn filter<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[f64]) -> bool,
    {
        let size = self.object_size();
        let mut kept = Vec::with_capacity(self.data.len());
        for object in self.data.chunks_exact(size) {
            if keep(object) {
                kept.extend_from_slice(object);
            }
        }
        self.data = kept;
    }

    /// Removes every object not fully inside the given rectangle.
    ///
    /// Lattice vectors are origin-relative and therefore unaffected;
    /// axis positions are compared against the range of their own axis.
    pub fn crop(&mut self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) {
        match self.shape {
            SelectionShape::Lattice => {}
            SelectionShape::Axis => {
                let (min, max) = match self.orientation {
                    Orientation::Vertical => (xmin, xmax),
                    Orientation::Horizontal => (ymin, ymax),
                };
                self.filter(|object| object[0] >= min && object[0] <= max);
            }
            _ => {
                self.filter(|object| {
                    object.chunks_exact(2).all(|pt| {
                        pt[0] >= xmin && pt[0] <= xmax && pt[1] >= ymin && pt[1] <= ymax
                    })
                });
            }
        }
    }

    /// Translates all objects by `(vx, vy)`.
    ///
    /// Lattice vectors are origin-relative and therefore unaffected;
    /// axis positions move along their own axis only.
    pub fn move_by(&mut self, vx: f64, vy: f64) {
        match self.shape {
            SelectionShape::Lattice => {}
            SelectionShape::Axis => {
                let v = match self.orientation {
                    Orientation::Vertical => vx,
                    Orientation::Horizontal => vy,
                };
                for position in self.data.iter_mut() {
                    *position += v;
                }
            }
            _ => {
                for pt in self.data.chunks_exact_mut(2) {
                    pt[0] += vx;
                    pt[1] += vy;
                }
            }
        }
    }

    // ============================================================
    // PATH PROPERTIES

    /// Returns the slackness of a path selection.
    ///
    /// # Panics
    ///
    /// If the shape is not [`SelectionShape::Path`].
    pub fn slackness(&self) -> f64 {
        assert_eq!(self.shape, SelectionShape::Path);
        self.slackness
    }

    /// Sets the slackness of a path selection.
    ///
    /// # Panics
    ///
    /// If the shape is not [`SelectionShape::Path`] or `slackness` is
    /// not within `0.0 ..= 1.0`.
    pub fn set_slackness(&mut self, slackness: f64) {
        assert_eq!(self.shape, SelectionShape::Path);
        assert!(
            (0.0..=1.0).contains(&slackness),
            "slackness must be within [0, 1]"
        );
        self.slackness = slackness;
    }

    /// Returns whether a path selection is closed.
    ///
    /// # Panics
    ///
    /// If the shape is not [`SelectionShape::Path`].
    pub fn closed(&self) -> bool {
        assert_eq!(self.shape, SelectionShape::Path);
        self.closed
    }

    /// Sets whether a path selection is closed.
    ///
    /// # Panics
    ///
    /// If the shape is not [`SelectionShape::Path`].
    pub fn set_closed(&mut self, closed: bool) {
        assert_eq!(self.shape, SelectionShape::Path);
        self.closed = closed;
    }
}

// ======================================================================
// TESTS
