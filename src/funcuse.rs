//! Recently-used-function ranking with exponential decay.
//!
//! Every use of a function bumps its score on two time scales: a fast
//! local one (half-life of 8 uses) and a slow global one (half-life of
//! 240 uses).  Entries are kept sorted descending by the combined score,
//! so the head of the list is the short list of "recent" functions.
//!
//! Only the global score is persisted; see [`FuncUse::load`] and
//! [`FuncUse::save`].  A lazily loaded process-wide instance is
//! available through [`with_process`] and [`save_process`].

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use once_cell::sync::Lazy;

use crate::Error;

// ======================================================================
// CONST - PRIVATE

const DELTA_LOCAL: f64 = std::f64::consts::LN_2 / 8.0;
const DELTA_GLOBAL: f64 = std::f64::consts::LN_2 / 240.0;

// ======================================================================
// Entry - PRIVATE

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    global: f64,
    local: f64,
}

impl Entry {
    fn weight(&self) -> f64 {
        self.global + self.local
    }
}

// ======================================================================
// FuncUse - PUBLIC

/// Exponentially decayed use counts of named functions.
#[derive(Debug)]
pub struct FuncUse {
    delta_local: f64,
    delta_global: f64,
    entries: Vec<Entry>,
}

impl FuncUse {
    /// Creates an empty store with the standard decay constants
    /// (ln 2 / 8 locally, ln 2 / 240 globally).
    pub fn new() -> Self {
        Self::with_decay(DELTA_LOCAL, DELTA_GLOBAL)
    }

    /// Creates an empty store with explicit decay constants.
    ///
    /// # Panics
    ///
    /// If the decays are not positive or the global decay is not
    /// strictly smaller than the local one.
    pub fn with_decay(delta_local: f64, delta_global: f64) -> Self {
        assert!(delta_global > 0.0 && delta_local > 0.0);
        assert!(
            delta_global < delta_local,
            "global decay must be slower than local decay"
        );
        Self {
            delta_local,
            delta_global,
            entries: Vec::new(),
        }
    }

    /// Records one use of function `name`.
    ///
    /// All scores decay one step; the named function additionally gains
    /// one use, is created if absent, and bubbles towards the head so
    /// the list stays sorted descending by combined score.
    pub fn add(&mut self, name: &str) {
        // Linear search, but the most used functions are near the head.
        let mut found = None;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.name == name {
                found = Some(i);
                entry.local += self.delta_local;
                entry.global += self.delta_global;
            }
            entry.local /= 1.0 + self.delta_local;
            entry.global /= 1.0 + self.delta_global;
        }

        let found = match found {
            Some(found) => found,
            None => {
                self.entries.push(Entry {
                    name: name.to_owned(),
                    local: self.delta_local / (1.0 + self.delta_local),
                    global: self.delta_global / (1.0 + self.delta_global),
                });
                self.entries.len() - 1
            }
        };

        self.sort_up(found);
    }

    /// Returns the name at rank `i` (0 is the most used), or `None`
    /// beyond the end of the list.
    pub fn get(&self, i: usize) -> Option<&str> {
        self.entries.get(i).map(|entry| entry.name.as_str())
    }

    /// Returns the first `k` names in rank order.
    pub fn head(&self, k: usize) -> Vec<&str> {
        self.entries
            .iter()
            .take(k)
            .map(|entry| entry.name.as_str())
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the combined score at rank `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of range.
    pub fn weight(&self, i: usize) -> f64 {
        self.entries[i].weight()
    }

    /// Loads a store from a file.
    ///
    /// Each line is `"<name> <global>"`.  Lines without a space, with an
    /// unparseable number (logged and skipped), or with a zero global
    /// score are ignored.  A missing or unreadable file yields an empty
    /// store.
    pub fn load(path: &Path) -> FuncUse {
        let mut store = FuncUse::new();
        let buffer = match fs::read_to_string(path) {
            Ok(buffer) => buffer,
            Err(err) => {
                log::debug!("not loading function use from {}: {}", path.display(), err);
                return store;
            }
        };

        for line in buffer.lines() {
            let line = line.trim();
            let (name, value) = match line.split_once(' ') {
                Some(split) => split,
                None => continue,
            };
            let global: f64 = match value.trim().parse() {
                Ok(global) => global,
                Err(_) => {
                    log::warn!("skipping malformed function use line {:?}", line);
                    continue;
                }
            };
            if global == 0.0 {
                continue;
            }
            store.entries.push(Entry {
                name: name.to_owned(),
                global,
                local: 0.0,
            });
        }

        store
            .entries
            .sort_by(|a, b| b.weight().total_cmp(&a.weight()));
        store
    }

    /// Saves the store, one `"<name> <global>"` line per entry in the
    /// current order.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        for entry in self.entries.iter() {
            writeln!(file, "{} {}", entry.name, entry.global)?;
        }
        Ok(())
    }
}

impl Default for FuncUse {
    fn default() -> Self {
        Self::new()
    }
}

// ======================================================================
// FuncUse - PRIVATE

impl FuncUse {
    /// Moves the entry at `pos`, whose score has just increased, towards
    /// the head until the descending order is restored.
    fn sort_up(&mut self, mut pos: usize) {
        while pos > 0 {
            if self.entries[pos - 1].weight() >= self.entries[pos].weight() {
                break;
            }
            self.entries.swap(pos - 1, pos);
            pos -= 1;
        }
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC - process-wide instance

static PROCESS: Lazy<Mutex<FuncUse>> = Lazy::new(|| {
    let store = match filename("process") {
        Some(path) => FuncUse::load(&path),
        None => FuncUse::new(),
    };
    Mutex::new(store)
});

/// Returns the default location of the store for the given kind, or
/// `None` when no user directory exists.
///
/// # Panics
///
/// If `kind` is not an identifier (ASCII letters, digits and
/// underscores, not starting with a digit).
pub fn filename(kind: &str) -> Option<PathBuf> {
    assert!(is_identifier(kind), "store kind must be an identifier");
    let mut path = dirs::config_dir()?;
    path.push("scanprobe");
    path.push(format!("funcuse-{}", kind));
    Some(path)
}

/// Runs a closure on the lazily loaded process-wide store.
pub fn with_process<R>(f: impl FnOnce(&mut FuncUse) -> R) -> R {
    let mut store = PROCESS.lock().unwrap();
    f(&mut store)
}

/// Saves the process-wide store to its default location.
///
/// Does nothing when no user directory exists.
///
/// # Errors
///
/// [`Error::Io`] when the file cannot be written.
pub fn save_process() -> Result<(), Error> {
    match filename("process") {
        Some(path) => with_process(|store| store.save(&path)),
        None => Ok(()),
    }
}

// ======================================================================
// FUNCTIONS - PRIVATE

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // RANKING

    #[test]
    fn repeated_use_beats_single_use() {
        let mut store = FuncUse::new();
        store.add("f");
        for _ in 0..10 {
            store.add("g");
        }

        assert_eq!(store.get(0), Some("g"));
        assert_eq!(store.get(1), Some("f"));
        assert!(store.weight(0) > store.weight(1));
    }

    #[test]
    fn scores_stay_sorted_descending() {
        let mut store = FuncUse::new();
        let names = ["level", "fft", "crop", "fft", "level", "fft", "stats"];
        for name in names {
            store.add(name);
            for i in 1..store.len() {
                assert!(store.weight(i - 1) >= store.weight(i));
            }
        }
        assert_eq!(store.get(0), Some("fft"));
    }

    #[test]
    fn use_strictly_increases_own_score() {
        let mut store = FuncUse::new();
        store.add("f");
        store.add("g");
        let before = store.weight(store.head(2).iter().position(|&n| n == "f").unwrap());
        store.add("f");
        let after = store.weight(store.head(2).iter().position(|&n| n == "f").unwrap());
        assert!(after > before);
    }

    #[test]
    fn fresh_entry_has_single_step_scores() {
        let mut store = FuncUse::new();
        store.add("f");
        assert_near!(
            store.weight(0),
            DELTA_LOCAL / (1.0 + DELTA_LOCAL) + DELTA_GLOBAL / (1.0 + DELTA_GLOBAL),
            1e-15,
        );
    }

    #[test]
    #[should_panic]
    fn global_decay_must_be_slower() {
        let _ = FuncUse::with_decay(0.1, 0.1);
    }

    // ============================================================
    // PERSISTENCE

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funcuse-test");

        let mut store = FuncUse::new();
        for _ in 0..3 {
            store.add("often");
        }
        store.add("rarely");
        store.save(&path).unwrap();

        let loaded = FuncUse::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0), Some("often"));
        assert_eq!(loaded.get(1), Some("rarely"));
    }

    #[test]
    fn malformed_and_zero_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funcuse-test");
        fs::write(
            &path,
            "good 0.25\nnospace\nbad notanumber\nzeroed 0\nalso_good 0.5\n",
        )
        .unwrap();

        let loaded = FuncUse::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0), Some("also_good"));
        assert_eq!(loaded.get(1), Some("good"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = FuncUse::load(&dir.path().join("does-not-exist"));
        assert!(loaded.is_empty());
    }

    #[test]
    fn filename_requires_identifier() {
        if let Some(path) = filename("process") {
            assert!(path.to_string_lossy().ends_with("funcuse-process"));
        }
    }

    #[test]
    #[should_panic]
    fn filename_rejects_non_identifier() {
        let _ = filename("../etc");
    }
}
