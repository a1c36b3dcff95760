//! Metavariables and their solutions.

/// A metavariable.
pub type Meta = usize;

/// A metavariable solution.
#[derive(Clone, Debug)]
pub enum Solution<T> {
    Unsolved,
    Solved(T),
}

impl<T> Solution<T> {
    pub fn is_unsolved(&self) -> bool {
        matches!(self, Solution::Unsolved)
    }
}

struct Entry<T> {
    solution: Solution<T>,
    /// The let-level at which the metavariable was created. Levels decide
    /// which variables a scheme may quantify: only those above the level
    /// of the binding being generalized.
    level: usize,
}

/// A mapping from metavariables to their solutions and levels.
///
/// # Preconditions
///
/// [`Meta`] arguments must be valid: `self.contains(meta)`.
/// Applies to [`Solutions::get`], [`Solutions::set`], [`Solutions::level`].
pub struct Solutions<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Solutions<T> {
    pub fn new() -> Self {
        Solutions {
            entries: Vec::new(),
        }
    }

    pub fn contains(&self, meta: Meta) -> bool {
        meta < self.entries.len()
    }

    pub fn get(&self, meta: Meta) -> &Solution<T> {
        &self
            .entries
            .get(meta)
            .unwrap_or_else(|| panic!("meta {:?} not found", meta))
            .solution
    }

    pub fn level(&self, meta: Meta) -> usize {
        self.entries
            .get(meta)
            .unwrap_or_else(|| panic!("meta {:?} not found", meta))
            .level
    }

    /// Lower a metavariable's level. Raising is never sound, so a larger
    /// value is ignored.
    pub fn demote(&mut self, meta: Meta, level: usize) {
        let entry = self
            .entries
            .get_mut(meta)
            .unwrap_or_else(|| panic!("meta {:?} not found", meta));
        if level < entry.level {
            entry.level = level;
        }
    }

    /// Set a metavariable's solution. Each metavariable can only be set
    /// once.
    ///
    /// # Preconditions
    ///
    /// * `self.get(meta).is_unsolved()`
    pub fn set(&mut self, meta: Meta, value: &T)
    where
        T: Clone,
    {
        let entry = self
            .entries
            .get_mut(meta)
            .unwrap_or_else(|| panic!("meta {:?} not found", meta));
        if entry.solution.is_unsolved() {
            entry.solution = Solution::Solved(value.clone());
        } else {
            panic!("meta {:?} has already been set", meta);
        }
    }

    /// Generate a new, unsolved metavariable at the given level.
    pub fn fresh_meta(&mut self, level: usize) -> Meta {
        let meta = self.entries.len();
        self.entries.push(Entry {
            solution: Solution::Unsolved,
            level,
        });
        meta
    }
}

impl<T> Default for Solutions<T> {
    fn default() -> Self {
        Self::new()
    }
}
