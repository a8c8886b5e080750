//! Chained dirty flags.
//!
//! A module keeps one flag per parameter so its update step can tell whether
//! derived state (filter coefficients, gain tables, ...) has to be recomputed.
//! Flags can observe other flags: setting a flag also sets every flag that
//! registered itself as its observer, so a "coefficients" flag can watch both
//! a cutoff and a resonance parameter.
//!
//! The observer graph is built once with [`NotificationFlagsBuilder`] and then
//! frozen into [`NotificationFlags`]. Building rejects cycles and flattens
//! each flag's transitive observers into a single list, so [`NotificationFlags::set`]
//! is a plain loop with no recursion and no allocation.
//!
//! # Example
//!
//! ```rust
//! use fxrig_core::NotificationFlagsBuilder;
//!
//! let mut builder = NotificationFlagsBuilder::new();
//! let cutoff = builder.add_flag();
//! let reso = builder.add_flag();
//! let coefs = builder.add_flag();
//! builder.add_observer(cutoff, coefs).unwrap();
//! builder.add_observer(reso, coefs).unwrap();
//!
//! let mut flags = builder.build();
//! flags.set(cutoff);
//! assert!(flags.take(coefs));
//! assert!(!flags.take(coefs));
//! assert!(!flags.get(reso));
//! ```

/// Handle to one flag inside a [`NotificationFlags`] set.
///
/// Handles are only meaningful for the builder that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagId(usize);

impl FlagId {
    /// Position of the flag inside its set.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Errors raised while wiring the observer graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlagError {
    /// The handle does not belong to this builder.
    #[error("notification flag {0} does not exist")]
    UnknownFlag(usize),

    /// The registration would make a flag (indirectly) observe itself.
    #[error("observing flag {subject} from flag {observer} would create a cycle")]
    Cycle {
        /// Flag being observed.
        subject: usize,
        /// Flag that wanted to observe it.
        observer: usize,
    },
}

/// Mutable observer graph, used at module construction time.
#[derive(Debug, Clone, Default)]
pub struct NotificationFlagsBuilder {
    observers: Vec<Vec<usize>>,
}

impl NotificationFlagsBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flags declared so far.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` when no flag has been declared.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Declares a new flag, initially clear.
    pub fn add_flag(&mut self) -> FlagId {
        self.observers.push(Vec::new());
        FlagId(self.observers.len() - 1)
    }

    /// Registers `observer` so it gets set whenever `subject` is set.
    ///
    /// Registering the same pair twice is a no-op.
    pub fn add_observer(&mut self, subject: FlagId, observer: FlagId) -> Result<(), FlagError> {
        self.check(subject)?;
        self.check(observer)?;
        if subject == observer || self.reaches(observer.0, subject.0) {
            return Err(FlagError::Cycle {
                subject: subject.0,
                observer: observer.0,
            });
        }
        let list = &mut self.observers[subject.0];
        if !list.contains(&observer.0) {
            list.push(observer.0);
        }
        Ok(())
    }

    /// Freezes the graph.
    pub fn build(self) -> NotificationFlags {
        let nbr_flags = self.observers.len();
        let mut offsets = Vec::with_capacity(nbr_flags + 1);
        let mut targets = Vec::new();
        let mut visited = vec![false; nbr_flags];
        let mut stack = Vec::new();

        offsets.push(0);
        for root in 0..nbr_flags {
            visited.fill(false);
            let start = targets.len();
            stack.clear();
            stack.extend_from_slice(&self.observers[root]);
            while let Some(flag) = stack.pop() {
                if !visited[flag] {
                    visited[flag] = true;
                    targets.push(flag);
                    stack.extend_from_slice(&self.observers[flag]);
                }
            }
            targets[start..].sort_unstable();
            offsets.push(targets.len());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            flags = nbr_flags,
            links = targets.len(),
            "notification flags built"
        );

        NotificationFlags {
            state: vec![false; nbr_flags],
            offsets,
            targets,
        }
    }

    fn check(&self, id: FlagId) -> Result<(), FlagError> {
        if id.0 < self.observers.len() {
            Ok(())
        } else {
            Err(FlagError::UnknownFlag(id.0))
        }
    }

    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut visited = vec![false; self.observers.len()];
        let mut stack = vec![from];
        while let Some(flag) = stack.pop() {
            if flag == to {
                return true;
            }
            if !visited[flag] {
                visited[flag] = true;
                stack.extend_from_slice(&self.observers[flag]);
            }
        }
        false
    }
}

/// Frozen set of chained dirty flags.
///
/// Every operation is O(number of dependents) and allocation-free, so the
/// set can live on the audio thread.
#[derive(Debug, Clone)]
pub struct NotificationFlags {
    state: Vec<bool>,
    // Flattened transitive observers of flag `i`: targets[offsets[i]..offsets[i + 1]]
    offsets: Vec<usize>,
    targets: Vec<usize>,
}

impl NotificationFlags {
    /// Number of flags in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Returns `true` if the set holds no flag.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Sets a flag and every flag observing it, directly or not.
    #[inline]
    pub fn set(&mut self, id: FlagId) {
        self.state[id.0] = true;
        for &dep in &self.targets[self.offsets[id.0]..self.offsets[id.0 + 1]] {
            self.state[dep] = true;
        }
    }

    /// Reads a flag without clearing it.
    #[inline]
    pub fn get(&self, id: FlagId) -> bool {
        self.state[id.0]
    }

    /// Reads a flag and clears it.
    #[inline]
    pub fn take(&mut self, id: FlagId) -> bool {
        core::mem::replace(&mut self.state[id.0], false)
    }

    /// Clears a single flag. Observers are left untouched.
    #[inline]
    pub fn reset(&mut self, id: FlagId) {
        self.state[id.0] = false;
    }

    /// Sets every flag, e.g. to force a full recomputation after a reset.
    pub fn set_all(&mut self) {
        self.state.fill(true);
    }

    /// Clears every flag.
    pub fn clear_all(&mut self) {
        self.state.fill(false);
    }

    /// Flattened list of flags set together with `id`.
    pub fn dependents(&self, id: FlagId) -> impl Iterator<Item = FlagId> + '_ {
        self.targets[self.offsets[id.0]..self.offsets[id.0 + 1]]
            .iter()
            .map(|&i| FlagId(i))
    }
}
