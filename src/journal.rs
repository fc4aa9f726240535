//! Append-only journal of local mutations.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

/// One journal record, naming every path a mutation touched.
///
/// Single-directory mutations carry one path; rename carries the source and
/// destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalDelta {
    /// Paths relative to the mount root.
    pub paths: Vec<PathBuf>,
}

impl JournalDelta {
    /// Build a delta over the given paths.
    #[must_use]
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

/// In-process append-only log of [`JournalDelta`] records.
///
/// Every successful mutating operation appends exactly one delta; failed
/// operations append nothing.
#[derive(Debug, Default)]
pub struct Journal {
    deltas: Mutex<Vec<JournalDelta>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta to the log.
    #[expect(
        clippy::unwrap_used,
        reason = "Mutex poisoning is unrecoverable; panicking is the correct behavior"
    )]
    pub fn append(&self, delta: JournalDelta) {
        let mut deltas = self.deltas.lock().unwrap();
        debug!(seq = deltas.len(), paths = ?delta.paths, "journal delta");
        deltas.push(delta);
    }

    /// Number of deltas recorded so far.
    #[expect(
        clippy::unwrap_used,
        reason = "Mutex poisoning is unrecoverable; panicking is the correct behavior"
    )]
    #[must_use]
    pub fn len(&self) -> usize {
        self.deltas.lock().unwrap().len()
    }

    /// Whether the journal has recorded anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every delta recorded so far, in append order.
    #[expect(
        clippy::unwrap_used,
        reason = "Mutex poisoning is unrecoverable; panicking is the correct behavior"
    )]
    #[must_use]
    pub fn deltas(&self) -> Vec<JournalDelta> {
        self.deltas.lock().unwrap().clone()
    }

    /// The most recently appended delta, if any.
    #[expect(
        clippy::unwrap_used,
        reason = "Mutex poisoning is unrecoverable; panicking is the correct behavior"
    )]
    #[must_use]
    pub fn latest(&self) -> Option<JournalDelta> {
        self.deltas.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_records_in_order() {
        let journal = Journal::new();
        assert!(journal.is_empty());

        journal.append(JournalDelta::new([PathBuf::from("a")]));
        journal.append(JournalDelta::new([PathBuf::from("b"), PathBuf::from("c")]));

        assert_eq!(journal.len(), 2);
        let deltas = journal.deltas();
        assert_eq!(deltas[0].paths, vec![PathBuf::from("a")]);
        assert_eq!(
            journal.latest().unwrap().paths,
            vec![PathBuf::from("b"), PathBuf::from("c")]
        );
    }
}
