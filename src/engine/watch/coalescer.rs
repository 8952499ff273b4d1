use std::path::PathBuf;

use rustc_hash::FxHashSet;

/// Set of paths handed to one rebuild round.
pub type Batch = FxHashSet<PathBuf>;

/// Accumulates changed paths and releases them one round at a time.
///
/// - nothing in flight: the next `take_ready` hands over everything pending
/// - round in flight: new paths accumulate into a fresh set
/// - `finish` marks the round done; whatever accumulated meanwhile becomes
///   the next batch
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: Batch,
    in_flight: bool,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge paths into the pending set. Returns true if anything was added.
    pub fn add<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) -> bool {
        let before = self.pending.len();
        self.pending.extend(paths);
        self.pending.len() > before
    }

    /// Hand over the pending set if no round is in flight.
    pub fn take_ready(&mut self) -> Option<Batch> {
        if self.in_flight || self.pending.is_empty() {
            return None;
        }
        self.in_flight = true;
        Some(std::mem::take(&mut self.pending))
    }

    /// The in-flight round completed.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/site/{n}"))).collect()
    }

    #[test]
    fn test_idle_dispatches_immediately() {
        let mut coalescer = Coalescer::new();
        assert!(coalescer.add(paths(&["a.md"])));

        let batch = coalescer.take_ready().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(coalescer.is_in_flight());
        assert_eq!(coalescer.pending_len(), 0);
    }

    #[test]
    fn test_burst_during_round_collapses_into_one_batch() {
        let mut coalescer = Coalescer::new();
        coalescer.add(paths(&["a.md"]));
        coalescer.take_ready().unwrap();

        for name in ["b.md", "c.md", "b.md", "d.md", "c.md"] {
            coalescer.add(paths(&[name]));
            assert!(coalescer.take_ready().is_none(), "never overlap rounds");
        }

        coalescer.finish();
        let batch = coalescer.take_ready().unwrap();
        let expected: Batch = paths(&["b.md", "c.md", "d.md"]).into_iter().collect();
        assert_eq!(batch, expected);

        coalescer.finish();
        assert!(coalescer.take_ready().is_none());
        assert!(!coalescer.is_in_flight());
    }

    #[test]
    fn test_duplicate_paths_not_counted_as_added() {
        let mut coalescer = Coalescer::new();
        assert!(coalescer.add(paths(&["a.md"])));
        assert!(!coalescer.add(paths(&["a.md"])));
        assert!(!coalescer.add(Vec::new()));
    }
}
