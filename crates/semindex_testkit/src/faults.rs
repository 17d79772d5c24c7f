//! Fault injecting indexing sources.
//!
//! Both wrappers delegate to an inner source and keep its name, so they can
//! be registered with a manager in place of the real thing.

use parking_lot::{Condvar, Mutex};
use semindex_core::{ChangeSet, Entity, Epoch, IndexingSource, Revision, SourceError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source that fails selected reads.
pub struct FailingSource {
    inner: Arc<dyn IndexingSource>,
    /// Remaining successful `get` calls before the armed failure; 0 = disarmed.
    fail_in: AtomicUsize,
    gets: AtomicUsize,
    unavailable: AtomicBool,
}

impl FailingSource {
    /// Wraps `inner` with no faults armed.
    pub fn new(inner: Arc<dyn IndexingSource>) -> Self {
        Self {
            inner,
            fail_in: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes the `n`-th `get` from now fail once; `n` starts at 1.
    pub fn fail_nth_get(&self, n: usize) {
        self.fail_in.store(n, Ordering::SeqCst);
    }

    /// Makes `epoch` and `changes` fail until turned off again.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get` calls seen, failed ones included.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("injected outage".into()));
        }
        Ok(())
    }
}

impl IndexingSource for FailingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn epoch(&self) -> Result<Epoch, SourceError> {
        self.check_available()?;
        self.inner.epoch()
    }

    fn changes(
        &self,
        epoch: Epoch,
        from: Option<Revision>,
        batch_size: u32,
    ) -> Result<ChangeSet, SourceError> {
        self.check_available()?;
        self.inner.changes(epoch, from, batch_size)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>, SourceError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let armed = self
            .fail_in
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if armed == 1 {
            return Err(SourceError::Entity {
                id: id.to_string(),
                message: "injected read failure".into(),
            });
        }
        self.inner.get(id)
    }
}

#[derive(Default)]
struct Gate {
    closed: bool,
    waiting: usize,
}

/// A source whose `changes` calls block while the gate is closed.
pub struct GatedSource {
    inner: Arc<dyn IndexingSource>,
    gate: Mutex<Gate>,
    changed: Condvar,
}

impl GatedSource {
    /// Wraps `inner` with the gate open.
    pub fn new(inner: Arc<dyn IndexingSource>) -> Self {
        Self {
            inner,
            gate: Mutex::new(Gate::default()),
            changed: Condvar::new(),
        }
    }

    /// Blocks subsequent `changes` calls.
    pub fn close(&self) {
        self.gate.lock().closed = true;
    }

    /// Releases every blocked caller.
    pub fn open(&self) {
        self.gate.lock().closed = false;
        self.changed.notify_all();
    }

    /// Waits until at least one caller is blocked at the gate.
    pub fn wait_blocked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.gate.lock();
        while gate.waiting == 0 {
            if self.changed.wait_until(&mut gate, deadline).timed_out() {
                return gate.waiting > 0;
            }
        }
        true
    }
}

impl IndexingSource for GatedSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn epoch(&self) -> Result<Epoch, SourceError> {
        self.inner.epoch()
    }

    fn changes(
        &self,
        epoch: Epoch,
        from: Option<Revision>,
        batch_size: u32,
    ) -> Result<ChangeSet, SourceError> {
        {
            let mut gate = self.gate.lock();
            if gate.closed {
                gate.waiting += 1;
                self.changed.notify_all();
                while gate.closed {
                    self.changed.wait(&mut gate);
                }
                gate.waiting -= 1;
            }
        }
        self.inner.changes(epoch, from, batch_size)
    }

    fn get(&self, id: &str) -> Result<Option<Entity>, SourceError> {
        self.inner.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::article;
    use semindex_core::MemorySource;
    use std::thread;

    #[test]
    fn fails_only_the_armed_get() {
        let inner = Arc::new(MemorySource::new("default"));
        inner.put(article("urn:a", "a"));
        let source = FailingSource::new(inner);

        source.fail_nth_get(2);
        assert!(source.get("urn:a").is_ok());
        assert!(matches!(
            source.get("urn:a"),
            Err(SourceError::Entity { .. })
        ));
        assert!(source.get("urn:a").is_ok());
        assert_eq!(source.gets(), 3);
    }

    #[test]
    fn outage_fails_changes() {
        let source = FailingSource::new(Arc::new(MemorySource::new("default")));
        source.set_unavailable(true);
        assert!(matches!(source.epoch(), Err(SourceError::Unavailable(_))));
        source.set_unavailable(false);
        let epoch = source.epoch().unwrap();
        assert!(source.changes(epoch, None, 10).unwrap().is_empty());
    }

    #[test]
    fn gate_blocks_until_opened() {
        let inner = Arc::new(MemorySource::new("default"));
        inner.put(article("urn:a", "a"));
        let source = Arc::new(GatedSource::new(inner));
        source.close();

        let reader = {
            let source = source.clone();
            thread::spawn(move || source.changes(Epoch(1), None, 10).unwrap().len())
        };
        assert!(source.wait_blocked(Duration::from_secs(5)));
        source.open();
        assert_eq!(reader.join().unwrap(), 1);
        assert!(!source.wait_blocked(Duration::from_millis(10)));
    }
}
