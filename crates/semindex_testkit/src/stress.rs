//! Stress helpers for SemIndex.
//!
//! These run direct writes, source feeds and polls from several threads at
//! once against a single index.

use crate::fixtures::article;
use semindex_core::{MemorySource, SemanticIndex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct entities.
    pub entity_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            entity_count: 50,
        }
    }
}

fn entity_id(i: usize) -> String {
    format!("urn:stress:{i}")
}

/// Indexes and removes entities directly from several threads.
///
/// Every third operation of a thread is a removal.
pub fn concurrent_writes(index: &Arc<SemanticIndex>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let threads: Vec<_> = (0..config.threads)
        .map(|t| {
            let index = index.clone();
            let successful = successful.clone();
            let failed = failed.clone();
            let config = config.clone();
            thread::spawn(move || {
                for i in 0..config.operations {
                    let id = entity_id((t * config.operations + i) % config.entity_count);
                    let result = if i % 3 == 2 {
                        index.remove(&id)
                    } else {
                        index
                            .index(&article(&id, &format!("thread {t} op {i}")))
                            .map(|_| ())
                    };
                    match result {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in threads {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Feeds the source from writer threads while other threads poll.
///
/// Half the threads write, the rest call `poll_now` in a loop. A final poll
/// after the writers finish brings the index up to date.
pub fn concurrent_feed_and_poll(
    index: &Arc<SemanticIndex>,
    source: &Arc<MemorySource>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let writers = (config.threads / 2).max(1);

    let threads: Vec<_> = (0..config.threads.max(2))
        .map(|t| {
            let index = index.clone();
            let source = source.clone();
            let successful = successful.clone();
            let failed = failed.clone();
            let config = config.clone();
            thread::spawn(move || {
                for i in 0..config.operations {
                    if t < writers {
                        let id = entity_id((t * config.operations + i) % config.entity_count);
                        if i % 4 == 3 {
                            source.delete(&id);
                        } else {
                            source.put(article(&id, &format!("writer {t} op {i}")));
                        }
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        match index.poll_now() {
                            Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                            Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                }
            })
        })
        .collect();

    for handle in threads {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    match index.poll_now() {
        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
    };
    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_computes_throughput() {
        let result = StressTestResult::new(90, 10, Duration::from_secs(2));
        assert_eq!(result.total_ops, 100);
        assert!((result.ops_per_second - 50.0).abs() < f64::EPSILON);

        let instant = StressTestResult::new(1, 0, Duration::ZERO);
        assert_eq!(instant.ops_per_second, 0.0);
    }
}
