use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens when a job is submitted while the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Suspend the submitting task until a slot frees up.
    #[default]
    Wait,
    /// Fail immediately with [`crate::PoolError::QueueFull`].
    Reject,
}

/// Configuration for the [`crate::WorkerPool`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Label used for worker names in logs.
    pub name: String,
    /// Number of workers. Also the number of calls that can run at once.
    pub worker_count: usize,
    /// Jobs that may wait for a free worker before overflow applies.
    pub queue_capacity: usize,
    /// Behaviour when the queue is full.
    pub overflow: OverflowPolicy,
    /// Upper bound on the time a single call may take, queueing included.
    /// `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "prov-worker".into(),
            worker_count: default_worker_count(),
            queue_capacity: 256,
            overflow: OverflowPolicy::Wait,
            task_timeout: None,
        }
    }
}

impl PoolConfig {
    /// A pool of exactly `workers` workers with otherwise default settings.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            worker_count: workers,
            ..Default::default()
        }
    }

    /// Check the configuration for values the pool cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be at least 1".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1".into());
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err("task_timeout must be non-zero".into());
        }
        Ok(())
    }
}

/// Available hardware parallelism, or 4 when it cannot be determined.
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = PoolConfig::default();
        assert!(c.worker_count >= 1);
        assert_eq!(c.queue_capacity, 256);
        assert_eq!(c.overflow, OverflowPolicy::Wait);
        assert!(c.task_timeout.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_workers_invalid() {
        assert!(PoolConfig::with_workers(0).validate().is_err());
    }

    #[test]
    fn zero_queue_invalid() {
        let c = PoolConfig {
            queue_capacity: 0,
            ..PoolConfig::with_workers(2)
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: PoolConfig = toml::from_str("worker_count = 3\noverflow = \"reject\"").unwrap();
        assert_eq!(c.worker_count, 3);
        assert_eq!(c.overflow, OverflowPolicy::Reject);
        assert_eq!(c.queue_capacity, 256);
    }
}
