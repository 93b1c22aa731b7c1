//! Workload controller that records calls instead of touching containers

use anyhow::{anyhow, Result};
use keeper::services::workload::WorkloadControl;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct FakeWorkload {
    calls: Mutex<Vec<String>>,
    fail_stop: bool,
    fail_start: bool,
}

impl FakeWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    /// A workload whose stop always fails, e.g. already stopped
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WorkloadControl for FakeWorkload {
    async fn stop(&self, container: &str) -> Result<()> {
        self.record(format!("stop {}", container));
        if self.fail_stop {
            return Err(anyhow!("container {} is not running", container));
        }
        Ok(())
    }

    async fn start(&self, container: &str) -> Result<()> {
        self.record(format!("start {}", container));
        if self.fail_start {
            return Err(anyhow!("container {} failed to start", container));
        }
        Ok(())
    }
}
