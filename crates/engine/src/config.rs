//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a working engine:
//!
//! ```toml
//! [executor]
//! timeout_secs = 300
//! memory_limit_mb = 512
//! approval_risk_threshold = "HIGH"
//!
//! [approval]
//! poll_interval_secs = 5
//! timeout_secs = 86400
//! resume_running = true
//!
//! [breaker]
//! failure_threshold = 5
//! reset_timeout_secs = 60
//! monitoring_window_secs = 120
//! half_open_successes = 3
//!
//! [trigger]
//! subjects = ["workflow.trigger.>", "graph.>", "health.>"]
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use db::models::RiskLevel;
use sandbox::BreakerConfig;

use crate::{ApprovalConfig, ExecutorConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub executor: ExecutorSection,
    pub approval: ApprovalSection,
    pub breaker: BreakerSection,
    pub trigger: TriggerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub timeout_secs: u64,
    pub memory_limit_mb: u64,
    pub approval_risk_threshold: Option<RiskLevel>,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            memory_limit_mb: 512,
            approval_risk_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub resume_running: bool,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            timeout_secs: 24 * 60 * 60,
            resume_running: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub monitoring_window_secs: u64,
    pub half_open_successes: u32,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
            monitoring_window_secs: 120,
            half_open_successes: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSection {
    /// Coarse subscriptions the matcher listens on; per-workflow patterns
    /// are matched against events arriving here.
    pub subjects: Vec<String>,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            subjects: vec![
                "workflow.trigger.>".into(),
                "graph.>".into(),
                "health.>".into(),
            ],
        }
    }
}

impl EngineConfig {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            execution_timeout: Duration::from_secs(self.executor.timeout_secs),
            memory_limit_mb: self.executor.memory_limit_mb,
            approval_risk_threshold: self.executor.approval_risk_threshold,
        }
    }

    pub fn approval_config(&self) -> ApprovalConfig {
        ApprovalConfig {
            poll_interval: Duration::from_secs(self.approval.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(self.approval.timeout_secs),
            resume_running: self.approval.resume_running,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker.failure_threshold.max(1),
            reset_timeout: Duration::from_secs(self.breaker.reset_timeout_secs),
            monitoring_window: Duration::from_secs(self.breaker.monitoring_window_secs),
            half_open_successes: self.breaker.half_open_successes.max(1),
        }
    }
}
