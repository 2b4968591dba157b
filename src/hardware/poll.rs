//! # 有界轮询
//!
//! `while status != done: sleep(interval)` 的有界版本：
//! 超过 `timeout` 返回 `Timeout`，取消标志置位时返回 `Aborted`。
//!
//! ## 依赖关系
//! - 被 `hardware/scan.rs`, `hardware/shutter.rs`, `hardware/robot.rs` 使用

use super::AbortHandle;
use crate::error::{EcalError, Result};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// 轮询参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// 轮询间隔（毫秒）
    pub interval_ms: u64,
    /// 超时（毫秒）
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval_ms: 10,
            timeout_ms: 30_000,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        PollConfig {
            interval_ms: interval.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 轮询直到条件成立，返回等待时长
pub fn wait_until<F>(
    device: &str,
    operation: &str,
    config: &PollConfig,
    abort: Option<&AbortHandle>,
    mut condition: F,
) -> Result<Duration>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();
    let timeout = config.timeout();
    let mut polls: u64 = 0;

    loop {
        if let Some(handle) = abort {
            handle.check(&format!("{} while waiting to {}", device, operation))?;
        }
        if condition()? {
            tracing::debug!(device, operation, polls, "condition reached");
            return Ok(start.elapsed());
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            tracing::warn!(device, operation, ?elapsed, "poll timed out");
            return Err(EcalError::Timeout {
                device: device.to_string(),
                operation: operation.to_string(),
                waited: elapsed,
            });
        }

        polls += 1;
        std::thread::sleep(config.interval().min(timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[test]
    fn test_condition_reached_after_polls() {
        let mut calls = 0;
        let waited = wait_until("motor", "settle", &fast(), None, || {
            calls += 1;
            Ok(calls >= 3)
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert!(waited < Duration::from_millis(50));
    }

    #[test]
    fn test_timeout_is_bounded() {
        let start = Instant::now();
        let err = wait_until("shutter", "open", &fast(), None, || Ok(false)).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            EcalError::Timeout {
                device, operation, ..
            } => {
                assert_eq!(device, "shutter");
                assert_eq!(operation, "open");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_abort_interrupts_wait() {
        let handle = AbortHandle::new();
        let inner = handle.clone();
        let mut calls = 0;
        let err = wait_until("robot", "load", &fast(), Some(&handle), || {
            calls += 1;
            if calls == 2 {
                inner.abort();
            }
            Ok(false)
        })
        .unwrap_err();
        assert!(matches!(err, EcalError::Aborted(_)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_condition_error_propagates() {
        let err = wait_until("motor", "settle", &fast(), None, || {
            Err(EcalError::Device {
                device: "motor".to_string(),
                reason: "disconnected".to_string(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, EcalError::Device { .. }));
    }
}
