//! # 快门时序
//!
//! 快门由开 / 关两个命令通道和两个低电平有效的状态通道组成：
//! 开状态读 0 表示已打开，关状态读 0 表示已关闭。
//!
//! ## 依赖关系
//! - 被 `hardware/mod.rs` 导出
//! - 使用 `hardware/poll.rs`

use super::poll::{wait_until, PollConfig};
use super::{AbortHandle, Readable, Settable};
use crate::error::Result;

/// 快门
pub struct FastShutter {
    name: String,
    open_cmd: Box<dyn Settable>,
    close_cmd: Box<dyn Settable>,
    open_status: Box<dyn Readable>,
    close_status: Box<dyn Readable>,
    poll: PollConfig,
    abort: Option<AbortHandle>,
}

fn is_active(channel: &dyn Readable) -> Result<bool> {
    Ok(channel.read()? == 0.0)
}

impl FastShutter {
    pub fn new(
        name: impl Into<String>,
        open_cmd: Box<dyn Settable>,
        open_status: Box<dyn Readable>,
        close_cmd: Box<dyn Settable>,
        close_status: Box<dyn Readable>,
        poll: PollConfig,
    ) -> Self {
        Self {
            name: name.into(),
            open_cmd,
            close_cmd,
            open_status,
            close_status,
            poll,
            abort: None,
        }
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 开状态为 0 且关状态为 1
    pub fn is_open(&self) -> Result<bool> {
        Ok(is_active(self.open_status.as_ref())? && self.close_status.read()? == 1.0)
    }

    pub fn open(&self) -> Result<()> {
        if self.is_open()? {
            tracing::debug!(shutter = %self.name, "already open");
            return Ok(());
        }
        self.open_cmd.set(1.0)?;
        let waited = wait_until(&self.name, "open", &self.poll, self.abort.as_ref(), || {
            is_active(self.open_status.as_ref())
        })?;
        tracing::info!(shutter = %self.name, ?waited, "shutter open");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        if is_active(self.close_status.as_ref())? {
            tracing::debug!(shutter = %self.name, "already closed");
            return Ok(());
        }
        self.close_cmd.set(1.0)?;
        let waited = wait_until(&self.name, "close", &self.poll, self.abort.as_ref(), || {
            is_active(self.close_status.as_ref())
        })?;
        tracing::info!(shutter = %self.name, ?waited, "shutter closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcalError;
    use crate::hardware::sim::SimChannel;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 写 1 后把两个状态通道切换到目标位置
    struct Actuator {
        name: String,
        open_status: SimChannel<f64>,
        close_status: SimChannel<f64>,
        opens: bool,
        writes: Arc<Mutex<u32>>,
    }

    impl Readable for Actuator {
        fn name(&self) -> &str {
            &self.name
        }

        fn read(&self) -> Result<f64> {
            Ok(0.0)
        }
    }

    impl Settable for Actuator {
        fn set(&self, _value: f64) -> Result<()> {
            *self.writes.lock().unwrap() += 1;
            let (open, close) = if self.opens { (0.0, 1.0) } else { (1.0, 0.0) };
            self.open_status.set(open)?;
            self.close_status.set(close)
        }
    }

    fn poll() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(20))
    }

    fn shutter(writes: &Arc<Mutex<u32>>) -> FastShutter {
        // 初始关闭
        let open_status = SimChannel::new("open_sts", 1.0);
        let close_status = SimChannel::new("close_sts", 0.0);
        let actuator = |name: &str, opens| Actuator {
            name: name.to_string(),
            open_status: open_status.linked("open_sts"),
            close_status: close_status.linked("close_sts"),
            opens,
            writes: Arc::clone(writes),
        };
        FastShutter::new(
            "sh1",
            Box::new(actuator("open_cmd", true)),
            Box::new(open_status.linked("open_sts")),
            Box::new(actuator("close_cmd", false)),
            Box::new(close_status.linked("close_sts")),
            poll(),
        )
    }

    #[test]
    fn test_open_then_close() {
        let writes = Arc::new(Mutex::new(0));
        let sh = shutter(&writes);
        assert!(!sh.is_open().unwrap());

        sh.open().unwrap();
        assert!(sh.is_open().unwrap());
        // 已打开时不再写命令
        sh.open().unwrap();
        assert_eq!(*writes.lock().unwrap(), 1);

        sh.close().unwrap();
        assert!(!sh.is_open().unwrap());
        assert_eq!(*writes.lock().unwrap(), 2);
    }

    #[test]
    fn test_unresponsive_shutter_times_out() {
        let sh = FastShutter::new(
            "sh1",
            Box::new(SimChannel::new("open_cmd", 0.0)),
            Box::new(SimChannel::new("open_sts", 1.0)),
            Box::new(SimChannel::new("close_cmd", 0.0)),
            Box::new(SimChannel::new("close_sts", 0.0)),
            poll(),
        );
        let err = sh.open().unwrap_err();
        assert!(matches!(err, EcalError::Timeout { ref operation, .. } if operation == "open"));
    }
}
