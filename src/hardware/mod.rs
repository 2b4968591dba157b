//! # 硬件抽象模块
//!
//! 控制系统通道的窄能力接口，以及基于这些接口的时序逻辑。
//! 校准核心只依赖 `ScanRunner` 返回的 `ScanTrace`，不直接接触设备对象。
//!
//! ## 子模块
//! - `poll`: 有界轮询（超时 + 取消）
//! - `scan`: 扫描适配器 `ScanRunner` 及其实现
//! - `shutter`: 快门开关时序
//! - `robot`: 换样机器人时序
//! - `sim`: 模拟电机 / 探测器 / 光束线
//!
//! ## 依赖关系
//! - 被 `calib/driver.rs`, `commands/calibrate.rs` 使用
//! - 使用 `error.rs`

pub mod poll;
pub mod robot;
pub mod scan;
pub mod shutter;
pub mod sim;

pub use poll::PollConfig;
pub use robot::SampleRobot;
pub use scan::{ReplayScanner, ScanRunner};
pub use shutter::FastShutter;
pub use sim::SimulationConfig;

use crate::error::{EcalError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 可读通道
pub trait Readable<T = f64> {
    /// 通道名称
    fn name(&self) -> &str;

    /// 读取当前值
    fn read(&self) -> Result<T>;
}

/// 可写通道
pub trait Settable<T = f64>: Readable<T> {
    /// 写入设定值（不等待完成）
    fn set(&self, value: T) -> Result<()>;

    /// 上一次写入是否已完成（例如电机到位）
    fn is_done(&self) -> Result<bool> {
        Ok(true)
    }
}

/// 操作员取消标志，可跨线程共享
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 已取消时返回 `Aborted`
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_aborted() {
            Err(EcalError::Aborted(what.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_handle_shared() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        assert!(handle.check("scan").is_ok());
        clone.abort();
        assert!(handle.is_aborted());
        assert!(matches!(handle.check("scan"), Err(EcalError::Aborted(_))));
    }
}
