//! # 换样机器人时序
//!
//! 写入目标样品号与装载 / 卸载命令，触发执行，
//! 等待机器人进入对应的工作状态后再等待其回到 "Idle"。
//! 两个等待阶段都受 `PollConfig` 超时约束。
//!
//! ## 依赖关系
//! - 被 `hardware/mod.rs` 导出
//! - 使用 `hardware/poll.rs`

use super::poll::{wait_until, PollConfig};
use super::{AbortHandle, Readable, Settable};
use crate::error::{EcalError, Result};

use std::fmt;

/// 机器人状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotState {
    Idle,
    Loading,
    Unloading,
    Other(String),
}

impl RobotState {
    pub fn parse(status: &str) -> Self {
        match status.trim() {
            "Idle" => RobotState::Idle,
            "Loading Sample" => RobotState::Loading,
            "Unloading Sample" => RobotState::Unloading,
            other => RobotState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotState::Idle => write!(f, "Idle"),
            RobotState::Loading => write!(f, "Loading Sample"),
            RobotState::Unloading => write!(f, "Unloading Sample"),
            RobotState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// 换样机器人
pub struct SampleRobot {
    name: String,
    sample: Box<dyn Settable<u32>>,
    load_cmd: Box<dyn Settable>,
    unload_cmd: Box<dyn Settable>,
    execute_cmd: Box<dyn Settable>,
    status: Box<dyn Readable<String>>,
    poll: PollConfig,
    abort: Option<AbortHandle>,
}

impl SampleRobot {
    pub fn new(
        name: impl Into<String>,
        sample: Box<dyn Settable<u32>>,
        load_cmd: Box<dyn Settable>,
        unload_cmd: Box<dyn Settable>,
        execute_cmd: Box<dyn Settable>,
        status: Box<dyn Readable<String>>,
        poll: PollConfig,
    ) -> Self {
        Self {
            name: name.into(),
            sample,
            load_cmd,
            unload_cmd,
            execute_cmd,
            status,
            poll,
            abort: None,
        }
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn state(&self) -> Result<RobotState> {
        Ok(RobotState::parse(&self.status.read()?))
    }

    /// 装载样品
    pub fn load(&self, sample: u32) -> Result<()> {
        self.ensure_idle()?;
        tracing::info!(robot = %self.name, sample, "loading sample");
        self.sample.set(sample)?;
        self.load_cmd.set(1.0)?;
        self.execute(RobotState::Loading)
    }

    /// 卸载当前样品
    pub fn unload(&self) -> Result<()> {
        self.ensure_idle()?;
        tracing::info!(robot = %self.name, "unloading sample");
        self.unload_cmd.set(1.0)?;
        self.execute(RobotState::Unloading)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state()? {
            RobotState::Idle => Ok(()),
            busy => Err(EcalError::DeviceBusy {
                device: self.name.clone(),
                status: busy.to_string(),
            }),
        }
    }

    fn execute(&self, active: RobotState) -> Result<()> {
        self.execute_cmd.set(1.0)?;

        let started = format!("start {}", active);
        wait_until(&self.name, &started, &self.poll, self.abort.as_ref(), || {
            Ok(self.state()? == active)
        })?;
        let waited = wait_until(&self.name, "return to Idle", &self.poll, self.abort.as_ref(), || {
            Ok(self.state()? == RobotState::Idle)
        })?;
        tracing::info!(robot = %self.name, ?waited, "robot idle");
        Ok(())
    }
}
