//! 控制循环状态
//!
//! `Idle → Starting → Running → Stopping → Stopped`，`Stopped` 之后可以再次启动。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 控制循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoopState {
    /// 从未启动
    #[default]
    Idle = 0,
    /// 正在连接、声明字段、上传程序
    Starting = 1,
    /// 控制线程正在运行周期
    Running = 2,
    /// 正在执行关闭序列
    Stopping = 3,
    /// 关闭序列已完成
    Stopped = 4,
}

impl LoopState {
    /// 从 u8 转换，无效值视为 Stopped
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否可以（重新）启动
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// 是否处于启动到关闭完成之间
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// 控制循环状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicLoopState {
    inner: AtomicU8,
}

impl AtomicLoopState {
    pub fn new(state: LoopState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> LoopState {
        LoopState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: LoopState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换，成功返回 true
    pub fn compare_exchange(
        &self,
        current: LoopState,
        new: LoopState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicLoopState {
    fn default() -> Self {
        Self::new(LoopState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        for state in [
            LoopState::Idle,
            LoopState::Starting,
            LoopState::Running,
            LoopState::Stopping,
            LoopState::Stopped,
        ] {
            assert_eq!(LoopState::from_u8(state.as_u8()), state);
        }
        assert_eq!(LoopState::from_u8(200), LoopState::Stopped);
    }

    #[test]
    fn test_can_start() {
        assert!(LoopState::Idle.can_start());
        assert!(LoopState::Stopped.can_start());
        assert!(!LoopState::Running.can_start());
        assert!(!LoopState::Stopping.can_start());
        assert!(LoopState::Starting.is_active());
    }

    #[test]
    fn test_atomic_loop_state() {
        let state = AtomicLoopState::default();
        assert_eq!(state.get(Ordering::Relaxed), LoopState::Idle);

        assert!(state.compare_exchange(
            LoopState::Idle,
            LoopState::Starting,
            Ordering::AcqRel,
            Ordering::Acquire
        ));
        assert!(!state.compare_exchange(
            LoopState::Idle,
            LoopState::Starting,
            Ordering::AcqRel,
            Ordering::Acquire
        ));

        state.set(LoopState::Running, Ordering::Release);
        assert_eq!(state.get(Ordering::Acquire), LoopState::Running);
        assert_eq!(format!("{}", LoopState::Running), "running");
    }
}
