//! 设定点邮箱
//!
//! 单槽位、后写覆盖（Last Write Wins）。应用线程 `put`，控制线程每周期 `take` 一次，
//! 任何一方都不会被另一方长时间阻塞（临界区只有一次 `Option` 交换）。

use parking_lot::Mutex;
use ur_protocol::Setpoint;

/// 设定点邮箱
#[derive(Debug, Default)]
pub struct SetpointMailbox {
    slot: Mutex<Option<Setpoint>>,
}

impl SetpointMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入设定点，覆盖尚未被消费的旧值
    ///
    /// 返回是否发生了覆盖。
    pub fn put(&self, setpoint: Setpoint) -> bool {
        self.slot.lock().replace(setpoint).is_some()
    }

    /// 取出当前设定点，槽位变为空
    pub fn take(&self) -> Option<Setpoint> {
        self.slot.lock().take()
    }

    /// 丢弃待处理的设定点
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}
