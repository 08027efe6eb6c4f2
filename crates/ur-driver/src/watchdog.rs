//! 看门狗计数器
//!
//! 每个成功的周期加一，写入 `input_int_register_0`。机械臂端程序在该寄存器
//! 连续 `setpoint_timeout` 个周期未变化时自行停机。

/// 设定点序号
///
/// 从 0 开始，第一帧携带 1。只增不减，与设定点类型无关；溢出时回绕。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogCounter {
    setpoint_number: i32,
}

impl WatchdogCounter {
    pub const fn new() -> Self {
        Self { setpoint_number: 0 }
    }

    /// 加一并返回新值
    #[inline]
    pub fn kick(&mut self) -> i32 {
        self.setpoint_number = self.setpoint_number.wrapping_add(1);
        self.setpoint_number
    }

    /// 最近一次写出的值（未写出时为 0）
    #[inline]
    pub fn current(&self) -> i32 {
        self.setpoint_number
    }
}
