//! 控制循环指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环实时指标
///
/// # 使用示例
///
/// ```rust
/// use ur_driver::LoopMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LoopMetrics::new();
/// metrics.cycles.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().cycles, 1);
/// ```
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 完成的周期数（全部寄存器写入成功）
    pub cycles: AtomicU64,

    /// 邮箱覆盖次数（未被消费的设定点被新值替换）
    ///
    /// 快速增长说明应用线程的发送频率高于控制周期，属于正常现象。
    pub mailbox_overwrites: AtomicU64,

    /// 观察者 panic 次数
    pub observer_failures: AtomicU64,

    /// 成功的寄存器组写入次数
    pub register_writes: AtomicU64,

    /// 失败的寄存器组写入次数
    pub write_failures: AtomicU64,

    /// 速度缩放被钳位的次数
    pub speed_scale_clamps: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            mailbox_overwrites: self.mailbox_overwrites.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
            register_writes: self.register_writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            speed_scale_clamps: self.speed_scale_clamps.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopMetricsSnapshot {
    pub cycles: u64,
    pub mailbox_overwrites: u64,
    pub observer_failures: u64,
    pub register_writes: u64,
    pub write_failures: u64,
    pub speed_scale_clamps: u64,
}

impl LoopMetricsSnapshot {
    /// 写入失败率（百分比），没有写入时返回 0.0
    pub fn write_failure_rate(&self) -> f64 {
        let total = self.register_writes + self.write_failures;
        if total == 0 {
            return 0.0;
        }
        (self.write_failures as f64 / total as f64) * 100.0
    }
}
