//! 驱动层模块
//!
//! 本模块提供 UR 机械臂实时伺服控制功能，包括：
//! - 设定点仲裁（Halt / Position / Velocity，邮箱后写覆盖）
//! - 固定周期控制线程（看门狗序号、速度缩放钳位、逐组寄存器写入）
//! - 关闭序列（stop program → pause → disconnect，逐步独立执行）
//! - 观察者（每周期状态回调，panic 隔离）
//! - 无锁状态读取（ArcSwap）与原子指标
//!
//! # 使用场景
//!
//! 大多数用户通过 [`Controller`] 使用：启动前用 `servo()` 放入第一个设定点，
//! 调用 `start()` 后以不低于控制周期（8ms）的频率持续提交设定点。

mod builder;
pub mod command;
mod controller;
mod error;
pub mod hooks;
pub mod mailbox;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod state;
pub mod watchdog;

pub use builder::{ControllerBuilder, DEFAULT_RTDE_PORT};
pub use command::ServoCommand;
pub use controller::Controller;
pub use error::DriverError;
pub use hooks::{ObserverSet, StateObserver};
pub use mailbox::SetpointMailbox;
pub use metrics::{LoopMetrics, LoopMetricsSnapshot};
pub use params::{LoopParameters, ParameterOverrides, SharedParameters};
pub use pipeline::{
    ControlLoop, ExitCallback, LoopContext, LoopExit, OUTPUT_FREQUENCY, RegisterHandles,
    ShutdownReport, build_frame, control_thread, declare_registers, shutdown_sequence,
};
pub use state::{AtomicLoopState, LoopState};
pub use watchdog::WatchdogCounter;
