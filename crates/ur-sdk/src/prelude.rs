//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ur_sdk::prelude::*;
//! ```

// 驱动层
pub use crate::driver::{
    Controller, ControllerBuilder, LoopExit, LoopMetricsSnapshot, LoopParameters, LoopState,
    ServoCommand, StateObserver,
};

// 链路层（常用 Trait）
pub use crate::link::{CommandChannel, RealtimeLink, TcpCommandChannel};

// 协议层
pub use crate::protocol::{ArmState, JointVector, Setpoint, SetpointType};

// 配置与限位
pub use crate::tools::{ControllerConfig, JointLimits, check_joint_limits};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::link::LinkError;
pub use crate::protocol::ProtocolError;
pub use crate::tools::{ConfigError, LimitError};
