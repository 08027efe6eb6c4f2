//! UR SDK - UR 机械臂实时伺服 Rust SDK
//!
//! 通过寄存器式实时链路以 125Hz 驱动六轴机械臂：在 halt / position / velocity
//! 三种设定点之间仲裁，用看门狗序号防止过期命令，并逐周期下发速度、加速度、
//! 前瞻时间和增益参数。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 寄存器表、设定点、机械臂端程序模板
//! - **链路层** (`link`): 实时链路与命令通道抽象
//! - **工具层** (`tools`): 配置文件与关节限位
//! - **驱动层** (`driver`): 控制线程、邮箱、关闭序列、控制器门面
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ur_sdk::prelude::*;
//! # fn connect_link() -> Box<dyn RealtimeLink + Send> { unimplemented!() }
//!
//! ur_sdk::init_logger();
//!
//! let config = ControllerConfig::load_from_file("controller.toml")?;
//! let controller = ControllerBuilder::from_config(&config).build();
//!
//! controller.servo(ServoCommand::halt())?;
//! controller.start(connect_link())?;
//! controller.servo(ServoCommand::velocity([0.0, 0.0, 0.0, 0.0, 0.0, 0.1]))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub use ur_driver as driver;
pub use ur_link as link;
pub use ur_protocol as protocol;
pub use ur_tools as tools;

pub mod prelude;

pub use ur_driver::{
    Controller, ControllerBuilder, DriverError, LoopExit, LoopState, ServoCommand, StateObserver,
};
pub use ur_link::{CommandChannel, LinkError, RealtimeLink};
pub use ur_protocol::{ArmState, ProtocolError, Setpoint, SetpointType};
pub use ur_tools::{ConfigError, ControllerConfig, JointLimits, LimitError};

static LOGGER: Once = Once::new();

/// 初始化日志
///
/// 使用 `RUST_LOG` 环境变量过滤（默认 `info`），并把 `log` crate 的记录转发到 tracing。
/// 可以多次调用；已有全局 subscriber 时不做任何事。
pub fn init_logger() {
    LOGGER.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            let _ = tracing_log::LogTracer::init();
        }
    });
}
