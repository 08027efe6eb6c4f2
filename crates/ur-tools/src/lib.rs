//! # UR Tools - 配置与安全辅助
//!
//! **依赖原则**: 只依赖 `ur-protocol`，避免依赖 `ur-driver`
//!
//! ## 包含模块
//!
//! - `config` - 控制器配置（TOML）
//! - `safety` - 关节限位检查（纯函数）

pub mod config;
pub mod safety;

// 重新导出常用类型
pub use config::{ConfigError, ControllerConfig, ParameterConfig};
pub use safety::{JointLimits, LimitError, check_joint_limits, check_vector_len, in_limits};
