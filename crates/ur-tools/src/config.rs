//! # 控制器配置
//!
//! TOML 格式，所有字段都有默认值，最小配置只需 `host`：
//!
//! ```toml
//! host = "192.168.1.10"
//!
//! [parameters]
//! gain = 500.0
//! ```

use crate::safety::{JointLimits, LimitError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use ur_protocol::ProgramConfig;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid joint limits: {0}")]
    Limits(#[from] LimitError),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 控制循环参数的初始值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// 速度限制（rad/s）
    pub velocity_limit: f64,
    /// 加速度限制（rad/s²）
    pub acceleration_limit: f64,
    /// servoj 前瞻时间（秒，0.03 - 0.2）
    pub lookahead: f64,
    /// servoj 增益（100 - 2000）
    pub gain: f64,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            velocity_limit: 0.0,
            acceleration_limit: 10.0,
            lookahead: 0.1,
            gain: 300.0,
        }
    }
}

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 机械臂控制器地址
    pub host: String,
    /// 实时链路端口
    pub rtde_port: u16,
    /// 命令通道端口
    pub command_port: u16,
    /// 工具中心点偏移
    pub tcp: [f64; 6],
    /// 负载（kg）
    pub payload: f64,
    /// 重力向量
    pub gravity: [f64; 3],
    /// 机械臂端看门狗超时（周期数）
    pub setpoint_timeout: u32,
    /// 控制循环参数
    pub parameters: ParameterConfig,
    /// 关节限位（可选）
    pub joint_limits: Option<JointLimits>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let program = ProgramConfig::default();
        Self {
            host: "localhost".to_string(),
            rtde_port: 30004,
            command_port: 30002,
            tcp: program.tcp,
            payload: program.payload,
            gravity: program.gravity,
            setpoint_timeout: program.setpoint_timeout,
            parameters: ParameterConfig::default(),
            joint_limits: None,
        }
    }
}

impl ControllerConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 校验取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "host",
                reason: "empty".to_string(),
            });
        }
        if self.setpoint_timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "setpoint_timeout",
                reason: "must be at least 1 cycle".to_string(),
            });
        }
        if !(self.payload.is_finite() && self.payload >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "payload",
                reason: format!("{} is not a valid mass", self.payload),
            });
        }
        let p = &self.parameters;
        for (field, value) in [
            ("parameters.velocity_limit", p.velocity_limit),
            ("parameters.acceleration_limit", p.acceleration_limit),
            ("parameters.lookahead", p.lookahead),
            ("parameters.gain", p.gain),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not finite", value),
                });
            }
        }
        if let Some(limits) = &self.joint_limits {
            limits.validate()?;
        }
        Ok(())
    }

    /// 机械臂端程序参数
    pub fn program(&self) -> ProgramConfig {
        ProgramConfig {
            tcp: self.tcp,
            payload: self.payload,
            gravity: self.gravity,
            setpoint_timeout: self.setpoint_timeout,
            ..ProgramConfig::default()
        }
    }
}
