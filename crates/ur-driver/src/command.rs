//! servo 命令
//!
//! 一条命令可以声明 halt / position / velocity 中的任意几个，外加可选的参数覆盖。
//! 只有恰好声明一种运动类型的命令是有效的；校验在任何状态修改之前完成。

use crate::error::DriverError;
use crate::params::{LoopParameters, ParameterOverrides};
use ur_protocol::{JointVector, Setpoint, SetpointType};

/// servo 命令
///
/// # 示例
///
/// ```rust
/// use ur_driver::ServoCommand;
///
/// let cmd = ServoCommand::position([0.0; 6]).lookahead(0.05).gain(500.0);
/// assert!(cmd.validate().is_ok());
///
/// // 同时声明两种运动类型是无效的
/// let cmd = ServoCommand::halt().with_velocity([0.1; 6]);
/// assert!(cmd.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServoCommand {
    halt: bool,
    position: Option<JointVector>,
    velocity: Option<JointVector>,
    overrides: ParameterOverrides,
}

impl ServoCommand {
    /// 空命令（未声明运动类型，校验会失败）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt() -> Self {
        Self::new().with_halt()
    }

    /// 关节位置目标（rad）
    pub fn position(target: JointVector) -> Self {
        Self::new().with_position(target)
    }

    /// 关节速度目标（rad/s）
    pub fn velocity(target: JointVector) -> Self {
        Self::new().with_velocity(target)
    }

    pub fn with_halt(mut self) -> Self {
        self.halt = true;
        self
    }

    pub fn with_position(mut self, target: JointVector) -> Self {
        self.position = Some(target);
        self
    }

    pub fn with_velocity(mut self, target: JointVector) -> Self {
        self.velocity = Some(target);
        self
    }

    pub fn velocity_limit(mut self, value: f64) -> Self {
        self.overrides.velocity_limit = Some(value);
        self
    }

    pub fn acceleration_limit(mut self, value: f64) -> Self {
        self.overrides.acceleration_limit = Some(value);
        self
    }

    pub fn lookahead(mut self, value: f64) -> Self {
        self.overrides.lookahead = Some(value);
        self
    }

    pub fn gain(mut self, value: f64) -> Self {
        self.overrides.gain = Some(value);
        self
    }

    /// 位置目标（仅 position 命令）
    pub fn position_target(&self) -> Option<&JointVector> {
        self.position.as_ref()
    }

    pub fn overrides(&self) -> &ParameterOverrides {
        &self.overrides
    }

    /// 声明的运动类型数量
    pub fn kind_count(&self) -> usize {
        usize::from(self.halt)
            + usize::from(self.position.is_some())
            + usize::from(self.velocity.is_some())
    }

    /// 校验命令，返回其运动类型
    ///
    /// # 错误
    /// - `InvalidCommand`: 运动类型数量不是 1，或包含非有限数值
    pub fn validate(&self) -> Result<SetpointType, DriverError> {
        let count = self.kind_count();
        if count != 1 {
            return Err(DriverError::InvalidCommand(format!(
                "exactly one of halt, position or velocity is required, got {}",
                count
            )));
        }

        for (name, target) in [("position", &self.position), ("velocity", &self.velocity)] {
            if let Some(target) = target
                && let Some(joint) = target.iter().position(|v| !v.is_finite())
            {
                return Err(DriverError::InvalidCommand(format!(
                    "{} target joint {} is not finite",
                    name, joint
                )));
            }
        }

        for (name, value) in self.overrides.values() {
            if let Some(value) = value
                && !value.is_finite()
            {
                return Err(DriverError::InvalidCommand(format!(
                    "{} = {} is not finite",
                    name, value
                )));
            }
        }

        Ok(if self.halt {
            SetpointType::Halt
        } else if self.position.is_some() {
            SetpointType::Position
        } else {
            SetpointType::Velocity
        })
    }

    /// 用生效参数构造设定点
    ///
    /// Position 携带生效的 lookahead / gain，Velocity 携带生效的加速度限制。
    pub fn to_setpoint(&self, params: &LoopParameters) -> Result<Setpoint, DriverError> {
        let setpoint = match (self.validate()?, self.position, self.velocity) {
            (SetpointType::Position, Some(target), _) => Setpoint::Position {
                target,
                lookahead: params.lookahead,
                gain: params.gain,
            },
            (SetpointType::Velocity, _, Some(target)) => Setpoint::Velocity {
                target,
                acceleration: params.acceleration_limit,
            },
            _ => Setpoint::Halt,
        };
        Ok(setpoint)
    }
}
