//! 设定点定义
//!
//! 一个设定点就是一条运动指令：停止、目标关节位置或目标关节速度，
//! 附带各自的平滑/加速度参数。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 关节数量
pub const JOINT_COUNT: usize = 6;

/// 六轴关节向量（弧度或弧度/秒）
pub type JointVector = [f64; JOINT_COUNT];

/// 设定点类型（类型寄存器的取值）
///
/// 数值与机械臂端程序中的 `SETPOINT_*` 常量一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum SetpointType {
    Halt = 0,
    Position = 1,
    Velocity = 2,
}

impl SetpointType {
    /// 寄存器数值
    #[inline]
    pub fn code(self) -> i32 {
        self.into()
    }

    /// 从寄存器数值解析
    pub fn from_code(code: i32) -> Result<Self, ProtocolError> {
        Self::try_from(code).map_err(|_| ProtocolError::InvalidSetpointType(code))
    }
}

/// 设定点
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Setpoint {
    /// 停止运动（机械臂端程序执行 halt）
    Halt,
    /// 关节位置伺服（servoj）
    Position {
        target: JointVector,
        lookahead: f64,
        gain: f64,
    },
    /// 关节速度伺服（speedj）
    Velocity {
        target: JointVector,
        acceleration: f64,
    },
}

impl Setpoint {
    /// 设定点类型
    pub fn kind(&self) -> SetpointType {
        match self {
            Setpoint::Halt => SetpointType::Halt,
            Setpoint::Position { .. } => SetpointType::Position,
            Setpoint::Velocity { .. } => SetpointType::Velocity,
        }
    }

    /// 目标向量（Halt 没有目标）
    pub fn target(&self) -> Option<&JointVector> {
        match self {
            Setpoint::Halt => None,
            Setpoint::Position { target, .. } | Setpoint::Velocity { target, .. } => Some(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setpoint_type_codes() {
        assert_eq!(SetpointType::Halt.code(), 0);
        assert_eq!(SetpointType::Position.code(), 1);
        assert_eq!(SetpointType::Velocity.code(), 2);

        assert_eq!(SetpointType::from_code(1), Ok(SetpointType::Position));
        assert_eq!(
            SetpointType::from_code(3),
            Err(ProtocolError::InvalidSetpointType(3))
        );
        assert_eq!(
            SetpointType::from_code(-1),
            Err(ProtocolError::InvalidSetpointType(-1))
        );
    }

    #[test]
    fn test_setpoint_kind_and_target() {
        assert_eq!(Setpoint::Halt.kind(), SetpointType::Halt);
        assert!(Setpoint::Halt.target().is_none());

        let position = Setpoint::Position {
            target: [0.1; 6],
            lookahead: 0.1,
            gain: 300.0,
        };
        assert_eq!(position.kind(), SetpointType::Position);
        assert_eq!(position.target(), Some(&[0.1; 6]));

        let velocity = Setpoint::Velocity {
            target: [-0.2; 6],
            acceleration: 10.0,
        };
        assert_eq!(velocity.kind(), SetpointType::Velocity);
        assert_eq!(velocity.target(), Some(&[-0.2; 6]));
    }
}
