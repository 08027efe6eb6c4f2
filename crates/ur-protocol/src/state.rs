//! 机械臂状态
//!
//! 每周期从输出字段解码得到的快照，字段顺序见 [`OUTPUT_FIELD_NAMES`]。

use crate::ProtocolError;
use crate::frame::FieldValue;
use crate::registers::{FieldType, OUTPUT_FIELD_NAMES};
use crate::setpoint::JointVector;

/// 机械臂状态快照
///
/// 控制循环只消费 `target_speed_fraction`，其余字段原样交给观察者。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmState {
    /// 控制器启动以来的时间（秒）
    pub timestamp: f64,
    /// 目标关节位置（rad）
    pub target_q: JointVector,
    /// 实际关节位置（rad）
    pub actual_q: JointVector,
    /// 目标关节速度（rad/s）
    pub target_qd: JointVector,
    /// 实际关节速度（rad/s）
    pub actual_qd: JointVector,
    /// 目标关节加速度（rad/s²）
    pub target_qdd: JointVector,
    /// 示教器/程序设定的速度比例上限（0.0 - 1.0）
    pub target_speed_fraction: f64,
}

impl ArmState {
    /// 从输出字段值解码
    ///
    /// # 错误
    /// - `FieldCountMismatch`: 字段数量与输出字段表不一致
    /// - `FieldTypeMismatch`: 某个字段的类型不符
    pub fn from_values(values: &[FieldValue]) -> Result<Self, ProtocolError> {
        if values.len() != OUTPUT_FIELD_NAMES.len() {
            return Err(ProtocolError::FieldCountMismatch {
                expected: OUTPUT_FIELD_NAMES.len(),
                actual: values.len(),
            });
        }

        let double = |i: usize| {
            values[i].as_f64().ok_or(ProtocolError::FieldTypeMismatch {
                field: OUTPUT_FIELD_NAMES[i],
                expected: FieldType::Double,
            })
        };
        let vector = |i: usize| {
            values[i].as_vector().copied().ok_or(ProtocolError::FieldTypeMismatch {
                field: OUTPUT_FIELD_NAMES[i],
                expected: FieldType::Vector6D,
            })
        };

        Ok(Self {
            timestamp: double(0)?,
            target_q: vector(1)?,
            actual_q: vector(2)?,
            target_qd: vector(3)?,
            actual_qd: vector(4)?,
            target_qdd: vector(5)?,
            target_speed_fraction: double(6)?,
        })
    }

    /// 编码为输出字段值（模拟链路和录制使用）
    pub fn to_values(&self) -> [FieldValue; 7] {
        [
            FieldValue::Double(self.timestamp),
            FieldValue::Vector6D(self.target_q),
            FieldValue::Vector6D(self.actual_q),
            FieldValue::Vector6D(self.target_qd),
            FieldValue::Vector6D(self.actual_qd),
            FieldValue::Vector6D(self.target_qdd),
            FieldValue::Double(self.target_speed_fraction),
        ]
    }

    /// 以给定速度比例构造空闲状态（测试与模拟使用）
    pub fn with_speed_fraction(target_speed_fraction: f64) -> Self {
        Self {
            target_speed_fraction,
            ..Default::default()
        }
    }
}
