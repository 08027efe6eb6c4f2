//! 寄存器帧
//!
//! 一个控制周期内写入机械臂的全部寄存器值。帧本身是纯数据，
//! 逐字段组写入链路的顺序由 [`RegisterFrame::send_order`] 固定。

use crate::registers::{FieldType, RegisterGroup, SPEED_SLIDER_MASK};
use crate::setpoint::{JointVector, SetpointType};
use smallvec::SmallVec;

/// 单个字段的值
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Double(f64),
    Vector6D(JointVector),
    Int32(i32),
    UInt32(u32),
}

impl FieldValue {
    /// 值对应的字段类型
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Vector6D(_) => FieldType::Vector6D,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::UInt32(_) => FieldType::UInt32,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&JointVector> {
        match self {
            FieldValue::Vector6D(v) => Some(v),
            _ => None,
        }
    }
}

/// 一个字段组的值（最多 6 个字段，栈上分配）
pub type GroupValues = SmallVec<[FieldValue; 6]>;

/// 寄存器帧
///
/// `setpoint_type` 恒为三者之一；`target` 仅在 Position / Velocity 时存在。
/// 未写入的寄存器在机械臂端保持上一周期的值。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterFrame {
    pub setpoint_type: SetpointType,
    pub target: Option<JointVector>,
    pub setpoint_number: i32,
    pub velocity_limit: f64,
    pub acceleration_limit: f64,
    pub lookahead: f64,
    pub gain: f64,
    pub speed_fraction: f64,
}

impl RegisterFrame {
    /// 字段组写入顺序
    ///
    /// type → target（如有）→ setpoint_number → velocity → acceleration
    /// → lookahead → gain → speed_slider
    pub fn send_order(&self) -> impl Iterator<Item = RegisterGroup> + use<> {
        let has_target = self.target.is_some();
        [
            RegisterGroup::SetpointType,
            RegisterGroup::Target,
            RegisterGroup::SetpointNumber,
            RegisterGroup::VelocityLimit,
            RegisterGroup::AccelerationLimit,
            RegisterGroup::Lookahead,
            RegisterGroup::Gain,
            RegisterGroup::SpeedSlider,
        ]
        .into_iter()
        .filter(move |group| has_target || *group != RegisterGroup::Target)
    }

    /// 字段组的值
    ///
    /// 对 Halt 帧请求 `Target` 返回 `None`。
    pub fn group_values(&self, group: RegisterGroup) -> Option<GroupValues> {
        let mut values = GroupValues::new();
        match group {
            RegisterGroup::Target => {
                let target = self.target?;
                values.extend(target.iter().map(|v| FieldValue::Double(*v)));
            },
            RegisterGroup::SetpointNumber => values.push(FieldValue::Int32(self.setpoint_number)),
            RegisterGroup::SetpointType => {
                values.push(FieldValue::Int32(self.setpoint_type.code()))
            },
            RegisterGroup::VelocityLimit => values.push(FieldValue::Double(self.velocity_limit)),
            RegisterGroup::AccelerationLimit => {
                values.push(FieldValue::Double(self.acceleration_limit))
            },
            RegisterGroup::Lookahead => values.push(FieldValue::Double(self.lookahead)),
            RegisterGroup::Gain => values.push(FieldValue::Double(self.gain)),
            RegisterGroup::SpeedSlider => {
                values.push(FieldValue::UInt32(SPEED_SLIDER_MASK));
                values.push(FieldValue::Double(self.speed_fraction));
            },
        }
        Some(values)
    }
}
