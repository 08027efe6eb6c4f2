//! # UR Protocol
//!
//! UR 机械臂实时寄存器协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `registers`: 寄存器编号、字段组与字段类型（静态表）
//! - `setpoint`: 设定点（Halt / Position / Velocity）
//! - `frame`: 每周期写入的寄存器帧
//! - `state`: 每周期读取的机械臂状态
//! - `program`: 机械臂端控制程序模板
//!
//! ## 寄存器约定
//!
//! 控制循环写入的寄存器编号与机械臂端程序读取的编号必须一致，
//! 两者都来自 [`registers`] 中的常量，禁止在别处硬编码。

pub mod frame;
pub mod program;
pub mod registers;
pub mod setpoint;
pub mod state;

// 重新导出常用类型
pub use frame::{FieldValue, GroupValues, RegisterFrame};
pub use program::{ProgramConfig, STOP_PROGRAM, render_program};
pub use registers::{FieldType, RegisterGroup};
pub use setpoint::{JOINT_COUNT, JointVector, Setpoint, SetpointType};
pub use state::ArmState;

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid setpoint type code: {0}")]
    InvalidSetpointType(i32),

    #[error("Invalid field count: expected {expected}, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("Invalid value for field {field}: expected {expected:?}")]
    FieldTypeMismatch {
        field: &'static str,
        expected: FieldType,
    },
}
