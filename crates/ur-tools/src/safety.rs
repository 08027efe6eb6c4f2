//! # 关节限位
//!
//! 未配置限位与超出限位是两种不同的错误：前者是配置问题，后者是安全违规。
//! 两者都不放行（fail closed），调用方可以按错误类型区分处理。

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use ur_protocol::JOINT_COUNT;

/// 关节限位错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LimitError {
    /// 未配置限位（配置错误）
    #[error("Joint limits not configured")]
    Unset,

    /// 向量长度不符
    #[error("Invalid vector length: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// 限位本身无效（min > max 或非有限值）
    #[error("Invalid limit range for joint {joint}: [{min}, {max}]")]
    InvalidRange { joint: usize, min: f64, max: f64 },

    /// 超出限位（安全违规）
    #[error("Joint {joint} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        joint: usize,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// 关节位置限位（rad）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub min: [f64; JOINT_COUNT],
    pub max: [f64; JOINT_COUNT],
}

impl Default for JointLimits {
    fn default() -> Self {
        // UR 系列各关节 ±360°
        let full_turn = 2.0 * std::f64::consts::PI;
        Self {
            min: [-full_turn; JOINT_COUNT],
            max: [full_turn; JOINT_COUNT],
        }
    }
}

impl JointLimits {
    /// 检查限位本身是否有效
    pub fn validate(&self) -> Result<(), LimitError> {
        for joint in 0..JOINT_COUNT {
            let (min, max) = (self.min[joint], self.max[joint]);
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(LimitError::InvalidRange { joint, min, max });
            }
        }
        Ok(())
    }

    /// 检查关节向量（不含“未配置”情况）
    pub fn check(&self, q: &[f64]) -> Result<(), LimitError> {
        check_vector_len(q, JOINT_COUNT)?;
        for (joint, value) in q.iter().copied().enumerate() {
            let (min, max) = (self.min[joint], self.max[joint]);
            // NaN 不在任何区间内
            if !(value >= min && value <= max) {
                return Err(LimitError::OutOfRange {
                    joint,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// 检查关节向量是否在限位内
///
/// # 错误
/// - `Unset`: 未配置限位
/// - `LengthMismatch`: 向量长度不是 6
/// - `OutOfRange`: 某个关节超出限位
pub fn check_joint_limits(q: &[f64], limits: Option<&JointLimits>) -> Result<(), LimitError> {
    match limits {
        Some(limits) => limits.check(q),
        None => {
            warn!("Joint limits not set, rejecting joint vector");
            Err(LimitError::Unset)
        },
    }
}

/// 布尔版本：任何错误（包括未配置）都返回 false
pub fn in_limits(q: &[f64], limits: Option<&JointLimits>) -> bool {
    check_joint_limits(q, limits).is_ok()
}

/// 检查向量长度
pub fn check_vector_len(values: &[f64], expected: usize) -> Result<(), LimitError> {
    if values.len() != expected {
        return Err(LimitError::LengthMismatch {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}
