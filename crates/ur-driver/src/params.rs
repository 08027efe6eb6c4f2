//! 控制循环参数
//!
//! 应用线程通过 `servo()` 覆盖参数，控制线程每周期读取一次快照。

use parking_lot::Mutex;
use tracing::debug;
use ur_tools::ParameterConfig;

/// 每周期写入机械臂的标量参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopParameters {
    /// 速度限制（rad/s）
    pub velocity_limit: f64,
    /// 加速度限制（rad/s²）
    pub acceleration_limit: f64,
    /// servoj 前瞻时间（秒）
    pub lookahead: f64,
    /// servoj 增益
    pub gain: f64,
    /// 速度缩放（0.0 - 1.0）
    ///
    /// 第一个周期被机械臂上报的上限替换，之后每周期被钳位到该上限。
    pub speed_scale: f64,
}

impl Default for LoopParameters {
    fn default() -> Self {
        Self::from(&ParameterConfig::default())
    }
}

impl From<&ParameterConfig> for LoopParameters {
    fn from(config: &ParameterConfig) -> Self {
        Self {
            velocity_limit: config.velocity_limit,
            acceleration_limit: config.acceleration_limit,
            lookahead: config.lookahead,
            gain: config.gain,
            speed_scale: 1.0,
        }
    }
}

/// servo 命令携带的参数覆盖
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterOverrides {
    pub velocity_limit: Option<f64>,
    pub acceleration_limit: Option<f64>,
    pub lookahead: Option<f64>,
    pub gain: Option<f64>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn values(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("velocity_limit", self.velocity_limit),
            ("acceleration_limit", self.acceleration_limit),
            ("lookahead", self.lookahead),
            ("gain", self.gain),
        ]
    }
}

/// 共享参数（应用线程与控制线程之间）
#[derive(Debug, Default)]
pub struct SharedParameters {
    inner: Mutex<LoopParameters>,
}

impl SharedParameters {
    pub fn new(params: LoopParameters) -> Self {
        Self {
            inner: Mutex::new(params),
        }
    }

    /// 应用覆盖并返回应用后的快照
    pub fn apply(&self, overrides: &ParameterOverrides) -> LoopParameters {
        if overrides.is_empty() {
            return self.snapshot();
        }

        let mut params = self.inner.lock();
        if let Some(v) = overrides.velocity_limit {
            params.velocity_limit = v;
        }
        if let Some(v) = overrides.acceleration_limit {
            params.acceleration_limit = v;
        }
        if let Some(v) = overrides.lookahead {
            params.lookahead = v;
        }
        if let Some(v) = overrides.gain {
            params.gain = v;
        }
        debug!("Loop parameters updated: {:?}", *params);
        *params
    }

    pub fn snapshot(&self) -> LoopParameters {
        *self.inner.lock()
    }

    pub fn speed_scale(&self) -> f64 {
        self.inner.lock().speed_scale
    }

    pub fn set_speed_scale(&self, value: f64) {
        self.inner.lock().speed_scale = value;
    }

    /// 用机械臂上报的上限替换当前速度缩放
    pub fn latch_speed_ceiling(&self, ceiling: f64) -> LoopParameters {
        let mut params = self.inner.lock();
        params.speed_scale = ceiling;
        *params
    }

    /// 将速度缩放钳位到 `[0, max]` 并写回
    ///
    /// `max` 必须是非负有限值。返回钳位后的快照以及是否发生了钳位。
    pub fn clamp_speed_scale(&self, max: f64) -> (LoopParameters, bool) {
        let mut params = self.inner.lock();
        let current = params.speed_scale;
        let clamped = if current.is_nan() {
            0.0
        } else {
            current.clamp(0.0, max)
        };
        let changed = clamped != current;
        params.speed_scale = clamped;
        (*params, changed)
    }
}

/// 把上报的速度上限规整到 `[0, 1]`
pub(crate) fn sanitize_ceiling(reported: f64) -> f64 {
    if reported.is_finite() {
        reported.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
