//! 寄存器表
//!
//! 实时链路的输入寄存器按命名字段声明，每个字段组声明一次，得到一个句柄。
//! 逻辑字段（target[i]、velocity、gain ...）到线上字段名的映射在这里是固定表，
//! 不在运行时拼接字符串。

/// 整数输入寄存器：设定点编号（看门狗）
pub const REG_SETPOINT: usize = 0;
/// 整数输入寄存器：设定点类型
pub const REG_TYPE: usize = 1;

/// 浮点输入寄存器：目标向量起始编号（占用 0..6）
pub const REG_TARGET: usize = 0;
/// 浮点输入寄存器：速度限制
pub const REG_VELOCITY: usize = 6;
/// 浮点输入寄存器：加速度限制
pub const REG_ACCELERATION: usize = 7;
/// 浮点输入寄存器：前瞻时间（servoj lookahead）
pub const REG_LOOKAHEAD: usize = 8;
/// 浮点输入寄存器：增益（servoj gain）
pub const REG_GAIN: usize = 9;

/// 速度滑块掩码：1 表示本帧携带 speed_slider_fraction
pub const SPEED_SLIDER_MASK: u32 = 1;

/// 链路字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    Double,
    Vector6D,
    Int32,
    UInt32,
}

impl FieldType {
    /// 链路协议中的类型名
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Double => "DOUBLE",
            FieldType::Vector6D => "VECTOR6D",
            FieldType::Int32 => "INT32",
            FieldType::UInt32 => "UINT32",
        }
    }
}

/// 输出字段（机械臂 → 控制循环）
pub const OUTPUT_FIELD_NAMES: [&str; 7] = [
    "timestamp",
    "target_q",
    "actual_q",
    "target_qd",
    "actual_qd",
    "target_qdd",
    "target_speed_fraction",
];

/// 输出字段类型，与 [`OUTPUT_FIELD_NAMES`] 一一对应
pub const OUTPUT_FIELD_TYPES: [FieldType; 7] = [
    FieldType::Double,
    FieldType::Vector6D,
    FieldType::Vector6D,
    FieldType::Vector6D,
    FieldType::Vector6D,
    FieldType::Vector6D,
    FieldType::Double,
];

/// 输入字段组（控制循环 → 机械臂）
///
/// 判别值即声明顺序，也是 `RegisterHandles` 中的数组下标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterGroup {
    Target = 0,
    SetpointNumber = 1,
    SetpointType = 2,
    VelocityLimit = 3,
    AccelerationLimit = 4,
    Lookahead = 5,
    Gain = 6,
    SpeedSlider = 7,
}

impl RegisterGroup {
    /// 字段组数量
    pub const COUNT: usize = 8;

    /// 全部字段组（声明顺序）
    pub const ALL: [RegisterGroup; Self::COUNT] = [
        RegisterGroup::Target,
        RegisterGroup::SetpointNumber,
        RegisterGroup::SetpointType,
        RegisterGroup::VelocityLimit,
        RegisterGroup::AccelerationLimit,
        RegisterGroup::Lookahead,
        RegisterGroup::Gain,
        RegisterGroup::SpeedSlider,
    ];

    /// 数组下标
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 该字段组的线上字段名
    pub const fn field_names(self) -> &'static [&'static str] {
        match self {
            RegisterGroup::Target => &[
                "input_double_register_0",
                "input_double_register_1",
                "input_double_register_2",
                "input_double_register_3",
                "input_double_register_4",
                "input_double_register_5",
            ],
            RegisterGroup::SetpointNumber => &["input_int_register_0"],
            RegisterGroup::SetpointType => &["input_int_register_1"],
            RegisterGroup::VelocityLimit => &["input_double_register_6"],
            RegisterGroup::AccelerationLimit => &["input_double_register_7"],
            RegisterGroup::Lookahead => &["input_double_register_8"],
            RegisterGroup::Gain => &["input_double_register_9"],
            RegisterGroup::SpeedSlider => &["speed_slider_mask", "speed_slider_fraction"],
        }
    }

    /// 该字段组的字段类型，与 [`Self::field_names`] 一一对应
    pub const fn field_types(self) -> &'static [FieldType] {
        match self {
            RegisterGroup::Target => &[FieldType::Double; 6],
            RegisterGroup::SetpointNumber | RegisterGroup::SetpointType => &[FieldType::Int32],
            RegisterGroup::VelocityLimit
            | RegisterGroup::AccelerationLimit
            | RegisterGroup::Lookahead
            | RegisterGroup::Gain => &[FieldType::Double],
            RegisterGroup::SpeedSlider => &[FieldType::UInt32, FieldType::Double],
        }
    }
}
