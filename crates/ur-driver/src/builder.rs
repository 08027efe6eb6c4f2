//! Builder 模式实现
//!
//! 提供链式构造 `Controller` 实例的便捷方式。

use crate::controller::{Controller, ControllerSettings};
use crate::hooks::{ObserverSet, StateObserver};
use crate::params::LoopParameters;
use crate::pipeline::{ExitCallback, LoopExit, OUTPUT_FREQUENCY};
use std::sync::Arc;
use ur_protocol::ProgramConfig;
use ur_tools::{ControllerConfig, JointLimits};

/// 实时链路默认端口
pub const DEFAULT_RTDE_PORT: u16 = 30004;

/// Controller Builder（链式构造）
///
/// # Example
///
/// ```
/// use ur_driver::ControllerBuilder;
/// use ur_protocol::ArmState;
/// use std::sync::Arc;
///
/// let controller = ControllerBuilder::new("192.168.1.10")
///     .payload(1.2)
///     .setpoint_timeout(40)
///     .observer(Arc::new(|state: &ArmState| {
///         let _ = state.actual_q;
///     }))
///     .on_exit(|exit| eprintln!("control loop exited: {}", exit))
///     .build();
/// assert_eq!(controller.host(), "192.168.1.10");
/// ```
pub struct ControllerBuilder {
    host: String,
    rtde_port: u16,
    command_port: u16,
    program: ProgramConfig,
    parameters: LoopParameters,
    observers: ObserverSet,
    on_exit: Option<ExitCallback>,
    output_frequency: f64,
    joint_limits: Option<JointLimits>,
}

impl ControllerBuilder {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            rtde_port: DEFAULT_RTDE_PORT,
            command_port: ur_link::tcp::DEFAULT_COMMAND_PORT,
            program: ProgramConfig::default(),
            parameters: LoopParameters::default(),
            observers: ObserverSet::new(),
            on_exit: None,
            output_frequency: OUTPUT_FREQUENCY,
            joint_limits: None,
        }
    }

    /// 从配置文件内容创建 Builder
    pub fn from_config(config: &ControllerConfig) -> Self {
        let mut builder = Self::new(config.host.clone())
            .rtde_port(config.rtde_port)
            .command_port(config.command_port)
            .parameters(LoopParameters::from(&config.parameters));
        builder.program = config.program();
        builder.joint_limits = config.joint_limits;
        builder
    }

    pub fn rtde_port(mut self, port: u16) -> Self {
        self.rtde_port = port;
        self
    }

    pub fn command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    /// 工具中心点偏移
    pub fn tcp(mut self, tcp: [f64; 6]) -> Self {
        self.program.tcp = tcp;
        self
    }

    /// 负载（kg）
    pub fn payload(mut self, payload: f64) -> Self {
        self.program.payload = payload;
        self
    }

    pub fn gravity(mut self, gravity: [f64; 3]) -> Self {
        self.program.gravity = gravity;
        self
    }

    /// 机械臂端看门狗超时（周期数）
    pub fn setpoint_timeout(mut self, cycles: u32) -> Self {
        self.program.setpoint_timeout = cycles;
        self
    }

    /// 初始循环参数
    pub fn parameters(mut self, parameters: LoopParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// 注册观察者（按调用顺序）
    pub fn observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// 终止回调，在控制线程完成关闭序列后调用
    pub fn on_exit(mut self, callback: impl Fn(&LoopExit) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(callback));
        self
    }

    /// 输出字段频率（Hz，默认 125）
    pub fn output_frequency(mut self, frequency: f64) -> Self {
        self.output_frequency = frequency;
        self
    }

    /// 位置命令的关节限位
    pub fn joint_limits(mut self, limits: JointLimits) -> Self {
        self.joint_limits = Some(limits);
        self
    }

    pub fn build(self) -> Controller {
        Controller::from_settings(ControllerSettings {
            host: self.host,
            rtde_port: self.rtde_port,
            command_port: self.command_port,
            program: self.program,
            parameters: self.parameters,
            observers: self.observers,
            on_exit: self.on_exit,
            output_frequency: self.output_frequency,
            joint_limits: self.joint_limits,
        })
    }
}
