//! 控制循环（Pipeline）
//!
//! 控制线程独占实时链路与命令通道，每个周期：
//!
//! 1. 阻塞接收一帧状态（`None` 表示连接丢失）
//! 2. 第一个周期锁定速度上限
//! 3. 按注册顺序通知观察者
//! 4. 从邮箱取出设定点（为空则退出）
//! 5. 构造寄存器帧，看门狗序号加一，速度缩放钳位
//! 6. 按固定顺序逐组写入寄存器（任一失败则退出）
//!
//! 任何退出原因都汇合到同一个关闭序列：`stop program` → pause → disconnect。

use crate::error::DriverError;
use crate::hooks::{ObserverSet, panic_message};
use crate::mailbox::SetpointMailbox;
use crate::metrics::LoopMetrics;
use crate::params::{LoopParameters, SharedParameters, sanitize_ceiling};
use crate::state::{AtomicLoopState, LoopState};
use crate::watchdog::WatchdogCounter;
use arc_swap::ArcSwapOption;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, trace, warn};
use ur_link::{CommandChannel, FieldGroupHandle, LinkError, RealtimeLink};
use ur_protocol::registers::{OUTPUT_FIELD_NAMES, OUTPUT_FIELD_TYPES};
use ur_protocol::{ArmState, RegisterFrame, RegisterGroup, STOP_PROGRAM, Setpoint};

/// 输出字段频率（Hz），与机械臂控制周期一致
pub const OUTPUT_FREQUENCY: f64 = 125.0;

/// 终止回调
pub type ExitCallback = Arc<dyn Fn(&LoopExit) + Send + Sync>;

/// 输入字段组句柄表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterHandles {
    handles: [FieldGroupHandle; RegisterGroup::COUNT],
}

impl RegisterHandles {
    #[inline]
    pub fn get(&self, group: RegisterGroup) -> FieldGroupHandle {
        self.handles[group.index()]
    }
}

/// 声明输出字段和全部输入字段组
pub fn declare_registers<L: RealtimeLink + ?Sized>(
    link: &mut L,
    frequency: f64,
) -> Result<RegisterHandles, LinkError> {
    link.declare_output_fields(&OUTPUT_FIELD_NAMES, &OUTPUT_FIELD_TYPES, frequency)?;

    let mut handles = [FieldGroupHandle::default(); RegisterGroup::COUNT];
    for group in RegisterGroup::ALL {
        handles[group.index()] = link.declare_input_fields(group.field_names(), group.field_types())?;
    }
    Ok(RegisterHandles { handles })
}

/// 控制循环退出原因
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// 调用了 `stop()`
    StopRequested,
    /// 链路未返回状态
    ConnectionLost,
    /// 周期开始时邮箱为空
    MissingSetpoint,
    /// 某个寄存器组写入失败
    SendFailure {
        group: RegisterGroup,
        message: String,
    },
    /// 链路在控制线程中 panic
    LinkPanic(String),
}

impl LoopExit {
    /// 是否为故障退出
    pub fn is_fault(&self) -> bool {
        !matches!(self, LoopExit::StopRequested)
    }

    /// 对应的错误（正常停止时为 None）
    pub fn error(&self) -> Option<DriverError> {
        match self {
            LoopExit::StopRequested => None,
            LoopExit::ConnectionLost => Some(DriverError::ConnectionLost),
            LoopExit::MissingSetpoint => Some(DriverError::MissingSetpoint),
            LoopExit::SendFailure { group, message } => Some(DriverError::SendFailure {
                group: *group,
                message: message.clone(),
            }),
            LoopExit::LinkPanic(message) => Some(DriverError::LinkPanic(message.clone())),
        }
    }
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            Some(err) => write!(f, "{}", err),
            None => f.write_str("Stop requested"),
        }
    }
}

/// 应用线程与控制线程共享的上下文
#[derive(Debug, Default)]
pub struct LoopContext {
    pub mailbox: SetpointMailbox,
    pub params: SharedParameters,
    pub metrics: LoopMetrics,
    pub state: AtomicLoopState,
    pub stop_requested: AtomicBool,
    /// 最近一帧状态（仅控制线程写入）
    pub latest: ArcSwapOption<ArmState>,
    /// 最近一次运行的退出原因
    pub exit: Mutex<Option<LoopExit>>,
}

impl LoopContext {
    pub fn new(params: LoopParameters) -> Self {
        Self {
            params: SharedParameters::new(params),
            ..Default::default()
        }
    }
}

/// 由设定点和参数构造寄存器帧
///
/// lookahead / gain 取自 Position 设定点，加速度取自 Velocity 设定点，
/// 其余标量取自参数。
pub fn build_frame(setpoint: &Setpoint, setpoint_number: i32, params: &LoopParameters) -> RegisterFrame {
    let mut frame = RegisterFrame {
        setpoint_type: setpoint.kind(),
        target: setpoint.target().copied(),
        setpoint_number,
        velocity_limit: params.velocity_limit,
        acceleration_limit: params.acceleration_limit,
        lookahead: params.lookahead,
        gain: params.gain,
        speed_fraction: params.speed_scale,
    };
    match *setpoint {
        Setpoint::Position {
            lookahead, gain, ..
        } => {
            frame.lookahead = lookahead;
            frame.gain = gain;
        },
        Setpoint::Velocity { acceleration, .. } => {
            frame.acceleration_limit = acceleration;
        },
        Setpoint::Halt => {},
    }
    frame
}

/// 控制循环
///
/// 独占链路；只能在单个线程上运行。
pub struct ControlLoop<L> {
    link: L,
    handles: RegisterHandles,
    ctx: Arc<LoopContext>,
    observers: ObserverSet,
    watchdog: WatchdogCounter,
    max_speed_scale: Option<f64>,
}

impl<L: RealtimeLink> ControlLoop<L> {
    pub fn new(
        link: L,
        handles: RegisterHandles,
        ctx: Arc<LoopContext>,
        observers: ObserverSet,
    ) -> Self {
        Self {
            link,
            handles,
            ctx,
            observers,
            watchdog: WatchdogCounter::new(),
            max_speed_scale: None,
        }
    }

    /// 执行一个周期，返回已写出的寄存器帧
    pub fn cycle(&mut self) -> Result<RegisterFrame, LoopExit> {
        let state = self.link.receive().ok_or(LoopExit::ConnectionLost)?;

        let max_speed_scale = match self.max_speed_scale {
            Some(max) => max,
            None => {
                let ceiling = sanitize_ceiling(state.target_speed_fraction);
                self.ctx.params.latch_speed_ceiling(ceiling);
                self.max_speed_scale = Some(ceiling);
                info!("Speed scale ceiling latched at {}", ceiling);
                ceiling
            },
        };

        self.ctx.latest.store(Some(Arc::new(state)));

        let failures = self.observers.notify_all(&state);
        if failures > 0 {
            self.ctx.metrics.observer_failures.fetch_add(failures as u64, Ordering::Relaxed);
        }

        let setpoint = self.ctx.mailbox.take().ok_or(LoopExit::MissingSetpoint)?;
        let setpoint_number = self.watchdog.kick();

        let (params, clamped) = self.ctx.params.clamp_speed_scale(max_speed_scale);
        if clamped {
            self.ctx.metrics.speed_scale_clamps.fetch_add(1, Ordering::Relaxed);
        }

        let frame = build_frame(&setpoint, setpoint_number, &params);
        self.send_frame(&frame)?;

        self.ctx.metrics.cycles.fetch_add(1, Ordering::Relaxed);
        trace!(
            "Cycle {}: {:?} speed_scale={}",
            setpoint_number, frame.setpoint_type, frame.speed_fraction
        );
        Ok(frame)
    }

    fn send_frame(&mut self, frame: &RegisterFrame) -> Result<(), LoopExit> {
        for group in frame.send_order() {
            let Some(values) = frame.group_values(group) else {
                continue;
            };
            match self.link.send(self.handles.get(group), &values) {
                Ok(()) => {
                    self.ctx.metrics.register_writes.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => {
                    self.ctx.metrics.write_failures.fetch_add(1, Ordering::Relaxed);
                    return Err(LoopExit::SendFailure {
                        group,
                        message: e.to_string(),
                    });
                },
            }
        }
        Ok(())
    }

    /// 运行直到停止请求或故障
    pub fn run(&mut self) -> LoopExit {
        loop {
            // Acquire: 看到 true 时，stop() 之前的写入均可见
            if self.ctx.stop_requested.load(Ordering::Acquire) {
                info!("Control loop: stop requested");
                return LoopExit::StopRequested;
            }
            if let Err(exit) = self.cycle() {
                warn!("Control loop exiting: {}", exit);
                return exit;
            }
        }
    }

    /// 最近一次写出的看门狗序号
    pub fn setpoint_number(&self) -> i32 {
        self.watchdog.current()
    }

    /// 第一个周期锁定的速度上限
    pub fn max_speed_scale(&self) -> Option<f64> {
        self.max_speed_scale
    }

    pub fn context(&self) -> &Arc<LoopContext> {
        &self.ctx
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

/// 关闭序列各步骤的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stop_program: bool,
    pub pause: bool,
    pub disconnect: bool,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stop_program && self.pause && self.disconnect
    }
}

/// 关闭序列：`stop program` → pause → disconnect
///
/// 每一步都会执行，前一步失败（包括 panic）不影响后一步；失败只记录日志。
pub fn shutdown_sequence<L, C>(link: &mut L, channel: &mut C) -> ShutdownReport
where
    L: RealtimeLink + ?Sized,
    C: CommandChannel + ?Sized,
{
    ShutdownReport {
        stop_program: shutdown_step("send stop program", || channel.send_raw_program(STOP_PROGRAM)),
        pause: shutdown_step("pause link", || link.pause()),
        disconnect: shutdown_step("disconnect link", || link.disconnect()),
    }
}

fn shutdown_step(name: &str, step: impl FnOnce() -> Result<(), LinkError>) -> bool {
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Shutdown: failed to {}: {}", name, e);
            false
        },
        Err(payload) => {
            error!("Shutdown: {} panicked: {}", name, panic_message(payload.as_ref()));
            false
        },
    }
}

/// 控制线程主体
///
/// 运行循环，执行关闭序列，记录退出原因，调用终止回调，最后通知等待者。
pub fn control_thread<L, C>(
    mut control: ControlLoop<L>,
    mut channel: C,
    on_exit: Option<ExitCallback>,
    exit_tx: Sender<LoopExit>,
) where
    L: RealtimeLink,
    C: CommandChannel,
{
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Control thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set control thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    // 链路 panic 同样汇合到关闭序列
    let exit = match catch_unwind(AssertUnwindSafe(|| control.run())) {
        Ok(exit) => exit,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Control loop panicked: {}", message);
            LoopExit::LinkPanic(message)
        },
    };
    let ctx = control.context().clone();

    ctx.state.set(LoopState::Stopping, Ordering::Release);
    ctx.mailbox.clear();

    let report = shutdown_sequence(control.link_mut(), &mut channel);
    if report.is_clean() {
        info!("Shutdown sequence completed");
    } else {
        warn!("Shutdown sequence completed with failures: {:?}", report);
    }

    *ctx.exit.lock() = Some(exit.clone());
    ctx.state.set(LoopState::Stopped, Ordering::Release);

    if let Some(callback) = on_exit
        && catch_unwind(AssertUnwindSafe(|| callback(&exit))).is_err()
    {
        warn!("Exit callback panicked");
    }

    // 没有等待者时接收端可能已被丢弃
    let _ = exit_tx.send(exit);
}
