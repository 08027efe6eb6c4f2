//! 控制器门面
//!
//! 对外提供 `Controller`：应用线程通过 `servo()` / `stop()` / `speed_scale()` 与
//! 控制线程交互，控制线程的实现细节（链路、寄存器、关闭序列）对调用方不可见。

use crate::builder::ControllerBuilder;
use crate::command::ServoCommand;
use crate::error::DriverError;
use crate::hooks::{ObserverSet, StateObserver};
use crate::metrics::LoopMetricsSnapshot;
use crate::params::LoopParameters;
use crate::pipeline::{
    ControlLoop, ExitCallback, LoopContext, LoopExit, RegisterHandles, control_thread,
    declare_registers,
};
use crate::state::LoopState;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info, warn};
use ur_link::{CommandChannel, ControllerVersion, RealtimeLink, TcpCommandChannel};
use ur_protocol::{ArmState, ProgramConfig, render_program};
use ur_tools::{JointLimits, check_joint_limits};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        let (tx, rx) = bounded(1);

        // 由辅助线程执行阻塞的 join
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 控制器启动参数（由 Builder 生成）
pub(crate) struct ControllerSettings {
    pub host: String,
    pub rtde_port: u16,
    pub command_port: u16,
    pub program: ProgramConfig,
    pub parameters: LoopParameters,
    pub observers: ObserverSet,
    pub on_exit: Option<ExitCallback>,
    pub output_frequency: f64,
    pub joint_limits: Option<JointLimits>,
}

/// UR 机械臂伺服控制器
///
/// # 使用示例
///
/// ```rust,no_run
/// use ur_driver::{Controller, ServoCommand};
/// # fn connect_link() -> Box<dyn ur_link::RealtimeLink + Send> { unimplemented!() }
///
/// let controller = Controller::builder("192.168.1.10").build();
///
/// // 启动前先放入第一个设定点
/// controller.servo(ServoCommand::halt())?;
/// controller.start(connect_link())?;
///
/// controller.servo(ServoCommand::position([0.0, -1.57, 1.57, 0.0, 1.57, 0.0]))?;
/// controller.stop();
/// # Ok::<(), ur_driver::DriverError>(())
/// ```
pub struct Controller {
    ctx: Arc<LoopContext>,
    host: String,
    rtde_port: u16,
    command_port: u16,
    program: ProgramConfig,
    output_frequency: f64,
    joint_limits: Option<JointLimits>,
    observers: Mutex<ObserverSet>,
    on_exit: Option<ExitCallback>,
    version: Mutex<Option<ControllerVersion>>,
    exit_rx: Mutex<Option<Receiver<LoopExit>>>,
    control_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// 创建 Builder
    pub fn builder(host: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder::new(host)
    }

    pub(crate) fn from_settings(settings: ControllerSettings) -> Self {
        Self {
            ctx: Arc::new(LoopContext::new(settings.parameters)),
            host: settings.host,
            rtde_port: settings.rtde_port,
            command_port: settings.command_port,
            program: settings.program,
            output_frequency: settings.output_frequency,
            joint_limits: settings.joint_limits,
            observers: Mutex::new(settings.observers),
            on_exit: settings.on_exit,
            version: Mutex::new(None),
            exit_rx: Mutex::new(None),
            control_thread: Mutex::new(None),
        }
    }

    /// 提交 servo 命令
    ///
    /// 命令无效时返回 `InvalidCommand`，且不修改任何状态。
    /// 启动前也可以调用（用于放入第一个周期的设定点）。
    pub fn servo(&self, command: ServoCommand) -> Result<(), DriverError> {
        command.validate()?;
        if let (Some(limits), Some(target)) = (self.joint_limits.as_ref(), command.position_target()) {
            check_joint_limits(target, Some(limits))
                .map_err(|e| DriverError::InvalidCommand(e.to_string()))?;
        }

        let params = self.ctx.params.apply(command.overrides());
        let setpoint = command.to_setpoint(&params)?;
        if self.ctx.mailbox.put(setpoint) {
            self.ctx.metrics.mailbox_overwrites.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// 请求停止（幂等，不阻塞）
    ///
    /// 控制线程在下一个周期开始时退出并执行关闭序列。
    /// 停止请求只作用于当前运行：`start()` 会清除它，因此在 `Idle` / `Stopped`
    /// 状态下调用的 `stop()` 不会阻止下一次启动。
    pub fn stop(&self) {
        // Release: 控制线程看到 true 时，之前的写入均可见
        if !self.ctx.stop_requested.swap(true, Ordering::AcqRel) && self.is_running() {
            info!("Stop requested");
        }
    }

    /// 设置（`Some`）或读取（`None`）期望的速度缩放
    ///
    /// 控制循环每周期把它钳位到 `[0, 机械臂上报的上限]`，返回当前值。
    pub fn speed_scale(&self, value: Option<f64>) -> f64 {
        match value {
            Some(v) if v.is_finite() => self.ctx.params.set_speed_scale(v),
            Some(v) => warn!("Ignoring non-finite speed scale {}", v),
            None => {},
        }
        self.ctx.params.speed_scale()
    }

    /// 打开命令通道并启动控制循环
    pub fn start<L>(&self, link: L) -> Result<(), DriverError>
    where
        L: RealtimeLink + Send + 'static,
    {
        let prior = self.begin_start()?;
        let channel = match TcpCommandChannel::open(&self.host, self.command_port) {
            Ok(channel) => channel,
            Err(e) => {
                self.ctx.state.set(prior, Ordering::Release);
                return Err(DriverError::CommandChannel(e));
            },
        };
        self.launch(link, channel, prior)
    }

    /// 使用给定的命令通道启动控制循环
    pub fn start_with<L, C>(&self, link: L, channel: C) -> Result<(), DriverError>
    where
        L: RealtimeLink + Send + 'static,
        C: CommandChannel + Send + 'static,
    {
        let prior = self.begin_start()?;
        self.launch(link, channel, prior)
    }

    /// Idle / Stopped → Starting，返回之前的状态
    fn begin_start(&self) -> Result<LoopState, DriverError> {
        let prior = self.ctx.state.get(Ordering::Acquire);
        if !prior.can_start()
            || !self.ctx.state.compare_exchange(
                prior,
                LoopState::Starting,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
        {
            return Err(DriverError::AlreadyRunning);
        }

        // 上一次运行的线程已经走完关闭序列
        if let Some(handle) = self.control_thread.lock().take()
            && handle.join().is_err()
        {
            error!("Previous control thread panicked");
        }

        self.ctx.stop_requested.store(false, Ordering::Release);
        *self.ctx.exit.lock() = None;
        Ok(prior)
    }

    fn launch<L, C>(&self, mut link: L, mut channel: C, prior: LoopState) -> Result<(), DriverError>
    where
        L: RealtimeLink + Send + 'static,
        C: CommandChannel + Send + 'static,
    {
        let handles = match self.bring_up(&mut link, &mut channel) {
            Ok(handles) => handles,
            Err(e) => {
                error!("Controller start failed: {}", e);
                self.ctx.state.set(prior, Ordering::Release);
                return Err(e);
            },
        };

        let observers = self.observers.lock().clone();
        let control = ControlLoop::new(link, handles, self.ctx.clone(), observers);
        let on_exit = self.on_exit.clone();
        let (exit_tx, exit_rx) = bounded(1);

        self.ctx.state.set(LoopState::Running, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("ur-control".to_string())
            .spawn(move || control_thread(control, channel, on_exit, exit_tx));

        match spawned {
            Ok(handle) => {
                *self.exit_rx.lock() = Some(exit_rx);
                *self.control_thread.lock() = Some(handle);
                info!("Control loop started");
                Ok(())
            },
            Err(e) => {
                self.ctx.state.set(LoopState::Stopped, Ordering::Release);
                Err(DriverError::IoThread(format!(
                    "failed to spawn control thread: {}",
                    e
                )))
            },
        }
    }

    /// 连接、声明字段、启动链路、上传程序
    fn bring_up<L, C>(&self, link: &mut L, channel: &mut C) -> Result<RegisterHandles, DriverError>
    where
        L: RealtimeLink,
        C: CommandChannel,
    {
        link.connect()?;

        let version = link.controller_version();
        if let Some(version) = version {
            info!("Connected to controller version {}", version);
        }
        *self.version.lock() = version;

        let result = declare_registers(link, self.output_frequency)
            .and_then(|handles| link.start().map(|_| handles))
            .map_err(DriverError::from)
            .and_then(|handles| {
                channel
                    .send_raw_program(&render_program(&self.program))
                    .map(|_| handles)
                    .map_err(DriverError::CommandChannel)
            });

        if result.is_err() {
            // 连接之后的失败：尽力暂停并断开
            if let Err(e) = link.pause() {
                warn!("Start aborted: failed to pause link: {}", e);
            }
            if let Err(e) = link.disconnect() {
                warn!("Start aborted: failed to disconnect link: {}", e);
            }
        }
        result
    }

    /// 注册观察者（只能在控制循环未运行时调用）
    pub fn add_observer(&self, observer: Arc<dyn StateObserver>) -> Result<(), DriverError> {
        if self.loop_state().is_active() {
            return Err(DriverError::AlreadyRunning);
        }
        self.observers.lock().add(observer);
        Ok(())
    }

    pub fn loop_state(&self) -> LoopState {
        self.ctx.state.get(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.loop_state() == LoopState::Running
    }

    /// 最近一次运行的退出原因
    pub fn exit_reason(&self) -> Option<LoopExit> {
        self.ctx.exit.lock().clone()
    }

    /// 阻塞等待控制循环退出（含关闭序列）
    ///
    /// # 错误
    /// - `NotStarted`: 从未启动
    /// - `Timeout`: 超时前未退出
    pub fn wait_for_exit(&self, timeout: Duration) -> Result<LoopExit, DriverError> {
        let rx = self.exit_rx.lock().clone();
        let Some(rx) = rx else {
            return Err(DriverError::NotStarted);
        };

        match rx.recv_timeout(timeout) {
            Ok(exit) => Ok(exit),
            // 已被其他等待者取走，或通知早已发出
            Err(RecvTimeoutError::Disconnected) => self.exit_reason().ok_or(DriverError::Timeout),
            Err(RecvTimeoutError::Timeout) => {
                if self.loop_state() == LoopState::Stopped {
                    self.exit_reason().ok_or(DriverError::Timeout)
                } else {
                    Err(DriverError::Timeout)
                }
            },
        }
    }

    /// 最近一帧机械臂状态
    pub fn latest_state(&self) -> Option<Arc<ArmState>> {
        self.ctx.latest.load_full()
    }

    pub fn metrics(&self) -> LoopMetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 当前生效的循环参数
    pub fn parameters(&self) -> LoopParameters {
        self.ctx.params.snapshot()
    }

    /// 连接时上报的控制器版本
    pub fn controller_version(&self) -> Option<ControllerVersion> {
        *self.version.lock()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn rtde_port(&self) -> u16 {
        self.rtde_port
    }

    pub fn command_port(&self) -> u16 {
        self.command_port
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.control_thread.lock().take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Control thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
