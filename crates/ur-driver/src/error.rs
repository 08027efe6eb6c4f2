//! 驱动层错误类型定义

use thiserror::Error;
use ur_link::LinkError;
use ur_protocol::RegisterGroup;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 实时链路错误（启动阶段）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 命令通道错误（打开或上传程序失败）
    #[error("Command channel error: {0}")]
    CommandChannel(LinkError),

    /// 链路未返回状态（连接丢失）
    #[error("Connection lost")]
    ConnectionLost,

    /// 当前周期邮箱为空
    #[error("No setpoint available for this cycle")]
    MissingSetpoint,

    /// 寄存器写入失败
    #[error("Failed to send {group:?} registers: {message}")]
    SendFailure {
        group: RegisterGroup,
        message: String,
    },

    /// 链路实现在控制线程中 panic
    #[error("Link panicked: {0}")]
    LinkPanic(String),

    /// 无效的 servo 命令（未修改任何状态）
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// 观察者 panic（已隔离）
    #[error("Observer failure: {0}")]
    ObserverFailure(String),

    /// 控制循环正在运行
    #[error("Control loop already running")]
    AlreadyRunning,

    /// 控制循环从未启动
    #[error("Control loop not started")]
    NotStarted,

    /// 控制线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,
}
