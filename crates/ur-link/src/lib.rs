//! # UR Link Layer
//!
//! 实时链路与命令通道的统一抽象。
//!
//! - [`RealtimeLink`]: 周期性寄存器交换通道（约 125Hz），字段表需预先声明
//! - [`CommandChannel`]: 一次性上传机械臂端程序文本的通道
//!
//! 链路的帧编解码、握手和字段表协商属于具体实现，不在本 crate 范围内。

use std::fmt;
use thiserror::Error;
use ur_protocol::{ArmState, FieldType, FieldValue, ProtocolError};

pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use tcp::TcpCommandChannel;

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Link not connected")]
    NotConnected,
    #[error("Link not started")]
    NotStarted,
    #[error("Field setup rejected: {0}")]
    SetupRejected(String),
    #[error("Unknown field group handle: {0}")]
    UnknownHandle(FieldGroupHandle),
    #[error("Device Error: {0}")]
    Device(String),
}

/// 输入字段组句柄（声明时由链路分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldGroupHandle(pub u8);

impl fmt::Display for FieldGroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 机械臂控制器版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ControllerVersion {
    pub major: u32,
    pub minor: u32,
    pub bugfix: u32,
    pub build: u32,
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.bugfix, self.build
        )
    }
}

/// 实时链路
///
/// 控制循环独占链路：运行期间不允许其他线程调用任何方法。
pub trait RealtimeLink {
    fn connect(&mut self) -> Result<(), LinkError>;
    fn disconnect(&mut self) -> Result<(), LinkError>;

    /// 连接后报告的控制器版本（可选）
    fn controller_version(&self) -> Option<ControllerVersion> {
        None
    }

    /// 声明输出字段（机械臂 → 本机），`frequency` 为输出频率（Hz）
    fn declare_output_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
        frequency: f64,
    ) -> Result<(), LinkError>;

    /// 声明一个输入字段组（本机 → 机械臂），返回写入时使用的句柄
    fn declare_input_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
    ) -> Result<FieldGroupHandle, LinkError>;

    fn start(&mut self) -> Result<(), LinkError>;
    fn pause(&mut self) -> Result<(), LinkError>;

    /// 阻塞等待下一帧状态；`None` 表示连接已丢失
    fn receive(&mut self) -> Option<ArmState>;

    /// 写入一个字段组
    fn send(&mut self, handle: FieldGroupHandle, values: &[FieldValue]) -> Result<(), LinkError>;
}

/// 命令通道
pub trait CommandChannel {
    /// 上传原始程序文本（末尾自动追加换行）
    fn send_raw_program(&mut self, text: &str) -> Result<(), LinkError>;
}

impl<T: RealtimeLink + ?Sized> RealtimeLink for Box<T> {
    fn connect(&mut self) -> Result<(), LinkError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        (**self).disconnect()
    }

    fn controller_version(&self) -> Option<ControllerVersion> {
        (**self).controller_version()
    }

    fn declare_output_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
        frequency: f64,
    ) -> Result<(), LinkError> {
        (**self).declare_output_fields(names, types, frequency)
    }

    fn declare_input_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
    ) -> Result<FieldGroupHandle, LinkError> {
        (**self).declare_input_fields(names, types)
    }

    fn start(&mut self) -> Result<(), LinkError> {
        (**self).start()
    }

    fn pause(&mut self) -> Result<(), LinkError> {
        (**self).pause()
    }

    fn receive(&mut self) -> Option<ArmState> {
        (**self).receive()
    }

    fn send(&mut self, handle: FieldGroupHandle, values: &[FieldValue]) -> Result<(), LinkError> {
        (**self).send(handle, values)
    }
}

impl<T: CommandChannel + ?Sized> CommandChannel for Box<T> {
    fn send_raw_program(&mut self, text: &str) -> Result<(), LinkError> {
        (**self).send_raw_program(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_display() {
        assert_eq!(format!("{}", LinkError::NotConnected), "Link not connected");
        assert_eq!(format!("{}", LinkError::NotStarted), "Link not started");
        let msg = format!("{}", LinkError::UnknownHandle(FieldGroupHandle(9)));
        assert!(msg.contains("#9"));
        let msg = format!("{}", LinkError::Device("cable".to_string()));
        assert!(msg.contains("Device") && msg.contains("cable"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: LinkError = ProtocolError::InvalidSetpointType(5).into();
        assert!(matches!(
            err,
            LinkError::Protocol(ProtocolError::InvalidSetpointType(5))
        ));
    }

    #[test]
    fn test_controller_version_display_and_order() {
        let v1 = ControllerVersion {
            major: 3,
            minor: 15,
            bugfix: 7,
            build: 106331,
        };
        let v2 = ControllerVersion {
            major: 5,
            minor: 11,
            bugfix: 0,
            build: 0,
        };
        assert_eq!(format!("{}", v1), "3.15.7.106331");
        assert!(v1 < v2);
    }
}
