//! TCP 命令通道
//!
//! 控制器的脚本端口（默认 30002）接收纯文本 URScript，每条以换行结尾。

use crate::{CommandChannel, LinkError};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

/// 默认命令端口
pub const DEFAULT_COMMAND_PORT: u16 = 30002;

/// 基于 TCP 的命令通道
#[derive(Debug)]
pub struct TcpCommandChannel {
    stream: TcpStream,
    peer: String,
}

impl TcpCommandChannel {
    /// 连接到控制器命令端口
    pub fn open(host: &str, port: u16) -> Result<Self, LinkError> {
        let stream = TcpStream::connect((host, port))?;
        Self::from_stream(stream, format!("{}:{}", host, port))
    }

    /// 带超时的连接
    pub fn open_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, LinkError> {
        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No address for {}:{}", host, port),
            ))
        })?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        Self::from_stream(stream, format!("{}:{}", host, port))
    }

    fn from_stream(stream: TcpStream, peer: String) -> Result<Self, LinkError> {
        stream.set_nodelay(true)?;
        info!("Command channel connected to {}", peer);
        Ok(Self { stream, peer })
    }

    /// 对端地址
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl CommandChannel for TcpCommandChannel {
    fn send_raw_program(&mut self, text: &str) -> Result<(), LinkError> {
        debug!("Sending {} bytes to {}", text.len() + 1, self.peer);
        self.stream.write_all(text.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_send_raw_program_appends_newline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).unwrap();
            received
        });

        {
            let mut channel = TcpCommandChannel::open("127.0.0.1", port).unwrap();
            assert_eq!(channel.peer(), format!("127.0.0.1:{}", port));
            channel.send_raw_program("stop program").unwrap();
            // drop 关闭连接，服务端 read_to_string 返回
        }

        assert_eq!(server.join().unwrap(), "stop program\n");
    }

    #[test]
    fn test_open_refused() {
        // 绑定后立即释放，端口大概率无人监听
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = TcpCommandChannel::open_timeout("127.0.0.1", port, Duration::from_millis(200));
        assert!(matches!(result, Err(LinkError::Io(_))));
    }
}
