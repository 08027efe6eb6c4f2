//! 日志初始化测试
//!
//! `init_logger()` 之后，`log` crate 的记录应转发到 tracing subscriber。

use std::io;
use std::sync::{Arc, Mutex};

/// 把格式化输出写入共享缓冲区
#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_log_records_reach_tracing() {
    ur_sdk::init_logger();
    ur_sdk::init_logger();

    let output = CapturedOutput::default();
    let writer = output.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        log::info!("bridged record from log: cycle {}", 42);
        log::debug!("filtered out at the default level");
    });

    let captured = output.contents();
    assert!(
        captured.contains("bridged record from log: cycle 42"),
        "captured: {:?}",
        captured
    );
    assert!(captured.contains("INFO"));
    assert!(!captured.contains("filtered out"));
}
