//! Mock 链路（无硬件依赖）
//!
//! [`MockLink`] 与 [`MockCommandChannel`] 共享同一个 [`MockJournal`]，
//! 所有调用按发生顺序记录，便于断言关闭序列等跨组件的调用顺序。
//! 故障通过 [`MockFaults`] 在运行时注入。
//!
//! # 使用示例
//!
//! ```rust
//! use ur_link::mock::{MockCommandChannel, MockJournal, MockLink};
//! use ur_link::{CommandChannel, RealtimeLink};
//! use ur_protocol::ArmState;
//!
//! let journal = MockJournal::new();
//! let (mut link, feeder) = MockLink::scripted(journal.clone());
//! let mut channel = MockCommandChannel::new(journal.clone());
//!
//! feeder.feed(ArmState::with_speed_fraction(1.0));
//! link.connect().unwrap();
//! link.start().unwrap();
//! assert!(link.receive().is_some());
//! channel.send_raw_program("stop program").unwrap();
//! assert_eq!(journal.calls().len(), 3);
//! ```

use crate::{CommandChannel, ControllerVersion, FieldGroupHandle, LinkError, RealtimeLink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use ur_protocol::{ArmState, FieldType, FieldValue, RegisterGroup, STOP_PROGRAM};

/// 调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    Connect,
    Disconnect,
    DeclareOutput {
        names: Vec<String>,
        frequency: f64,
    },
    DeclareInput {
        handle: FieldGroupHandle,
        group: Option<RegisterGroup>,
    },
    Start,
    Pause,
    Send {
        group: Option<RegisterGroup>,
        values: Vec<FieldValue>,
    },
    /// 命令通道上传的文本
    Program(String),
}

impl LinkCall {
    /// 是否为关闭序列中的某一步（stop program / pause / disconnect）
    pub fn is_shutdown_step(&self) -> bool {
        match self {
            LinkCall::Program(text) => text == STOP_PROGRAM,
            LinkCall::Pause | LinkCall::Disconnect => true,
            _ => false,
        }
    }
}

/// 故障注入开关
#[derive(Debug, Clone, Default)]
pub struct MockFaults {
    pub fail_connect: bool,
    pub fail_start: bool,
    pub fail_pause: bool,
    pub fail_disconnect: bool,
    /// 写入该字段组时失败
    pub fail_send_group: Option<RegisterGroup>,
    /// 上传控制程序失败
    pub fail_program_upload: bool,
    /// 发送 stop program 失败
    pub fail_stop_program: bool,
    /// 下一次 receive 返回 None
    pub drop_connection: bool,
    /// 截断输出帧（解码失败，按连接丢失处理）
    pub corrupt_frame: bool,
    /// receive 时 panic（模拟链路实现的缺陷）
    pub panic_on_receive: bool,
}

/// 调用日志（线程安全，可克隆共享）
#[derive(Debug, Clone)]
pub struct MockJournal {
    inner: Arc<JournalInner>,
}

#[derive(Debug)]
struct JournalInner {
    calls: Mutex<Vec<LinkCall>>,
    faults: Mutex<MockFaults>,
    events_tx: Sender<LinkCall>,
    events_rx: Receiver<LinkCall>,
}

impl MockJournal {
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            inner: Arc::new(JournalInner {
                calls: Mutex::new(Vec::new()),
                faults: Mutex::new(MockFaults::default()),
                events_tx,
                events_rx,
            }),
        }
    }

    fn record(&self, call: LinkCall) {
        self.inner.calls.lock().push(call.clone());
        let _ = self.inner.events_tx.send(call);
    }

    /// 全部调用记录（按发生顺序）
    pub fn calls(&self) -> Vec<LinkCall> {
        self.inner.calls.lock().clone()
    }

    /// 所有 Send 调用
    pub fn sends(&self) -> Vec<(Option<RegisterGroup>, Vec<FieldValue>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LinkCall::Send { group, values } => Some((group, values)),
                _ => None,
            })
            .collect()
    }

    /// 关闭序列中的调用（按发生顺序）
    pub fn shutdown_steps(&self) -> Vec<LinkCall> {
        self.calls().into_iter().filter(LinkCall::is_shutdown_step).collect()
    }

    /// 修改故障开关
    pub fn set_faults(&self, update: impl FnOnce(&mut MockFaults)) {
        update(&mut self.inner.faults.lock());
    }

    fn faults(&self) -> MockFaults {
        self.inner.faults.lock().clone()
    }

    /// 等待满足条件的调用（跳过之前的事件）
    pub fn wait_for(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&LinkCall) -> bool,
    ) -> Option<LinkCall> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inner.events_rx.recv_timeout(remaining) {
                Ok(call) if predicate(&call) => return Some(call),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// 等待某个字段组的写入
    pub fn wait_for_send(&self, group: RegisterGroup, timeout: Duration) -> Option<Vec<FieldValue>> {
        match self.wait_for(timeout, |call| {
            matches!(call, LinkCall::Send { group: Some(g), .. } if *g == group)
        })? {
            LinkCall::Send { values, .. } => Some(values),
            _ => None,
        }
    }
}

impl Default for MockJournal {
    fn default() -> Self {
        Self::new()
    }
}

/// 状态来源
enum StateSource {
    /// 由 [`MockArmFeeder`] 逐帧喂入
    Scripted(Receiver<ArmState>),
    /// 每次 receive 都返回同一状态
    Repeating(ArmState),
}

/// Mock 实时链路
pub struct MockLink {
    journal: MockJournal,
    source: StateSource,
    /// 模拟链路周期（None 表示不等待）
    period: Option<Duration>,
    connected: bool,
    started: bool,
    declared: Vec<Option<RegisterGroup>>,
}

/// 向 [`MockLink`] 喂入状态帧
///
/// drop 或调用 [`MockArmFeeder::disconnect`] 后，链路的 receive 返回 None。
#[derive(Debug)]
pub struct MockArmFeeder {
    tx: Option<Sender<ArmState>>,
}

impl MockArmFeeder {
    pub fn feed(&self, state: ArmState) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(state);
        }
    }

    /// 模拟连接断开
    pub fn disconnect(&mut self) {
        self.tx = None;
    }
}

impl MockLink {
    /// 等待喂入的最长时间，超时视为连接丢失
    pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

    /// 创建由测试逐帧驱动的链路
    pub fn scripted(journal: MockJournal) -> (Self, MockArmFeeder) {
        let (tx, rx) = unbounded();
        let link = Self::with_source(journal, StateSource::Scripted(rx));
        (link, MockArmFeeder { tx: Some(tx) })
    }

    /// 创建按固定周期重复返回同一状态的链路
    pub fn repeating(journal: MockJournal, state: ArmState, period: Duration) -> Self {
        let mut link = Self::with_source(journal, StateSource::Repeating(state));
        link.period = Some(period);
        link
    }

    fn with_source(journal: MockJournal, source: StateSource) -> Self {
        Self {
            journal,
            source,
            period: None,
            connected: false,
            started: false,
            declared: Vec::new(),
        }
    }

    fn injected(message: &str) -> LinkError {
        LinkError::Device(format!("injected failure: {}", message))
    }
}

impl RealtimeLink for MockLink {
    fn connect(&mut self) -> Result<(), LinkError> {
        self.journal.record(LinkCall::Connect);
        if self.journal.faults().fail_connect {
            return Err(Self::injected("connect"));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.journal.record(LinkCall::Disconnect);
        self.connected = false;
        self.started = false;
        if self.journal.faults().fail_disconnect {
            return Err(Self::injected("disconnect"));
        }
        Ok(())
    }

    fn controller_version(&self) -> Option<ControllerVersion> {
        self.connected.then_some(ControllerVersion {
            major: 5,
            minor: 11,
            bugfix: 0,
            build: 0,
        })
    }

    fn declare_output_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
        frequency: f64,
    ) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if names.len() != types.len() {
            return Err(LinkError::SetupRejected(format!(
                "{} names for {} types",
                names.len(),
                types.len()
            )));
        }
        self.journal.record(LinkCall::DeclareOutput {
            names: names.iter().map(|s| s.to_string()).collect(),
            frequency,
        });
        Ok(())
    }

    fn declare_input_fields(
        &mut self,
        names: &[&str],
        types: &[FieldType],
    ) -> Result<FieldGroupHandle, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        let group = RegisterGroup::ALL
            .into_iter()
            .find(|g| g.field_names() == names && g.field_types() == types);
        let handle = FieldGroupHandle(self.declared.len() as u8 + 1);
        self.declared.push(group);
        self.journal.record(LinkCall::DeclareInput { handle, group });
        Ok(handle)
    }

    fn start(&mut self) -> Result<(), LinkError> {
        self.journal.record(LinkCall::Start);
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if self.journal.faults().fail_start {
            return Err(Self::injected("start"));
        }
        self.started = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), LinkError> {
        self.journal.record(LinkCall::Pause);
        self.started = false;
        if self.journal.faults().fail_pause {
            return Err(Self::injected("pause"));
        }
        Ok(())
    }

    fn receive(&mut self) -> Option<ArmState> {
        if let Some(period) = self.period {
            spin_sleep::sleep(period);
        }
        let faults = self.journal.faults();
        if faults.panic_on_receive {
            panic!("mock link: injected panic in receive");
        }
        if faults.drop_connection {
            return None;
        }
        let state = match &self.source {
            StateSource::Scripted(rx) => match rx.recv_timeout(Self::RECEIVE_TIMEOUT) {
                Ok(state) => state,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            },
            StateSource::Repeating(state) => *state,
        };

        // 与真实链路一样经过输出字段编解码
        let values = state.to_values();
        let values = if faults.corrupt_frame {
            &values[..values.len() - 1]
        } else {
            &values[..]
        };
        match ArmState::from_values(values) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Mock link: dropping undecodable frame: {}", e);
                None
            },
        }
    }

    fn send(&mut self, handle: FieldGroupHandle, values: &[FieldValue]) -> Result<(), LinkError> {
        if !self.started {
            return Err(LinkError::NotStarted);
        }
        let group = *self
            .declared
            .get((handle.0 as usize).wrapping_sub(1))
            .ok_or(LinkError::UnknownHandle(handle))?;
        self.journal.record(LinkCall::Send {
            group,
            values: values.to_vec(),
        });
        if group.is_some() && self.journal.faults().fail_send_group == group {
            return Err(Self::injected("send"));
        }
        Ok(())
    }
}

/// Mock 命令通道
pub struct MockCommandChannel {
    journal: MockJournal,
}

impl MockCommandChannel {
    pub fn new(journal: MockJournal) -> Self {
        Self { journal }
    }
}

impl CommandChannel for MockCommandChannel {
    fn send_raw_program(&mut self, text: &str) -> Result<(), LinkError> {
        self.journal.record(LinkCall::Program(text.to_string()));
        let faults = self.journal.faults();
        let is_stop = text == STOP_PROGRAM;
        if (is_stop && faults.fail_stop_program) || (!is_stop && faults.fail_program_upload) {
            return Err(Self::injected_error(is_stop));
        }
        Ok(())
    }
}

impl MockCommandChannel {
    fn injected_error(is_stop: bool) -> LinkError {
        LinkError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            if is_stop {
                "injected failure: stop program"
            } else {
                "injected failure: program upload"
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_link() -> (MockLink, MockArmFeeder, MockJournal) {
        let journal = MockJournal::new();
        let (mut link, feeder) = MockLink::scripted(journal.clone());
        link.connect().unwrap();
        (link, feeder, journal)
    }

    #[test]
    fn test_declare_requires_connection() {
        let journal = MockJournal::new();
        let (mut link, _feeder) = MockLink::scripted(journal);
        let group = RegisterGroup::Gain;
        assert!(matches!(
            link.declare_input_fields(group.field_names(), group.field_types()),
            Err(LinkError::NotConnected)
        ));
    }

    #[test]
    fn test_declared_handles_resolve_groups() {
        let (mut link, _feeder, journal) = started_link();
        let mut handles = Vec::new();
        for group in RegisterGroup::ALL {
            handles.push(
                link.declare_input_fields(group.field_names(), group.field_types())
                    .unwrap(),
            );
        }
        link.start().unwrap();
        link.send(handles[RegisterGroup::Gain.index()], &[FieldValue::Double(300.0)])
            .unwrap();

        assert_eq!(
            journal.sends(),
            vec![(Some(RegisterGroup::Gain), vec![FieldValue::Double(300.0)])]
        );
    }

    #[test]
    fn test_send_before_start_fails() {
        let (mut link, _feeder, _journal) = started_link();
        let group = RegisterGroup::Gain;
        let handle = link.declare_input_fields(group.field_names(), group.field_types()).unwrap();
        assert!(matches!(
            link.send(handle, &[FieldValue::Double(1.0)]),
            Err(LinkError::NotStarted)
        ));
    }

    #[test]
    fn test_send_unknown_handle() {
        let (mut link, _feeder, _journal) = started_link();
        link.start().unwrap();
        assert!(matches!(
            link.send(FieldGroupHandle(42), &[]),
            Err(LinkError::UnknownHandle(FieldGroupHandle(42)))
        ));
    }

    #[test]
    fn test_scripted_receive_and_disconnect() {
        let (mut link, mut feeder, _journal) = started_link();
        feeder.feed(ArmState::with_speed_fraction(0.5));
        assert_eq!(link.receive().map(|s| s.target_speed_fraction), Some(0.5));

        feeder.disconnect();
        assert!(link.receive().is_none());
    }

    #[test]
    fn test_corrupt_frame_reads_as_connection_loss() {
        let (mut link, feeder, journal) = started_link();
        feeder.feed(ArmState::with_speed_fraction(0.5));
        feeder.feed(ArmState::with_speed_fraction(0.5));

        journal.set_faults(|f| f.corrupt_frame = true);
        assert!(link.receive().is_none());

        journal.set_faults(|f| f.corrupt_frame = false);
        assert_eq!(link.receive().map(|s| s.target_speed_fraction), Some(0.5));
    }

    #[test]
    #[should_panic(expected = "injected panic")]
    fn test_panic_on_receive() {
        let (mut link, _feeder, journal) = started_link();
        journal.set_faults(|f| f.panic_on_receive = true);
        let _ = link.receive();
    }

    #[test]
    fn test_injected_send_failure() {
        let (mut link, _feeder, journal) = started_link();
        let group = RegisterGroup::Lookahead;
        let handle = link.declare_input_fields(group.field_names(), group.field_types()).unwrap();
        link.start().unwrap();
        journal.set_faults(|f| f.fail_send_group = Some(RegisterGroup::Lookahead));
        assert!(link.send(handle, &[FieldValue::Double(0.1)]).is_err());
        // 失败的写入同样被记录
        assert_eq!(journal.sends().len(), 1);
    }

    #[test]
    fn test_command_channel_faults() {
        let journal = MockJournal::new();
        let mut channel = MockCommandChannel::new(journal.clone());
        journal.set_faults(|f| f.fail_stop_program = true);

        assert!(channel.send_raw_program("def prog():\nend").is_ok());
        assert!(channel.send_raw_program(STOP_PROGRAM).is_err());
        assert_eq!(journal.shutdown_steps(), vec![LinkCall::Program(STOP_PROGRAM.to_string())]);
    }

    #[test]
    fn test_wait_for_skips_unrelated_events() {
        let journal = MockJournal::new();
        let (mut link, _feeder) = MockLink::scripted(journal.clone());
        link.connect().unwrap();
        link.pause().unwrap();
        let found = journal.wait_for(Duration::from_millis(100), |c| *c == LinkCall::Pause);
        assert_eq!(found, Some(LinkCall::Pause));
        assert!(journal.wait_for(Duration::from_millis(10), |_| true).is_none());
    }
}
