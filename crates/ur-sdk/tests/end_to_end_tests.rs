//! 端到端测试
//!
//! 通过 Mock 链路驱动完整的控制器生命周期：
//! 1. position → halt → 连接丢失
//! 2. 观察者与速度缩放
//! 3. 启动时未放入设定点

use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::time::Duration;
use ur_link::mock::{LinkCall, MockCommandChannel, MockJournal, MockLink};
use ur_protocol::{FieldValue, RegisterGroup, STOP_PROGRAM};
use ur_sdk::prelude::*;

const WAIT: Duration = Duration::from_secs(2);

/// 从第 `skip` 个写入开始，查找某个字段组的值
fn group_values(
    sends: &[(Option<RegisterGroup>, Vec<FieldValue>)],
    skip: usize,
    group: RegisterGroup,
) -> Option<Vec<FieldValue>> {
    sends
        .iter()
        .skip(skip)
        .find(|(g, _)| *g == Some(group))
        .map(|(_, values)| values.clone())
}

#[test]
fn test_position_halt_then_connection_loss() {
    let journal = MockJournal::new();
    let (link, mut feeder) = MockLink::scripted(journal.clone());
    let channel = MockCommandChannel::new(journal.clone());
    let controller = ControllerBuilder::new("localhost").build();

    controller.servo(ServoCommand::position([0.0; 6])).unwrap();
    controller.start_with(link, channel).unwrap();
    assert_eq!(controller.loop_state(), LoopState::Running);

    // 第一个周期：POSITION
    feeder.feed(ArmState::with_speed_fraction(1.0));
    journal
        .wait_for_send(RegisterGroup::SpeedSlider, WAIT)
        .expect("first cycle not completed");

    let sends = journal.sends();
    assert_eq!(sends.len(), 8);
    assert_eq!(
        group_values(&sends, 0, RegisterGroup::SetpointType),
        Some(vec![FieldValue::Int32(SetpointType::Position.code())])
    );
    assert_eq!(
        group_values(&sends, 0, RegisterGroup::Target),
        Some(vec![FieldValue::Double(0.0); 6])
    );
    assert_eq!(
        group_values(&sends, 0, RegisterGroup::SetpointNumber),
        Some(vec![FieldValue::Int32(1)])
    );
    assert_eq!(
        group_values(&sends, 0, RegisterGroup::Lookahead),
        Some(vec![FieldValue::Double(0.1)])
    );
    assert_eq!(
        group_values(&sends, 0, RegisterGroup::Gain),
        Some(vec![FieldValue::Double(300.0)])
    );

    // 第二个周期：HALT，循环继续运行
    controller.servo(ServoCommand::halt()).unwrap();
    feeder.feed(ArmState::with_speed_fraction(1.0));
    journal
        .wait_for_send(RegisterGroup::SpeedSlider, WAIT)
        .expect("second cycle not completed");

    let sends = journal.sends();
    assert_eq!(sends.len(), 8 + 7);
    assert_eq!(
        group_values(&sends, 8, RegisterGroup::SetpointType),
        Some(vec![FieldValue::Int32(SetpointType::Halt.code())])
    );
    assert_eq!(group_values(&sends, 8, RegisterGroup::Target), None);
    assert_eq!(
        group_values(&sends, 8, RegisterGroup::SetpointNumber),
        Some(vec![FieldValue::Int32(2)])
    );
    assert!(controller.is_running());

    // 连接丢失
    feeder.disconnect();
    let exit = controller.wait_for_exit(WAIT).unwrap();
    assert_eq!(exit, LoopExit::ConnectionLost);
    assert_eq!(controller.loop_state(), LoopState::Stopped);
    assert_eq!(
        journal.shutdown_steps(),
        vec![
            LinkCall::Program(STOP_PROGRAM.to_string()),
            LinkCall::Pause,
            LinkCall::Disconnect
        ]
    );

    let metrics = controller.metrics();
    assert_eq!(metrics.cycles, 2);
    assert_eq!(metrics.register_writes, 15);
    assert_eq!(metrics.write_failures, 0);
}

#[test]
fn test_startup_sequence() {
    let journal = MockJournal::new();
    let (link, mut feeder) = MockLink::scripted(journal.clone());
    let controller = ControllerBuilder::new("localhost").build();

    controller.servo(ServoCommand::halt()).unwrap();
    controller
        .start_with(link, MockCommandChannel::new(journal.clone()))
        .unwrap();

    let calls = journal.calls();
    assert_eq!(calls[0], LinkCall::Connect);
    assert!(matches!(calls[1], LinkCall::DeclareOutput { .. }));
    let declared: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            LinkCall::DeclareInput { group, .. } => *group,
            _ => None,
        })
        .collect();
    assert_eq!(declared, RegisterGroup::ALL.to_vec());
    assert_eq!(calls[10], LinkCall::Start);
    assert!(matches!(&calls[11], LinkCall::Program(text) if text.contains("servoj")));
    assert_eq!(
        controller.controller_version().map(|v| v.to_string()),
        Some("5.11.0.0".to_string())
    );

    feeder.disconnect();
    controller.wait_for_exit(WAIT).unwrap();
}

#[test]
fn test_observers_and_speed_scale() {
    struct Faulty;
    impl StateObserver for Faulty {
        fn on_state(&self, _state: &ArmState) {
            panic!("observer bug");
        }
    }

    let (state_tx, state_rx) = unbounded();
    let journal = MockJournal::new();
    let (link, mut feeder) = MockLink::scripted(journal.clone());
    let controller = ControllerBuilder::new("localhost")
        .observer(Arc::new(Faulty))
        .observer(Arc::new(move |state: &ArmState| {
            let _ = state_tx.send(state.target_speed_fraction);
        }))
        .build();

    controller.servo(ServoCommand::halt()).unwrap();
    controller
        .start_with(link, MockCommandChannel::new(journal.clone()))
        .unwrap();

    // 机械臂上报的上限为 0.5，期望值 0.9 被钳位
    controller.speed_scale(Some(0.9));
    feeder.feed(ArmState::with_speed_fraction(0.5));
    let slider = journal.wait_for_send(RegisterGroup::SpeedSlider, WAIT).unwrap();
    assert_eq!(slider, vec![FieldValue::UInt32(1), FieldValue::Double(0.5)]);
    assert_eq!(controller.speed_scale(None), 0.5);

    controller.speed_scale(Some(0.2));
    controller.servo(ServoCommand::halt()).unwrap();
    feeder.feed(ArmState::with_speed_fraction(1.0));
    let slider = journal.wait_for_send(RegisterGroup::SpeedSlider, WAIT).unwrap();
    assert_eq!(slider, vec![FieldValue::UInt32(1), FieldValue::Double(0.2)]);

    // panic 的观察者不影响后续观察者
    assert_eq!(state_rx.recv_timeout(WAIT), Ok(0.5));
    assert_eq!(state_rx.recv_timeout(WAIT), Ok(1.0));
    assert_eq!(controller.metrics().observer_failures, 2);
    assert_eq!(
        controller.latest_state().map(|s| s.target_speed_fraction),
        Some(1.0)
    );

    controller.stop();
    feeder.disconnect();
    let exit = controller.wait_for_exit(WAIT).unwrap();
    assert!(matches!(exit, LoopExit::StopRequested | LoopExit::ConnectionLost));
    assert_eq!(controller.loop_state(), LoopState::Stopped);
}

#[test]
fn test_unprimed_mailbox_stops_loop() {
    let journal = MockJournal::new();
    let (link, feeder) = MockLink::scripted(journal.clone());
    let (exit_tx, exit_rx) = unbounded();
    let controller = ControllerBuilder::new("localhost")
        .on_exit(move |exit| {
            let _ = exit_tx.send(exit.clone());
        })
        .build();

    controller
        .start_with(link, MockCommandChannel::new(journal.clone()))
        .unwrap();
    feeder.feed(ArmState::with_speed_fraction(1.0));

    assert_eq!(controller.wait_for_exit(WAIT).unwrap(), LoopExit::MissingSetpoint);
    assert_eq!(exit_rx.recv_timeout(WAIT), Ok(LoopExit::MissingSetpoint));
    assert!(journal.sends().is_empty());
    assert_eq!(journal.shutdown_steps().len(), 3);
    assert!(matches!(
        controller.exit_reason().and_then(|e| e.error()),
        Some(DriverError::MissingSetpoint)
    ));
}

#[test]
fn test_restart_after_stop() {
    let controller = ControllerBuilder::new("localhost").build();

    for run in 0..2 {
        let journal = MockJournal::new();
        let (link, mut feeder) = MockLink::scripted(journal.clone());
        controller.servo(ServoCommand::halt()).unwrap();
        controller
            .start_with(link, MockCommandChannel::new(journal.clone()))
            .unwrap();

        feeder.feed(ArmState::with_speed_fraction(1.0));
        let number = journal
            .wait_for_send(RegisterGroup::SetpointNumber, WAIT)
            .unwrap();
        // 每次运行的看门狗序号都从 1 开始
        assert_eq!(number, vec![FieldValue::Int32(1)], "run {}", run);

        feeder.disconnect();
        assert_eq!(controller.wait_for_exit(WAIT).unwrap(), LoopExit::ConnectionLost);
    }
}
