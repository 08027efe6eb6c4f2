//! 观察者（Observer）
//!
//! 控制线程每个周期收到状态后，按注册顺序调用全部观察者。
//! 观察者集合在循环启动前确定，运行期间不可修改。
//!
//! 单个观察者 panic 会被捕获、记录并计数，不影响同一周期的寄存器写入。
//!
//! # 使用示例
//!
//! ```rust
//! use ur_driver::hooks::{ObserverSet, StateObserver};
//! use ur_protocol::ArmState;
//! use crossbeam_channel::bounded;
//! use std::sync::Arc;
//!
//! let (tx, rx) = bounded(16);
//! let mut observers = ObserverSet::new();
//! observers.add(Arc::new(move |state: &ArmState| {
//!     let _ = tx.try_send(state.actual_q);
//! }));
//!
//! let failures = observers.notify_all(&ArmState::default());
//! assert_eq!(failures, 0);
//! assert!(rx.try_recv().is_ok());
//! ```

use crate::error::DriverError;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;
use ur_protocol::ArmState;

/// 状态观察者
///
/// 在控制线程上同步调用，耗时直接占用控制周期（8ms）。
/// 需要做重活的观察者应当只把数据 `try_send` 到自己的线程。
pub trait StateObserver: Send + Sync {
    fn on_state(&self, state: &ArmState);
}

impl<F> StateObserver for F
where
    F: Fn(&ArmState) + Send + Sync,
{
    fn on_state(&self, state: &ArmState) {
        self(state)
    }
}

/// 观察者集合
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn StateObserver>>,
}

impl ObserverSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn add(&mut self, observer: Arc<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// 按注册顺序调用全部观察者，返回失败（panic）的数量
    pub fn notify_all(&self, state: &ArmState) -> usize {
        let mut failures = 0;
        for (index, observer) in self.observers.iter().enumerate() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer.on_state(state))) {
                failures += 1;
                let err = DriverError::ObserverFailure(format!(
                    "observer #{} panicked: {}",
                    index,
                    panic_message(payload.as_ref())
                ));
                warn!("{}", err);
            }
        }
        failures
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut observers = ObserverSet::new();
        for id in 0..3 {
            let log = log.clone();
            observers.add(Arc::new(move |_: &ArmState| log.lock().push(id)));
        }

        assert_eq!(observers.len(), 3);
        assert_eq!(observers.notify_all(&ArmState::default()), 0);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_observer_isolated() {
        struct Faulty;
        impl StateObserver for Faulty {
            fn on_state(&self, _state: &ArmState) {
                panic!("observer bug");
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = ObserverSet::new();
        observers.add(Arc::new(Faulty));
        {
            let seen = seen.clone();
            observers.add(Arc::new(move |state: &ArmState| {
                seen.lock().push(state.target_speed_fraction)
            }));
        }

        let failures = observers.notify_all(&ArmState::with_speed_fraction(0.4));
        assert_eq!(failures, 1);
        // 后续观察者仍被调用
        assert_eq!(*seen.lock(), vec![0.4]);
    }

    #[test]
    fn test_struct_observer() {
        struct Counter(Mutex<u32>);
        impl StateObserver for Counter {
            fn on_state(&self, _state: &ArmState) {
                *self.0.lock() += 1;
            }
        }

        let counter = Arc::new(Counter(Mutex::new(0)));
        let mut observers = ObserverSet::new();
        observers.add(counter.clone());
        observers.notify_all(&ArmState::default());
        observers.notify_all(&ArmState::default());
        assert_eq!(*counter.0.lock(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
