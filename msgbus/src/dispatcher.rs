//! 分发器（Dispatcher）
//!
//! 给定信封，在注册表快照上逐个订阅者解析应调用的回调：
//! 1. 宿主生命周期已结束的订阅者：经注册表入口移除并跳过；
//! 2. 类型寻址：仅调用类型完全一致的类型化能力（不做上下转型）；
//! 3. 名称寻址：调用注册名或方法名与事件名一致的全部命名回调（按声明顺序），
//!    若载荷的运行时类型恰有类型化能力，也一并调用；
//! 4. 每次调用相互隔离：`Err` 或 panic 记为 `CallbackFailure`，本轮继续。
//!
//! 参数个数不匹配（无参回调遇到载荷，或单参回调没有载荷/类型不符）一律跳过，不视为错误。
//!
use crate::config::BusConfig;
use crate::error::BusError;
use crate::message::{Discriminator, Envelope};
use crate::registry::{Liveness, Registry};
use crate::subscriber::{CallbackResult, Callbacks, NamedInvoke};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// 一轮分发的结果
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// 实际调用的回调数（含失败）
    pub invoked: usize,
    /// 本轮识别并移除的失效订阅者数
    pub expired: usize,
    /// 逐回调记录的 `CallbackFailure`
    pub failures: Vec<BusError>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }
}

/// 单次回调调用器：负责隔离失败并记录到报告
pub(crate) struct Invoker<'a> {
    config: &'a BusConfig,
    report: &'a mut DispatchReport,
    subscriber: &'static str,
}

impl Invoker<'_> {
    fn call(&mut self, callback: &str, f: impl FnOnce() -> CallbackResult) {
        self.report.invoked += 1;

        let outcome = if self.config.catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(result) => result,
                Err(panic) => Err(anyhow::anyhow!(
                    "callback panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        } else {
            f()
        };

        if let Err(err) = outcome {
            warn!(
                subscriber = self.subscriber,
                callback,
                error = %err,
                "callback failed"
            );
            self.report.failures.push(BusError::CallbackFailure {
                subscriber: self.subscriber,
                callback: callback.to_string(),
                reason: format!("{err:#}"),
            });
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// 对注册表快照执行一轮分发
pub(crate) fn dispatch(
    registry: &Registry,
    config: &BusConfig,
    envelope: &Envelope<'_>,
) -> DispatchReport {
    let started = config.trace_dispatch.then(Instant::now);
    let snapshot = registry.snapshot();
    let mut report = DispatchReport::default();

    for entry in snapshot.iter() {
        let subscriber = entry.label();
        let mut invoker = Invoker {
            config,
            report: &mut report,
            subscriber,
        };

        if entry.deliver(envelope, &mut invoker) == Liveness::Expired {
            // 仅移除该订阅者，不对剩余成员做即时复查
            registry.unregister(entry.key());
            report.expired += 1;
            debug!(subscriber, "expired subscriber unregistered");
        }
    }

    if let Some(started) = started {
        debug!(
            message = envelope.label(),
            subscribers = snapshot.len(),
            invoked = report.invoked,
            failed = report.failures.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "dispatch completed"
        );
    }

    report
}

/// 解析单个订阅者在该信封下应调用的回调
pub(crate) fn resolve<S>(
    subscriber: &S,
    callbacks: &Callbacks<S>,
    envelope: &Envelope<'_>,
    invoker: &mut Invoker<'_>,
) where
    S: Send + Sync + 'static,
{
    match envelope.discriminator() {
        Discriminator::Type(ty) => {
            let (Some(typed), Some(payload)) = (callbacks.typed_for(ty), envelope.payload())
            else {
                return;
            };
            invoker.call(ty.name(), || (typed.call)(subscriber, payload.value()));
        }
        Discriminator::Event(name) => {
            let payload = envelope.payload();

            for named in callbacks.named_for(name) {
                match (&named.invoke, payload) {
                    (NamedInvoke::Nullary(f), None) => {
                        invoker.call(named.method, || f(subscriber));
                    }
                    (NamedInvoke::Unary { ty, call }, Some(p)) if *ty == p.message_type() => {
                        invoker.call(named.method, || call(subscriber, p.value()));
                    }
                    _ => {
                        trace!(
                            subscriber = invoker.subscriber,
                            callback = named.method,
                            event = name,
                            "arity mismatch, skipped"
                        );
                    }
                }
            }

            // 名称寻址与类型寻址并不互斥：载荷类型命中的类型化能力同样触发
            if let Some(p) = payload {
                if let Some(typed) = callbacks.typed_for(p.message_type()) {
                    invoker.call(typed.ty.name(), || (typed.call)(subscriber, p.value()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Entry, SubscriberKey};
    use crate::subscriber::Subscriber;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, Weak};

    #[derive(Default)]
    struct Spy {
        ints: Mutex<Vec<i64>>,
        texts: AtomicUsize,
        pings: AtomicUsize,
        alive: AtomicBool,
    }

    impl Spy {
        fn new() -> Arc<Self> {
            let spy = Self::default();
            spy.alive.store(true, Ordering::SeqCst);
            Arc::new(spy)
        }
    }

    impl Subscriber for Spy {
        fn callbacks(&self) -> Callbacks<Self> {
            Callbacks::<Self>::new()
                .on::<i64, _>(|s, v| {
                    s.ints.lock().unwrap().push(*v);
                    Ok(())
                })
                .method("ping", &["Ping"], |s| {
                    s.pings.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .method_with::<String, _>("on_text", &["Ping"], |s, _| {
                    s.texts.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    fn registry_with(subs: &[&Arc<Spy>]) -> Registry {
        let registry = Registry::default();
        for s in subs {
            registry.register(Arc::new(Entry::strong(s)));
        }
        registry
    }

    #[test]
    fn typed_dispatch_matches_exact_type_only() {
        let spy = Spy::new();
        let registry = registry_with(&[&spy]);
        let config = BusConfig::default();

        let report = dispatch(&registry, &config, &Envelope::typed(&7_i64));
        assert_eq!(report.invoked, 1);
        // i32 与 i64 不互通
        let report = dispatch(&registry, &config, &Envelope::typed(&7_i32));
        assert_eq!(report.invoked, 0);

        assert_eq!(*spy.ints.lock().unwrap(), vec![7]);
    }

    #[test]
    fn named_dispatch_respects_arity() {
        let spy = Spy::new();
        let registry = registry_with(&[&spy]);
        let config = BusConfig::default();

        // 无参：只触发无参回调
        dispatch(&registry, &config, &Envelope::event("Ping"));
        assert_eq!(spy.pings.load(Ordering::SeqCst), 1);
        assert_eq!(spy.texts.load(Ordering::SeqCst), 0);

        // String 载荷：只触发单参 String 回调
        let text = String::from("hi");
        dispatch(&registry, &config, &Envelope::named("Ping", &text));
        assert_eq!(spy.pings.load(Ordering::SeqCst), 1);
        assert_eq!(spy.texts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_event_with_typed_payload_fires_typed_capability_too() {
        let spy = Spy::new();
        let registry = registry_with(&[&spy]);

        let report = dispatch(&registry, &BusConfig::default(), &Envelope::named("Ping", &42_i64));

        assert_eq!(report.invoked, 1);
        assert_eq!(*spy.ints.lock().unwrap(), vec![42]);
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<&'static str>>,
    }

    impl Subscriber for Recorder {
        fn callbacks(&self) -> Callbacks<Self> {
            Callbacks::<Self>::new()
                .on::<i64, _>(|s, _| {
                    s.calls.lock().unwrap().push("typed");
                    Ok(())
                })
                .method_with::<i64, _>("on_ping", &["Ping"], |s, _| {
                    s.calls.lock().unwrap().push("named");
                    Ok(())
                })
        }
    }

    #[test]
    fn named_and_typed_callbacks_on_one_subscriber_both_fire_named_first() {
        let recorder = Arc::new(Recorder::default());
        let registry = Registry::default();
        registry.register(Arc::new(Entry::strong(&recorder)));

        let report = dispatch(&registry, &BusConfig::default(), &Envelope::named("Ping", &42_i64));

        assert_eq!(report.invoked, 2);
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["named", "typed"]);
    }

    #[test]
    fn dead_subscribers_are_unregistered_and_skipped() {
        let alive = Spy::new();
        let dead = Spy::new();
        dead.alive.store(false, Ordering::SeqCst);

        let registry = registry_with(&[&dead, &alive]);
        let report = dispatch(&registry, &BusConfig::default(), &Envelope::typed(&1_i64));

        assert_eq!(report.expired, 1);
        assert_eq!(report.invoked, 1);
        assert!(dead.ints.lock().unwrap().is_empty());
        assert!(!registry.contains(SubscriberKey::of(&dead)));
        assert!(registry.contains(SubscriberKey::of(&alive)));
    }

    #[test]
    fn dropped_weak_subscriber_is_detected_as_expired() {
        let registry = Registry::default();
        let weak: Weak<Spy> = {
            let owned = Spy::new();
            registry.register(Arc::new(Entry::weak(&owned)));
            Arc::downgrade(&owned)
        };
        assert_eq!(registry.len(), 1);

        let report = dispatch(&registry, &BusConfig::default(), &Envelope::typed(&1_i64));
        assert_eq!(report.expired, 1);
        assert_eq!(registry.len(), 0);
        assert!(weak.upgrade().is_none());
    }

    struct Faulty;

    impl Subscriber for Faulty {
        fn callbacks(&self) -> Callbacks<Self> {
            Callbacks::new()
                .method("boom", &["Ping"], |_| Err(anyhow::anyhow!("boom")))
                .method("panics", &["Ping"], |_| panic!("kaboom"))
        }
    }

    #[test]
    fn failures_and_panics_are_isolated() {
        let faulty = Arc::new(Faulty);
        let spy = Spy::new();
        let registry = Registry::default();
        registry.register(Arc::new(Entry::strong(&faulty)));
        registry.register(Arc::new(Entry::strong(&spy)));

        let report = dispatch(&registry, &BusConfig::default(), &Envelope::event("Ping"));

        assert_eq!(report.invoked, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.succeeded(), 1);
        assert!(matches!(
            &report.failures[1],
            BusError::CallbackFailure { callback, reason, .. }
                if callback == "panics" && reason.contains("kaboom")
        ));
        assert_eq!(spy.pings.load(Ordering::SeqCst), 1);
    }
}
