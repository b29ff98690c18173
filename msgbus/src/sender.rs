use crate::bus::Bus;
use crate::error::BusResult;
use crate::message::{Arg, Args};
use crate::replication::{Delivery, Published};
use serde::{Deserialize, Serialize};

/// 可序列化的事件发送器：事件名 + 参数表 + 投递策略
///
/// `send` 在参数非空时先发布带 `Args` 的命名事件，随后总是发布同名的无参事件，
/// 因此无参回调与带参回调都会被触发。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventSender {
    event_name: String,
    #[serde(default)]
    args: Args,
    #[serde(default)]
    policy: Delivery,
}

impl EventSender {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn policy(mut self, policy: Delivery) -> Self {
        self.policy = policy;
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn send(&self, bus: &Bus) -> BusResult<Vec<Published>> {
        let mut published = Vec::with_capacity(2);
        if !self.args.is_empty() {
            published.push(bus.publish_named_with(&self.event_name, &self.args, self.policy)?);
        }
        published.push(bus.publish_event_with(&self.event_name, self.policy)?);
        Ok(published)
    }
}
