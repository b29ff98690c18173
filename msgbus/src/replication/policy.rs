use serde::{Deserialize, Serialize};
use std::fmt;

/// 投递策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// 权威节点处理后广播给所有对端（包括发布者）
    #[default]
    Everyone,
    /// 仅权威节点处理，不再广播
    HostOnly,
    /// 仅在发布者本地分发，不产生网络流量
    OwnerOnly,
}

impl Delivery {
    /// 是否需要经过权威节点
    pub fn is_replicated(self) -> bool {
        !matches!(self, Delivery::OwnerOnly)
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Delivery::Everyone => "everyone",
            Delivery::HostOnly => "host_only",
            Delivery::OwnerOnly => "owner_only",
        };
        f.write_str(s)
    }
}
