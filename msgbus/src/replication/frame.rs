use super::Delivery;
use crate::error::{BusError, BusResult};
use crate::packet::Packet;
use serde::{Deserialize, Serialize};

/// 路由帧：报文外层的一跳路由信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Frame {
    /// 对端 → 权威节点，附带发布者请求的策略
    ToAuthority { policy: Delivery, packet: Packet },
    /// 权威节点 → 所有对端
    Broadcast { packet: Packet },
}

impl Frame {
    pub fn packet(&self) -> &Packet {
        match self {
            Frame::ToAuthority { packet, .. } | Frame::Broadcast { packet } => packet,
        }
    }

    pub fn to_bytes(&self) -> BusResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> BusResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| BusError::invalid_packet(format!("malformed frame: {e}")))
    }
}
