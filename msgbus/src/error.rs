//! 消息总线统一错误定义
//!
//! 按传播路径分为三组：
//! - 发布侧（同步返回给发布者）：`InvalidMessage` / `InvalidMessageShape` / `AuthorityUnavailable`；
//! - 接收侧（仅在接收节点记录并丢弃）：`InvalidPacket` / `UnknownType` / `DeserializationFailure`；
//! - 分发侧（逐回调隔离，记录在 `DispatchReport` 中）：`CallbackFailure`。
//!
use crate::replication::PeerId;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    // --- 发布 ---
    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },
    #[error("invalid message shape: {type_name} is bound to a subscriber lifecycle")]
    InvalidMessageShape { type_name: &'static str },
    #[error("authority unavailable: {reason}")]
    AuthorityUnavailable { reason: String },

    // --- 报文/编解码 ---
    #[error("invalid packet: {reason}")]
    InvalidPacket { reason: String },
    #[error("unknown type: {type_name}")]
    UnknownType { type_name: String },
    #[error("deserialization failure: type={type_name}, reason={reason}")]
    DeserializationFailure { type_name: String, reason: String },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // --- 分发 ---
    #[error("callback failure: subscriber={subscriber}, callback={callback}, reason={reason}")]
    CallbackFailure {
        subscriber: &'static str,
        callback: String,
        reason: String,
    },

    // --- 传输 ---
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// 传输层错误（由 `Transport` 实现返回）
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    PeerUnreachable(PeerId),
    #[error("transport closed")]
    Closed,
    #[error("transport error: {0}")]
    Other(String),
}

impl BusError {
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        BusError::InvalidMessage {
            reason: reason.into(),
        }
    }

    pub fn invalid_packet(reason: impl Into<String>) -> Self {
        BusError::InvalidPacket {
            reason: reason.into(),
        }
    }

    pub fn authority_unavailable(reason: impl Into<String>) -> Self {
        BusError::AuthorityUnavailable {
            reason: reason.into(),
        }
    }

    /// 是否为接收侧错误（应记录后丢弃，不影响发送方）
    pub fn is_receipt_error(&self) -> bool {
        matches!(
            self,
            BusError::InvalidPacket { .. }
                | BusError::UnknownType { .. }
                | BusError::DeserializationFailure { .. }
        )
    }
}

/// 统一 Result 类型别名
pub type BusResult<T> = Result<T, BusError>;
