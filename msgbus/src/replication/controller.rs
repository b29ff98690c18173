//! 复制控制器（Replication Controller）
//!
//! 发布侧：
//! - 无活动会话 → 强制 `OwnerOnly`，本地分发；
//! - `OwnerOnly` → 本地分发，不产生流量；
//! - `Everyone` / `HostOnly` → 编码后发往权威节点；发布者本身即权威节点时直接本地交接。
//!
//! 接收侧：
//! - `ToAuthority`：仅权威节点接受；`HostOnly` 本地分发，`Everyone` 广播后本地分发一次；
//! - `Broadcast`：解码后本地分发。
//!
//! 接收侧错误记录后丢弃，同时返回给传输循环。
//!
use super::{Delivery, Frame, PeerId, Transport};
use crate::bus::Bus;
use crate::dispatcher::DispatchReport;
use crate::error::{BusError, BusResult, TransportError};
use crate::message::Envelope;
use crate::packet::{self, Packet};
use std::sync::Arc;
use tracing::{debug, warn};

/// 网络会话：总线当前挂接的传输
pub(crate) struct Session {
    transport: Arc<dyn Transport>,
}

impl Session {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

/// 一次发布的去向
#[derive(Debug)]
pub enum Published {
    /// 在本节点完成分发
    Dispatched(DispatchReport),
    /// 已入队发往权威节点
    Forwarded { authority: PeerId },
    /// 本节点为权威节点：已广播给对端并完成本地分发
    Broadcast {
        report: DispatchReport,
        peers: Vec<PeerId>,
    },
}

impl Published {
    /// 本节点的分发结果；仅转发时为 `None`
    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            Published::Dispatched(report) | Published::Broadcast { report, .. } => Some(report),
            Published::Forwarded { .. } => None,
        }
    }
}

/// 一次接收的处理结果
#[derive(Debug)]
pub enum Received {
    Dispatched(DispatchReport),
    /// 权威节点已原样转播给对端；`local` 为本节点回环分发的结果
    ///
    /// 本节点无法还原载荷时（如从未登记该类型）只影响本地分发，对端照常收到。
    Relayed {
        peers: Vec<PeerId>,
        local: BusResult<DispatchReport>,
    },
}

impl Received {
    /// 本节点的分发结果；回环解码失败时为 `None`
    pub fn report(&self) -> Option<&DispatchReport> {
        match self {
            Received::Dispatched(report) => Some(report),
            Received::Relayed { local, .. } => local.as_ref().ok(),
        }
    }
}

pub(crate) fn publish(
    bus: &Bus,
    envelope: &Envelope<'_>,
    policy: Delivery,
) -> BusResult<Published> {
    let session = bus.session().filter(|s| s.transport().is_active());

    let Some(session) = session else {
        if policy.is_replicated() {
            debug!(message = envelope.label(), %policy, "no active session, delivering locally");
        }
        return Ok(Published::Dispatched(bus.dispatch_local(envelope)));
    };

    if !policy.is_replicated() {
        return Ok(Published::Dispatched(bus.dispatch_local(envelope)));
    }

    let transport = session.transport();
    let packet = packet::encode(envelope)?;
    // 接收方无法还原的报文在发送前拦下，按发布侧错误返回
    packet.validate().map_err(|err| match err {
        BusError::InvalidPacket { reason } => BusError::invalid_message(reason),
        other => other,
    })?;

    let authority = transport
        .authority()
        .ok_or_else(|| BusError::authority_unavailable("no authority in session"))?;

    if authority == transport.local_peer() {
        debug!(message = envelope.label(), %policy, "publishing as authority");
        return Ok(match policy {
            Delivery::Everyone => {
                let peers = broadcast(transport, &packet)?;
                Published::Broadcast {
                    report: bus.dispatch_local(envelope),
                    peers,
                }
            }
            _ => Published::Dispatched(bus.dispatch_local(envelope)),
        });
    }

    let bytes = Frame::ToAuthority { policy, packet }.to_bytes()?;
    transport
        .send(&[authority], &bytes)
        .map_err(|e| match e {
            TransportError::PeerUnreachable(_) | TransportError::Closed => {
                BusError::authority_unavailable(e.to_string())
            }
            other => BusError::Transport(other),
        })?;

    debug!(message = envelope.label(), %policy, %authority, "forwarded to authority");
    Ok(Published::Forwarded { authority })
}

pub(crate) fn receive(bus: &Bus, from: PeerId, bytes: &[u8]) -> BusResult<Received> {
    handle_frame(bus, from, bytes).inspect_err(|err| {
        warn!(%from, error = %err, "receipt dropped");
    })
}

fn handle_frame(bus: &Bus, from: PeerId, bytes: &[u8]) -> BusResult<Received> {
    let limit = bus.config().max_frame_bytes;
    if bytes.len() > limit {
        return Err(BusError::invalid_packet(format!(
            "frame of {} bytes exceeds limit {limit}",
            bytes.len()
        )));
    }

    match Frame::from_bytes(bytes)? {
        Frame::Broadcast { packet } => {
            let decoded = packet::decode(bus.types(), &packet)?;
            Ok(Received::Dispatched(bus.dispatch_local(&decoded.envelope())))
        }
        Frame::ToAuthority { policy, packet } => {
            let session = bus
                .session()
                .filter(|s| s.transport().is_authority())
                .ok_or_else(|| BusError::invalid_packet("frame routed to a non-authority peer"))?;

            match policy {
                Delivery::Everyone => {
                    // 先转播原始报文，再为本节点解码；发布者同样在广播对象之内
                    let peers = broadcast(session.transport(), &packet)?;
                    let local = packet::decode(bus.types(), &packet)
                        .map(|decoded| bus.dispatch_local(&decoded.envelope()))
                        .inspect_err(|err| {
                            warn!(%from, error = %err, "relayed, local dispatch skipped");
                        });
                    debug!(%from, peers = peers.len(), "relayed");
                    Ok(Received::Relayed { peers, local })
                }
                Delivery::HostOnly => {
                    let decoded = packet::decode(bus.types(), &packet)?;
                    Ok(Received::Dispatched(bus.dispatch_local(&decoded.envelope())))
                }
                Delivery::OwnerOnly => Err(BusError::invalid_packet(
                    "owner-only message must not cross the network",
                )),
            }
        }
    }
}

/// 广播给所有已连接对端；部分对端不可达只记录，不影响其余对端与本地分发
fn broadcast(transport: &dyn Transport, packet: &Packet) -> BusResult<Vec<PeerId>> {
    let local = transport.local_peer();
    let peers: Vec<PeerId> = transport
        .connected_peers()
        .into_iter()
        .filter(|p| *p != local)
        .collect();
    if peers.is_empty() {
        return Ok(peers);
    }

    let bytes = Frame::Broadcast {
        packet: packet.clone(),
    }
    .to_bytes()?;
    if let Err(err) = transport.send(&peers, &bytes) {
        warn!(error = %err, "broadcast partially failed");
    }
    Ok(peers)
}
