//! 内存网络（LocalNetwork）
//!
//! 以 tokio 无界通道模拟“一个权威节点 + N 个对端”的会话：
//! 每个对端持有一个 `LocalTransport`（发送端）和一个 `Inbox`（接收端），
//! 同一发送方的帧按发送顺序到达。
//!
use super::{PeerId, Transport};
use crate::bus::Bus;
use crate::error::TransportError;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::debug;

/// 一条入站帧
#[derive(Debug, Clone)]
pub struct Inbound {
    pub from: PeerId,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct Hub {
    peers: DashMap<PeerId, UnboundedSender<Inbound>>,
    authority: ArcSwapOption<PeerId>,
    next_id: AtomicU64,
}

/// 内存网络
#[derive(Clone, Default)]
pub struct LocalNetwork {
    hub: Arc<Hub>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入网络并成为权威节点（替换已有的权威节点）
    pub fn host(&self) -> (LocalTransport, Inbox) {
        let (transport, inbox) = self.connect();
        self.hub.authority.store(Some(Arc::new(transport.id)));
        debug!(peer = %transport.id, "authority hosted");
        (transport, inbox)
    }

    /// 以普通对端身份加入网络
    pub fn join(&self) -> (LocalTransport, Inbox) {
        let (transport, inbox) = self.connect();
        debug!(peer = %transport.id, "peer joined");
        (transport, inbox)
    }

    /// 关闭权威节点：其后所有远程发布都会得到 `AuthorityUnavailable`
    pub fn shutdown_authority(&self) -> Option<PeerId> {
        let authority = self.hub.authority.swap(None).map(|id| *id)?;
        self.hub.peers.remove(&authority);
        debug!(peer = %authority, "authority shut down");
        Some(authority)
    }

    /// 断开指定对端；其 `Inbox` 在取完剩余帧后结束
    pub fn disconnect(&self, peer: PeerId) -> bool {
        if self.authority() == Some(peer) {
            return self.shutdown_authority().is_some();
        }
        let removed = self.hub.peers.remove(&peer).is_some();
        if removed {
            debug!(%peer, "peer disconnected");
        }
        removed
    }

    pub fn authority(&self) -> Option<PeerId> {
        current_authority(&self.hub)
    }

    /// 当前在线的全部对端（升序）
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.hub.peers.iter().map(|e| *e.key()).collect();
        peers.sort_unstable();
        peers
    }

    fn connect(&self) -> (LocalTransport, Inbox) {
        let id = PeerId(self.hub.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.peers.insert(id, tx);
        (
            LocalTransport {
                id,
                hub: Arc::clone(&self.hub),
            },
            Inbox { id, rx },
        )
    }
}

fn current_authority(hub: &Hub) -> Option<PeerId> {
    hub.authority.load().as_deref().copied()
}

/// 内存网络上的传输端点
#[derive(Clone)]
pub struct LocalTransport {
    id: PeerId,
    hub: Arc<Hub>,
}

impl Transport for LocalTransport {
    fn local_peer(&self) -> PeerId {
        self.id
    }

    fn authority(&self) -> Option<PeerId> {
        current_authority(&self.hub)
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .hub
            .peers
            .iter()
            .map(|e| *e.key())
            .filter(|p| *p != self.id)
            .collect();
        peers.sort_unstable();
        peers
    }

    fn is_active(&self) -> bool {
        self.hub.peers.contains_key(&self.id)
    }

    /// 逐个对端入队；不可达的对端不影响其余对端，返回遇到的第一个错误
    fn send(&self, peers: &[PeerId], bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_active() {
            return Err(TransportError::Closed);
        }

        let mut first_error = None;
        for peer in peers {
            let delivered = self.hub.peers.get(peer).is_some_and(|tx| {
                tx.send(Inbound {
                    from: self.id,
                    bytes: bytes.to_vec(),
                })
                .is_ok()
            });
            if !delivered && first_error.is_none() {
                first_error = Some(TransportError::PeerUnreachable(*peer));
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport").field("id", &self.id).finish()
    }
}

/// 对端的接收队列
#[derive(Debug)]
pub struct Inbox {
    id: PeerId,
    rx: UnboundedReceiver<Inbound>,
}

impl Inbox {
    pub fn peer(&self) -> PeerId {
        self.id
    }

    pub fn try_next(&mut self) -> Option<Inbound> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }

    /// 同步取出当前已到达的全部帧并交给总线，返回处理的帧数
    ///
    /// 接收侧错误已由 `Bus::receive` 记录，这里不再向上传播。
    pub fn drain_into(&mut self, bus: &Bus) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(inbound) => {
                    let _ = bus.receive(inbound.from, &inbound.bytes);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// 持续接收直到本对端断开
    pub async fn serve(mut self, bus: Bus) {
        while let Some(inbound) = self.rx.recv().await {
            let _ = bus.receive(inbound.from, &inbound.bytes);
        }
        debug!(peer = %self.id, "inbox closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_join_assign_distinct_peers() {
        let net = LocalNetwork::new();
        let (host, _host_inbox) = net.host();
        let (a, _a_inbox) = net.join();
        let (b, _b_inbox) = net.join();

        assert_eq!(host.authority(), Some(host.local_peer()));
        assert!(host.is_authority());
        assert!(!a.is_authority());
        assert_eq!(a.connected_peers(), vec![host.local_peer(), b.local_peer()]);
        assert_eq!(net.peers().len(), 3);
    }

    #[test]
    fn frames_arrive_in_send_order() {
        let net = LocalNetwork::new();
        let (host, mut inbox) = net.host();
        let (peer, _peer_inbox) = net.join();

        for i in 0..5_u8 {
            peer.send(&[host.local_peer()], &[i]).unwrap();
        }

        let received: Vec<u8> = std::iter::from_fn(|| inbox.try_next())
            .map(|m| {
                assert_eq!(m.from, peer.local_peer());
                m.bytes[0]
            })
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shutdown_authority_makes_it_unreachable() {
        let net = LocalNetwork::new();
        let (host, _host_inbox) = net.host();
        let (peer, _peer_inbox) = net.join();

        assert_eq!(net.shutdown_authority(), Some(host.local_peer()));
        assert_eq!(peer.authority(), None);
        assert!(!host.is_active());
        assert_eq!(
            peer.send(&[host.local_peer()], b"x"),
            Err(TransportError::PeerUnreachable(host.local_peer()))
        );
        assert_eq!(host.send(&[peer.local_peer()], b"x"), Err(TransportError::Closed));
    }
}
