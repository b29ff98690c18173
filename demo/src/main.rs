use msgbus::{
    Arg, Args, Bus, CallbackResult, Callbacks, Delivery, EventSender, LocalNetwork, Subscribe,
    Subscriber, Transport, UnbindPolicy, message,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::info;

#[message(name = "demo::PlayerScored")]
struct PlayerScored {
    player: String,
    points: u32,
}

/// 记分板：类型化订阅
#[derive(Default)]
struct Scoreboard {
    node: &'static str,
    total: AtomicU32,
}

impl Subscribe<PlayerScored> for Scoreboard {
    fn on_published(&self, scored: &PlayerScored) -> CallbackResult {
        let total = self.total.fetch_add(scored.points, Ordering::SeqCst) + scored.points;
        info!(node = self.node, player = %scored.player, total, "score updated");
        Ok(())
    }
}

impl Subscriber for Scoreboard {
    fn callbacks(&self) -> Callbacks<Self> {
        Callbacks::new().subscribe::<PlayerScored>()
    }
}

/// 大门：命名回调，同时接受无参与带参两种形式
struct Gate {
    node: &'static str,
}

impl Subscriber for Gate {
    fn callbacks(&self) -> Callbacks<Self> {
        Callbacks::<Self>::new()
            .method("Open", &["Unlock"], |g| {
                info!(node = g.node, "gate opened");
                Ok(())
            })
            .method_with::<Args, _>("open_by", &["Open"], |g, args| {
                info!(node = g.node, by = args.text("who").unwrap_or("?"), "gate opened by");
                Ok(())
            })
    }
}

/// 随宿主启停的界面组件
struct Hud;

impl Subscriber for Hud {
    fn callbacks(&self) -> Callbacks<Self> {
        Callbacks::new().on::<PlayerScored, _>(|_, scored| {
            info!(player = %scored.player, "hud flash");
            Ok(())
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,msgbus=debug".into()),
        )
        .init();

    let net = LocalNetwork::new();
    let mut nodes = Vec::new();
    for (name, (transport, inbox)) in [("host", net.host()), ("p1", net.join()), ("p2", net.join())] {
        let bus = Bus::new();
        info!(node = name, peer = %transport.local_peer(), "node online");
        bus.attach(transport);

        let scoreboard = Arc::new(Scoreboard {
            node: name,
            ..Default::default()
        });
        bus.subscribe(&scoreboard);
        bus.subscribe(&Arc::new(Gate { node: name }));

        tokio::spawn(inbox.serve(bus.clone()));
        nodes.push((bus, scoreboard));
    }
    let p1 = nodes[1].0.clone();

    // p1 得分：经权威节点广播给所有节点
    p1.publish(&PlayerScored {
        player: "p1".into(),
        points: 10,
    })?;

    // 仅权威节点处理
    p1.publish_event_with("Unlock", Delivery::HostOnly)?;

    // 带参数的事件发送器：先发带参事件，再发无参事件
    EventSender::new("Open")
        .arg(Arg::text("who", "p1"))
        .send(&p1)?;

    // 生命周期绑定：停用后不再收到消息
    let hud = Arc::new(Hud);
    let binding = p1.bind(&hud, UnbindPolicy::OnDeactivate);
    binding.on_activate();
    p1.publish_with(
        &PlayerScored {
            player: "p1".into(),
            points: 5,
        },
        Delivery::OwnerOnly,
    )?;
    binding.on_deactivate();

    tokio::time::sleep(Duration::from_millis(50)).await;

    for (bus, scoreboard) in &nodes {
        info!(
            node = scoreboard.node,
            total = scoreboard.total.load(Ordering::SeqCst),
            subscribers = bus.subscriber_count(),
            "final"
        );
    }

    net.shutdown_authority();
    if let Err(err) = p1.publish(&PlayerScored {
        player: "p1".into(),
        points: 1,
    }) {
        info!(error = %err, "publish after authority shutdown");
    }

    Ok(())
}
