use msgbus::message::Message;
use msgbus_macros::message;

#[message]
struct PlayerJoined {
    name: String,
    level: u32,
}

fn main() {
    assert!(PlayerJoined::TYPE_NAME.ends_with("::PlayerJoined"));

    let joined = PlayerJoined {
        name: "Player 1".into(),
        level: 69,
    };
    // 默认派生：Clone + PartialEq + Debug
    assert_eq!(joined.clone(), joined);
    let _ = format!("{joined:?}");
}
