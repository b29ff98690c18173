use msgbus::message::Message;
use msgbus_macros::message;
use serde::{Deserialize, Serialize};

#[message(name = "game.score")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ScoreChanged {
    player_id: u64,
    new_score: i64,
}

fn main() {
    assert_eq!(ScoreChanged::TYPE_NAME, "game.score");
    assert_eq!(ScoreChanged::default().new_score, 0);
}
