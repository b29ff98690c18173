use msgbus::message::Message;
use msgbus_macros::message;

#[message(name = "door")]
enum DoorEvent {
    Opened { by: String },
    Closed,
}

fn main() {
    assert_eq!(DoorEvent::TYPE_NAME, "door");
    assert_ne!(DoorEvent::Closed, DoorEvent::Opened { by: "x".into() });
}
