#[test]
fn ui_pass() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/message_basic.rs");
    t.pass("tests/ui/message_named.rs");
    t.pass("tests/ui/message_enum.rs");
}
