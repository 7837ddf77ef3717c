//! Inbound-message auto-reply policy.

use wabridge_core::event::InboundMessage;

/// Whether an inbound event should produce an auto-reply.
///
/// Own-account echoes and events with no extractable text are dropped.
#[must_use]
pub fn should_reply(msg: &InboundMessage) -> bool {
    !msg.from_me && msg.text.as_deref().is_some_and(|t| !t.trim().is_empty())
}

/// The fixed reply template, echoing the received text.
#[must_use]
pub fn echo_reply(text: &str) -> String {
    format!("You said: {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(from_me: bool, text: Option<&str>) -> InboundMessage {
        InboundMessage {
            chat: "15551234567@s.whatsapp.net".into(),
            sender: "15551234567@s.whatsapp.net".into(),
            from_me,
            text: text.map(Into::into),
            push_name: None,
        }
    }

    #[test]
    fn replies_echo_the_text() {
        assert!(echo_reply("hi").contains("hi"));
    }

    #[test]
    fn own_echoes_and_empty_bodies_are_dropped() {
        assert!(should_reply(&msg(false, Some("hi"))));
        assert!(!should_reply(&msg(true, Some("hi"))));
        assert!(!should_reply(&msg(false, None)));
        assert!(!should_reply(&msg(false, Some("  "))));
    }
}
