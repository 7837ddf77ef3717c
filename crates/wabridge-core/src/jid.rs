//! Conversation-address (JID) normalization.

/// Server suffix for direct-message addresses.
pub const USER_SUFFIX: &str = "@s.whatsapp.net";
/// Server suffix for group conversations.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Normalize a recipient into a full conversation address.
///
/// Bare phone numbers are reduced to digits and given the user
/// suffix; anything already carrying a server suffix passes through.
#[must_use]
pub fn normalize(to: &str) -> String {
    let trimmed = to.trim();
    if trimmed.contains('@') {
        return trimmed.to_string();
    }
    format!("{}{USER_SUFFIX}", digits(trimmed))
}

/// Digits-only form of a phone number, as pairing-code requests want.
#[must_use]
pub fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// The bare identifier before the server suffix.
#[must_use]
pub fn bare(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// Whether an address names a group conversation.
#[must_use]
pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_gets_user_suffix() {
        assert_eq!(normalize("15551234567"), "15551234567@s.whatsapp.net");
        assert_eq!(normalize(" +1 (555) 123-4567 "), "15551234567@s.whatsapp.net");
    }

    #[test]
    fn full_addresses_pass_through() {
        assert_eq!(normalize("15551234567@s.whatsapp.net"), "15551234567@s.whatsapp.net");
        assert_eq!(normalize("1234-5678@g.us"), "1234-5678@g.us");
    }

    #[test]
    fn bare_and_group() {
        assert_eq!(bare("15551234567@s.whatsapp.net"), "15551234567");
        assert!(is_group("1234-5678@g.us"));
        assert!(!is_group("15551234567@s.whatsapp.net"));
    }
}
