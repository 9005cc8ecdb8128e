use std::fmt;

/// Identifier of a channel definition (`tel`, `mail`, `im/xmpp`, ...).
///
/// Names are stored verbatim in the sink, so they are restricted to a short
/// ASCII alphabet: the first character is alphanumeric, the rest are
/// alphanumeric or one of `.`, `_`, `/`, `-`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChannelName(String);

impl ChannelName {
    pub const MAX_BYTES: usize = 64;

    pub fn new(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > Self::MAX_BYTES || !raw.is_ascii() {
            return None;
        }
        let mut chars = raw.chars();
        let first = chars.next()?;
        if !first.is_ascii_alphanumeric() {
            return None;
        }
        if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '/' | '-')) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
