/// Subject-tag protocol shared with the whitelisted contacts
pub const COMMAND_PREFIX: &str = "[cmd]";
pub const PING_PREFIX: &str = "[ping]";
pub const PRINT_PREFIX: &str = "[bot]";

/// Action selected for a message by its subject prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Command,
    Ping,
    Print,
    Ignore,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Command => "command",
            Tag::Ping => "ping",
            Tag::Print => "print",
            Tag::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-sensitive prefix match. A missing subject is never dispatched.
pub fn classify(subject: Option<&str>) -> Tag {
    match subject {
        Some(s) if s.starts_with(COMMAND_PREFIX) => Tag::Command,
        Some(s) if s.starts_with(PING_PREFIX) => Tag::Ping,
        Some(s) if s.starts_with(PRINT_PREFIX) => Tag::Print,
        _ => Tag::Ignore,
    }
}

/// Shell command carried by a `[cmd]` subject, surrounding whitespace removed
pub fn command_text(subject: &str) -> Option<&str> {
    subject.strip_prefix(COMMAND_PREFIX).map(str::trim)
}
