use std::fmt;

/// Control message sent back to the feed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Directive {
    /// Start receiving node and block events for a chain.
    Subscribe(String),
    /// Enable or disable finality (vote) events.
    SendFinality(bool),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Subscribe(chain) => write!(f, "subscribe:{chain}"),
            Directive::SendFinality(enabled) => {
                write!(f, "send-finality:{}", if *enabled { 1 } else { 0 })
            }
        }
    }
}
