//! Action codes used by the telemetry feed.
//!
//! Every message in a feed batch is tagged with one of these codes. The
//! numeric values are fixed by the upstream feed and must not change.

/// Kind of a decoded feed event.
///
/// Codes outside the known range decode to [`ActionKind::Unknown`] so that a
/// newer feed can add actions without breaking older exporters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    FeedVersion,
    BestBlock,
    BestFinalized,
    AddedNode,
    RemovedNode,
    LocatedNode,
    ImportedBlock,
    FinalizedBlock,
    NodeStats,
    NodeHardware,
    TimeSync,
    AddedChain,
    RemovedChain,
    SubscribedTo,
    UnsubscribedFrom,
    Pong,
    AfgFinalized,
    AfgReceivedPrevote,
    AfgReceivedPrecommit,
    AfgAuthoritySet,
    /// Any code this exporter does not know about.
    Unknown(i64),
}

impl ActionKind {
    /// Maps a wire code to its action kind.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::FeedVersion,
            1 => Self::BestBlock,
            2 => Self::BestFinalized,
            3 => Self::AddedNode,
            4 => Self::RemovedNode,
            5 => Self::LocatedNode,
            6 => Self::ImportedBlock,
            7 => Self::FinalizedBlock,
            8 => Self::NodeStats,
            9 => Self::NodeHardware,
            10 => Self::TimeSync,
            11 => Self::AddedChain,
            12 => Self::RemovedChain,
            13 => Self::SubscribedTo,
            14 => Self::UnsubscribedFrom,
            15 => Self::Pong,
            16 => Self::AfgFinalized,
            17 => Self::AfgReceivedPrevote,
            18 => Self::AfgReceivedPrecommit,
            19 => Self::AfgAuthoritySet,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire code of this action kind.
    pub fn code(&self) -> i64 {
        match self {
            Self::FeedVersion => 0,
            Self::BestBlock => 1,
            Self::BestFinalized => 2,
            Self::AddedNode => 3,
            Self::RemovedNode => 4,
            Self::LocatedNode => 5,
            Self::ImportedBlock => 6,
            Self::FinalizedBlock => 7,
            Self::NodeStats => 8,
            Self::NodeHardware => 9,
            Self::TimeSync => 10,
            Self::AddedChain => 11,
            Self::RemovedChain => 12,
            Self::SubscribedTo => 13,
            Self::UnsubscribedFrom => 14,
            Self::Pong => 15,
            Self::AfgFinalized => 16,
            Self::AfgReceivedPrevote => 17,
            Self::AfgReceivedPrecommit => 18,
            Self::AfgAuthoritySet => 19,
            Self::Unknown(code) => *code,
        }
    }

    /// Returns `false` for [`ActionKind::Unknown`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}
