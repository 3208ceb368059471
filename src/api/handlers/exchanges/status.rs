//! Exchange lifecycle states and the transition rules between them.

use std::fmt;

/// Lifecycle of an exchange between two users.
///
/// `pending` moves to `accepted`, `rejected`, or `cancelled`; `accepted` to
/// `in_progress` or `cancelled`; `in_progress` to `completed` or `cancelled`.
/// `rejected`, `completed`, and `cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExchangeStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl ExchangeStatus {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Transitions allowed by the lifecycle; anything else is a state
    /// conflict, including re-asserting the current status.
    pub(crate) fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected | Self::Cancelled)
                | (Self::Accepted, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Completed | Self::Cancelled)
        )
    }

    /// Accepting or rejecting a request is reserved for the provider.
    pub(crate) fn provider_only(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Only exchanges that never became active may be deleted outright.
    pub(crate) fn deletable(self) -> bool {
        matches!(self, Self::Pending | Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the two parties plan to meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MeetingPreference {
    Online,
    InPerson,
    Hybrid,
}

impl MeetingPreference {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "online" => Some(Self::Online),
            "in_person" => Some(Self::InPerson),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::InPerson => "in_person",
            Self::Hybrid => "hybrid",
        }
    }
}
