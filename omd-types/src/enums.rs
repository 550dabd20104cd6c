use serde::{Deserialize, Serialize};

/// A user's vote on a pin. `Clear` is never stored: it is represented by the
/// absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    Down,
    #[default]
    Clear,
    Up,
}

impl VoteValue {
    pub fn as_i8(&self) -> i8 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Clear => 0,
            VoteValue::Up => 1,
        }
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(VoteValue::Down),
            0 => Some(VoteValue::Clear),
            1 => Some(VoteValue::Up),
            _ => None,
        }
    }

    /// The vote that results from pressing `next` while `self` is current:
    /// pressing the same arrow again clears it.
    pub fn toggled(self, next: VoteValue) -> VoteValue {
        if self == next {
            VoteValue::Clear
        } else {
            next
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" | "1" | "+1" => Some(VoteValue::Up),
            "down" | "-1" => Some(VoteValue::Down),
            "clear" | "none" | "0" => Some(VoteValue::Clear),
            _ => None,
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i8()
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        VoteValue::from_i8(value).ok_or_else(|| format!("invalid vote value {}", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FollowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowStatus::Pending => "pending",
            FollowStatus::Accepted => "accepted",
            FollowStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(FollowStatus::Pending),
            "accepted" => Some(FollowStatus::Accepted),
            "rejected" => Some(FollowStatus::Rejected),
            _ => None,
        }
    }
}

/// Folder an uploaded object lands in on the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Posts,
    Profiles,
    Trips,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Posts => "posts",
            MediaKind::Profiles => "profiles",
            MediaKind::Trips => "trips",
        }
    }
}
