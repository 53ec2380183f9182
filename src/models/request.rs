use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::coordinates::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DispatchStatus::Pending)
    }
}

/// Terminal outcome applied to a pending request.
#[derive(Debug, Clone)]
pub enum Resolution {
    Succeeded,
    Failed(DispatchError),
    Cancelled,
}

impl Resolution {
    pub fn status(&self) -> DispatchStatus {
        match self {
            Resolution::Succeeded => DispatchStatus::Succeeded,
            Resolution::Failed(_) => DispatchStatus::Failed,
            Resolution::Cancelled => DispatchStatus::Cancelled,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            Resolution::Succeeded => "success",
            Resolution::Failed(DispatchError::Timeout { .. }) => "timeout",
            Resolution::Failed(DispatchError::Application(_)) => "rejected",
            Resolution::Failed(_) => "error",
            Resolution::Cancelled => "cancelled",
        }
    }
}

/// Point-in-time view of one dispatch attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSnapshot {
    pub id: RequestId,
    pub coordinates: Coordinates,
    pub status: DispatchStatus,
    pub remaining_seconds: u32,
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<DispatchError>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DispatchSnapshot {
    pub fn pending(coordinates: Coordinates, countdown_seconds: u32) -> Self {
        Self {
            id: RequestId::new(),
            coordinates,
            status: DispatchStatus::Pending,
            remaining_seconds: countdown_seconds,
            failure: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Decrements the countdown. Returns `false` once terminal or already at zero.
    pub fn tick(&mut self) -> bool {
        if self.status.is_terminal() || self.remaining_seconds == 0 {
            return false;
        }
        self.remaining_seconds -= 1;
        true
    }

    /// Applies a terminal outcome. Returns `false` if the request already left `Pending`.
    pub fn resolve(&mut self, resolution: Resolution) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = resolution.status();
        self.remaining_seconds = 0;
        self.resolved_at = Some(Utc::now());
        if let Resolution::Failed(err) = resolution {
            self.failure = Some(err);
        }
        true
    }
}

fn serialize_failure<S>(failure: &Option<DispatchError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match failure {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}
