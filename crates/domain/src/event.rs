//! Outbound webhook events.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aicall::AicallStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ai_created")]
    AiCreated,
    #[serde(rename = "ai_updated")]
    AiUpdated,
    #[serde(rename = "ai_deleted")]
    AiDeleted,
    #[serde(rename = "aicall_status_initializing")]
    AicallInitializing,
    #[serde(rename = "aicall_status_progressing")]
    AicallProgressing,
    #[serde(rename = "aicall_status_pausing")]
    AicallPausing,
    #[serde(rename = "aicall_status_resuming")]
    AicallResuming,
    #[serde(rename = "aicall_status_terminating")]
    AicallTerminating,
    #[serde(rename = "aicall_status_terminated")]
    AicallTerminated,
    #[serde(rename = "aicall_deleted")]
    AicallDeleted,
    #[serde(rename = "aimessage_created")]
    MessageCreated,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::AiCreated => "ai_created",
            EventType::AiUpdated => "ai_updated",
            EventType::AiDeleted => "ai_deleted",
            EventType::AicallInitializing => "aicall_status_initializing",
            EventType::AicallProgressing => "aicall_status_progressing",
            EventType::AicallPausing => "aicall_status_pausing",
            EventType::AicallResuming => "aicall_status_resuming",
            EventType::AicallTerminating => "aicall_status_terminating",
            EventType::AicallTerminated => "aicall_status_terminated",
            EventType::AicallDeleted => "aicall_deleted",
            EventType::MessageCreated => "aimessage_created",
        }
    }

    /// The status event published when an aicall enters `status`.
    pub fn for_status(status: AicallStatus) -> Self {
        match status {
            AicallStatus::Initiating => EventType::AicallInitializing,
            AicallStatus::Progressing => EventType::AicallProgressing,
            AicallStatus::Pausing => EventType::AicallPausing,
            AicallStatus::Resuming => EventType::AicallResuming,
            AicallStatus::Terminating => EventType::AicallTerminating,
            AicallStatus::Terminated => EventType::AicallTerminated,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A webhook event carrying the full entity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub customer_id: Uuid,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub data: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(customer_id: Uuid, kind: EventType, entity: &impl Serialize) -> Self {
        Self {
            customer_id,
            kind,
            data: serde_json::to_value(entity).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_as_str() {
        for (ty, name) in [
            (EventType::AicallInitializing, "aicall_status_initializing"),
            (EventType::MessageCreated, "aimessage_created"),
            (EventType::AiDeleted, "ai_deleted"),
        ] {
            assert_eq!(ty.as_str(), name);
            assert_eq!(serde_json::to_string(&ty).unwrap(), format!("\"{name}\""));
        }
    }

    #[test]
    fn every_status_has_an_event() {
        assert_eq!(
            EventType::for_status(AicallStatus::Initiating),
            EventType::AicallInitializing
        );
        assert_eq!(
            EventType::for_status(AicallStatus::Terminated),
            EventType::AicallTerminated
        );
    }
}
