use ac_domain::ai::Ai;
use ac_domain::aicall::{Aicall, AicallStatus};
use ac_domain::message::{Message, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default page size when a request does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Newest-first page request.
///
/// `token` is the id of the last record of the previous page; the next page
/// starts right after it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub token: Option<Uuid>,
}

impl Page {
    pub fn first(size: usize) -> Self {
        Self {
            size: Some(size),
            token: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// `deleted: None` matches both live and soft-deleted records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AicallFilter {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub transcribe_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<AicallStatus>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl AicallFilter {
    pub fn live() -> Self {
        Self {
            deleted: Some(false),
            ..Self::default()
        }
    }

    pub fn matches(&self, aicall: &Aicall) -> bool {
        self.customer_id.map_or(true, |c| aicall.customer_id == c)
            && self.reference_id.map_or(true, |r| aicall.reference_id == Some(r))
            && self.transcribe_id.map_or(true, |t| aicall.transcribe_id == Some(t))
            && self.status.map_or(true, |s| aicall.status == s)
            && self.deleted.map_or(true, |d| aicall.is_deleted() == d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl MessageFilter {
    pub fn live() -> Self {
        Self {
            role: None,
            deleted: Some(false),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.role.map_or(true, |r| message.role == r)
            && self.deleted.map_or(true, |d| message.is_deleted() == d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFilter {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

impl AiFilter {
    pub fn matches(&self, ai: &Ai) -> bool {
        self.customer_id.map_or(true, |c| ai.customer_id == c)
            && self.deleted.map_or(true, |d| ai.is_deleted() == d)
    }
}
