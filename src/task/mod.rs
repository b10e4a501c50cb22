//! Task model for tierwatch.
//!
//! A task is created by the dispatcher on submission and mutated by whichever
//! tier currently owns it. Records are serialized as JSON by the store:
//!
//! ```text
//! {
//!   "id": "T-M2X9K41",
//!   "title": "Fix login API",
//!   "domain": "backend",
//!   "priority": "high",
//!   "status": "pending_approval",
//!   ...
//! }
//! ```

use crate::error::{Result, TierwatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;


/// Longest accepted task title, in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Identifier of a task, e.g. `T-M2X9K41`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from a timestamp and a per-process sequence number.
    pub fn generate(now: DateTime<Utc>, seq: u32) -> Self {
        let millis = now.timestamp_millis().max(0) as u64;
        Self(format!("T-{}{}", to_base36(millis), to_base36(seq as u64)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be placed (new, rejected, or requeued after a bridge failure).
    Pending,
    /// Holding a pool slot or in flight on a tier.
    Running,
    /// Parked until an operator approves or rejects it.
    PendingApproval,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl TaskStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::PendingApproval => "pending_approval",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "1" => Some(Self::High),
            "medium" | "2" => Some(Self::Medium),
            "low" | "3" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

/// Work domain used for account affinity routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Architecture,
    Backend,
    Frontend,
    Quality,
    /// No recognized hint; routed purely by utilization.
    Generic,
}

/// Keyword table for [`Domain::from_hint`]. First match wins.
const DOMAIN_KEYWORDS: &[(&str, Domain)] = &[
    ("architect", Domain::Architecture),
    ("architecture", Domain::Architecture),
    ("contract", Domain::Architecture),
    ("types", Domain::Architecture),
    ("config", Domain::Architecture),
    ("backend", Domain::Backend),
    ("api", Domain::Backend),
    ("database", Domain::Backend),
    ("db", Domain::Backend),
    ("migration", Domain::Backend),
    ("query", Domain::Backend),
    ("sql", Domain::Backend),
    ("frontend", Domain::Frontend),
    ("ui", Domain::Frontend),
    ("component", Domain::Frontend),
    ("page", Domain::Frontend),
    ("design", Domain::Frontend),
    ("css", Domain::Frontend),
    ("style", Domain::Frontend),
    ("i18n", Domain::Frontend),
    ("translation", Domain::Frontend),
    ("animation", Domain::Frontend),
    ("qa", Domain::Quality),
    ("quality", Domain::Quality),
    ("test", Domain::Quality),
    ("e2e", Domain::Quality),
    ("lint", Domain::Quality),
    ("audit", Domain::Quality),
    ("security", Domain::Quality),
    ("docs", Domain::Quality),
    ("documentation", Domain::Quality),
];

impl Domain {
    /// Map a free-form hint to a domain.
    ///
    /// The hint is split into lowercase words and checked against the keyword
    /// table; anything unrecognized is `Generic`.
    pub fn from_hint(hint: &str) -> Self {
        let words: Vec<String> = hint
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_ascii_lowercase())
            .collect();

        DOMAIN_KEYWORDS
            .iter()
            .find(|(keyword, _)| words.iter().any(|w| w == keyword))
            .map(|(_, domain)| *domain)
            .unwrap_or(Domain::Generic)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Architecture => "architecture",
            Domain::Backend => "backend",
            Domain::Frontend => "frontend",
            Domain::Quality => "quality",
            Domain::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Execution tier in the cascade, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Tier 1: the account pool.
    Pool,
    /// Tier 2: the credit-limited fast executor.
    Fast,
    /// Tier 3: the human-gated last-resort bridge.
    LastResort,
}

impl Tier {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Tier::Pool),
            2 => Some(Tier::Fast),
            3 => Some(Tier::LastResort),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Tier::Pool => 1,
            Tier::Fast => 2,
            Tier::LastResort => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Pool => "pool",
            Tier::Fast => "fast",
            Tier::LastResort => "last_resort",
        };
        f.write_str(s)
    }
}

/// A unit of work moving through the cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,

    /// The hint as submitted, kept for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_hint: Option<String>,

    /// Resolved domain used for routing.
    pub domain: Domain,

    #[serde(default)]
    pub priority: Priority,

    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,

    /// Skip tiers 1-2 and go straight to the last-resort path.
    #[serde(default)]
    pub force_override: bool,

    /// Tier that currently owns (or last owned) the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,

    /// Account holding the slot while the task runs on tier 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task, validating the submission.
    ///
    /// # Errors
    ///
    /// `MalformedTask` when the title is blank, too long, or contains control
    /// characters other than newlines and tabs.
    pub fn new(
        id: TaskId,
        title: &str,
        domain_hint: Option<&str>,
        priority: Option<Priority>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TierwatchError::MalformedTask(
                "task title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(TierwatchError::MalformedTask(format!(
                "task title exceeds {} characters",
                MAX_TITLE_CHARS
            )));
        }
        if title
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t')
        {
            return Err(TierwatchError::MalformedTask(
                "task title contains control characters".to_string(),
            ));
        }

        let domain_hint = domain_hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        let domain = domain_hint
            .as_deref()
            .map(Domain::from_hint)
            .unwrap_or(Domain::Generic);

        Ok(Self {
            id,
            title: title.to_string(),
            domain_hint,
            domain,
            priority: priority.unwrap_or_default(),
            created_at: now,
            status: TaskStatus::Pending,
            force_override: false,
            tier: None,
            account_id: None,
            result: None,
            updated_at: None,
        })
    }

    pub fn with_force_override(mut self, force: bool) -> Self {
        self.force_override = force;
        self
    }
}
