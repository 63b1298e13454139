// File: ./src/model/item.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::EnumIter;

/// Default label for best-effort text fields the portal left blank.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Sentinel deadline for tasks the portal ships without a due date.
/// Sorts such tasks after every real deadline.
pub fn far_future() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap()
        .and_utc()
}

// --- CALENDAR / CLASSES ---

/// What a calendar row represents. The feed mixes real lessons with
/// whole-day markers and due-date echoes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, EnumIter)]
pub enum ActivityType {
    Normal,
    Event,
    Exempt,
    WeekNumber,
    DueTask,
    Unknown,
}

impl ActivityType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Normal,
            2 => Self::Event,
            5 => Self::Exempt,
            7 => Self::WeekNumber,
            10 => Self::DueTask,
            _ => Self::Unknown,
        }
    }
}

/// One row of the per-student calendar, normalized.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    /// Short class code as the feed titles the row, e.g. "09MAT01".
    pub code: String,
    /// Class display name resolved through the staff lookup, or
    /// [`UNKNOWN_LABEL`] when the manager id was absent or unresolvable.
    pub name: String,
    /// Teacher name. Only filled by detail enrichment; [`UNKNOWN_LABEL`]
    /// when enrichment ran but the detail payload omitted it.
    pub teacher: Option<String>,
    /// Portrait URL of the teacher, absolute. Only filled by enrichment.
    pub teacher_photo: Option<String>,
    /// Display form of the room, with substitution markup resolved.
    pub room: String,
    /// The room segment exactly as the feed carried it.
    pub room_raw: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    pub roll_marked: bool,
    pub activity_type: ActivityType,
    /// Lesson instance id, when the row maps to an actual lesson. Feeds
    /// [`fetch_lesson`](crate::client::CompassClient::fetch_lesson) and
    /// detail enrichment.
    pub instance_id: Option<String>,
    pub manager_id: Option<i64>,
}

// --- LESSONS ---

/// A single lesson occurrence with its published plan, if any.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub instance_id: String,
    /// Id of the owning class activity; keys the by-class task feed.
    pub activity_id: i64,
    pub name: String,
    pub teacher: String,
    pub teacher_photo: Option<String>,
    pub room: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    /// Lesson plan HTML with root-relative links rewritten to absolute
    /// portal URLs. `None` when no plan was published.
    pub plan: Option<String>,
}

// --- NEWS ---

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewsAttachment {
    pub name: String,
    /// Absolute download URL. Empty when the feed carried no link.
    pub url: String,
    pub is_image: bool,
    pub original_file_name: String,
}

/// One item of the school news feed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub content1: String,
    pub content2: String,
    pub posted: DateTime<Utc>,
    pub email_sent: Option<DateTime<Utc>>,
    pub priority: bool,
    pub locked: bool,
    pub by_admin: bool,
    pub sender: String,
    /// Absolute URL of the sender's avatar. Empty when absent upstream.
    pub sender_image: String,
    pub attachments: Vec<NewsAttachment>,
}

// --- USER PROFILES ---

/// One timeline period of a user's presence record for the day.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub name: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    /// Raw attendance status code; `-1` when the portal sent null.
    pub status_code: i64,
    pub status_name: String,
    pub present: bool,
    pub teaching_time: bool,
    pub attendance_override: bool,
}

/// Identity and contact details of a portal user, with the day's
/// presence timeline in feed order.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_code: String,
    pub full_name: String,
    pub preferred_name: String,
    pub preferred_last_name: String,
    pub email: String,
    pub house: String,
    pub form_group: String,
    pub year_level: String,
    pub year_level_id: i64,
    pub school_id: String,
    pub school_url: String,
    pub photo: String,
    pub square_photo: String,
    pub presence: Vec<PresenceEntry>,
}

// --- LEARNING TASKS ---

/// Submission state of a learning task, as graded by the portal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, EnumIter)]
pub enum SubmissionStatus {
    OnTime,
    Late,
    NotSubmitted,
    Overdue,
    Unknown,
}

impl SubmissionStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::NotSubmitted,
            2 => Self::Overdue,
            3 => Self::OnTime,
            4 => Self::Late,
            _ => Self::Unknown,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::OnTime | Self::Late)
    }

    /// Urgency rank: overdue first, open next, settled after, unknown last.
    pub fn urgency_rank(&self) -> u8 {
        match self {
            Self::Overdue => 0,
            Self::NotSubmitted => 1,
            Self::OnTime | Self::Late => 2,
            Self::Unknown => 3,
        }
    }
}

/// What a submission consisted of.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, EnumIter)]
pub enum SubmissionKind {
    File,
    Url,
    Unknown,
}

impl SubmissionKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::File,
            2 => Self::Url,
            _ => Self::Unknown,
        }
    }
}

/// A file attached to a learning task by staff.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskAttachment {
    pub name: String,
    pub file_name: String,
    /// Absolute download URL. Empty when the row carried no asset id.
    pub url: String,
}

/// One artifact the student handed in.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub file_name: String,
    pub submitted: DateTime<Utc>,
    /// Absolute download URL. Empty when the row carried no asset id.
    pub url: String,
}

/// A learning task (assignment) with its grading state and submissions.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LearningTask {
    pub id: i64,
    /// Owning class activity; 0 when the feed omitted it.
    pub activity_id: i64,
    /// Short class code, e.g. "09MAT01".
    pub class_code: String,
    /// Full subject name, e.g. "Mathematics".
    pub subject: String,
    pub name: String,
    /// Task description HTML with root-relative links made absolute.
    pub description: String,
    pub created: DateTime<Utc>,
    /// Deadline; [`far_future`] when the portal sent none.
    pub due: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub attachments: Vec<TaskAttachment>,
    pub submissions: Vec<Submission>,
}

impl LearningTask {
    pub fn has_deadline(&self) -> bool {
        self.due != far_future()
    }

    /// Whether anything was handed in at all.
    pub fn is_completed(&self) -> bool {
        !self.submissions.is_empty()
    }

    /// True when every submission arrived after the deadline. Vacuously
    /// true with no submissions; combine with [`Self::is_completed`].
    pub fn is_late(&self) -> bool {
        self.submissions.iter().all(|s| s.submitted > self.due)
    }

    /// Urgency order: status rank first, earlier deadline breaks ties.
    pub fn compare_urgency(&self, other: &Self) -> Ordering {
        self.status
            .urgency_rank()
            .cmp(&other.status.urgency_rank())
            .then_with(|| self.due.cmp(&other.due))
    }
}

/// Sorts tasks most-urgent-first. The sort is stable, so tasks equal in
/// rank and deadline keep their upstream order.
pub fn sort_by_urgency(tasks: &mut [LearningTask]) {
    tasks.sort_by(|a, b| a.compare_urgency(b));
}
