// File: ./src/model/mod.rs
pub mod item;
pub(crate) mod payload;

pub use item::{
    ActivityType, ClassEntry, LearningTask, Lesson, NewsAttachment, NewsItem, PresenceEntry,
    Submission, SubmissionKind, SubmissionStatus, TaskAttachment, UNKNOWN_LABEL, UserProfile,
    far_future, sort_by_urgency,
};
