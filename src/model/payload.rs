// File: ./src/model/payload.rs
//
// Wire schemas for the portal's JSON services plus the normalization
// applied when mapping them into the typed records of `item`.
//
// Field optionality mirrors the feeds: a plain field is required and its
// absence fails the decode, an `Option`/`default` field is best-effort
// and falls back to a safe value during mapping.

use crate::error::Error;
use crate::model::item::{
    ActivityType, ClassEntry, LearningTask, Lesson, NewsAttachment, NewsItem, PresenceEntry,
    Submission, SubmissionKind, SubmissionStatus, TaskAttachment, UNKNOWN_LABEL, UserProfile,
    far_future, sort_by_urgency,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Every service wraps its result as `{"d": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub d: T,
}

/// Paged feeds nest their rows one level deeper: `{"d": {"data": [...]}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Paged<T> {
    pub data: Vec<T>,
}

// --- TIMESTAMPS ---

/// Parses the timestamp shapes the portal emits. Offset-carrying values
/// are converted to UTC; naive values are read as already-UTC.
pub(crate) fn parse_portal_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn required_datetime(raw: Option<&str>, field: &'static str) -> Result<DateTime<Utc>, Error> {
    let raw = raw.ok_or(Error::MissingField(field))?;
    parse_portal_datetime(raw).ok_or_else(|| Error::UnreadableField {
        field,
        value: raw.to_string(),
    })
}

// --- URL NORMALIZATION ---

/// Joins a portal-relative path onto the base URL. Absolute and
/// protocol-relative values pass through untouched.
pub(crate) fn absolutize(base: &str, path: &str) -> String {
    if path.is_empty()
        || path.starts_with("http://")
        || path.starts_with("https://")
        || path.starts_with("//")
    {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Download URL of a portal file asset.
pub(crate) fn file_asset_url(base: &str, asset_id: &str) -> String {
    format!("{base}/Services/FileAssets.svc/DownloadFile?id={asset_id}")
}

fn next_link_attr(rest: &str) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for pat in ["src=\"", "src='", "href=\"", "href='"] {
        if let Some(pos) = rest.find(pat)
            && best.is_none_or(|(b, _)| pos < b)
        {
            best = Some((pos, pat.len()));
        }
    }
    best
}

/// Rewrites root-relative `src`/`href` attribute values in an HTML
/// fragment to absolute portal URLs. Protocol-relative (`//cdn...`) and
/// already-absolute values are left alone.
pub(crate) fn rewrite_root_links(html: &str, base: &str) -> String {
    let mut out = String::with_capacity(html.len() + 64);
    let mut rest = html;
    while let Some((pos, len)) = next_link_attr(rest) {
        let after = pos + len;
        out.push_str(&rest[..after]);
        rest = &rest[after..];
        if rest.starts_with('/') && !rest.starts_with("//") {
            out.push_str(base);
        }
    }
    out.push_str(rest);
    out
}

// --- ROOM PARSING ---

/// Extracts the room segment from a calendar long title shaped like
/// `"1 - 09MAT01 - B12 - JSMITH"`: the second-to-last `-` segment.
pub(crate) fn split_room_segment(long_title: &str) -> Option<&str> {
    let segments: Vec<&str> = long_title.split('-').collect();
    if segments.len() < 2 {
        return None;
    }
    Some(segments[segments.len() - 2].trim())
}

/// Resolves room-substitution markup into the effective room name.
/// `<strike>B12</strike>&nbsp;B14` reads as "B14"; plain values pass
/// through trimmed.
pub(crate) fn display_room(raw: &str) -> String {
    let mut s = raw.to_string();
    while let Some(open) = s.find("<strike") {
        let Some(close) = s[open..].find("</strike>") else {
            // Unterminated markup strikes out the rest of the value; the
            // struck text must not come back as the effective room.
            s.truncate(open);
            break;
        };
        s.replace_range(open..open + close + "</strike>".len(), "");
    }
    let s = s.replace("&nbsp;", " ");
    let mut text = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- LESSON PLAN ---

/// The asset service answers `{"h": ...}` instead of document content
/// when no plan exists for the requested id.
pub(crate) fn is_plan_placeholder(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body.trim())
        .map(|v| v.get("h").is_some())
        .unwrap_or(false)
}

// --- CALENDAR ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassRow {
    pub title: String,
    pub start: String,
    pub finish: String,
    pub roll_marked: bool,
    pub long_title_without_time: String,
    #[serde(default)]
    pub activity_type: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl ClassRow {
    pub(crate) fn into_entry(self, names: &HashMap<i64, String>) -> Result<ClassEntry, Error> {
        let start = required_datetime(Some(&self.start), "start")?;
        let finish = required_datetime(Some(&self.finish), "finish")?;

        let name = self
            .manager_id
            .and_then(|id| names.get(&id))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        let room_raw = split_room_segment(&self.long_title_without_time)
            .unwrap_or_default()
            .to_string();
        let mut room = display_room(&room_raw);
        if room.is_empty() {
            room = UNKNOWN_LABEL.to_string();
        }

        Ok(ClassEntry {
            code: self.title,
            name,
            teacher: None,
            teacher_photo: None,
            room,
            room_raw,
            start,
            finish,
            roll_marked: self.roll_marked,
            activity_type: ActivityType::from_code(self.activity_type.unwrap_or_default()),
            instance_id: self.instance_id,
            manager_id: self.manager_id,
        })
    }
}

/// One row of the staff-details lookup: the staff ids it covers plus the
/// display name of the class they manage.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassNameRow {
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub subject_name: Option<String>,
}

/// Builds the manager-id to class-name map. Duplicate ids keep the
/// first-seen name; later rows are ignored.
pub(crate) fn build_name_lookup(rows: Vec<ClassNameRow>) -> HashMap<i64, String> {
    let mut map = HashMap::new();
    for row in rows {
        let Some(id) = row.ids.first().copied() else {
            continue;
        };
        let Some(name) = row.subject_name else {
            continue;
        };
        match map.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(name);
            }
            Entry::Occupied(_) => {
                log::debug!("duplicate id {id} in class name lookup (class {name}), keeping first");
            }
        }
    }
    map
}

// --- LESSON INSTANCES ---

/// One lesson instance as both instance services describe it. The outer
/// members are Pascal-cased, nested objects fall back to camelCase.
/// Everything is best-effort here; the lesson mapping enforces its own
/// required fields.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct InstanceDetail {
    #[serde(rename = "InstanceId", default)]
    pub instance_id: Option<String>,
    #[serde(rename = "ActivityId", default)]
    pub activity_id: Option<i64>,
    #[serde(rename = "SubjectName", default)]
    pub subject_name: Option<String>,
    #[serde(rename = "ManagerTextReadable", default)]
    pub manager_text_readable: Option<String>,
    #[serde(rename = "ManagerPhotoPath", default)]
    pub manager_photo_path: Option<String>,
    #[serde(rename = "LocationDetails", default)]
    pub location_details: Option<LocationDetails>,
    #[serde(rename = "Start", default)]
    pub start: Option<String>,
    #[serde(rename = "Finish", default)]
    pub finish: Option<String>,
    #[serde(rename = "lp", default)]
    pub lesson_plan: Option<PlanRef>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocationDetails {
    #[serde(rename = "longName", default)]
    pub long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlanRef {
    #[serde(default)]
    pub file_asset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonPayload {
    #[serde(rename = "Instances", default)]
    pub instances: Vec<InstanceDetail>,
}

impl ClassEntry {
    /// Merges a detail payload into this entry. Missing detail fields
    /// fall back to safe defaults instead of failing the batch.
    pub(crate) fn apply_detail(&mut self, detail: InstanceDetail, base: &str) {
        self.teacher = Some(
            detail
                .manager_text_readable
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        );
        self.teacher_photo = detail
            .manager_photo_path
            .map(|path| absolutize(base, &path));
        self.room = detail
            .location_details
            .and_then(|loc| loc.long_name)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    }
}

/// Maps a lesson instance to a [`Lesson`]. Identity and time range are
/// required; naming fields degrade to [`UNKNOWN_LABEL`].
pub(crate) fn lesson_from_instance(
    inst: InstanceDetail,
    requested_instance_id: &str,
    plan: Option<String>,
    base: &str,
) -> Result<Lesson, Error> {
    let start = required_datetime(inst.start.as_deref(), "Start")?;
    let finish = required_datetime(inst.finish.as_deref(), "Finish")?;
    Ok(Lesson {
        instance_id: inst
            .instance_id
            .unwrap_or_else(|| requested_instance_id.to_string()),
        activity_id: inst.activity_id.ok_or(Error::MissingField("ActivityId"))?,
        name: inst
            .subject_name
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        teacher: inst
            .manager_text_readable
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        teacher_photo: inst
            .manager_photo_path
            .map(|path| absolutize(base, &path)),
        room: inst
            .location_details
            .and_then(|loc| loc.long_name)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        start,
        finish,
        plan,
    })
}

// --- NEWS ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NewsRow {
    pub title: String,
    #[serde(default)]
    pub content1: Option<String>,
    #[serde(default)]
    pub content2: Option<String>,
    pub post_date_time: String,
    #[serde(default)]
    pub email_sent_date: Option<String>,
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub created_by_admin: bool,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_image_url: Option<String>,
    #[serde(default)]
    pub attachments: Vec<NewsAttachmentRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NewsAttachmentRow {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ui_link: Option<String>,
    #[serde(default)]
    pub is_image: bool,
    #[serde(default)]
    pub original_file_name: Option<String>,
}

impl NewsRow {
    pub(crate) fn into_item(self, base: &str) -> Result<NewsItem, Error> {
        let posted = required_datetime(Some(&self.post_date_time), "PostDateTime")?;
        let email_sent = self
            .email_sent_date
            .as_deref()
            .and_then(parse_portal_datetime);
        let attachments = self
            .attachments
            .into_iter()
            .map(|a| NewsAttachment {
                name: a.name.unwrap_or_default(),
                url: a
                    .ui_link
                    .map(|link| absolutize(base, &link))
                    .unwrap_or_default(),
                is_image: a.is_image,
                original_file_name: a.original_file_name.unwrap_or_default(),
            })
            .collect();
        Ok(NewsItem {
            title: self.title,
            content1: self.content1.unwrap_or_default(),
            content2: self.content2.unwrap_or_default(),
            posted,
            email_sent,
            priority: self.priority,
            locked: self.locked,
            by_admin: self.created_by_admin,
            sender: self.user_name.unwrap_or_default(),
            sender_image: self
                .user_image_url
                .map(|url| absolutize(base, &url))
                .unwrap_or_default(),
            attachments,
        })
    }
}

// --- USER PROFILES ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBlob {
    #[serde(default)]
    pub user_display_code: Option<String>,
    #[serde(default)]
    pub user_full_name: Option<String>,
    #[serde(default)]
    pub user_preferred_name: Option<String>,
    #[serde(default)]
    pub user_preferred_last_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_house: Option<String>,
    #[serde(default)]
    pub user_form_group: Option<String>,
    #[serde(default)]
    pub user_year_level: Option<String>,
    #[serde(default)]
    pub user_year_level_id: i64,
    #[serde(default)]
    pub user_school_id: Option<String>,
    #[serde(rename = "userSchoolURL", default)]
    pub user_school_url: Option<String>,
    #[serde(default)]
    pub user_photo_path: Option<String>,
    #[serde(default)]
    pub user_square_photo_path: Option<String>,
    #[serde(default)]
    pub user_time_line_periods: Vec<PresenceRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresenceRow {
    pub start: String,
    pub finish: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub teaching_time: bool,
    #[serde(default)]
    pub attendance_override: bool,
}

/// Sole status code that counts as present in a timeline period.
const PRESENT_STATUS: i64 = 1;

pub(crate) fn profile_from_blob(blob: UserBlob, base: &str) -> Result<UserProfile, Error> {
    let presence = blob
        .user_time_line_periods
        .into_iter()
        .map(|row| {
            let start = required_datetime(Some(&row.start), "start")?;
            let finish = required_datetime(Some(&row.finish), "finish")?;
            // Null status means the portal has not classified the period.
            let status_code = row.status.unwrap_or(-1);
            Ok(PresenceEntry {
                name: row.name.unwrap_or_default(),
                start,
                finish,
                status_code,
                status_name: row.status_name.unwrap_or_default(),
                present: status_code == PRESENT_STATUS,
                teaching_time: row.teaching_time,
                attendance_override: row.attendance_override,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(UserProfile {
        display_code: blob.user_display_code.unwrap_or_default(),
        full_name: blob.user_full_name.unwrap_or_default(),
        preferred_name: blob.user_preferred_name.unwrap_or_default(),
        preferred_last_name: blob.user_preferred_last_name.unwrap_or_default(),
        email: blob.user_email.unwrap_or_default(),
        house: blob.user_house.unwrap_or_default(),
        form_group: blob.user_form_group.unwrap_or_default(),
        year_level: blob.user_year_level.unwrap_or_default(),
        year_level_id: blob.user_year_level_id,
        school_id: blob.user_school_id.unwrap_or_default(),
        school_url: blob.user_school_url.unwrap_or_default(),
        photo: blob
            .user_photo_path
            .map(|p| absolutize(base, &p))
            .unwrap_or_default(),
        square_photo: blob
            .user_square_photo_path
            .map(|p| absolutize(base, &p))
            .unwrap_or_default(),
        presence,
    })
}

// --- LEARNING TASKS ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskRow {
    pub id: i64,
    #[serde(default)]
    pub activity_id: Option<i64>,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_timestamp: Option<String>,
    #[serde(default)]
    pub due_date_timestamp: Option<String>,
    #[serde(default)]
    pub attachments: Vec<TaskAttachmentRow>,
    #[serde(default)]
    pub students: Vec<StudentRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskAttachmentRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Per-student grading state. The feed carries one row per student; for
/// a student session only the first row is ours.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentRow {
    #[serde(default)]
    pub submission_status: Option<i64>,
    #[serde(default)]
    pub submissions: Vec<SubmissionRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionRow {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,
}

/// Shared mapping for both learning-task feeds. Returns tasks already in
/// urgency order.
pub(crate) fn learning_tasks_from_rows(
    rows: Vec<TaskRow>,
    base: &str,
) -> Result<Vec<LearningTask>, Error> {
    let mut tasks = rows
        .into_iter()
        .map(|row| task_from_row(row, base))
        .collect::<Result<Vec<_>, Error>>()?;
    sort_by_urgency(&mut tasks);
    Ok(tasks)
}

fn task_from_row(row: TaskRow, base: &str) -> Result<LearningTask, Error> {
    let created = required_datetime(row.created_timestamp.as_deref(), "createdTimestamp")?;
    let due = match row.due_date_timestamp.as_deref() {
        None => far_future(),
        Some(raw) => parse_portal_datetime(raw).unwrap_or_else(|| {
            log::debug!("task {}: unreadable due date {raw:?}, treating as undated", row.id);
            far_future()
        }),
    };

    let attachments = row
        .attachments
        .into_iter()
        .map(|a| TaskAttachment {
            name: a.name.unwrap_or_default(),
            file_name: a.file_name.unwrap_or_default(),
            url: a
                .id
                .map(|id| file_asset_url(base, &id))
                .unwrap_or_default(),
        })
        .collect();

    let our_row = row.students.into_iter().next();
    let status = our_row
        .as_ref()
        .and_then(|s| s.submission_status)
        .map(SubmissionStatus::from_code)
        .unwrap_or(SubmissionStatus::Unknown);
    let submissions = our_row
        .map(|s| s.submissions)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|sub| {
            let Some(submitted) = sub.timestamp.as_deref().and_then(parse_portal_datetime) else {
                log::debug!("task {}: dropping submission without usable timestamp", row.id);
                return None;
            };
            Some(Submission {
                kind: SubmissionKind::from_code(sub.kind.unwrap_or_default()),
                file_name: sub.file_name.unwrap_or_default(),
                submitted,
                url: sub
                    .file_id
                    .map(|id| file_asset_url(base, &id))
                    .unwrap_or_default(),
            })
        })
        .collect();

    Ok(LearningTask {
        id: row.id,
        activity_id: row.activity_id.unwrap_or_default(),
        class_code: row.activity_name.unwrap_or_default(),
        subject: row.subject_name.unwrap_or_default(),
        name: row.name.unwrap_or_default(),
        description: row
            .description
            .map(|d| rewrite_root_links(&d, base))
            .unwrap_or_default(),
        created,
        due,
        status,
        attachments,
        submissions,
    })
}
