// File: ./src/client/fetch.rs
//
// The resource operations. Each one is an independent request/parse/map
// pipeline over `core`'s transport: build the fixed-shape JSON body,
// POST it, decode the envelope, normalize rows through `model::payload`.

use crate::client::core::CompassClient;
use crate::error::Error;
use crate::model::payload::{
    ClassNameRow, ClassRow, Envelope, InstanceDetail, LessonPayload, NewsRow, Paged, TaskRow,
    UserBlob, build_name_lookup, is_plan_placeholder, learning_tasks_from_rows,
    lesson_from_instance, profile_from_blob, rewrite_root_links,
};
use crate::model::{ClassEntry, LearningTask, Lesson, NewsItem, UserProfile};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::HashMap;

/// Page window for the paged feeds.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 25 }
    }
}

/// Concurrent per-entry detail lookups during class enrichment.
const DETAIL_CONCURRENCY: usize = 4;

impl CompassClient {
    /// Timetable entries for the date range, ascending by start time
    /// (ties keep feed order). With `include_detail`, each entry that
    /// maps to a lesson instance gets a best-effort secondary lookup
    /// resolving teacher name/photo and the authoritative room.
    pub async fn fetch_classes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        pagination: Pagination,
        include_detail: bool,
    ) -> Result<Vec<ClassEntry>, Error> {
        let session = self.require_session()?;
        let body = json!({
            "userId": session.user_id(),
            "homePage": false,
            "activityId": null,
            "locationId": null,
            "staffIds": null,
            "startDate": start.format("%Y-%m-%d").to_string(),
            "endDate": end.format("%Y-%m-%d").to_string(),
            "page": pagination.page,
            "start": 0,
            "limit": pagination.limit,
        });
        let rows: Envelope<Vec<ClassRow>> = self
            .post_service(&self.endpoints().calendar_events(), body)
            .await?;

        let names = match self.fetch_name_lookup(session.user_id()).await {
            Ok(map) => map,
            Err(e) => {
                log::warn!("class name lookup failed ({e}), labelling classes Unknown");
                HashMap::new()
            }
        };

        let mut entries = rows
            .d
            .into_iter()
            .map(|row| row.into_entry(&names))
            .collect::<Result<Vec<_>, Error>>()?;
        if include_detail {
            entries = self.enrich_entries(entries).await;
        }
        entries.sort_by_key(|entry| entry.start);
        Ok(entries)
    }

    async fn fetch_name_lookup(&self, user_id: &str) -> Result<HashMap<i64, String>, Error> {
        let body = json!({
            "userId": user_id,
            "page": 1,
            "start": 0,
            "limit": 25,
        });
        let rows: Envelope<Vec<ClassNameRow>> = self
            .post_service(&self.endpoints().class_names(), body)
            .await?;
        Ok(build_name_lookup(rows.d))
    }

    async fn enrich_entries(&self, entries: Vec<ClassEntry>) -> Vec<ClassEntry> {
        let base = self.endpoints().base().to_string();
        let lookups = entries.into_iter().enumerate().map(|(idx, mut entry)| {
            let base = base.clone();
            async move {
                if let Some(instance_id) = entry.instance_id.clone() {
                    let detail = match self.fetch_instance_detail(&instance_id).await {
                        Ok(detail) => detail,
                        Err(e) => {
                            log::warn!(
                                "detail lookup for instance {instance_id} failed ({e}), \
                                 using defaults"
                            );
                            InstanceDetail::default()
                        }
                    };
                    entry.apply_detail(detail, &base);
                }
                (idx, entry)
            }
        });
        let mut enriched: Vec<(usize, ClassEntry)> = stream::iter(lookups)
            .buffer_unordered(DETAIL_CONCURRENCY)
            .collect()
            .await;
        // Completion order is scrambled; restore feed order first.
        enriched.sort_by_key(|(idx, _)| *idx);
        enriched.into_iter().map(|(_, entry)| entry).collect()
    }

    async fn fetch_instance_detail(&self, instance_id: &str) -> Result<InstanceDetail, Error> {
        let payload: Envelope<InstanceDetail> = self
            .post_service(
                &self.endpoints().lesson_detail(),
                json!({ "instanceId": instance_id }),
            )
            .await?;
        Ok(payload.d)
    }

    /// Detail for one lesson occurrence, including its plan document
    /// when one was published.
    pub async fn fetch_lesson(&self, instance_id: &str) -> Result<Lesson, Error> {
        self.require_session()?;
        let payload: Envelope<LessonPayload> = self
            .post_service(
                &self.endpoints().lessons_by_instance(),
                json!({ "instanceId": instance_id }),
            )
            .await?;
        let instance = payload
            .d
            .instances
            .into_iter()
            .next()
            .ok_or(Error::MissingField("Instances"))?;
        let plan = match instance
            .lesson_plan
            .as_ref()
            .and_then(|plan| plan.file_asset_id.clone())
        {
            Some(asset_id) => self.fetch_lesson_plan(&asset_id).await,
            None => None,
        };
        lesson_from_instance(instance, instance_id, plan, self.endpoints().base())
    }

    /// Best-effort plan download: a failed request or the placeholder
    /// answer both read as "no plan".
    async fn fetch_lesson_plan(&self, asset_id: &str) -> Option<String> {
        let url = self.endpoints().file_asset(asset_id);
        match self.get_raw(&url).await {
            Ok((status, bytes)) if status.is_success() => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if is_plan_placeholder(&text) {
                    return None;
                }
                Some(rewrite_root_links(&text, self.endpoints().base()))
            }
            Ok((status, _)) => {
                log::warn!("lesson plan download answered {status}");
                None
            }
            Err(e) => {
                log::warn!("lesson plan download failed: {e}");
                None
            }
        }
    }

    /// News feed window, newest first.
    pub async fn fetch_news(&self, start: u32, limit: u32) -> Result<Vec<NewsItem>, Error> {
        self.require_session()?;
        let body = json!({
            "activityId": null,
            "start": start,
            "limit": limit,
        });
        let payload: Envelope<Paged<NewsRow>> = self
            .post_service(&self.endpoints().news_feed(), body)
            .await?;
        let mut items = payload
            .d
            .data
            .into_iter()
            .map(|row| row.into_item(self.endpoints().base()))
            .collect::<Result<Vec<_>, Error>>()?;
        items.sort_by_key(|item| std::cmp::Reverse(item.posted));
        Ok(items)
    }

    /// Profile and presence timeline of the session's user.
    pub async fn fetch_user_profile(&self) -> Result<UserProfile, Error> {
        let session = self.require_session()?;
        let user_id = json_user_id(session.user_id());
        let body = json!({
            "id": user_id,
            "targetUserId": user_id,
        });
        let payload: Envelope<UserBlob> = self
            .post_service(&self.endpoints().user_details(), body)
            .await?;
        profile_from_blob(payload.d, self.endpoints().base())
    }

    /// All learning tasks of the session's user, most urgent first.
    pub async fn fetch_learning_tasks(
        &self,
        pagination: Pagination,
    ) -> Result<Vec<LearningTask>, Error> {
        let session = self.require_session()?;
        let body = json!({
            "userId": json_user_id(session.user_id()),
            "page": pagination.page,
            "start": 0,
            "limit": pagination.limit,
        });
        self.learning_tasks_request(&self.endpoints().learning_tasks_by_user(), body)
            .await
    }

    /// Learning tasks of one class activity, most urgent first.
    pub async fn fetch_learning_tasks_by_class(
        &self,
        activity_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<LearningTask>, Error> {
        self.require_session()?;
        let body = json!({
            "activityId": activity_id,
            "page": pagination.page,
            "start": 0,
            "limit": pagination.limit,
        });
        self.learning_tasks_request(&self.endpoints().learning_tasks_by_activity(), body)
            .await
    }

    async fn learning_tasks_request(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<Vec<LearningTask>, Error> {
        let payload: Envelope<Paged<TaskRow>> = self.post_service(url, body).await?;
        learning_tasks_from_rows(payload.d.data, self.endpoints().base())
    }
}

/// The newer services want numeric user ids as JSON numbers; anything
/// non-numeric is passed through as a string.
fn json_user_id(user_id: &str) -> serde_json::Value {
    user_id
        .parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(user_id))
}
