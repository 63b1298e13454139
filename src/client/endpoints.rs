// File: ./src/client/endpoints.rs
//
// URL table for the portal's bespoke service endpoints. The services
// are SOAP-era `.svc` handlers answering JSON; paths and query strings
// mirror what the web frontend itself sends.

use crate::model::payload::file_asset_url;

#[derive(Clone, Debug)]
pub(crate) struct Endpoints {
    base: String,
}

impl Endpoints {
    /// Endpoints of a school's portal instance, e.g. prefix "xyz" for
    /// `https://xyz.compass.education`.
    pub fn for_school(prefix: &str) -> Self {
        Self {
            base: format!("https://{prefix}.compass.education"),
        }
    }

    /// Endpoints rooted at an arbitrary base URL. Lets tests point the
    /// client at a local server.
    pub fn with_base(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn login(&self) -> String {
        format!("{}/login.aspx?sessionstate=disabled", self.base)
    }

    pub fn calendar_events(&self) -> String {
        format!(
            "{}/Services/Calendar.svc/GetCalendarEventsByUser?sessionstate=readonly\
             &includeEvents=false&includeAllPd=false&includeExams=false\
             &includeVolunteeringEvent=false",
            self.base
        )
    }

    pub fn class_names(&self) -> String {
        format!(
            "{}/Services/Communications.svc/GetClassTeacherDetailsByStudent?sessionstate=readonly",
            self.base
        )
    }

    pub fn lessons_by_instance(&self) -> String {
        format!(
            "{}/Services/Activity.svc/GetLessonsByInstanceId?sessionstate=readonly",
            self.base
        )
    }

    pub fn lesson_detail(&self) -> String {
        format!(
            "{}/Services/Activity.svc/GetLessonsByInstanceIdQuick?sessionstate=readonly",
            self.base
        )
    }

    pub fn news_feed(&self) -> String {
        format!(
            "{}/Services/NewsFeed.svc/GetMyNewsFeedPaged?sessionstate=readonly",
            self.base
        )
    }

    pub fn user_details(&self) -> String {
        format!(
            "{}/Services/User.svc/GetUserDetailsBlobByUserId?sessionstate=readonly",
            self.base
        )
    }

    pub fn learning_tasks_by_user(&self) -> String {
        format!(
            "{}/Services/LearningTasks.svc/GetAllLearningTasksByUserId?sessionstate=readonly",
            self.base
        )
    }

    pub fn learning_tasks_by_activity(&self) -> String {
        format!(
            "{}/Services/LearningTasks.svc/GetAllLearningTasksByActivityId?sessionstate=readonly",
            self.base
        )
    }

    pub fn file_asset(&self, asset_id: &str) -> String {
        file_asset_url(&self.base, asset_id)
    }
}
