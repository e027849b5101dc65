use chrono::Utc;
use serde_json::json;

use super::{normalize_id, School};
use crate::audit::{emit, AuditEvent};
use crate::documents::{Notice, NoticesFeed};
use crate::store::Connector;
use crate::{Result, SchoolError};

impl<C: Connector> School<C> {
    /// the teachers' notices feed
    pub fn list_notices(&self) -> Result<NoticesFeed> {
        self.store.read(&self.notices_path())
    }

    /// appends a notice. Its id is the creation time in milliseconds, bumped by one until it is
    /// unique within the feed.
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if the title or the message is empty
    pub fn add_notice(&self, title: &str, message: &str, author: Option<&str>) -> Result<Notice> {
        let title = title.trim();
        let message = message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(SchoolError::BadRequest(
                "Notice title and message are required".to_string(),
            ));
        }

        let notice = self
            .store
            .mutate(&self.notices_path(), |feed: &mut NoticesFeed| {
                let now = Utc::now();
                let mut millis = now.timestamp_millis();
                while feed.notices.iter().any(|n| n.id == millis.to_string()) {
                    millis += 1;
                }
                let notice = Notice {
                    id: millis.to_string(),
                    title: title.to_string(),
                    message: message.to_string(),
                    author: author.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
                    created_at: now,
                };
                feed.notices.push(notice.clone());
                feed.last_updated = Some(now);
                Ok(notice)
            })?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new("notice_created", json!({ "id": notice.id, "title": notice.title })),
        );
        Ok(notice)
    }

    /// removes the notice with `id`
    ///
    /// # Errors
    /// `SchoolError::NotFound` if there is no such notice, in which case the feed is untouched
    pub fn delete_notice(&self, id: &str) -> Result<Notice> {
        let id = normalize_id(id);
        let removed = self
            .store
            .mutate(&self.notices_path(), |feed: &mut NoticesFeed| {
                let idx = feed
                    .notices
                    .iter()
                    .position(|n| n.id == id)
                    .ok_or_else(|| SchoolError::NotFound(format!("Notice '{}' not found", id)))?;
                feed.last_updated = Some(Utc::now());
                Ok(feed.notices.remove(idx))
            })?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new("notice_deleted", json!({ "id": removed.id })),
        );
        Ok(removed)
    }
}
