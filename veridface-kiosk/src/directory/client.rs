use crate::directory::types::{
    DashboardRecord, DashboardSummary, DirectoryError, DirectoryUser, Envelope, UserRecord,
};
use crate::verification::types::{RawResponse, TransportError, DASHBOARD_PATH, USERS_PATH};
use crate::verification::HttpBackend;
use log::{debug, info};
use serde::de::DeserializeOwned;

/// Read-only client for the admin endpoints. It reshapes what the service
/// returns and never computes figures of its own.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
    http: HttpBackend,
}

impl DirectoryClient {
    pub fn new(http: HttpBackend) -> Self {
        DirectoryClient { http }
    }

    pub async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let raw = self.http.get(USERS_PATH, &[]).await?;
        let users = decode_users(&raw)?;
        info!("[Directory] Loaded {} users", users.len());
        Ok(users)
    }

    /// `Ok(None)` when the service does not know the id.
    pub async fn get_user(&self, id: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        let path = format!("{}/{}", USERS_PATH, id);
        let raw = self.http.get(&path, &[]).await?;
        decode_user(&raw, id)
    }

    pub async fn dashboard(&self, event: &str) -> Result<DashboardSummary, DirectoryError> {
        let raw = self.http.get(DASHBOARD_PATH, &[("event", event)]).await?;
        let summary = decode_dashboard(&raw)?;
        debug!(
            "[Directory] Dashboard for '{}': {} present, {} heatmap rows",
            event,
            summary.total_attendance_today,
            summary.hourly_heatmap.len()
        );
        Ok(summary)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(endpoint: &str, raw: &RawResponse) -> Result<T, DirectoryError> {
    let envelope: Envelope<T> = serde_json::from_slice(&raw.body).map_err(|e| {
        TransportError::MalformedResponse {
            endpoint: endpoint.to_string(),
            status: raw.status,
            cause: e.to_string(),
        }
    })?;
    envelope.data.ok_or(DirectoryError::Empty)
}

pub fn decode_users(raw: &RawResponse) -> Result<Vec<DirectoryUser>, DirectoryError> {
    let records: Vec<UserRecord> = unwrap_envelope(USERS_PATH, raw)?;
    Ok(records
        .into_iter()
        .map(|record| DirectoryUser::from_record(record, None))
        .collect())
}

pub fn decode_user(raw: &RawResponse, id: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
    if raw.status == 404 {
        return Ok(None);
    }
    match unwrap_envelope::<UserRecord>(USERS_PATH, raw) {
        Ok(record) => Ok(Some(DirectoryUser::from_record(record, Some(id)))),
        Err(DirectoryError::Empty) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn decode_dashboard(raw: &RawResponse) -> Result<DashboardSummary, DirectoryError> {
    let record: DashboardRecord = unwrap_envelope(DASHBOARD_PATH, raw)?;
    Ok(DashboardSummary::from(record))
}

/// Pages a user list five at a time. `offset` is the exclusive end of the
/// visible window and never drops below one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPager {
    offset: usize,
    total: usize,
}

impl UserPager {
    pub const PAGE_SIZE: usize = 5;

    pub fn new(total: usize) -> Self {
        UserPager { offset: Self::PAGE_SIZE, total }
    }

    /// Index range of the users on the current page.
    pub fn window(&self) -> std::ops::Range<usize> {
        let end = self.offset.min(self.total);
        let start = self.offset.saturating_sub(Self::PAGE_SIZE).min(end);
        start..end
    }

    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.window();
        let end = range.end.min(items.len());
        &items[range.start.min(end)..end]
    }

    pub fn has_prev(&self) -> bool {
        self.offset > Self::PAGE_SIZE
    }

    pub fn has_next(&self) -> bool {
        self.offset < self.total
    }

    pub fn prev(&mut self) {
        self.offset = self.offset.saturating_sub(Self::PAGE_SIZE).max(Self::PAGE_SIZE);
    }

    pub fn next(&mut self) {
        // Clamped to the total, but never below a full first page
        self.offset = (self.offset + Self::PAGE_SIZE).min(self.total).max(Self::PAGE_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::types::MISSING;
    use serde_json::json;

    #[test]
    fn users_envelope_normalises_each_record() {
        let raw = RawResponse::json(
            200,
            &json!({ "data": [
                { "id": "rec1", "fields": { "Name": "Aisyah", "DigitalID": "BIL-001", "Timestamp": "2025-07-21T14:30:00Z" } },
                { "id": "rec2", "fields": {} }
            ]}),
        );
        let users = decode_users(&raw).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].digital_id, "BIL-001");
        assert_eq!(users[1].name, MISSING);
    }

    #[test]
    fn single_user_carries_activity_log() {
        let raw = RawResponse::json(
            200,
            &json!({ "data": {
                "fields": { "Name": "Aisyah" },
                "log": [ { "fields": { "timestamp": "2025-07-25T09:15:00Z", "title": "Checked in" } } ]
            }}),
        );
        let user = decode_user(&raw, "rec1").unwrap().unwrap();
        assert_eq!(user.id, "rec1");
        assert_eq!(user.activity_log.len(), 1);
        assert_eq!(user.activity_log[0].date, "2025-07-25");
    }

    #[test]
    fn unknown_user_is_none() {
        let raw = RawResponse::json(404, &json!({ "status": "fail", "message": "User not found" }));
        assert_eq!(decode_user(&raw, "nope"), Ok(None));
    }

    #[test]
    fn dashboard_without_data_is_empty() {
        let raw = RawResponse::json(200, &json!({ "status": "ok" }));
        assert_eq!(decode_dashboard(&raw), Err(DirectoryError::Empty));

        let garbage = RawResponse::new(502, "Bad Gateway");
        assert!(matches!(
            decode_dashboard(&garbage),
            Err(DirectoryError::Transport(TransportError::MalformedResponse { status: 502, .. }))
        ));
    }

    #[test]
    fn pager_clamps_at_both_ends() {
        let mut pager = UserPager::new(12);
        assert_eq!(pager.window(), 0..5);
        assert!(!pager.has_prev());

        pager.next();
        assert_eq!(pager.window(), 5..10);
        pager.next();
        assert_eq!(pager.window(), 7..12);
        assert!(!pager.has_next());
        pager.next();
        assert_eq!(pager.window(), 7..12);

        pager.prev();
        assert_eq!(pager.window(), 2..7);
        pager.prev();
        pager.prev();
        assert_eq!(pager.window(), 0..5);
    }

    #[test]
    fn pager_on_short_list() {
        let users: Vec<u32> = (0..3).collect();
        let mut pager = UserPager::new(users.len());
        assert_eq!(pager.page(&users), &[0, 1, 2]);
        pager.next();
        assert_eq!(pager.page(&users), &[0, 1, 2]);
        assert!(!pager.has_next());
    }
}
