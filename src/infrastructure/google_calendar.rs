use crate::domain::models::{Acceptance, CalendarEvent};
use crate::infrastructure::config::CalendarSecrets;
use crate::infrastructure::error::CalendarError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use std::sync::Mutex;
use url::Url;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
// Tokens last ~1 hour; refresh five minutes early.
const TOKEN_EXPIRY_LEEWAY_SECS: i64 = 300;

/// Supplies calendar events for a time range. The wake pass consumes
/// this contract; the device ships the Google implementation below.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_events(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct ReqwestCalendarSource {
    client: Client,
    secrets: CalendarSecrets,
    zone: Tz,
    request_timeout: std::time::Duration,
    token: Mutex<Option<CachedToken>>,
}

impl ReqwestCalendarSource {
    pub fn new(secrets: CalendarSecrets, zone: Tz, request_timeout: std::time::Duration) -> Self {
        Self {
            client: Client::new(),
            secrets,
            zone,
            request_timeout,
            token: Mutex::new(None),
        }
    }

    fn events_endpoint(&self) -> Result<Url, CalendarError> {
        let mut url = Url::parse(CALENDAR_API_BASE).map_err(|error| {
            CalendarError::ServerError(format!("invalid calendar api base url: {error}"))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CalendarError::ServerError("calendar api base URL cannot be a base".to_string())
            })?;
            segments.push("calendars");
            segments.push(&self.secrets.calendar_id);
            segments.push("events");
        }
        Ok(url)
    }

    fn cached_token(&self, now: DateTime<Utc>) -> Result<Option<String>, CalendarError> {
        let token = self.token.lock().map_err(|error| {
            CalendarError::ServerError(format!("token cache lock poisoned: {error}"))
        })?;
        Ok(token
            .as_ref()
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.access_token.clone()))
    }

    fn store_token(&self, cached: CachedToken) -> Result<(), CalendarError> {
        let mut token = self.token.lock().map_err(|error| {
            CalendarError::ServerError(format!("token cache lock poisoned: {error}"))
        })?;
        *token = Some(cached);
        Ok(())
    }

    async fn ensure_token(&self, now: DateTime<Utc>) -> Result<String, CalendarError> {
        if let Some(token) = self.cached_token(now)? {
            return Ok(token);
        }

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .timeout(self.request_timeout)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("refresh_token", self.secrets.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|error| request_error(error, "token refresh"))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            CalendarError::ServerError(format!("failed reading token response: {error}"))
        })?;

        let parsed: TokenResponsePayload = serde_json::from_str(&body).map_err(|error| {
            CalendarError::ServerError(format!("invalid token response payload: {error}"))
        })?;

        if let Some(error_code) = parsed.error {
            // A revoked or expired refresh token needs the owner to
            // redo the authorization bootstrap.
            if error_code == "invalid_grant" {
                return Err(CalendarError::AuthExpired(
                    parsed
                        .error_description
                        .unwrap_or_else(|| error_code.clone()),
                ));
            }
            return Err(status_error(status.as_u16(), &error_code));
        }
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }

        let access_token = parsed.access_token.ok_or_else(|| {
            CalendarError::ServerError("token response did not include access_token".to_string())
        })?;
        let expires_in = parsed.expires_in.unwrap_or(0).max(0);
        self.store_token(CachedToken {
            access_token: access_token.clone(),
            expires_at: now + chrono::Duration::seconds(expires_in - TOKEN_EXPIRY_LEEWAY_SECS),
        })?;
        Ok(access_token)
    }
}

#[async_trait]
impl CalendarSource for ReqwestCalendarSource {
    async fn fetch_events(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let access_token = self.ensure_token(Utc::now()).await?;
        let endpoint = self.events_endpoint()?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(endpoint.clone())
                .timeout(self.request_timeout)
                .bearer_auth(&access_token)
                .query(&[
                    ("timeMin", range_start.to_rfc3339()),
                    ("timeMax", range_end.to_rfc3339()),
                ])
                .query(&[
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "50"),
                ]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request
                .send()
                .await
                .map_err(|error| request_error(error, "events list"))?;

            let status = response.status();
            let body = response.text().await.map_err(|error| {
                CalendarError::ServerError(format!("failed reading events response: {error}"))
            })?;
            if !status.is_success() {
                return Err(status_error(status.as_u16(), &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                CalendarError::ServerError(format!("invalid events payload: {error}"))
            })?;

            events.extend(
                parsed
                    .items
                    .take()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|item| map_event(item, self.zone)),
            );

            match parsed.next_page_token.take() {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }
}

fn request_error(error: reqwest::Error, context: &str) -> CalendarError {
    if error.is_timeout() {
        return CalendarError::Timeout;
    }
    CalendarError::NetworkUnavailable(format!("{context}: {error}"))
}

fn status_error(status: u16, body: &str) -> CalendarError {
    let detail = body.trim();
    let detail = if detail.is_empty() {
        format!("http {status}")
    } else {
        format!("http {status}: {detail}")
    };
    match status {
        401 | 403 => CalendarError::AuthExpired(detail),
        _ => CalendarError::ServerError(detail),
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponsePayload {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<EventItem>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct EventItem {
    summary: Option<String>,
    status: Option<String>,
    start: Option<EventPoint>,
    end: Option<EventPoint>,
    attendees: Option<Vec<AttendeeItem>>,
}

#[derive(Debug, serde::Deserialize)]
struct EventPoint {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct AttendeeItem {
    #[serde(rename = "self")]
    is_self: Option<bool>,
    #[serde(rename = "responseStatus")]
    response_status: Option<String>,
}

/// Maps one API item to the device model. Cancelled items and items
/// without a parseable start/end are dropped; everything else is
/// cached regardless of acceptance so the focus filter stays a pure
/// domain decision.
fn map_event(item: EventItem, zone: Tz) -> Option<CalendarEvent> {
    let cancelled = item
        .status
        .as_deref()
        .is_some_and(|status| status.eq_ignore_ascii_case("cancelled"));
    if cancelled {
        return None;
    }

    let start = parse_point(item.start.as_ref()?, zone)?;
    let end = parse_point(item.end.as_ref()?, zone)?;
    if end <= start {
        tracing::warn!(summary = item.summary.as_deref(), "skipping event with reversed range");
        return None;
    }

    Some(CalendarEvent {
        title: item.summary.unwrap_or_else(|| "No title".to_string()),
        start,
        end,
        acceptance: acceptance_of(item.attendees.as_deref()),
    })
}

/// The owner's own response status. Events without an attendee list
/// (solo blocks, self-created meetings) count as accepted.
fn acceptance_of(attendees: Option<&[AttendeeItem]>) -> Acceptance {
    let Some(me) = attendees
        .unwrap_or_default()
        .iter()
        .find(|attendee| attendee.is_self.unwrap_or(false))
    else {
        return Acceptance::Accepted;
    };

    match me.response_status.as_deref() {
        Some("accepted") => Acceptance::Accepted,
        Some("declined") => Acceptance::Declined,
        Some("tentative") => Acceptance::Tentative,
        _ => Acceptance::Unknown,
    }
}

fn parse_point(point: &EventPoint, zone: Tz) -> Option<DateTime<Utc>> {
    if let Some(date_time) = point.date_time.as_deref() {
        return DateTime::parse_from_rfc3339(date_time)
            .ok()
            .map(|at| at.with_timezone(&Utc));
    }
    // All-day events carry a bare date; anchor them to local midnight.
    let date = NaiveDate::parse_from_str(point.date.as_deref()?, "%Y-%m-%d").ok()?;
    zone.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: Tz = chrono_tz::Europe::Madrid;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn item_from_json(payload: serde_json::Value) -> EventItem {
        serde_json::from_value(payload).expect("event item parses")
    }

    #[test]
    fn maps_a_timed_event_with_self_acceptance() {
        let item = item_from_json(serde_json::json!({
            "summary": "Product sync",
            "status": "confirmed",
            "start": { "dateTime": "2026-03-05T18:19:00+01:00" },
            "end": { "dateTime": "2026-03-05T19:00:00+01:00" },
            "attendees": [
                { "email": "boss@example.com", "responseStatus": "accepted" },
                { "self": true, "responseStatus": "accepted" }
            ]
        }));

        let event = map_event(item, ZONE).expect("mapped event");
        assert_eq!(event.title, "Product sync");
        assert_eq!(event.start, fixed_time("2026-03-05T17:19:00Z"));
        assert_eq!(event.acceptance, Acceptance::Accepted);
    }

    #[test]
    fn declined_and_tentative_statuses_are_retained_not_dropped() {
        let declined = item_from_json(serde_json::json!({
            "summary": "All-hands",
            "start": { "dateTime": "2026-03-05T14:00:00Z" },
            "end": { "dateTime": "2026-03-05T15:00:00Z" },
            "attendees": [{ "self": true, "responseStatus": "declined" }]
        }));
        assert_eq!(
            map_event(declined, ZONE).expect("mapped").acceptance,
            Acceptance::Declined
        );

        let tentative = item_from_json(serde_json::json!({
            "summary": "Maybe",
            "start": { "dateTime": "2026-03-05T14:00:00Z" },
            "end": { "dateTime": "2026-03-05T15:00:00Z" },
            "attendees": [{ "self": true, "responseStatus": "tentative" }]
        }));
        assert_eq!(
            map_event(tentative, ZONE).expect("mapped").acceptance,
            Acceptance::Tentative
        );
    }

    #[test]
    fn needs_action_maps_to_unknown() {
        let item = item_from_json(serde_json::json!({
            "summary": "Unanswered invite",
            "start": { "dateTime": "2026-03-05T14:00:00Z" },
            "end": { "dateTime": "2026-03-05T15:00:00Z" },
            "attendees": [{ "self": true, "responseStatus": "needsAction" }]
        }));
        assert_eq!(
            map_event(item, ZONE).expect("mapped").acceptance,
            Acceptance::Unknown
        );
    }

    #[test]
    fn solo_events_without_attendees_count_as_accepted() {
        let item = item_from_json(serde_json::json!({
            "summary": "Deep work",
            "start": { "dateTime": "2026-03-05T09:00:00Z" },
            "end": { "dateTime": "2026-03-05T11:00:00Z" }
        }));
        assert_eq!(
            map_event(item, ZONE).expect("mapped").acceptance,
            Acceptance::Accepted
        );
    }

    #[test]
    fn cancelled_events_are_dropped() {
        let item = item_from_json(serde_json::json!({
            "summary": "Cancelled",
            "status": "cancelled",
            "start": { "dateTime": "2026-03-05T14:00:00Z" },
            "end": { "dateTime": "2026-03-05T15:00:00Z" }
        }));
        assert!(map_event(item, ZONE).is_none());
    }

    #[test]
    fn all_day_events_anchor_to_local_midnight() {
        let item = item_from_json(serde_json::json!({
            "summary": "Company holiday",
            "start": { "date": "2026-03-05" },
            "end": { "date": "2026-03-06" }
        }));
        let event = map_event(item, ZONE).expect("mapped");
        // Madrid midnight is 23:00 UTC the previous day in winter.
        assert_eq!(event.start, fixed_time("2026-03-04T23:00:00Z"));
        assert_eq!(event.end, fixed_time("2026-03-05T23:00:00Z"));
    }

    #[test]
    fn unparseable_points_drop_the_event() {
        let missing_end = item_from_json(serde_json::json!({
            "summary": "Broken",
            "start": { "dateTime": "2026-03-05T14:00:00Z" }
        }));
        assert!(map_event(missing_end, ZONE).is_none());

        let garbage = item_from_json(serde_json::json!({
            "summary": "Broken",
            "start": { "dateTime": "not-a-timestamp" },
            "end": { "dateTime": "2026-03-05T15:00:00Z" }
        }));
        assert!(map_event(garbage, ZONE).is_none());
    }

    #[test]
    fn status_errors_map_to_the_taxonomy() {
        assert!(matches!(
            status_error(401, "unauthorized"),
            CalendarError::AuthExpired(_)
        ));
        assert!(matches!(
            status_error(403, ""),
            CalendarError::AuthExpired(_)
        ));
        assert!(matches!(
            status_error(500, "boom"),
            CalendarError::ServerError(_)
        ));
        assert!(matches!(
            status_error(429, "slow down"),
            CalendarError::ServerError(_)
        ));
    }

    #[test]
    fn events_page_parses_with_pagination_token() {
        let page: EventsPageResponse = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "summary": "One",
                        "start": { "dateTime": "2026-03-05T14:00:00Z" },
                        "end": { "dateTime": "2026-03-05T15:00:00Z" }
                    }
                ],
                "nextPageToken": "page-2"
            }"#,
        )
        .expect("page parses");
        assert_eq!(page.items.map(|items| items.len()), Some(1));
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
    }
}
