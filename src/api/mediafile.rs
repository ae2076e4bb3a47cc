use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError};

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_POLLS: u32 = 10;

#[derive(Debug, Serialize)]
struct CreateRequest {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    request_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum State {
    Failed,
    Processing,
    Available,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: State,
    url: Option<String>,
}

/// Request, poll, and download a recorded media file. The server assembles
/// the file asynchronously; status is polled on a fixed interval until it
/// is available, fails, or the poll attempts run out.
pub async fn download(
    client: &ApiClient,
    device_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    output_dir: &Path,
    shutdown: &AtomicBool,
) -> Result<PathBuf, ApiError> {
    tracing::info!(device = %device_id, "requesting media file creation");
    let request_id = create_request(client, device_id, start, end).await?;

    for _ in 0..MAX_POLLS {
        tracing::info!(
            request_id,
            secs = POLL_INTERVAL.as_secs(),
            "waiting for media file"
        );
        tokio::time::sleep(POLL_INTERVAL).await;
        if shutdown.load(Ordering::Relaxed) {
            return Err(ApiError::Interrupted);
        }

        let status = request_status(client, device_id, request_id).await?;
        match status.state {
            State::Failed => return Err(ApiError::MediaFileFailed),
            State::Processing => continue,
            State::Available => {
                let url = status
                    .url
                    .ok_or(ApiError::InvalidResponse("media file available without a url"))?;
                let path = output_dir.join(format!("{request_id}.mp4"));
                tracing::info!(path = %path.display(), "downloading media file");
                download_to(client, &url, &path).await?;
                return Ok(path);
            }
        }
    }

    Err(ApiError::MediaFileTimeout(MAX_POLLS))
}

async fn create_request(
    client: &ApiClient,
    device_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<i64, ApiError> {
    let body = CreateRequest {
        start: to_rfc3339_local(start),
        end: to_rfc3339_local(end),
    };

    let response: CreateResponse = client
        .post(&client.endpoint(&format!("/v2/devices/{device_id}/media_files/requests")))
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.request_id)
}

async fn request_status(
    client: &ApiClient,
    device_id: &str,
    request_id: i64,
) -> Result<StatusResponse, ApiError> {
    let status = client
        .get(&client.endpoint(&format!(
            "/v2/devices/{device_id}/media_files/requests/{request_id}"
        )))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(status)
}

async fn download_to(client: &ApiClient, url: &str, path: &Path) -> Result<(), ApiError> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

/// RFC 3339 with the local UTC offset, e.g. `2023-04-01T12:00:00+09:00`.
fn to_rfc3339_local(datetime: NaiveDateTime) -> String {
    match Local.from_local_datetime(&datetime).earliest() {
        Some(local) => local.to_rfc3339_opts(SecondsFormat::Secs, false),
        // nonexistent local time (DST gap): fall back to UTC
        None => Utc
            .from_utc_datetime(&datetime)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn state_deserializes_from_server_names() {
        for (json, expected) in [
            ("\"FAILED\"", State::Failed),
            ("\"PROCESSING\"", State::Processing),
            ("\"AVAILABLE\"", State::Available),
        ] {
            let state: State = serde_json::from_str(json).unwrap();
            assert_eq!(state, expected);
        }
        assert!(serde_json::from_str::<State>("\"DONE\"").is_err());
    }

    #[test]
    fn status_url_is_optional_while_processing() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"state": "PROCESSING"}"#).unwrap();
        assert_eq!(status.state, State::Processing);
        assert_eq!(status.url, None);
    }

    #[test]
    fn create_request_body_shape() {
        let body = CreateRequest {
            start: "2023-04-01T12:00:00+09:00".to_string(),
            end: "2023-04-01T12:05:00+09:00".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["start"], "2023-04-01T12:00:00+09:00");
        assert_eq!(json["end"], "2023-04-01T12:05:00+09:00");
    }

    #[test]
    fn rfc3339_keeps_the_wall_clock_time() {
        let datetime = NaiveDate::from_ymd_opt(2023, 4, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let formatted = to_rfc3339_local(datetime);
        assert!(formatted.starts_with("2023-04-01T12:00:00"));
        // a numeric offset or Z must follow the seconds field
        let tail = &formatted["2023-04-01T12:00:00".len()..];
        assert!(tail.starts_with('+') || tail.starts_with('-') || tail == "Z");
    }
}
