use thiserror::Error;

pub mod devices;
pub mod mediafile;
pub mod monitor;

const API_KEY_HEADER: &str = "Safie-API-Key";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    InvalidResponse(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server reported media file creation failed")]
    MediaFileFailed,
    #[error("media file not ready after {0} polls")]
    MediaFileTimeout(u32),
    #[error("interrupted")]
    Interrupted,
}

/// Authenticated client for the vendor REST API. Every request carries the
/// API key header; the stream helpers hand the same credentials to the
/// demuxer, which speaks HTTP on its own.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Live HLS playlist endpoint for a device.
    pub fn live_playlist_url(&self, device_id: &str) -> String {
        format!(
            "{}/v2/devices/{}/live/playlist.m3u8",
            self.base_url, device_id
        )
    }

    /// Auth header as one CRLF-terminated line, the form the demuxer's
    /// `headers` option expects.
    pub fn stream_auth_header(&self) -> String {
        format!("{}: {}\r\n", API_KEY_HEADER, self.api_key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).header(API_KEY_HEADER, &self.api_key)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).header(API_KEY_HEADER, &self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_url() {
        let client = ApiClient::new("https://openapi.safie.link", "secret");
        assert_eq!(
            client.live_playlist_url("abc123"),
            "https://openapi.safie.link/v2/devices/abc123/live/playlist.m3u8"
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ApiClient::new("https://openapi.safie.link/", "secret");
        assert_eq!(
            client.endpoint("/v2/devices"),
            "https://openapi.safie.link/v2/devices"
        );
    }

    #[test]
    fn stream_auth_header_line() {
        let client = ApiClient::new("https://openapi.safie.link", "secret");
        assert_eq!(client.stream_auth_header(), "Safie-API-Key: secret\r\n");
    }
}
