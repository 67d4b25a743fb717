//! # Pushbullet REST Client
//!
//! Thin typed layer over [`ApiClient`] for the handful of v2 endpoints the
//! relay needs. All calls authenticate with the `Access-Token` header and go
//! through the retry middleware.

use async_trait::async_trait;
use reqwest::header::HeaderName;
use reqwest::Method;

use super::error::ProviderError;
use super::models::{Device, DeviceList, NewDevice, NewNote, Push, PushList};
use super::PushProvider;
use crate::retrieve::{ApiClient, ApiResponse, AuthScheme};

/// Production REST endpoint.
pub const API_BASE_URL: &str = "https://api.pushbullet.com/v2/";

/// Page size requested from `GET /v2/pushes`.
const PUSH_PAGE_LIMIT: u32 = 500;
/// Hard stop on cursor following, so a misbehaving server cannot loop us.
const MAX_PUSH_PAGES: usize = 20;

pub struct PushbulletClient {
    api: ApiClient,
}

impl PushbulletClient {
    pub fn new(api_key: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(API_BASE_URL, api_key)
    }

    /// Client against another base URL (a proxy or a local mock server).
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, ProviderError> {
        let auth = AuthScheme::Header(HeaderName::from_static("access-token"), api_key.to_string());
        Ok(Self {
            api: ApiClient::new(base_url, Some(auth))?,
        })
    }

    fn into_data<T>(response: ApiResponse<T>, what: &'static str) -> Result<T, ProviderError> {
        if response.success {
            return response.data.ok_or(ProviderError::EmptyResponse(what));
        }
        match response.status {
            401 | 403 => Err(ProviderError::InvalidKey(response.status)),
            status => Err(ProviderError::Api {
                status,
                body: response.error_body.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl PushProvider for PushbulletClient {
    async fn list_devices(&self) -> Result<Vec<Device>, ProviderError> {
        let response = self
            .api
            .request::<DeviceList, ()>(Method::GET, "devices", &[("active", "true".to_string())], None)
            .await?;
        Ok(Self::into_data(response, "GET devices")?.devices)
    }

    async fn create_device(&self, nickname: &str) -> Result<Device, ProviderError> {
        let body = NewDevice {
            nickname,
            model: "ODP",
            manufacturer: "ODP",
            icon: "system",
        };
        let response = self
            .api
            .request::<Device, _>(Method::POST, "devices", &[], Some(&body))
            .await?;
        let device = Self::into_data(response, "POST devices")?;
        log::info!("Created Pushbullet device '{}' ({})", device.name(), device.iden);
        Ok(device)
    }

    async fn list_pushes(&self, modified_after: Option<f64>) -> Result<Vec<Push>, ProviderError> {
        let mut pushes = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PUSH_PAGES {
            let mut query = vec![
                ("active", "true".to_string()),
                ("limit", PUSH_PAGE_LIMIT.to_string()),
            ];
            if let Some(after) = modified_after {
                query.push(("modified_after", after.to_string()));
            }
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .api
                .request::<PushList, ()>(Method::GET, "pushes", &query, None)
                .await?;
            let page = Self::into_data(response, "GET pushes")?;
            pushes.extend(page.pushes);

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(pushes),
            }
        }

        log::warn!(
            "Stopped following push pagination after {} pages ({} pushes)",
            MAX_PUSH_PAGES,
            pushes.len()
        );
        Ok(pushes)
    }

    async fn delete_push(&self, iden: &str) -> Result<(), ProviderError> {
        let path = format!("pushes/{}", iden);
        let response = self
            .api
            .request::<serde_json::Value, ()>(Method::DELETE, &path, &[], None)
            .await?;
        Self::into_data(response, "DELETE push").map(|_| ())
    }

    async fn push_note(&self, device_iden: &str, title: &str, body: &str) -> Result<(), ProviderError> {
        let note = NewNote {
            kind: "note",
            device_iden,
            title,
            body,
        };
        let response = self
            .api
            .request::<serde_json::Value, _>(Method::POST, "pushes", &[], Some(&note))
            .await?;
        Self::into_data(response, "POST pushes").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response per entry and returns the raw requests.
    fn mock_server(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{}/v2/", port);

        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                requests.push(read_request(&mut stream));

                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
            requests
        });

        (url, handle)
    }

    /// Reads headers plus a `Content-Length` body.
    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn test_list_devices_sends_access_token() {
        let (url, handle) = mock_server(vec![(
            200,
            r#"{"devices": [{"iden": "d1", "nickname": "Phone"}, {"iden": "d2"}]}"#,
        )]);
        let client = PushbulletClient::with_base_url(&url, "token123").unwrap();

        let devices = client.list_devices().await.unwrap();
        let requests = handle.join().unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name(), "Phone");
        assert_eq!(devices[1].name(), "");
        assert!(requests[0].starts_with("GET /v2/devices?active=true "));
        assert!(requests[0].to_lowercase().contains("access-token: token123"));
    }

    #[tokio::test]
    async fn test_list_pushes_follows_cursor() {
        let (url, handle) = mock_server(vec![
            (200, r#"{"pushes": [{"iden": "p1", "modified": 101.5}], "cursor": "next"}"#),
            (200, r#"{"pushes": [{"iden": "p2", "modified": 100.0}]}"#),
        ]);
        let client = PushbulletClient::with_base_url(&url, "token").unwrap();

        let pushes = client.list_pushes(Some(90.0)).await.unwrap();
        let requests = handle.join().unwrap();

        let idens: Vec<&str> = pushes.iter().map(|p| p.iden.as_str()).collect();
        assert_eq!(idens, vec!["p1", "p2"]);
        assert!(requests[0].contains("modified_after=90"));
        assert!(requests[1].contains("cursor=next"));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_invalid_key() {
        let (url, handle) = mock_server(vec![(401, r#"{"error": {"code": "invalid_access_token"}}"#)]);
        let client = PushbulletClient::with_base_url(&url, "bad").unwrap();

        let err = client.list_devices().await.unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, ProviderError::InvalidKey(401)));
    }

    #[tokio::test]
    async fn test_push_note_body() {
        let (url, handle) = mock_server(vec![(200, r#"{"iden": "reply1"}"#)]);
        let client = PushbulletClient::with_base_url(&url, "token").unwrap();

        client.push_note("src1", "Command: 'x'. Result: Success", "now").await.unwrap();
        let requests = handle.join().unwrap();

        assert!(requests[0].starts_with("POST /v2/pushes "));
        assert!(requests[0].contains(r#""device_iden":"src1""#));
        assert!(requests[0].contains(r#""type":"note""#));
    }
}
