//! Scripted client for tests
//!
//! The mock factory hands out clients that share a response table keyed by
//! URL string and record every request they see, so tests can assert both
//! what a component asked for and in what order.

use super::{Client, ClientFactory, ProbeResponse};
use crate::Result;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use url::Url;

/// A canned response for one URL.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub code: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub redirect: Option<Url>,
    pub length: Option<i64>,
}

impl MockResponse {
    pub fn status(code: u16) -> Self {
        Self {
            code,
            content_type: String::new(),
            body: Vec::new(),
            redirect: None,
            length: None,
        }
    }

    pub fn html(code: u16, body: &str) -> Self {
        Self {
            code,
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
            redirect: None,
            length: None,
        }
    }

    pub fn text(code: u16, body: &str) -> Self {
        Self {
            code,
            content_type: "text/plain".to_string(),
            body: body.as_bytes().to_vec(),
            redirect: None,
            length: None,
        }
    }

    pub fn redirect(code: u16, to: Url) -> Self {
        let mut resp = Self::status(code);
        resp.redirect = Some(to);
        resp
    }

    /// Overrides the reported Content-Length (the body stays as scripted).
    pub fn with_length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    fn to_probe(&self) -> ProbeResponse {
        let mut headers = HeaderMap::new();
        if !self.content_type.is_empty() {
            if let Ok(value) = self.content_type.parse() {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        ProbeResponse {
            code: self.code,
            length: self.length.unwrap_or(self.body.len() as i64),
            content_type: self.content_type.clone(),
            headers,
            redirect: self.redirect.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, MockResponse>,
    fallback: Option<MockResponse>,
    requests: Vec<(String, Option<String>)>,
}

/// Shared-state factory; clones observe the same script and request log.
#[derive(Debug, Clone, Default)]
pub struct MockClientFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for an exact URL string.
    pub fn respond(&self, url: &str, response: MockResponse) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(url.to_string(), response);
    }

    /// Scripts the response for any URL without an exact entry.
    pub fn respond_default(&self, response: MockResponse) {
        self.state.lock().unwrap().fallback = Some(response);
    }

    /// Every request seen so far, as `(url, host_override)` in order.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Request URLs only, in order.
    pub fn request_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

impl ClientFactory for MockClientFactory {
    type Client = MockClient;

    fn build(&self) -> Result<MockClient> {
        Ok(MockClient {
            state: self.state.clone(),
        })
    }
}

/// Client half of the mock; see [`MockClientFactory`].
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl Client for MockClient {
    async fn request(
        &mut self,
        url: &Url,
        host: Option<&str>,
        _header: &HeaderMap,
    ) -> Result<ProbeResponse> {
        let mut state = self.state.lock().unwrap();
        state
            .requests
            .push((url.to_string(), host.map(str::to_string)));
        let scripted = state
            .responses
            .get(url.as_str())
            .or(state.fallback.as_ref())
            .cloned();
        drop(state);
        match scripted {
            Some(response) => Ok(response.to_probe()),
            None => Err(crate::BurrowError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no scripted response for {url}"),
            ))),
        }
    }
}
