//! HTTP client seam
//!
//! Workers talk to the network through the [`Client`] trait so the request
//! behavior (Host override, default User-Agent, redirect trapping, auth
//! retries) can be exercised against a scripted mock. [`HttpClient`] is the
//! real implementation over reqwest; a [`ClientFactory`] builds one client
//! per worker so connection pools are never shared across workers.

pub mod mock;

use crate::{BurrowError, ConfigError, ConfigResult, Result};
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, USER_AGENT, WWW_AUTHENTICATE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Bodies are read up to this many bytes; anything longer is truncated.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Status codes that trigger the forwarded-for bypass probe.
const BYPASS_CODES: [u16; 4] = [401, 403, 504, 511];

/// The response to a single probe, with redirects trapped rather than
/// followed: a 3xx lands here with `redirect` set to the resolved Location.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// HTTP status code
    pub code: u16,
    /// Content-Length header value, -1 if unknown
    pub length: i64,
    /// Raw Content-Type header value
    pub content_type: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Resolved redirect target for 3xx responses
    pub redirect: Option<Url>,
    /// Response body, truncated to [`BODY_LIMIT`]
    pub body: Vec<u8>,
}

/// A client able to issue one probe request.
pub trait Client: Send {
    /// Issues a GET for `url`, optionally overriding the `Host` header, with
    /// the given header map applied.
    fn request(
        &mut self,
        url: &Url,
        host: Option<&str>,
        header: &HeaderMap,
    ) -> impl Future<Output = Result<ProbeResponse>> + Send;
}

/// Builds clients for workers; each worker owns its own client.
pub trait ClientFactory: Send + Sync {
    type Client: Client + 'static;

    fn build(&self) -> Result<Self::Client>;
}

/// Client factory over reqwest with optional SOCKS proxies.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    proxies: Vec<Url>,
    timeout: Duration,
    user_agent: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpClientFactory {
    /// Validates the proxy list and captures client defaults. reqwest only
    /// dials socks5/socks5h; other socks flavors are configuration errors.
    pub fn new(proxies: &[String], timeout: Duration, user_agent: &str) -> ConfigResult<Self> {
        let mut parsed = Vec::with_capacity(proxies.len());
        for proxy in proxies {
            let url = Url::parse(proxy).map_err(|_| ConfigError::InvalidProxy(proxy.clone()))?;
            match url.scheme() {
                "socks5" | "socks5h" | "http" | "https" => {}
                other => return Err(ConfigError::UnsupportedProxy(other.to_string())),
            }
            if url.host_str().is_none() {
                return Err(ConfigError::InvalidProxy(proxy.clone()));
            }
            parsed.push(url);
        }
        Ok(Self {
            proxies: parsed,
            timeout,
            user_agent: user_agent.to_string(),
            username: None,
            password: None,
        })
    }

    /// Sets HTTP Basic credentials for the 401 retry.
    pub fn set_credentials(&mut self, username: Option<String>, password: Option<String>) {
        self.username = username;
        self.password = password;
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = HttpClient;

    fn build(&self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true);
        if let Some(proxy) = self.proxies.choose(&mut rand::thread_rng()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        Ok(HttpClient {
            inner: builder.build()?,
            user_agent: self.user_agent.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// reqwest-backed client adding the default User-Agent, the auth-bypass
/// probe, and the HTTP Basic retry.
pub struct HttpClient {
    inner: reqwest::Client,
    user_agent: String,
    username: Option<String>,
    password: Option<String>,
}

enum Attempt {
    Plain,
    Bypass,
    Basic,
}

impl HttpClient {
    fn build_request(
        &self,
        url: &Url,
        host: Option<&str>,
        header: &HeaderMap,
        attempt: &Attempt,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.inner.get(url.clone()).headers(header.clone());
        if !header.contains_key(USER_AGENT) {
            builder = builder.header(USER_AGENT, &self.user_agent);
        }
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        match attempt {
            Attempt::Plain => builder,
            Attempt::Bypass => builder
                .header("X-Forwarded-For", "127.0.0.1")
                .header("X-Real-IP", "127.0.0.1"),
            Attempt::Basic => {
                builder.basic_auth(self.username.as_deref().unwrap_or(""), self.password.as_deref())
            }
        }
    }

    async fn send(
        &self,
        url: &Url,
        host: Option<&str>,
        header: &HeaderMap,
        attempt: Attempt,
    ) -> Result<reqwest::Response> {
        self.build_request(url, host, header, &attempt)
            .send()
            .await
            .map_err(|source| BurrowError::Transport {
                url: url.to_string(),
                source,
            })
    }
}

impl Client for HttpClient {
    async fn request(
        &mut self,
        url: &Url,
        host: Option<&str>,
        header: &HeaderMap,
    ) -> Result<ProbeResponse> {
        let mut resp = self.send(url, host, header, Attempt::Plain).await?;
        let code = resp.status().as_u16();

        if BYPASS_CODES.contains(&code) {
            // Probe whether forwarded-for headers change the answer, then
            // keep processing the original response either way.
            match self.send(url, host, header, Attempt::Bypass).await {
                Ok(probe) if probe.status().is_success() || probe.status().is_redirection() => {
                    tracing::warn!(
                        "{url}: {} with plain request, but {} with X-Forwarded-For headers",
                        code,
                        probe.status().as_u16()
                    );
                }
                _ => {}
            }
        }

        if code == StatusCode::UNAUTHORIZED.as_u16()
            && self.username.is_some()
            && wants_basic_auth(resp.headers())
        {
            resp = self.send(url, host, header, Attempt::Basic).await?;
        }

        read_response(url, resp).await
    }
}

fn wants_basic_auth(headers: &HeaderMap) -> bool {
    headers
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.len() >= 6 && v[..6].eq_ignore_ascii_case("basic "))
        .unwrap_or(false)
}

async fn read_response(url: &Url, mut resp: reqwest::Response) -> Result<ProbeResponse> {
    let code = resp.status().as_u16();
    let headers = resp.headers().clone();

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1);

    let redirect = if resp.status().is_redirection() {
        headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| url.join(location).ok())
    } else {
        None
    };

    let mut body = Vec::new();
    loop {
        let chunk = resp.chunk().await.map_err(|source| BurrowError::Transport {
            url: url.to_string(),
            source,
        })?;
        let Some(chunk) = chunk else { break };
        let remaining = BODY_LIMIT - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(ProbeResponse {
        code,
        length,
        content_type,
        headers,
        redirect,
        body,
    })
}
