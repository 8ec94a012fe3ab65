// src/renderer/remote.rs
//! HTTP client for the browser-automation sidecar. The sidecar owns the
//! actual headless browser; we drive it through a small JSON protocol:
//! `POST /contexts` -> id, `POST /contexts/{id}/goto`,
//! `POST /contexts/{id}/query`, `DELETE /contexts/{id}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{PageImage, PageRenderer, PageSession, WaitStrategy};

pub const DEFAULT_RENDERER_URL: &str = "http://localhost:7700";
pub const ENV_RENDERER_URL: &str = "RENDERER_SERVICE_URL";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct RemoteRenderer {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteRenderer {
    /// Build from `$RENDERER_SERVICE_URL` or the local default.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(ENV_RENDERER_URL).unwrap_or_else(|_| DEFAULT_RENDERER_URL.to_string());
        Self::new(&base_url)
    }

    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("crowdscout/0.1 (+github.com/crowdscout/crowdscout)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct OpenReq<'a> {
    user_agent: &'a str,
    viewport_width: u32,
    viewport_height: u32,
    /// Mask the automation flags the way a regular browser profile looks.
    stealth: bool,
}

#[derive(Deserialize)]
struct OpenResp {
    context_id: String,
}

#[derive(Serialize)]
struct GotoReq<'a> {
    url: &'a str,
    wait_until: &'a str,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct QueryReq<'a> {
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attr: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_steps: Option<u32>,
}

#[derive(Deserialize)]
struct QueryResp {
    #[serde(default)]
    value: Value,
}

#[async_trait]
impl PageRenderer for RemoteRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let req = OpenReq {
            user_agent: DEFAULT_USER_AGENT,
            viewport_width: 1280,
            viewport_height: 720,
            stealth: true,
        };
        let resp: OpenResp = self
            .http
            .post(format!("{}/contexts", self.base_url))
            .json(&req)
            .send()
            .await
            .context("renderer: open context")?
            .error_for_status()
            .context("renderer: open context status")?
            .json()
            .await
            .context("renderer: open context body")?;

        Ok(Box::new(RemoteSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            context_id: resp.context_id,
            closed: false,
        }))
    }
}

pub struct RemoteSession {
    http: reqwest::Client,
    base_url: String,
    context_id: String,
    closed: bool,
}

impl RemoteSession {
    fn context_url(&self, suffix: &str) -> String {
        format!("{}/contexts/{}{}", self.base_url, self.context_id, suffix)
    }

    async fn query(&self, req: &QueryReq<'_>) -> Result<Value> {
        let resp: QueryResp = self
            .http
            .post(self.context_url("/query"))
            .json(req)
            .send()
            .await
            .with_context(|| format!("renderer: query {}", req.op))?
            .error_for_status()
            .with_context(|| format!("renderer: query {} status", req.op))?
            .json()
            .await
            .with_context(|| format!("renderer: query {} body", req.op))?;
        Ok(resp.value)
    }

    fn query_op<'a>(op: &'a str) -> QueryReq<'a> {
        QueryReq {
            op,
            selector: None,
            attr: None,
            max_steps: None,
        }
    }
}

#[async_trait]
impl PageSession for RemoteSession {
    async fn navigate(&mut self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()> {
        let req = GotoReq {
            url,
            wait_until: wait.as_str(),
            timeout_ms: timeout.as_millis() as u64,
        };
        // The sidecar enforces its own timeout; the outer tokio timeout
        // guards against a wedged sidecar.
        let fut = self.http.post(self.context_url("/goto")).json(&req).send();
        let resp = tokio::time::timeout(timeout + Duration::from_secs(5), fut)
            .await
            .context("renderer: navigation timed out")?
            .context("renderer: goto")?;
        resp.error_for_status().context("renderer: goto status")?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self, max_steps: u32) -> Result<()> {
        let mut req = Self::query_op("scroll");
        req.max_steps = Some(max_steps);
        self.query(&req).await?;
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>> {
        let mut req = Self::query_op("text");
        req.selector = Some(selector);
        let v = self.query(&req).await?;
        Ok(v.as_str().map(str::to_string).filter(|s| !s.is_empty()))
    }

    async fn attr(&mut self, selector: &str, attr: &str) -> Result<Option<String>> {
        let mut req = Self::query_op("attr");
        req.selector = Some(selector);
        req.attr = Some(attr);
        let v = self.query(&req).await?;
        Ok(v.as_str().map(str::to_string).filter(|s| !s.is_empty()))
    }

    async fn links(&mut self, selector: &str) -> Result<Vec<String>> {
        let mut req = Self::query_op("links");
        req.selector = Some(selector);
        let v = self.query(&req).await?;
        Ok(serde_json::from_value(v).unwrap_or_default())
    }

    async fn images(&mut self) -> Result<Vec<PageImage>> {
        let v = self.query(&Self::query_op("images")).await?;
        Ok(serde_json::from_value(v).unwrap_or_default())
    }

    async fn body_text(&mut self) -> Result<String> {
        let v = self.query(&Self::query_op("body_text")).await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn structured_data(&mut self) -> Result<Vec<Value>> {
        let v = self.query(&Self::query_op("structured_data")).await?;
        Ok(serde_json::from_value(v).unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.http
            .delete(self.context_url(""))
            .send()
            .await
            .context("renderer: close context")?
            .error_for_status()
            .context("renderer: close context status")?;
        Ok(())
    }
}
