// src/renderer/mod.rs
//! Page-renderer capability. The headless-browser runtime itself lives in a
//! sidecar process; this crate only consumes the capability: open an
//! isolated browsing context, navigate with a wait strategy and timeout,
//! run selector queries against the live DOM, and close the context.

pub mod fixture;
pub mod remote;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to let a page settle before the navigation is considered done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    DomContentLoaded,
    NetworkIdle,
    Load,
}

impl WaitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitStrategy::DomContentLoaded => "domcontentloaded",
            WaitStrategy::NetworkIdle => "networkidle",
            WaitStrategy::Load => "load",
        }
    }
}

/// An image discovered on a rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
    pub width: u32,
    pub height: u32,
    /// Where the image came from: "project_data", "page_content", "fallback".
    pub source: String,
}

/// Factory for isolated browsing contexts. One context per listing page or
/// detail page; the caller is responsible for closing every context it
/// opens, on success and failure paths alike.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

/// One live browsing context.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate and wait according to `wait`; errors after `timeout`.
    async fn navigate(&mut self, url: &str, wait: WaitStrategy, timeout: Duration) -> Result<()>;

    /// Incremental scroll to trigger lazy-loaded content, capped at
    /// `max_steps` iterations.
    async fn scroll_to_bottom(&mut self, max_steps: u32) -> Result<()>;

    /// Inner text of the first element matching `selector`, if any.
    async fn text(&mut self, selector: &str) -> Result<Option<String>>;

    /// Attribute value of the first element matching `selector`, if any.
    async fn attr(&mut self, selector: &str, attr: &str) -> Result<Option<String>>;

    /// `href` targets of all anchors matching `selector`, resolved absolute.
    async fn links(&mut self, selector: &str) -> Result<Vec<String>>;

    /// All candidate images on the page (`<img>` plus background-image
    /// declarations), with natural dimensions where known.
    async fn images(&mut self) -> Result<Vec<PageImage>>;

    /// Full visible text of the page body.
    async fn body_text(&mut self) -> Result<String>;

    /// Embedded structured data: parsed `application/ld+json` blocks and
    /// server-injected state blobs.
    async fn structured_data(&mut self) -> Result<Vec<serde_json::Value>>;

    async fn close(&mut self) -> Result<()>;
}

/// Run `op` against a freshly opened session and close the session on every
/// exit path. This is the only sanctioned way to borrow a context.
pub async fn with_session<R, F>(renderer: &dyn PageRenderer, op: F) -> Result<R>
where
    F: for<'a> FnOnce(
            &'a mut dyn PageSession,
        )
            -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<R>> + Send + 'a>>
        + Send,
    R: Send,
{
    let mut session = renderer.open().await?;
    let out = op(session.as_mut()).await;
    let closed = session.close().await;
    let value = out?;
    closed?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::fixture::{FixturePage, FixtureRenderer};

    #[tokio::test]
    async fn with_session_closes_on_error() {
        let renderer = FixtureRenderer::new(vec![FixturePage::new("https://example.com/only")]);

        let out: Result<()> = with_session(&renderer, |sess| {
            Box::pin(async move {
                sess.navigate(
                    "https://example.com/missing",
                    WaitStrategy::DomContentLoaded,
                    Duration::from_secs(1),
                )
                .await?;
                Ok(())
            })
        })
        .await;

        assert!(out.is_err(), "navigation to unknown fixture must fail");
        assert_eq!(renderer.opened(), renderer.closed(), "context leaked");
    }
}
