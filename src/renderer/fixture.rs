// src/renderer/fixture.rs
//! Scripted renderer for tests and offline demos: pages are keyed by URL
//! and answer queries from canned data. Open/close calls are counted so
//! tests can assert that no context leaks.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{PageImage, PageRenderer, PageSession, WaitStrategy};

/// One canned page.
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub url: String,
    pub body_text: String,
    /// selector -> inner text
    pub texts: HashMap<String, String>,
    /// (selector, attr) -> value
    pub attrs: HashMap<(String, String), String>,
    /// selector -> hrefs
    pub links: HashMap<String, Vec<String>>,
    pub images: Vec<PageImage>,
    pub structured: Vec<Value>,
    /// Simulate a navigation failure (timeout, anti-bot block).
    pub fail_navigation: bool,
}

impl FixturePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_attr(mut self, selector: &str, attr: &str, value: &str) -> Self {
        self.attrs
            .insert((selector.to_string(), attr.to_string()), value.to_string());
        self
    }

    pub fn with_links(mut self, selector: &str, hrefs: &[&str]) -> Self {
        self.links.insert(
            selector.to_string(),
            hrefs.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_image(mut self, url: &str, width: u32, height: u32) -> Self {
        self.images.push(PageImage {
            url: url.to_string(),
            alt: String::new(),
            width,
            height,
            source: "page_content".to_string(),
        });
        self
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured.push(value);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_navigation = true;
        self
    }
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Renderer serving `FixturePage`s.
pub struct FixtureRenderer {
    pages: Arc<HashMap<String, FixturePage>>,
    counters: Arc<Counters>,
}

impl FixtureRenderer {
    pub fn new(pages: Vec<FixturePage>) -> Self {
        let pages = pages.into_iter().map(|p| (p.url.clone(), p)).collect();
        Self {
            pages: Arc::new(pages),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for FixtureRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureSession {
            pages: self.pages.clone(),
            counters: self.counters.clone(),
            current: None,
            closed: false,
        }))
    }
}

struct FixtureSession {
    pages: Arc<HashMap<String, FixturePage>>,
    counters: Arc<Counters>,
    current: Option<FixturePage>,
    closed: bool,
}

impl FixtureSession {
    fn page(&self) -> Result<&FixturePage> {
        self.current
            .as_ref()
            .ok_or_else(|| anyhow!("fixture: no page navigated"))
    }
}

#[async_trait]
impl PageSession for FixtureSession {
    async fn navigate(&mut self, url: &str, _wait: WaitStrategy, _timeout: Duration) -> Result<()> {
        match self.pages.get(url) {
            Some(p) if p.fail_navigation => Err(anyhow!("fixture: navigation failed for {url}")),
            Some(p) => {
                self.current = Some(p.clone());
                Ok(())
            }
            None => Err(anyhow!("fixture: no page scripted for {url}")),
        }
    }

    async fn scroll_to_bottom(&mut self, _max_steps: u32) -> Result<()> {
        self.page().map(|_| ())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>> {
        Ok(self.page()?.texts.get(selector).cloned())
    }

    async fn attr(&mut self, selector: &str, attr: &str) -> Result<Option<String>> {
        Ok(self
            .page()?
            .attrs
            .get(&(selector.to_string(), attr.to_string()))
            .cloned())
    }

    async fn links(&mut self, selector: &str) -> Result<Vec<String>> {
        Ok(self.page()?.links.get(selector).cloned().unwrap_or_default())
    }

    async fn images(&mut self) -> Result<Vec<PageImage>> {
        Ok(self.page()?.images.clone())
    }

    async fn body_text(&mut self) -> Result<String> {
        Ok(self.page()?.body_text.clone())
    }

    async fn structured_data(&mut self) -> Result<Vec<Value>> {
        Ok(self.page()?.structured.clone())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
