// src/services/fetch.rs

//! Page sources.
//!
//! Both implementations share one contract: raw HTML on success, `None` for
//! anything else. Failures are logged here and never propagate.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::process::Command;

use crate::error::Result;
use crate::models::{FetchConfig, RenderConfig};
use crate::utils::http;

/// Something that can turn a URL into page HTML.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fetch the page, or `None` when no usable content was obtained.
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// Plain HTTP GET with a browser-like user agent.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self::with_client(http::create_fetch_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", url, e);
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", url, e);
                return None;
            }
        };

        match response.text().await {
            Ok(body) if !body.trim().is_empty() => Some(body),
            Ok(_) => {
                log::warn!("Empty response body from {}", url);
                None
            }
            Err(e) => {
                log::warn!("Failed to read body from {}: {}", url, e);
                None
            }
        }
    }
}

/// Headless browser fetch that returns the DOM after scripts have run.
///
/// The browser is given `ready_wait_ms` of virtual time to settle, after
/// which whatever DOM exists is dumped. The whole call is bounded by
/// `timeout`.
pub struct RenderedFetcher {
    browser: String,
    extra_args: Vec<String>,
    user_agent: String,
    ready_wait_ms: u64,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(render: &RenderConfig, fetch: &FetchConfig) -> Self {
        Self {
            browser: render.browser.clone(),
            extra_args: render.extra_args.clone(),
            user_agent: fetch.user_agent.clone(),
            ready_wait_ms: render.ready_wait_ms,
            timeout: Duration::from_secs(render.timeout_secs),
        }
    }

    fn command_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--headless=new".to_string()];
        args.extend(self.extra_args.iter().cloned());
        args.push(format!("--user-agent={}", self.user_agent));
        args.push(format!("--virtual-time-budget={}", self.ready_wait_ms));
        args.push("--dump-dom".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl PageSource for RenderedFetcher {
    fn name(&self) -> &str {
        "rendered"
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let child = Command::new(&self.browser)
            .args(self.command_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Failed to launch browser '{}': {}", self.browser, e);
                return None;
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::warn!("Rendered fetch of {} failed: {}", url, e);
                return None;
            }
            Err(_) => {
                log::warn!(
                    "Rendered fetch of {} timed out after {}s",
                    url,
                    self.timeout.as_secs()
                );
                return None;
            }
        };

        if !output.status.success() {
            log::warn!("Browser exited with {} for {}", output.status, url);
            return None;
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            log::warn!("Browser returned an empty DOM for {}", url);
            return None;
        }
        Some(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_command_args() {
        let render = RenderConfig {
            ready_wait_ms: 5000,
            ..RenderConfig::default()
        };
        let fetch = FetchConfig {
            user_agent: "UA/1.0".to_string(),
            ..FetchConfig::default()
        };
        let args = RenderedFetcher::new(&render, &fetch).command_args("https://example.com/");

        assert_eq!(args.first().map(String::as_str), Some("--headless=new"));
        assert!(args.contains(&"--user-agent=UA/1.0".to_string()));
        assert!(args.contains(&"--virtual-time-budget=5000".to_string()));
        assert!(args.contains(&"--dump-dom".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/"));
    }

    #[tokio::test]
    async fn test_missing_browser_yields_no_content() {
        let render = RenderConfig {
            browser: "/nonexistent/browser-binary".to_string(),
            ..RenderConfig::default()
        };
        let fetcher = RenderedFetcher::new(&render, &FetchConfig::default());
        assert!(fetcher.fetch("https://example.com/").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_no_content() {
        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout_secs: 2,
            ..FetchConfig::default()
        })
        .unwrap();
        assert!(fetcher.fetch("http://127.0.0.1:9/").await.is_none());
    }
}
