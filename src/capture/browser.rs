//! Headless Chrome session over the DevTools protocol.
//!
//! chromiumoxide is async; the session owns a single-threaded runtime and
//! blocks on each call so the capture flow stays sequential.

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use super::CaptureError;
use crate::config::CaptureConfig;

/// Browser operations the capture flow needs.
pub trait DashboardBrowser {
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError>;
    /// Waits until `selector` matches an element, up to `timeout`.
    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), CaptureError>;
    fn save_screenshot(&mut self, path: &Path) -> Result<(), CaptureError>;
    /// Clicks the first selector that matches. Returns the one clicked, if any.
    fn click_first(&mut self, selectors: &[String]) -> Result<Option<String>, CaptureError>;
    fn pause(&mut self, duration: Duration);
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct ChromeSession {
    runtime: Runtime,
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    /// Launches headless Chrome and opens a blank tab.
    pub fn launch(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if let Some(exe) = &config.chrome_executable {
            builder = builder.chrome_executable(crate::paths::expand_home(exe));
        }
        let browser_config = builder.build().map_err(CaptureError::Launch)?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(browser_config))
            .map_err(|e| CaptureError::Launch(e.to_string()))?;

        let handler_task = runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromiumoxide handler event error: {}", e);
                }
            }
        });

        let page = match runtime.block_on(browser.new_page("about:blank")) {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                runtime.block_on(async {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                });
                handler_task.abort();
                return Err(CaptureError::Launch(e.to_string()));
            }
        };

        tracing::info!("Headless browser started");
        Ok(Self {
            runtime,
            browser: Some(browser),
            page,
            handler_task,
        })
    }
}

impl DashboardBrowser for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        let page = &self.page;
        self.runtime
            .block_on(async {
                page.goto(url).await?;
                page.wait_for_navigation().await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            })
            .map_err(|e| CaptureError::Navigation(format!("{}: {}", url, e)))
    }

    fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), CaptureError> {
        let page = &self.page;
        let start = Instant::now();
        self.runtime.block_on(async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(CaptureError::NotReady(format!(
                        "'{}' not present after {:?}",
                        selector, timeout
                    )));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
    }

    fn save_screenshot(&mut self, path: &Path) -> Result<(), CaptureError> {
        let page = &self.page;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.runtime
            .block_on(page.save_screenshot(params, path))
            .map(|_| ())
            .map_err(|e| CaptureError::Screenshot(format!("{}: {}", path.display(), e)))
    }

    fn click_first(&mut self, selectors: &[String]) -> Result<Option<String>, CaptureError> {
        let page = &self.page;
        self.runtime.block_on(async {
            for selector in selectors {
                let Ok(element) = page.find_element(selector.as_str()).await else {
                    continue;
                };
                element
                    .click()
                    .await
                    .map_err(|e| CaptureError::Interaction(format!("{}: {}", selector, e)))?;
                return Ok(Some(selector.clone()));
            }
            Ok(None)
        })
    }

    fn pause(&mut self, duration: Duration) {
        self.runtime.block_on(tokio::time::sleep(duration));
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            self.runtime.block_on(async {
                let _ = browser.close().await;
                let _ = browser.wait().await;
            });
        }
        self.handler_task.abort();
        tracing::info!("Headless browser closed");
    }
}
