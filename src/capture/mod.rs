//! Dashboard screenshot capture.
//!
//! This module provides:
//! - The capture flow (`capture_dashboard`), generic over the browser
//! - A headless Chrome implementation (`ChromeSession`)
//! - Manual fallback instructions when automation fails

pub mod browser;

pub use browser::{ChromeSession, DashboardBrowser};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::CaptureConfig;

pub const LIGHT_SCREENSHOT: &str = "dashboard-light.png";
pub const DARK_SCREENSHOT: &str = "dashboard-dark.png";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page not ready: {0}")]
    NotReady(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
    #[error("cannot create screenshot directory {0}: {1}")]
    Directory(PathBuf, std::io::Error),
}

/// Files written by a successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub light: PathBuf,
    /// `None` when no theme toggle was found
    pub dark: Option<PathBuf>,
}

/// Loads the dashboard, saves the light screenshot, then tries the dark one.
///
/// A missing theme toggle only skips the dark screenshot; every other
/// failure ends the capture.
pub fn capture_dashboard(
    browser: &mut dyn DashboardBrowser,
    config: &CaptureConfig,
    output_dir: &Path,
) -> Result<CaptureReport, CaptureError> {
    fs::create_dir_all(output_dir).map_err(|e| CaptureError::Directory(output_dir.to_path_buf(), e))?;

    tracing::info!("Opening {}", config.dashboard_url);
    browser.navigate(&config.dashboard_url)?;
    browser.wait_for_element(&config.ready_selector, Duration::from_millis(config.ready_timeout_ms))?;
    browser.pause(Duration::from_millis(config.settle_delay_ms));

    let light = output_dir.join(LIGHT_SCREENSHOT);
    browser.save_screenshot(&light)?;
    tracing::info!("Light mode screenshot saved: {}", light.display());

    let dark = match browser.click_first(&config.dark_mode_selectors) {
        Ok(Some(selector)) => {
            tracing::debug!("Clicked theme toggle '{}'", selector);
            browser.pause(Duration::from_millis(config.toggle_delay_ms));
            let dark = output_dir.join(DARK_SCREENSHOT);
            browser.save_screenshot(&dark)?;
            tracing::info!("Dark mode screenshot saved: {}", dark.display());
            Some(dark)
        }
        Ok(None) => {
            tracing::info!("No dark mode toggle found (skipped)");
            None
        }
        Err(e) => {
            tracing::warn!("Dark mode toggle could not be used: {} (skipped)", e);
            None
        }
    };

    Ok(CaptureReport { light, dark })
}

/// Step-by-step instructions for capturing the dashboard by hand.
pub fn manual_instructions(config: &CaptureConfig) -> String {
    let dir = config.screenshot_dir.trim_end_matches('/');
    format!(
        "Manual screenshot steps:\n\
         1. Open {url} in a browser\n\
         2. Wait until the page has fully loaded\n\
         3. Take a screenshot (about {w}x{h} works best)\n\
         4. Save it as {dir}/{light}\n\
         5. If available, switch to dark mode and save {dir}/{dark}",
        url = config.dashboard_url,
        w = config.window_width,
        h = config.window_height,
        dir = dir,
        light = LIGHT_SCREENSHOT,
        dark = DARK_SCREENSHOT,
    )
}

/// Launches headless Chrome and captures the dashboard.
///
/// On any failure, logs the error, prints manual instructions and returns
/// `None`. The browser is closed on every path.
pub fn run_capture(config: &CaptureConfig) -> Option<CaptureReport> {
    let output_dir = config.screenshot_path();

    let result = ChromeSession::launch(config)
        .and_then(|mut session| capture_dashboard(&mut session, config, &output_dir));

    match result {
        Ok(report) => {
            tracing::info!("Screenshot capture complete");
            Some(report)
        }
        Err(e) => {
            tracing::error!("Automatic capture failed: {}", e);
            println!("{}", manual_instructions(config));
            None
        }
    }
}
