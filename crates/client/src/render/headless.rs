//! Snapshot capture on a shared headless Chrome/Chromium instance.

use std::time::Instant;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use ogsnap_core::{Error, Snapshot};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use url::Url;

use super::idle::NetworkIdle;
use super::{CaptureConfig, RenderError, SnapshotCapturer};

/// Headless browser capturer.
///
/// One browser process is shared by all captures; each capture gets its own
/// page. At most `max_concurrent` pages are open at a time.
pub struct HeadlessCapturer {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    slots: Semaphore,
    config: CaptureConfig,
}

impl HeadlessCapturer {
    /// Launch the browser and start its CDP event loop.
    pub async fn start(config: CaptureConfig) -> Result<Self, RenderError> {
        let (width, height) = config.viewport;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height)
            .arg("--font-render-hinting=none")
            .arg("--hide-scrollbars");
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let (browser, mut handler) = Browser::launch(builder.build().map_err(RenderError::BrowserLaunch)?)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                }
            }
            tracing::debug!("browser handler finished");
        });

        tracing::info!(max_concurrent = config.max_concurrent, "headless browser started");

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
            slots: Semaphore::new(config.max_concurrent),
            config,
        })
    }

    /// Close the browser. Captures started afterwards fail with `BrowserClosed`.
    ///
    /// Waits for in-flight captures to release the browser first.
    pub async fn stop(&self) {
        self.slots.close();

        if let Some(mut browser) = self.browser.write().await.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("browser close failed: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("browser wait failed: {e}");
            }
        }

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        tracing::info!("headless browser stopped");
    }

    async fn shoot(&self, page: &Page, url: &Url) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.config.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(width, height, self.config.device_scale_factor, false))
            .await
            .map_err(|e| RenderError::Screenshot(format!("viewport override: {e}")))?;

        let idle = NetworkIdle::watch(page, self.config.idle_max_inflight, self.config.idle_window()).await?;

        page.goto(url.as_str()).await.map_err(|e| RenderError::Navigation(e.to_string()))?;
        let request = page.wait_for_navigation_response().await.map_err(|e| RenderError::Navigation(e.to_string()))?;

        let status = request.as_ref().and_then(|r| r.response.as_ref()).map(|r| r.status);
        match status {
            Some(200) => {}
            Some(other) => return Err(RenderError::NonOkStatus(u16::try_from(other).unwrap_or(0))),
            None => return Err(RenderError::Navigation("no response for main document".into())),
        }

        idle.settled().await;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(i64::from(self.config.jpeg_quality))
            .full_page(false)
            .build();

        page.screenshot(params).await.map_err(|e| RenderError::Screenshot(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SnapshotCapturer for HeadlessCapturer {
    async fn capture(&self, url: &Url) -> Result<Snapshot, Error> {
        let queued = tokio::time::timeout(self.config.queue_timeout(), self.slots.acquire())
            .await
            .map_err(|_| RenderError::Saturated(self.config.queue_timeout_ms))?;
        let _permit = queued.map_err(|_| RenderError::BrowserClosed)?;

        let browser = self.browser.read().await;
        let browser = browser.as_ref().ok_or(RenderError::BrowserClosed)?;

        let start = Instant::now();
        let page = browser.new_page("about:blank").await.map_err(|e| RenderError::Navigation(e.to_string()))?;

        let result = tokio::time::timeout(self.config.timeout(), self.shoot(&page, url))
            .await
            .unwrap_or(Err(RenderError::Timeout(self.config.timeout_ms)));

        if let Err(e) = page.close().await {
            tracing::debug!("page close failed: {e}");
        }

        let bytes = result?;
        tracing::info!(%url, bytes = bytes.len(), elapsed_ms = start.elapsed().as_millis() as u64, "captured snapshot");

        Ok(Snapshot::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_start_with_missing_executable() {
        let config = CaptureConfig { chrome_executable: Some("/nonexistent/chromium".into()), ..Default::default() };
        let result = HeadlessCapturer::start(config).await;
        assert!(matches!(result, Err(RenderError::BrowserLaunch(_))));
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_capture_local_page() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/hello");
                then.status(200).header("content-type", "text/html").body("<html><body><h1>Hello</h1></body></html>");
            })
            .await;

        let capturer = HeadlessCapturer::start(CaptureConfig::default()).await.unwrap();
        let url = Url::parse(&server.url("/hello")).unwrap();

        let snapshot = capturer.capture(&url).await.unwrap();
        assert!(snapshot.bytes.starts_with(&[0xFF, 0xD8]));

        capturer.stop().await;
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_capture_non_ok_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404).header("content-type", "text/html").body("<html><body>gone</body></html>");
            })
            .await;

        let capturer = HeadlessCapturer::start(CaptureConfig::default()).await.unwrap();
        let url = Url::parse(&server.url("/missing")).unwrap();

        let result = capturer.capture(&url).await;
        assert_eq!(result.unwrap_err(), Error::NonOkResponse(404));

        capturer.stop().await;
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_capture_after_stop() {
        let capturer = HeadlessCapturer::start(CaptureConfig::default()).await.unwrap();
        capturer.stop().await;

        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = capturer.capture(&url).await;
        assert!(matches!(result, Err(Error::CaptureFailed(msg)) if msg.contains("closed")));
    }
}
