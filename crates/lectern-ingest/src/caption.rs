//! Image captioning under a per-window quota.
//!
//! Each image gets OCR text plus a model caption. The primary vision provider
//! is used until `quota_limit` calls have been made in the current window;
//! later images go to the secondary provider until the window expires.

use crate::error::{IngestError, IngestResult};
use crate::toolkit::run_blocking;
use async_trait::async_trait;
use lectern_config::CaptioningConfig;
use lectern_providers::VisionProvider;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source of the current instant, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

/// Which vision provider handles an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    Primary,
    Secondary,
}

impl ProviderChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderChoice::Primary => "primary",
            ProviderChoice::Secondary => "secondary",
        }
    }
}

/// The primary is used while fewer than `limit` calls were made in the window.
pub fn choose_provider(counter: u32, limit: u32) -> ProviderChoice {
    if counter < limit {
        ProviderChoice::Primary
    } else {
        ProviderChoice::Secondary
    }
}

/// Call counter for the primary provider over a sliding window.
#[derive(Debug, Clone)]
pub struct QuotaWindow {
    counter: u32,
    window_start: Instant,
    limit: u32,
    window: Duration,
    overflow: u32,
}

impl QuotaWindow {
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            counter: 0,
            window_start: now,
            limit,
            window,
            overflow: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Start a new window once strictly more than `window` has elapsed.
    pub fn maybe_reset(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) > self.window {
            if self.counter > 0 || self.overflow > 0 {
                info!(
                    "Caption quota window reset after {} primary and {} secondary calls",
                    self.counter, self.overflow
                );
            }
            self.counter = 0;
            self.overflow = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// Decide the provider for the next image and count primary calls.
    pub fn acquire(&mut self, now: Instant) -> ProviderChoice {
        self.maybe_reset(now);
        let choice = choose_provider(self.counter, self.limit);
        match choice {
            ProviderChoice::Primary => self.counter += 1,
            ProviderChoice::Secondary => {
                if self.overflow == 0 {
                    info!(
                        "Primary caption quota of {} per {}s reached, switching to secondary",
                        self.limit,
                        self.window.as_secs()
                    );
                }
                self.overflow += 1;
            }
        }
        choice
    }
}

/// Pulls printed text out of an image. Returns an empty string on failure.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &Path) -> String;
}

/// OCR through the Tesseract CLI.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    timeout: Duration,
}

impl TesseractExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image: &Path) -> String {
        let path = image.to_path_buf();
        let task = run_blocking(move || Ok(lectern_process::ocr_image(&path)?));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.text,
            Ok(Err(e)) => {
                warn!("OCR failed for {:?}: {}", image, e);
                String::new()
            }
            Err(_) => {
                warn!("OCR timed out for {:?} after {}s", image, self.timeout.as_secs());
                String::new()
            }
        }
    }
}

/// Join OCR text and model caption into one labeled description.
pub fn combine_caption(ocr: &str, model: &str) -> Option<String> {
    let mut sections = Vec::new();
    let ocr = ocr.trim();
    let model = model.trim();
    if !ocr.is_empty() {
        sections.push(format!("Caption by OCR:\n{}", ocr));
    }
    if !model.is_empty() {
        sections.push(format!("Caption by model:\n{}", model));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

/// Captions images, spreading calls between two providers by quota.
pub struct CaptionScheduler {
    primary: Arc<dyn VisionProvider>,
    secondary: Arc<dyn VisionProvider>,
    extractor: Arc<dyn TextExtractor>,
    clock: Arc<dyn Clock>,
    quota: tokio::sync::Mutex<QuotaWindow>,
    timeout: Duration,
}

impl CaptionScheduler {
    pub fn new(
        primary: Arc<dyn VisionProvider>,
        secondary: Arc<dyn VisionProvider>,
        extractor: Arc<dyn TextExtractor>,
        clock: Arc<dyn Clock>,
        config: &CaptioningConfig,
    ) -> Self {
        let quota = QuotaWindow::new(
            config.quota_limit,
            Duration::from_secs(config.window_seconds),
            clock.now(),
        );
        Self {
            primary,
            secondary,
            extractor,
            clock,
            quota: tokio::sync::Mutex::new(quota),
            timeout: Duration::from_secs(config.caption_timeout_seconds),
        }
    }

    /// Primary calls made in the current window.
    pub async fn primary_calls(&self) -> u32 {
        self.quota.lock().await.counter()
    }

    /// Describe one image. `None` when neither OCR nor a model produced text.
    pub async fn caption(&self, image: &Path) -> IngestResult<Option<String>> {
        let bytes = tokio::fs::read(image).await?;
        let mime = mime_guess::from_path(image)
            .first_raw()
            .unwrap_or("image/png");

        let ocr = self.extractor.extract(image).await;

        let choice = {
            let mut quota = self.quota.lock().await;
            quota.acquire(self.clock.now())
        };
        debug!("Captioning {:?} with the {} provider", image, choice.as_str());

        let model = self.describe(choice, &bytes, mime, image).await;

        self.quota.lock().await.maybe_reset(self.clock.now());

        let (model, error) = match model {
            Ok(text) => (text, None),
            Err(e) => (None, Some(e)),
        };
        match (combine_caption(&ocr, model.as_deref().unwrap_or("")), error) {
            (Some(caption), _) => Ok(Some(caption)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    /// Ask the chosen provider, falling back to the secondary once when the
    /// primary fails or says nothing. `Ok(None)` means an empty answer.
    async fn describe(
        &self,
        choice: ProviderChoice,
        bytes: &[u8],
        mime: &str,
        image: &Path,
    ) -> IngestResult<Option<String>> {
        let provider = match choice {
            ProviderChoice::Primary => &self.primary,
            ProviderChoice::Secondary => &self.secondary,
        };

        let first = self.call(provider.as_ref(), bytes, mime, image).await;
        if choice == ProviderChoice::Secondary || matches!(first, Ok(Some(_))) {
            return first;
        }

        debug!("Retrying {:?} with {}", image, self.secondary.name());
        match self.call(self.secondary.as_ref(), bytes, mime, image).await {
            Ok(None) => first,
            second => second,
        }
    }

    async fn call(
        &self,
        provider: &dyn VisionProvider,
        bytes: &[u8],
        mime: &str,
        image: &Path,
    ) -> IngestResult<Option<String>> {
        match tokio::time::timeout(self.timeout, provider.caption(bytes, mime)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(Some(text.trim().to_string())),
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) => {
                warn!("{} failed to caption {:?}: {}", provider.name(), image, e);
                Err(IngestError::Provider(e))
            }
            Err(_) => {
                warn!(
                    "{} timed out captioning {:?} after {}s",
                    provider.name(),
                    image,
                    self.timeout.as_secs()
                );
                Err(IngestError::Timeout {
                    operation: format!("{} caption of {}", provider.name(), image.display()),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lectern_providers::{ProviderError, ProviderResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FakeVision {
        pub label: &'static str,
        pub fail: bool,
        pub silent: bool,
        pub calls: AtomicUsize,
    }

    impl FakeVision {
        pub fn new(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                fail: false,
                silent: false,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn failing(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                fail: true,
                silent: false,
                calls: AtomicUsize::new(0),
            })
        }

        /// Answers every request with an empty caption.
        pub fn silent(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                fail: false,
                silent: true,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionProvider for FakeVision {
        fn name(&self) -> &str {
            self.label
        }

        async fn caption(&self, image: &[u8], _mime: &str) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::ApiError {
                    status: 429,
                    message: "quota".to_string(),
                });
            }
            if self.silent {
                return Ok(String::new());
            }
            Ok(format!("{} saw {} bytes", self.label, image.len()))
        }
    }

    pub(crate) struct FixedOcr(pub &'static str);

    #[async_trait]
    impl TextExtractor for FixedOcr {
        async fn extract(&self, _image: &Path) -> String {
            self.0.to_string()
        }
    }

    fn config() -> CaptioningConfig {
        CaptioningConfig::default()
    }

    fn write_image(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"fakepng").unwrap();
        path
    }

    #[test]
    fn test_choose_provider() {
        assert_eq!(choose_provider(0, 14), ProviderChoice::Primary);
        assert_eq!(choose_provider(13, 14), ProviderChoice::Primary);
        assert_eq!(choose_provider(14, 14), ProviderChoice::Secondary);
        assert_eq!(choose_provider(0, 0), ProviderChoice::Secondary);
    }

    #[test]
    fn test_fifteenth_call_uses_secondary() {
        let clock = ManualClock::new();
        let mut quota = QuotaWindow::new(14, Duration::from_secs(60), clock.now());

        for _ in 0..14 {
            assert_eq!(quota.acquire(clock.now()), ProviderChoice::Primary);
        }
        assert_eq!(quota.acquire(clock.now()), ProviderChoice::Secondary);
        assert_eq!(quota.counter(), 14);
    }

    #[test]
    fn test_window_reset_is_strict() {
        let clock = ManualClock::new();
        let mut quota = QuotaWindow::new(14, Duration::from_secs(60), clock.now());
        for _ in 0..14 {
            quota.acquire(clock.now());
        }

        clock.advance(Duration::from_secs(60));
        assert!(!quota.maybe_reset(clock.now()));
        assert_eq!(quota.acquire(clock.now()), ProviderChoice::Secondary);

        clock.advance(Duration::from_secs(1));
        assert_eq!(quota.acquire(clock.now()), ProviderChoice::Primary);
        assert_eq!(quota.counter(), 1);
        assert_eq!(quota.window_start(), clock.now());
    }

    #[test]
    fn test_combine_caption() {
        assert_eq!(
            combine_caption("for i in range(3)", "A code slide"),
            Some("Caption by OCR:\nfor i in range(3)\n\nCaption by model:\nA code slide".to_string())
        );
        assert_eq!(
            combine_caption("  ", "A cat"),
            Some("Caption by model:\nA cat".to_string())
        );
        assert_eq!(combine_caption("", " "), None);
    }

    #[tokio::test]
    async fn test_scheduler_switches_after_quota() {
        let dir = tempfile::tempdir().unwrap();
        let primary = FakeVision::new("gemini");
        let secondary = FakeVision::new("openai");
        let scheduler = CaptionScheduler::new(
            primary.clone(),
            secondary.clone(),
            Arc::new(FixedOcr("")),
            Arc::new(ManualClock::new()),
            &config(),
        );

        for i in 0..16 {
            let image = write_image(dir.path(), &format!("img_{}.png", i));
            let caption = scheduler.caption(&image).await.unwrap().unwrap();
            if i < 14 {
                assert_eq!(caption, "Caption by model:\ngemini saw 7 bytes");
            } else {
                assert_eq!(caption, "Caption by model:\nopenai saw 7 bytes");
            }
        }

        assert_eq!(primary.calls(), 14);
        assert_eq!(secondary.calls(), 2);
        assert_eq!(scheduler.primary_calls().await, 14);
    }

    #[tokio::test]
    async fn test_scheduler_resets_window() {
        let dir = tempfile::tempdir().unwrap();
        let primary = FakeVision::new("gemini");
        let secondary = FakeVision::new("openai");
        let clock = Arc::new(ManualClock::new());
        let config = CaptioningConfig {
            quota_limit: 2,
            ..config()
        };
        let scheduler = CaptionScheduler::new(
            primary.clone(),
            secondary.clone(),
            Arc::new(FixedOcr("")),
            clock.clone(),
            &config,
        );
        let image = write_image(dir.path(), "slide.png");

        for _ in 0..3 {
            scheduler.caption(&image).await.unwrap();
        }
        assert_eq!((primary.calls(), secondary.calls()), (2, 1));

        clock.advance(Duration::from_secs(61));
        scheduler.caption(&image).await.unwrap();
        assert_eq!((primary.calls(), secondary.calls()), (3, 1));
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let primary = FakeVision::failing("gemini");
        let secondary = FakeVision::new("openai");
        let scheduler = CaptionScheduler::new(
            primary.clone(),
            secondary.clone(),
            Arc::new(FixedOcr("x = 1")),
            Arc::new(ManualClock::new()),
            &config(),
        );
        let image = write_image(dir.path(), "board.jpg");

        let caption = scheduler.caption(&image).await.unwrap().unwrap();
        assert_eq!(caption, "Caption by OCR:\nx = 1\n\nCaption by model:\nopenai saw 7 bytes");
        assert_eq!((primary.calls(), secondary.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_nothing_produced() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CaptionScheduler::new(
            FakeVision::silent("gemini"),
            FakeVision::silent("openai"),
            Arc::new(FixedOcr("")),
            Arc::new(ManualClock::new()),
            &config(),
        );
        let image = write_image(dir.path(), "blank.png");
        assert_eq!(scheduler.caption(&image).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CaptionScheduler::new(
            FakeVision::failing("gemini"),
            FakeVision::failing("openai"),
            Arc::new(FixedOcr("")),
            Arc::new(ManualClock::new()),
            &config(),
        );
        let image = write_image(dir.path(), "blank.png");

        let err = scheduler.caption(&image).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Provider);
    }

    #[tokio::test]
    async fn test_ocr_survives_provider_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CaptionScheduler::new(
            FakeVision::failing("gemini"),
            FakeVision::failing("openai"),
            Arc::new(FixedOcr("for i in range(3)")),
            Arc::new(ManualClock::new()),
            &config(),
        );
        let image = write_image(dir.path(), "board.png");

        let caption = scheduler.caption(&image).await.unwrap().unwrap();
        assert_eq!(caption, "Caption by OCR:\nfor i in range(3)");
    }

    #[tokio::test]
    async fn test_missing_image_is_an_error() {
        let scheduler = CaptionScheduler::new(
            FakeVision::new("gemini"),
            FakeVision::new("openai"),
            Arc::new(FixedOcr("")),
            Arc::new(SystemClock),
            &config(),
        );
        assert!(scheduler.caption(Path::new("/nonexistent/x.png")).await.is_err());
    }
}
