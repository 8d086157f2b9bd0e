//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scratch: ScratchConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub pdf: PdfConfig,

    #[serde(default)]
    pub captioning: CaptioningConfig,

    #[serde(default)]
    pub text: TextConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&paths.config_file)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Scratch root, falling back to the platform data directory.
    pub fn scratch_root(&self, paths: &AppPaths) -> PathBuf {
        self.scratch
            .root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| paths.scratch_dir.clone())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.audio.max_bytes == 0 {
            return Err(ConfigError::Invalid("audio.max_bytes must be > 0".into()));
        }
        if self.text.chunk_size == 0 {
            return Err(ConfigError::Invalid("text.chunk_size must be > 0".into()));
        }
        if self.text.chunk_overlap >= self.text.chunk_size {
            return Err(ConfigError::Invalid(
                "text.chunk_overlap must be smaller than text.chunk_size".into(),
            ));
        }
        if self.video.desired_fps < 0.0 {
            return Err(ConfigError::Invalid("video.desired_fps must be >= 0".into()));
        }
        if self.pipeline.max_concurrent_files == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_concurrent_files must be > 0".into(),
            ));
        }
        if self.pipeline.tool_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.tool_timeout_seconds must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Set a single value by its dotted key, e.g. `captioning.quota_limit`.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        match key {
            "scratch.root" => self.scratch.root = Some(value.to_string()),
            "audio.max_bytes" => self.audio.max_bytes = parse(key, value)?,
            "audio.chunk_format" => self.audio.chunk_format = value.to_string(),
            "audio.transcription_timeout_seconds" => {
                self.audio.transcription_timeout_seconds = parse(key, value)?
            }
            "video.desired_fps" => self.video.desired_fps = parse(key, value)?,
            "video.transcribe_audio" => self.video.transcribe_audio = parse(key, value)?,
            "pdf.image_mode" => self.pdf.image_mode = parse(key, value)?,
            "pdf.render_dpi" => self.pdf.render_dpi = parse(key, value)?,
            "captioning.quota_limit" => self.captioning.quota_limit = parse(key, value)?,
            "captioning.window_seconds" => self.captioning.window_seconds = parse(key, value)?,
            "captioning.caption_timeout_seconds" => {
                self.captioning.caption_timeout_seconds = parse(key, value)?
            }
            "captioning.ocr_timeout_seconds" => {
                self.captioning.ocr_timeout_seconds = parse(key, value)?
            }
            "captioning.prompt" => self.captioning.prompt = value.to_string(),
            "text.chunk_size" => self.text.chunk_size = parse(key, value)?,
            "text.chunk_overlap" => self.text.chunk_overlap = parse(key, value)?,
            "pipeline.max_concurrent_files" => {
                self.pipeline.max_concurrent_files = parse(key, value)?
            }
            "pipeline.tool_timeout_seconds" => {
                self.pipeline.tool_timeout_seconds = parse(key, value)?
            }
            "providers.transcription.base_url" => {
                self.providers.transcription.base_url = value.to_string()
            }
            "providers.transcription.model" => {
                self.providers.transcription.model = value.to_string()
            }
            "providers.transcription.api_key_env" => {
                self.providers.transcription.api_key_env = value.to_string()
            }
            _ => {
                let (prefix, field) = key
                    .rsplit_once('.')
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let vision = match prefix {
                    "providers.primary_vision" => &mut self.providers.primary_vision,
                    "providers.secondary_vision" => &mut self.providers.secondary_vision,
                    _ => return Err(ConfigError::UnknownKey(key.to_string())),
                };
                vision.set(key, field, value)?;
            }
        }
        self.validate()
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Lectern Configuration
# Turns lecture recordings, slides and documents into indexable content units

[scratch]
# Root for per-batch working directories (defaults to the data dir)
# root = "/tmp/lectern"

[audio]
# Files above this size are split before transcription (25 MiB)
max_bytes = 26214400

# Container used for temporary audio slices
chunk_format = "mp3"

# Per-request timeout for the transcription provider
transcription_timeout_seconds = 300

[video]
# Frames sampled per second of video (0 keeps every frame)
desired_fps = 1.0

# Also transcribe the video's audio track
transcribe_audio = true

[pdf]
# How images are taken from PDFs: "embedded", "pages" or "off"
image_mode = "embedded"

# Resolution used when image_mode = "pages"
render_dpi = 144

[captioning]
# Requests allowed on the primary vision provider per window
quota_limit = 14
window_seconds = 60

caption_timeout_seconds = 60
ocr_timeout_seconds = 30

prompt = "What is in this image?"

[text]
# Characters per chunk and overlap between neighbours
chunk_size = 1000
chunk_overlap = 200

[pipeline]
# Files processed at the same time within one batch
max_concurrent_files = 2

# Seconds a single ffmpeg or poppler run may take before the file fails
tool_timeout_seconds = 900

# API keys are read from the named environment variables, never from this file.

[providers.transcription]
base_url = "https://api.openai.com/v1"
model = "whisper-1"
api_key_env = "OPENAI_API_KEY"
language = "en"

[providers.primary_vision]
# kind: "gemini", "openai" or "ollama"
kind = "gemini"
base_url = "https://generativelanguage.googleapis.com"
model = "gemini-1.5-flash"
api_key_env = "GEMINI_API_KEY"

[providers.secondary_vision]
kind = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#
        .to_string()
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Scratch storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub root: Option<String>,
}

/// Audio transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub max_bytes: u64,
    pub chunk_format: String,
    pub transcription_timeout_seconds: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            max_bytes: 25 * 1024 * 1024,
            chunk_format: "mp3".to_string(),
            transcription_timeout_seconds: 300,
        }
    }
}

/// Video frame sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub desired_fps: f64,
    pub transcribe_audio: bool,
}

impl VideoConfig {
    /// Sampling rate, or `None` to keep every frame.
    pub fn sampling_fps(&self) -> Option<f64> {
        (self.desired_fps > 0.0).then_some(self.desired_fps)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            desired_fps: 1.0,
            transcribe_audio: true,
        }
    }
}

/// How images are taken from a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfImageMode {
    /// Extract images embedded in the pages.
    #[default]
    Embedded,
    /// Render every page to an image.
    Pages,
    /// Skip the image path for PDFs.
    Off,
}

impl FromStr for PdfImageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embedded" => Ok(PdfImageMode::Embedded),
            "pages" => Ok(PdfImageMode::Pages),
            "off" => Ok(PdfImageMode::Off),
            other => Err(format!("unknown pdf image mode: {}", other)),
        }
    }
}

/// PDF settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub image_mode: PdfImageMode,
    pub render_dpi: u32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            image_mode: PdfImageMode::Embedded,
            render_dpi: 144,
        }
    }
}

/// Captioning and quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptioningConfig {
    pub quota_limit: u32,
    pub window_seconds: u64,
    pub caption_timeout_seconds: u64,
    pub ocr_timeout_seconds: u64,
    pub prompt: String,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            quota_limit: 14,
            window_seconds: 60,
            caption_timeout_seconds: 60,
            ocr_timeout_seconds: 30,
            prompt: "What is in this image?".to_string(),
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Batch scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent_files: usize,
    /// Upper bound for one local tool run (frame sampling, audio or PDF image extraction).
    pub tool_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: 2,
            tool_timeout_seconds: 900,
        }
    }
}

/// External provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub transcription: TranscriptionProviderConfig,
    pub primary_vision: VisionProviderConfig,
    pub secondary_vision: VisionProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            transcription: TranscriptionProviderConfig::default(),
            primary_vision: VisionProviderConfig {
                kind: VisionKind::Gemini,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key_env: Some("GEMINI_API_KEY".to_string()),
            },
            secondary_vision: VisionProviderConfig::default(),
        }
    }
}

/// OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub language: Option<String>,
}

impl Default for TranscriptionProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            language: Some("en".to_string()),
        }
    }
}

/// Vision provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionKind {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl FromStr for VisionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(VisionKind::Gemini),
            "openai" => Ok(VisionKind::OpenAi),
            "ollama" => Ok(VisionKind::Ollama),
            other => Err(format!("unknown vision provider: {}", other)),
        }
    }
}

/// One vision captioning endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionProviderConfig {
    pub kind: VisionKind,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key. Ollama needs none.
    pub api_key_env: Option<String>,
}

impl VisionProviderConfig {
    fn set(&mut self, key: &str, field: &str, value: &str) -> ConfigResult<()> {
        match field {
            "kind" => self.kind = parse(key, value)?,
            "base_url" => self.base_url = value.to_string(),
            "model" => self.model = value.to_string(),
            "api_key_env" => {
                self.api_key_env = (!value.is_empty()).then(|| value.to_string());
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

impl Default for VisionProviderConfig {
    fn default() -> Self {
        Self {
            kind: VisionKind::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.max_bytes, 26_214_400);
        assert_eq!(config.captioning.quota_limit, 14);
        assert_eq!(config.captioning.window_seconds, 60);
        assert_eq!(config.text.chunk_size, 1000);
        assert_eq!(config.text.chunk_overlap, 200);
        assert_eq!(config.pdf.image_mode, PdfImageMode::Embedded);
        assert_eq!(config.providers.primary_vision.kind, VisionKind::Gemini);
        assert_eq!(config.providers.secondary_vision.kind, VisionKind::OpenAi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_string_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::default_config_string()).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.audio.max_bytes, defaults.audio.max_bytes);
        assert_eq!(parsed.video.desired_fps, defaults.video.desired_fps);
        assert_eq!(parsed.captioning.prompt, defaults.captioning.prompt);
        assert_eq!(
            parsed.providers.primary_vision.model,
            defaults.providers.primary_vision.model
        );
        assert_eq!(parsed.pipeline.max_concurrent_files, 2);
        assert_eq!(parsed.pipeline.tool_timeout_seconds, 900);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.audio.chunk_format, deserialized.audio.chunk_format);
        assert_eq!(
            config.providers.transcription.model,
            deserialized.providers.transcription.model
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [captioning]
            quota_limit = 5

            [pdf]
            image_mode = "pages"
            "#
        )
        .unwrap();

        let config = Config::load_from(temp_file.path()).unwrap();

        assert_eq!(config.captioning.quota_limit, 5);
        assert_eq!(config.pdf.image_mode, PdfImageMode::Pages);
        // Defaults should still work
        assert_eq!(config.captioning.window_seconds, 60);
        assert_eq!(config.text.chunk_size, 1000);
    }

    #[test]
    fn test_load_rejects_bad_overlap() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[text]\nchunk_size = 100\nchunk_overlap = 100").unwrap();

        assert!(matches!(
            Config::load_from(temp_file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_set_known_keys() {
        let mut config = Config::default();
        config.set("captioning.quota_limit", "20").unwrap();
        config.set("video.desired_fps", "0").unwrap();
        config.set("pdf.image_mode", "off").unwrap();
        config.set("providers.secondary_vision.kind", "ollama").unwrap();
        config.set("providers.secondary_vision.api_key_env", "").unwrap();

        assert_eq!(config.captioning.quota_limit, 20);
        assert_eq!(config.video.sampling_fps(), None);
        assert_eq!(config.pdf.image_mode, PdfImageMode::Off);
        assert_eq!(config.providers.secondary_vision.kind, VisionKind::Ollama);
        assert!(config.providers.secondary_vision.api_key_env.is_none());
    }

    #[test]
    fn test_set_rejects_unknown_and_invalid() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("audio.bitrate", "128"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("captioning.quota_limit", "many"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("providers.tertiary_vision.model", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("pipeline.tool_timeout_seconds", "0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_scratch_root_override() {
        let paths = AppPaths {
            config_dir: PathBuf::from("/cfg"),
            data_dir: PathBuf::from("/data"),
            config_file: PathBuf::from("/cfg/config.toml"),
            database_file: PathBuf::from("/data/lectern.db"),
            scratch_dir: PathBuf::from("/data/scratch"),
        };
        let mut config = Config::default();
        assert_eq!(config.scratch_root(&paths), PathBuf::from("/data/scratch"));

        config.scratch.root = Some("/tmp/lectern".to_string());
        assert_eq!(config.scratch_root(&paths), PathBuf::from("/tmp/lectern"));
    }
}
