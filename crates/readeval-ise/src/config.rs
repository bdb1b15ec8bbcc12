//! Configuration loading and evaluator factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use readeval_core::batch::BatchCoordinator;
use readeval_core::engine::{AdmissionLimiter, EvaluationEngine, DEFAULT_MAX_CONCURRENT};
use readeval_core::model::LanguageProfile;
use readeval_core::reference::{load_reference, ReferenceSet};
use readeval_core::traits::SpeechEvaluator;

use crate::client::IseClient;
use crate::frame::FrameScheduler;
use crate::signer::{Credentials, Endpoint, Signer};
use crate::waiter::ResultWaiter;

pub const DEFAULT_ENGINE_URL: &str = "ws://ise-api.xfyun.cn/v2/open-ise";

/// Engine credentials and address.
///
/// Note: Custom Debug impl masks the key and secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_url")]
    pub url: String,
    /// Host to sign, when it differs from the URL's host.
    #[serde(default)]
    pub host: Option<String>,
    /// Path to sign, when it differs from the URL's path.
    #[serde(default)]
    pub path: Option<String>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("app_id", &self.app_id)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("url", &self.url)
            .field("host", &self.host)
            .field("path", &self.path)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            url: default_url(),
            host: None,
            path: None,
        }
    }
}

impl EngineConfig {
    pub fn has_credentials(&self) -> bool {
        !self.app_id.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Bytes per audio frame.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    /// Delay between audio frames in milliseconds.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
    /// Overall deadline for the result after the last frame.
    #[serde(default = "default_result_timeout")]
    pub result_timeout_secs: u64,
    /// Upper bound on a single receive.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            frame_interval_ms: default_frame_interval(),
            result_timeout_secs: default_result_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl StreamingConfig {
    pub fn scheduler(&self) -> FrameScheduler {
        FrameScheduler::new(self.frame_size, Duration::from_millis(self.frame_interval_ms))
    }

    pub fn waiter(&self) -> ResultWaiter {
        ResultWaiter::new(
            Duration::from_secs(self.result_timeout_secs),
            Duration::from_secs(self.poll_interval_secs),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Max concurrently active engine sessions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Total score a character needs when the result has no per-character detail.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            pass_threshold: default_pass_threshold(),
            group: default_group(),
            language: default_language(),
            sample_rate: default_sample_rate(),
            audio_format: default_audio_format(),
        }
    }
}

impl EvaluationConfig {
    pub fn profile(&self) -> LanguageProfile {
        LanguageProfile {
            group: self.group.clone(),
            language: self.language.clone(),
        }
    }
}

/// Top-level readeval configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadevalConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Reference data file; the built-in set is used when absent.
    #[serde(default)]
    pub reference: Option<PathBuf>,
    /// Output directory for audit records and reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_url() -> String {
    DEFAULT_ENGINE_URL.to_string()
}
fn default_frame_size() -> usize {
    crate::frame::DEFAULT_FRAME_SIZE
}
fn default_frame_interval() -> u64 {
    40
}
fn default_result_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}
fn default_pass_threshold() -> f64 {
    readeval_core::batch::DEFAULT_PASS_THRESHOLD
}
fn default_group() -> String {
    "pupil".to_string()
}
fn default_language() -> String {
    "cn_vip".to_string()
}
fn default_sample_rate() -> u32 {
    16_000
}
fn default_audio_format() -> String {
    "raw".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./readeval-results")
}

impl ReadevalConfig {
    /// The configured reference set, or the built-in one.
    pub fn reference_set(&self) -> Result<ReferenceSet> {
        match &self.reference {
            Some(path) => load_reference(path),
            None => ReferenceSet::builtin(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let name = &result[start + 2..start + len];
        let value = std::env::var(name).unwrap_or_default();
        result.replace_range(start..start + len + 1, &value);
    }
    result
}

fn resolve_engine_config(engine: &EngineConfig) -> EngineConfig {
    EngineConfig {
        app_id: resolve_env_vars(&engine.app_id),
        api_key: resolve_env_vars(&engine.api_key),
        api_secret: resolve_env_vars(&engine.api_secret),
        url: resolve_env_vars(&engine.url),
        host: engine.host.as_deref().map(resolve_env_vars),
        path: engine.path.as_deref().map(resolve_env_vars),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `readeval.toml` in the current directory
/// 2. `~/.config/readeval/config.toml`
///
/// Environment variable overrides: `READEVAL_APP_ID`, `READEVAL_API_KEY`,
/// `READEVAL_API_SECRET`.
pub fn load_config() -> Result<ReadevalConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ReadevalConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("readeval.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        None => ReadevalConfig::default(),
    };

    apply_env_overrides(&mut config);
    config.engine = resolve_engine_config(&config.engine);

    Ok(config)
}

/// Parse configuration TOML without touching the environment.
pub fn parse_config_str(content: &str) -> Result<ReadevalConfig> {
    Ok(toml::from_str::<ReadevalConfig>(content)?)
}

fn apply_env_overrides(config: &mut ReadevalConfig) {
    let overrides = [
        ("READEVAL_APP_ID", &mut config.engine.app_id),
        ("READEVAL_API_KEY", &mut config.engine.api_key),
        ("READEVAL_API_SECRET", &mut config.engine.api_secret),
    ];
    for (var, field) in overrides {
        if let Ok(value) = std::env::var(var) {
            *field = value;
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("readeval"))
}

/// Build a signer from the engine section.
pub fn create_signer(engine: &EngineConfig) -> Result<Signer> {
    let endpoint = Endpoint::parse(&engine.url, engine.host.as_deref(), engine.path.as_deref())?;
    let credentials = Credentials {
        app_id: engine.app_id.clone(),
        api_key: engine.api_key.clone(),
        api_secret: engine.api_secret.clone(),
    };
    Ok(Signer::new(credentials, endpoint)?)
}

/// Create the remote engine client.
pub fn create_client(config: &ReadevalConfig) -> Result<IseClient> {
    let signer = create_signer(&config.engine).context("engine credentials are not usable")?;
    Ok(IseClient::new(signer)
        .with_scheduler(config.streaming.scheduler())
        .with_waiter(config.streaming.waiter()))
}

/// Wrap an evaluator in an engine configured from the evaluation section.
pub fn create_engine(config: &ReadevalConfig, evaluator: Arc<dyn SpeechEvaluator>) -> EvaluationEngine {
    let evaluation = &config.evaluation;
    EvaluationEngine::new(evaluator, AdmissionLimiter::new(evaluation.max_concurrent))
        .with_coordinator(BatchCoordinator::new().with_pass_threshold(evaluation.pass_threshold))
        .with_profile(evaluation.profile())
        .with_audio(evaluation.audio_format.clone(), evaluation.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_READEVAL_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_READEVAL_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_READEVAL_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_READEVAL_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
        std::env::remove_var("_READEVAL_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ReadevalConfig::default();
        assert_eq!(config.engine.url, DEFAULT_ENGINE_URL);
        assert_eq!(config.streaming.frame_size, 1280);
        assert_eq!(config.streaming.frame_interval_ms, 40);
        assert_eq!(config.streaming.result_timeout_secs, 30);
        assert_eq!(config.streaming.poll_interval_secs, 5);
        assert_eq!(config.evaluation.max_concurrent, 3);
        assert_eq!(config.evaluation.pass_threshold, 60.0);
        assert_eq!(config.evaluation.profile(), LanguageProfile::default());
        assert!(config.reference.is_none());
        assert!(!config.engine.has_credentials());
    }

    #[test]
    fn parse_sections() {
        let config = parse_config_str(
            r#"
reference = "data/reference.toml"
output_dir = "out"

[engine]
app_id = "app"
api_key = "key"
api_secret = "secret"
url = "wss://example.com/v2/open-ise"

[streaming]
frame_size = 640

[evaluation]
max_concurrent = 5
group = "adult"
"#,
        )
        .unwrap();

        assert!(config.engine.has_credentials());
        assert_eq!(config.engine.url, "wss://example.com/v2/open-ise");
        assert_eq!(config.streaming.frame_size, 640);
        assert_eq!(config.streaming.frame_interval_ms, 40);
        assert_eq!(config.evaluation.max_concurrent, 5);
        assert_eq!(config.evaluation.group, "adult");
        assert_eq!(config.evaluation.language, "cn_vip");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.reference, Some(PathBuf::from("data/reference.toml")));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readeval.toml");
        std::fs::write(&path, "[engine]\napp_id = \"${_READEVAL_CFG_APP}\"\n").unwrap();

        std::env::set_var("_READEVAL_CFG_APP", "from-env");
        let config = load_config_from(Some(&path)).unwrap();
        std::env::remove_var("_READEVAL_CFG_APP");

        if std::env::var("READEVAL_APP_ID").is_err() {
            assert_eq!(config.engine.app_id, "from-env");
        }
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/readeval.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn debug_masks_secrets() {
        let engine = EngineConfig {
            api_key: "key-123".into(),
            api_secret: "secret-456".into(),
            ..EngineConfig::default()
        };
        let debug = format!("{engine:?}");
        assert!(!debug.contains("key-123"));
        assert!(!debug.contains("secret-456"));
    }

    #[test]
    fn client_requires_credentials() {
        assert!(create_client(&ReadevalConfig::default()).is_err());

        let mut config = ReadevalConfig::default();
        config.engine.app_id = "app".into();
        config.engine.api_key = "key".into();
        config.engine.api_secret = "secret".into();
        let client = create_client(&config).unwrap();
        assert_eq!(client.signer().endpoint().host, "ise-api.xfyun.cn");
    }
}
