use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GitzoidError;

/// Character budget used for diff text when nothing else is configured.
pub const DEFAULT_MAX_DIFF_CHARS: usize = 25_000;

/// Parse a character budget from free-form text.
///
/// Non-numeric input falls back to [`DEFAULT_MAX_DIFF_CHARS`].
///
/// # Examples
///
/// ```
/// use gitzoid_core::{parse_char_budget, DEFAULT_MAX_DIFF_CHARS};
///
/// assert_eq!(parse_char_budget("8000"), 8000);
/// assert_eq!(parse_char_budget(" 8000 "), 8000);
/// assert_eq!(parse_char_budget("invalid"), DEFAULT_MAX_DIFF_CHARS);
/// ```
pub fn parse_char_budget(raw: &str) -> usize {
    raw.trim().parse().unwrap_or(DEFAULT_MAX_DIFF_CHARS)
}

/// Top-level configuration loaded from `.gitzoid.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use gitzoid_core::GitzoidConfig;
///
/// let config = GitzoidConfig::default();
/// assert_eq!(config.review.first_run_limit, 2);
/// assert!(config.repositories.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitzoidConfig {
    /// Hosting API settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review lifecycle settings.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Where the tracker state lives.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Repositories to watch.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl GitzoidConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Io`] if the file cannot be read, or
    /// [`GitzoidError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, GitzoidError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitzoid_core::GitzoidConfig;
    ///
    /// let toml = r#"
    /// [[repositories]]
    /// id = "octo/hello"
    /// target_branch = "main"
    /// "#;
    /// let config = GitzoidConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.repositories[0].id, "octo/hello");
    /// assert!(config.repositories[0].enabled);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, GitzoidError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment overrides on top of file values.
    ///
    /// Reads `GITHUB_TOKEN` (then `GH_TOKEN`), `OPENAI_API_KEY` and
    /// `GITZOID_MAX_DIFF_CHARS`. Values already present in the file win for
    /// credentials; the diff budget variable always wins.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.github.token.is_none() {
            self.github.token = lookup("GITHUB_TOKEN").or_else(|| lookup("GH_TOKEN"));
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup(self.llm.api_key_env());
        }
        if let Some(raw) = lookup("GITZOID_MAX_DIFF_CHARS") {
            self.review.max_diff_chars = Some(parse_char_budget(&raw));
        }
    }

    /// Character budget for diff text sent to the model.
    ///
    /// An explicit `max_diff_chars` wins; otherwise the model's input token
    /// limit is scaled by `token_multiplier`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitzoid_core::GitzoidConfig;
    ///
    /// let config = GitzoidConfig::default();
    /// assert_eq!(config.diff_char_budget(), 25_000);
    /// ```
    pub fn diff_char_budget(&self) -> usize {
        if let Some(chars) = self.review.max_diff_chars {
            return chars;
        }
        let scaled = self.llm.max_input_tokens as f64 * self.review.token_multiplier;
        if scaled.is_finite() && scaled >= 1.0 {
            scaled as usize
        } else {
            DEFAULT_MAX_DIFF_CHARS
        }
    }

    /// Repositories that are switched on.
    pub fn enabled_repositories(&self) -> impl Iterator<Item = &RepositoryConfig> {
        self.repositories.iter().filter(|r| r.enabled)
    }
}

/// Hosting API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Access token; falls back to `GITHUB_TOKEN` / `GH_TOKEN`.
    pub token: Option<String>,
    /// API root (default: `https://api.github.com`).
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use gitzoid_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o-mini");
/// assert_eq!(config.max_input_tokens, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (e.g. `"openai"`, `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Maximum input tokens the model accepts for the diff portion.
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    /// Maximum tokens in the generated review.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
}

impl LlmConfig {
    /// Environment variable holding the API key for this provider.
    pub fn api_key_env(&self) -> &'static str {
        match self.provider.as_str() {
            "anthropic" => "ANTHROPIC_API_KEY",
            "openrouter" => "OPENROUTER_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }

    /// Root of the chat completions API: `base_url` when set, otherwise the
    /// provider's OpenAI-compatible endpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitzoid_core::LlmConfig;
    ///
    /// let config = LlmConfig {
    ///     provider: "anthropic".into(),
    ///     ..LlmConfig::default()
    /// };
    /// assert_eq!(config.api_root(), "https://api.anthropic.com");
    /// ```
    pub fn api_root(&self) -> &str {
        let root = match (&self.base_url, self.provider.as_str()) {
            (Some(url), _) => url.as_str(),
            (None, "anthropic") => "https://api.anthropic.com",
            (None, "openrouter") => "https://openrouter.ai/api",
            (None, "ollama") => "http://localhost:11434",
            (None, _) => "https://api.openai.com",
        };
        root.trim_end_matches('/')
    }
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_input_tokens() -> usize {
    10_000
}

fn default_max_output_tokens() -> usize {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Review lifecycle configuration.
///
/// # Examples
///
/// ```
/// use gitzoid_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.first_run_limit, 2);
/// assert_eq!(config.stale_pr_days, 60);
/// assert_eq!(config.retention_days, 90);
/// assert!(config.skip_bots);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// PRs reviewed when a repository is seen for the first time (default: 2).
    #[serde(default = "default_first_run_limit")]
    pub first_run_limit: usize,
    /// PRs created longer ago than this are never reviewed (default: 60).
    #[serde(default = "default_stale_pr_days")]
    pub stale_pr_days: i64,
    /// Tracker entries untouched for longer than this are dropped (default: 90).
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Characters per input token when deriving the diff budget (default: 2.5).
    #[serde(default = "default_token_multiplier")]
    pub token_multiplier: f64,
    /// Explicit diff budget in characters, overriding the derived one.
    pub max_diff_chars: Option<usize>,
    /// Free-form guidance appended to every prompt.
    pub additional_context: Option<String>,
    /// Ignore PRs opened by bots (default: true).
    #[serde(default = "default_true")]
    pub skip_bots: bool,
}

fn default_first_run_limit() -> usize {
    2
}

fn default_stale_pr_days() -> i64 {
    60
}

fn default_retention_days() -> i64 {
    90
}

fn default_token_multiplier() -> f64 {
    2.5
}

fn default_true() -> bool {
    true
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            first_run_limit: default_first_run_limit(),
            stale_pr_days: default_stale_pr_days(),
            retention_days: default_retention_days(),
            token_multiplier: default_token_multiplier(),
            max_diff_chars: None,
            additional_context: None,
            skip_bots: true,
        }
    }
}

/// Location of the persisted tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// JSON file holding all tracker entries (default: `.gitzoid/tracker.json`).
    #[serde(default = "default_tracker_path")]
    pub path: PathBuf,
}

fn default_tracker_path() -> PathBuf {
    PathBuf::from(".gitzoid/tracker.json")
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            path: default_tracker_path(),
        }
    }
}

/// A watched repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository path, `owner/name`.
    pub id: String,
    /// Set to `false` to pause reviews without losing tracker state.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Only review PRs merging into this branch.
    pub target_branch: Option<String>,
    /// Repository-specific guidance, appended after the global context.
    pub additional_context: Option<String>,
}

impl RepositoryConfig {
    /// A repository entry with defaults for everything but the id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            target_branch: None,
            additional_context: None,
        }
    }
}
