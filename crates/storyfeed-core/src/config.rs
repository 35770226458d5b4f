use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::feed::FeedConfig;

/// Root configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub synth: SynthConfig,
    #[serde(default)]
    pub promo: PromoConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    /// Directory of the loaded config file; relative paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Category names, processed in this order
    #[serde(default)]
    pub categories: Vec<String>,
    /// Directory holding `<category>.json` configs
    #[serde(default = "default_categories_dir")]
    pub categories_dir: PathBuf,
    /// Directory receiving the `<category>.json` post documents
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Invalid-feed ledger file name, relative to `output_dir`
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            categories_dir: default_categories_dir(),
            output_dir: default_output_dir(),
            ledger_file: default_ledger_file(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for a feed document request
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    /// Timeout for an article page request
    #[serde(default = "default_content_timeout")]
    pub content_timeout_secs: u64,
    /// Maximum redirect hops followed per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            feed_timeout_secs: default_feed_timeout(),
            content_timeout_secs: default_content_timeout(),
            max_redirects: default_max_redirects(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Providers in priority order: "claude_api", "gemini_api", "openai"
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    /// Per-call timeout, raced against every provider request
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    /// Max tokens per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Claude/Anthropic API key (falls back to ANTHROPIC_API_KEY)
    #[serde(default)]
    pub claude_api_key: Option<String>,
    #[serde(default = "default_claude_model")]
    pub claude_model: String,
    #[serde(default)]
    pub claude_base_url: Option<String>,
    /// Gemini API key (falls back to GEMINI_API_KEY)
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default)]
    pub gemini_base_url: Option<String>,
    /// OpenAI API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default)]
    pub openai_base_url: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            timeout_secs: default_ai_timeout(),
            max_tokens: default_max_tokens(),
            claude_api_key: None,
            claude_model: default_claude_model(),
            claude_base_url: None,
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_base_url: None,
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    #[serde(default = "default_min_essence_words")]
    pub min_essence_words: usize,
    #[serde(default = "default_max_essence_words")]
    pub max_essence_words: usize,
    /// Lower bound of the length requested in the essence prompt
    #[serde(default = "default_target_essence_words")]
    pub target_essence_words: usize,
    #[serde(default = "default_min_reaction_chars")]
    pub min_reaction_chars: usize,
    /// Items shown to the AI in the pre-filter prompt
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Single-shot prompts used to top up a short perspective list
    #[serde(default = "default_max_followups")]
    pub max_followups: usize,
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
    #[serde(default = "default_max_comment_chars")]
    pub max_comment_chars: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            min_essence_words: default_min_essence_words(),
            max_essence_words: default_max_essence_words(),
            target_essence_words: default_target_essence_words(),
            min_reaction_chars: default_min_reaction_chars(),
            max_candidates: default_max_candidates(),
            max_followups: default_max_followups(),
            max_comments: default_max_comments(),
            max_comment_chars: default_max_comment_chars(),
        }
    }
}

/// Default promo banner, used when a category does not configure its own
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Banner text; `{feed}` is replaced by the feed name
    #[serde(default = "default_promo_text")]
    pub text: String,
}

impl Default for PromoConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            text: default_promo_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Generic phrases that mark filler text (matched case-insensitively)
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    /// Essence with at least this many denylist hits and no concrete signal is rejected
    #[serde(default = "default_essence_hit_threshold")]
    pub essence_hit_threshold: usize,
    /// A reaction with more hits than this is rejected
    #[serde(default = "default_reaction_max_hits")]
    pub reaction_max_hits: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
            essence_hit_threshold: default_essence_hit_threshold(),
            reaction_max_hits: default_reaction_max_hits(),
        }
    }
}

/// Per-category configuration, loaded from `<categories_dir>/<name>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub selection_prompt: Option<String>,
    #[serde(default)]
    pub essence_prompt: Option<String>,
    #[serde(default)]
    pub perspectives_prompt: Option<String>,
    #[serde(default = "default_top_posts_per_feed")]
    pub top_posts_per_feed: usize,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
    #[serde(default)]
    pub promo_banner: Option<CategoryBanner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBanner {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub const MIN_HISTORY_DAYS: u32 = 5;
pub const MAX_HISTORY_DAYS: u32 = 30;

impl CategoryConfig {
    /// Load and validate a category config file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: CategoryConfig = serde_json::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))?;
        config.history_days = config.history_days.clamp(MIN_HISTORY_DAYS, MAX_HISTORY_DAYS);
        config.top_posts_per_feed = config.top_posts_per_feed.max(1);
        Ok(config)
    }

    pub fn enabled_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.enabled)
    }
}

fn default_categories_dir() -> PathBuf {
    PathBuf::from("categories")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("posts")
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("invalid_feeds.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_feed_timeout() -> u64 {
    15
}

fn default_content_timeout() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_providers() -> Vec<String> {
    vec!["claude_api".to_string(), "gemini_api".to_string(), "openai".to_string()]
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1200
}

fn default_claude_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_min_essence_words() -> usize {
    30
}

fn default_max_essence_words() -> usize {
    600
}

fn default_target_essence_words() -> usize {
    200
}

fn default_min_reaction_chars() -> usize {
    40
}

fn default_max_candidates() -> usize {
    20
}

fn default_max_followups() -> usize {
    3
}

fn default_max_comments() -> usize {
    5
}

fn default_max_comment_chars() -> usize {
    500
}

fn default_promo_text() -> String {
    "Discover more stories from {feed}".to_string()
}

fn default_denylist() -> Vec<String> {
    [
        "in today's fast-paced world",
        "it is important to note",
        "it's worth noting",
        "plays a crucial role",
        "game-changer",
        "delve into",
        "in conclusion",
        "stay tuned",
        "only time will tell",
        "a testament to",
        "the landscape of",
        "navigating the complexities",
        "this article discusses",
        "click here",
        "read more",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_essence_hit_threshold() -> usize {
    2
}

fn default_reaction_max_hits() -> usize {
    1
}

fn default_top_posts_per_feed() -> usize {
    5
}

fn default_history_days() -> u32 {
    7
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load the root configuration. A missing file is an error, unlike the
    /// category documents which may be absent.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Default configuration file path: ~/.config/storyfeed/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("storyfeed")
            .join("config.toml")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = expand_tilde(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        }
    }

    pub fn categories_dir(&self) -> PathBuf {
        self.resolve(&self.general.categories_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.general.output_dir)
    }

    pub fn category_config_path(&self, category: &str) -> PathBuf {
        self.categories_dir().join(format!("{category}.json"))
    }

    pub fn posts_path(&self, category: &str) -> PathBuf {
        self.output_dir().join(format!("{category}.json"))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir().join(&self.general.ledger_file)
    }
}
