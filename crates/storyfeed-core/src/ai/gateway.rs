use std::sync::Arc;
use std::time::Duration;

use super::providers::{AiProvider, ClaudeApiProvider, GeminiApiProvider, OpenAiProvider};
use super::reply::FromReply;
use crate::config::AiConfig;
use crate::Result;

/// Priority-ordered chain of AI providers.
///
/// Every call either returns a usable reply or `None`. Provider errors,
/// timeouts and unparsable replies are logged and the next provider is tried;
/// nothing propagates to the caller, who must have a fallback for `None`.
pub struct AiGateway {
    providers: Vec<Arc<dyn AiProvider>>,
    timeout: Duration,
    max_tokens: u32,
}

impl AiGateway {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            providers,
            timeout,
            max_tokens: max_tokens.max(1),
        }
    }

    /// A gateway with no providers: every call yields `None`
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1), 1)
    }

    /// Build the provider chain from configuration. Providers without an API
    /// key are skipped, so an empty chain is a valid outcome.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

        for name in &config.providers {
            let provider: Arc<dyn AiProvider> = match name.as_str() {
                "claude_api" => {
                    let Some(api_key) = api_key(&config.claude_api_key, "ANTHROPIC_API_KEY") else {
                        tracing::warn!("Claude API key not configured, skipping claude_api");
                        continue;
                    };
                    match &config.claude_base_url {
                        Some(base) => Arc::new(ClaudeApiProvider::with_base_url(&api_key, &config.claude_model, base)?),
                        None => Arc::new(ClaudeApiProvider::new(&api_key, &config.claude_model)?),
                    }
                }
                "gemini_api" => {
                    let Some(api_key) = api_key(&config.gemini_api_key, "GEMINI_API_KEY") else {
                        tracing::warn!("Gemini API key not configured, skipping gemini_api");
                        continue;
                    };
                    match &config.gemini_base_url {
                        Some(base) => Arc::new(GeminiApiProvider::with_base_url(&api_key, &config.gemini_model, base)?),
                        None => Arc::new(GeminiApiProvider::new(&api_key, &config.gemini_model)?),
                    }
                }
                "openai" => {
                    let Some(api_key) = api_key(&config.openai_api_key, "OPENAI_API_KEY") else {
                        tracing::warn!("OpenAI API key not configured, skipping openai");
                        continue;
                    };
                    Arc::new(OpenAiProvider::new(
                        &api_key,
                        &config.openai_model,
                        config.openai_base_url.as_deref(),
                    ))
                }
                other => {
                    tracing::warn!("Unknown AI provider '{}', skipping", other);
                    continue;
                }
            };
            providers.push(provider);
        }

        if providers.is_empty() {
            tracing::warn!("No AI providers available; posts will use fallback text");
        }

        Ok(Self::new(
            providers,
            Duration::from_secs(config.timeout_secs),
            config.max_tokens,
        ))
    }

    pub fn is_enabled(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Plain-text completion: the first non-empty reply, or `None`
    pub async fn analyze(&self, prompt: &str, max_tokens: u32) -> Option<String> {
        self.generate::<String>(prompt, max_tokens).await
    }

    /// Structured completion: the first reply that parses as `T`, or `None`
    /// once every provider has failed, timed out or replied unusably.
    pub async fn generate<T: FromReply>(&self, prompt: &str, max_tokens: u32) -> Option<T> {
        for provider in &self.providers {
            let name = provider.name();
            match tokio::time::timeout(self.timeout, provider.complete(prompt, max_tokens)).await {
                Ok(Ok(reply)) => match T::from_reply(&reply) {
                    Some(parsed) => {
                        tracing::debug!("AI provider {} answered ({} chars)", name, reply.len());
                        return Some(parsed);
                    }
                    None => tracing::warn!("AI provider {} returned an unusable reply", name),
                },
                Ok(Err(e)) => tracing::warn!("AI provider {} failed: {}", name, e),
                Err(_) => tracing::warn!("AI provider {} timed out after {:?}", name, self.timeout),
            }
        }
        None
    }
}

fn api_key(configured: &Option<String>, env_var: &str) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Fail,
        Hang,
        Reply(&'static str),
    }

    struct ScriptedProvider {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl AiProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Fail => Err(Error::AiProvider("boom".to_string())),
                Behavior::Hang => std::future::pending().await,
                Behavior::Reply(text) => Ok(text.to_string()),
            }
        }
    }

    struct Digits(u32);

    impl FromReply for Digits {
        fn from_reply(reply: &str) -> Option<Self> {
            reply.trim().parse().ok().map(Digits)
        }
    }

    #[tokio::test]
    async fn test_falls_through_failures_in_priority_order() {
        let failing = ScriptedProvider::new("first", Behavior::Fail);
        let working = ScriptedProvider::new("second", Behavior::Reply("hello"));
        let unused = ScriptedProvider::new("third", Behavior::Reply("never"));

        let gateway = AiGateway::new(
            vec![failing.clone(), working.clone(), unused.clone()],
            Duration::from_secs(5),
            100,
        );

        assert_eq!(gateway.analyze("prompt", 50).await.as_deref(), Some("hello"));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(working.calls.load(Ordering::SeqCst), 1);
        assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_to_next_provider() {
        let hanging = ScriptedProvider::new("slow", Behavior::Hang);
        let working = ScriptedProvider::new("fast", Behavior::Reply("done"));

        let gateway = AiGateway::new(vec![hanging, working], Duration::from_secs(30), 100);
        assert_eq!(gateway.analyze("prompt", 50).await.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_unparsable_reply_advances() {
        let prose = ScriptedProvider::new("prose", Behavior::Reply("forty two"));
        let numeric = ScriptedProvider::new("numeric", Behavior::Reply(" 42 "));

        let gateway = AiGateway::new(vec![prose, numeric], Duration::from_secs(5), 100);
        let parsed: Option<Digits> = gateway.generate("prompt", 10).await;
        assert_eq!(parsed.map(|d| d.0), Some(42));
    }

    #[tokio::test]
    async fn test_exhausted_chain_yields_none() {
        let gateway = AiGateway::new(
            vec![
                ScriptedProvider::new("a", Behavior::Fail),
                ScriptedProvider::new("b", Behavior::Reply("   ")),
            ],
            Duration::from_secs(5),
            100,
        );
        assert!(gateway.analyze("prompt", 50).await.is_none());
        assert!(AiGateway::disabled().analyze("prompt", 50).await.is_none());
    }

    #[test]
    fn test_from_config_skips_providers_without_keys() {
        let config = AiConfig {
            providers: vec!["openai".to_string(), "mystery".to_string()],
            openai_api_key: Some("sk-test".to_string()),
            ..AiConfig::default()
        };
        let gateway = AiGateway::from_config(&config).unwrap();
        assert_eq!(gateway.provider_names(), vec!["openai"]);
    }
}
