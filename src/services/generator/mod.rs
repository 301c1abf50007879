//! Article generator
//!
//! Asks a text-completion endpoint for an article about a topic and coerces
//! the reply into a [`GeneratedArticle`].

mod parser;

pub use parser::{parse_completion, GeneratedArticle, MAX_GENERATED_PARAGRAPHS};

use crate::config::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Topic used when the caller leaves it blank
pub const DEFAULT_TOPIC: &str = "random topic";

const STOP_SEQUENCES: [&str; 2] = ["Human:", "AI:"];

/// Shape the model is asked to fill, in key order
const EXAMPLE_FIELDS: [(&str, &str); 11] = [
    ("title", "Article Title"),
    ("paragraph1_title", "Title of First Paragraph"),
    ("paragraph1_text", "Text of First Paragraph"),
    ("paragraph2_title", "Title of Second Paragraph"),
    ("paragraph2_text", "Text of Second Paragraph"),
    ("paragraph3_title", "Title of Third Paragraph"),
    ("paragraph3_text", "Text of Third Paragraph"),
    ("paragraph4_title", "Title of Fourth Paragraph"),
    ("paragraph4_text", "Text of Fourth Paragraph"),
    ("paragraph5_title", "Title of Fifth Paragraph"),
    ("paragraph5_text", "Text of Fifth Paragraph"),
];

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Article generation is disabled: no API key configured")]
    Disabled,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    stop: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

pub struct ArticleGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl ArticleGenerator {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    /// Whether an API key is configured
    pub fn is_enabled(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Generate an article about `topic`.
    ///
    /// Transport failures and non-success statuses are not errors: they yield
    /// [`GeneratedArticle::connection_error`]. Only a missing key is.
    pub async fn generate(&self, topic: &str) -> Result<GeneratedArticle, GeneratorError> {
        let api_key = self.api_key().ok_or(GeneratorError::Disabled)?;

        let body = CompletionRequest {
            model: &self.config.model,
            prompt: build_prompt(topic),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stop: STOP_SEQUENCES,
        };

        let response = match self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Completion request failed: {}", e);
                return Ok(GeneratedArticle::connection_error());
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Completion endpoint returned {}", status);
            return Ok(GeneratedArticle::connection_error());
        }

        let completion = match response.json::<CompletionResponse>().await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!("Unreadable completion response: {}", e);
                return Ok(GeneratedArticle::connection_error());
            }
        };
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .unwrap_or_default();

        let article = parse_completion(&text);
        tracing::info!("Generated article \"{}\"", article.title());
        Ok(article)
    }
}

/// Prompt sent for `topic`; a blank topic becomes [`DEFAULT_TOPIC`]
pub fn build_prompt(topic: &str) -> String {
    let topic = match topic.trim() {
        "" => DEFAULT_TOPIC,
        topic => topic,
    };
    format!(
        "Please generate an article in json form about {}.Type it all in one line.  \
         The article should be divided into paragraphs, with each paragraph addressing \
         a different aspect of the topic. Then, fill in the following python dictionary \
         format with the content of the generated article:{}",
        topic,
        example_dict()
    )
}

fn example_dict() -> String {
    let entries: Vec<String> = EXAMPLE_FIELDS
        .iter()
        .map(|(key, value)| format!("'{}': '{}'", key, value))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_defaults_topic() {
        let prompt = build_prompt("  ");
        assert!(prompt.contains("about random topic.Type it all in one line."));
        assert!(build_prompt("harbors").contains("about harbors."));
    }

    #[test]
    fn test_prompt_embeds_example_dict() {
        let prompt = build_prompt("tides");
        assert!(prompt.ends_with(
            "{'title': 'Article Title', 'paragraph1_title': 'Title of First Paragraph', \
             'paragraph1_text': 'Text of First Paragraph', 'paragraph2_title': 'Title of Second Paragraph', \
             'paragraph2_text': 'Text of Second Paragraph', 'paragraph3_title': 'Title of Third Paragraph', \
             'paragraph3_text': 'Text of Third Paragraph', 'paragraph4_title': 'Title of Fourth Paragraph', \
             'paragraph4_text': 'Text of Fourth Paragraph', 'paragraph5_title': 'Title of Fifth Paragraph', \
             'paragraph5_text': 'Text of Fifth Paragraph'}"
        ));
        // The example itself parses as an article
        let example = parse_completion(&example_dict());
        assert_eq!(example.title(), "Article Title");
        assert_eq!(example.paragraphs().len(), MAX_GENERATED_PARAGRAPHS);
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let generator = ArticleGenerator::new(GeneratorConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(!generator.is_enabled());
        assert!(matches!(
            generator.generate("tides").await,
            Err(GeneratorError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let generator = ArticleGenerator::new(GeneratorConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            api_key: Some("key".to_string()),
            timeout_seconds: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(generator.is_enabled());
        let article = generator.generate("tides").await.unwrap();
        assert_eq!(article, GeneratedArticle::connection_error());
    }

    #[test]
    fn test_endpoint_joins_path() {
        let generator = ArticleGenerator::new(GeneratorConfig {
            base_url: "https://example.test/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(generator.endpoint(), "https://example.test/v1/completions");
    }
}
