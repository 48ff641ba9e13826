//! Client for the text-generation oracle (an OpenAI-style chat-completions
//! endpoint). Generation failures here are the caller's concern; the
//! structurer never retries.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::models::BookCategory;
use crate::services::prompts;
use crate::services::structurer;

/// Completions shorter than this are treated as truncated and retried once.
const DEFAULT_MIN_WORDS: usize = 2000;

pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    min_words: usize,
}

impl LLMClient {
    pub fn new() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY").unwrap_or_else(|_| "dummy_key".to_string());
        let api_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
        let model =
            std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4-turbo-preview".to_string());
        let min_words = std::env::var("GENERATION_MIN_WORDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MIN_WORDS);

        Ok(LLMClient {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
            min_words,
        })
    }

    /// Asks the oracle for the full narrative text of one book. When the
    /// first completion looks truncated, retries once with a reinforced
    /// prompt and keeps the longer of the two responses.
    pub async fn generate_book_text(
        &self,
        category: BookCategory,
        answers: &HashMap<String, String>,
        image_count: usize,
    ) -> Result<String> {
        let prompt = prompts::build_user_prompt(category, answers, image_count);

        let text = self
            .complete(prompts::SYSTEM_PROMPT, &prompt, 12000, 0.8)
            .await?;
        let word_count = structurer::count_words(&text);
        tracing::info!(words = word_count, ?category, "received generation");

        if word_count < self.min_words {
            tracing::warn!(
                words = word_count,
                min_words = self.min_words,
                "generation looks truncated, retrying with reinforced prompt"
            );
            let retry_prompt = format!(
                "{prompt}\n\nIMPORTANT: write the COMPLETE book with ALL chapters. Do not stop halfway!"
            );
            let retry = self
                .complete(prompts::RETRY_SYSTEM_PROMPT, &retry_prompt, 14000, 0.7)
                .await?;
            if structurer::count_words(&retry) > word_count {
                tracing::info!(words = structurer::count_words(&retry), "retry succeeded");
                return Ok(retry);
            }
        }

        Ok(text)
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let mut request = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ],
                "max_tokens": max_tokens,
                "temperature": temperature,
            }));

        if self.api_key != "dummy_key" {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("generation API returned {status}: {body}"));
        }

        let body: serde_json::Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(anyhow!("empty completion from the generation API"));
        }

        Ok(content.to_string())
    }
}
