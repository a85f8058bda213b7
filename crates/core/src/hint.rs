//! Hint Generation Service
//!
//! This module provides the services that turn a stuck user's utterance into
//! a short, persona-aware hint. The session controller treats the generator
//! as an opaque, possibly slow call and never times it out.

use crate::{puzzle::Puzzle, user::Profile};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::info;

/// The prompt used when no override is supplied.
pub const DEFAULT_HINT_PROMPT: &str = "\
You are a friendly robot tutor. Your personality MUST adapt to the user you are talking to.

Your current user is {user_name}, aged {user_age}. Speak to them as if you are {user_persona}.

The user is trying to solve this riddle: \"{puzzle_question}\"

The user just said: \"{user_input}\"

Provide a single, short, helpful hint.
- Match the tone to the user's profile.
- Do NOT give away the answer. Guide them, don't solve it for them.
- Keep it to 1-3 sentences, phrased as if you are speaking directly to the user.";

/// Defines the contract for any service that can produce a hint.
///
/// This abstraction lets the brain swap between a hosted model and an
/// offline canned generator while keeping the session flow identical.
#[async_trait]
pub trait HintGenerator: Send + Sync {
    /// The model identifier reported to the analytics sink.
    fn model_name(&self) -> &str;

    /// Produces a hint for `puzzle` given what the user said.
    ///
    /// # Arguments
    ///
    /// * `puzzle` - The puzzle currently open.
    /// * `input` - The utterance that triggered the hint request.
    /// * `profile` - The logged-in user's persona data.
    async fn generate_hint(&self, puzzle: &Puzzle, input: &str, profile: &Profile) -> Result<String>;
}

/// Fills the placeholders of a hint prompt template.
pub fn render_prompt(template: &str, puzzle: &Puzzle, input: &str, profile: &Profile) -> String {
    template
        .replace("{user_name}", &profile.name)
        .replace("{user_age}", &profile.age.to_string())
        .replace("{user_persona}", &profile.persona)
        .replace("{puzzle_question}", &puzzle.question)
        .replace("{user_input}", input)
}

/// An implementation of `HintGenerator` for any OpenAI-compatible API.
pub struct LLMHintGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    prompt: String,
}

impl LLMHintGenerator {
    /// Creates a new generator.
    ///
    /// # Arguments
    ///
    /// * `config` - The OpenAI client configuration (API key and base URL).
    /// * `model` - Model identifier for chat completions (e.g., "gpt-4o-mini").
    /// * `max_tokens` - Upper bound on the length of a hint.
    /// * `prompt` - A template using the placeholders of [`DEFAULT_HINT_PROMPT`].
    pub fn new(config: OpenAIConfig, model: String, max_tokens: u32, prompt: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            max_tokens,
            prompt,
        }
    }
}

#[async_trait]
impl HintGenerator for LLMHintGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_hint(&self, puzzle: &Puzzle, input: &str, profile: &Profile) -> Result<String> {
        info!(user = %profile.name, puzzle = %puzzle.id, model = %self.model, "Generating hint");
        let prompt = render_prompt(&self.prompt, puzzle, input, profile);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content("You are a helpful robot tutor that gives hints, never answers.")
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let answer = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;

        Ok(answer.trim().to_string())
    }
}

/// A `HintGenerator` for offline runs and tests.
///
/// It answers every request with a generic nudge built from the puzzle, so a
/// session can be rehearsed end to end without network access.
pub struct CannedHintGenerator;

#[async_trait]
impl HintGenerator for CannedHintGenerator {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate_hint(&self, puzzle: &Puzzle, _input: &str, profile: &Profile) -> Result<String> {
        Ok(format!(
            "Good try, {}! Listen to the riddle again: {}",
            profile.name, puzzle.question
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (Puzzle, Profile) {
        (
            Puzzle {
                id: "puzzle_01".into(),
                question: "What has whiskers and purrs?".into(),
                image_ref: "cat.png".into(),
                solution_keywords: ["cat".to_string()].into(),
            },
            Profile {
                name: "Alex".into(),
                age: 9,
                persona: "a patient older sibling".into(),
            },
        )
    }

    #[test]
    fn test_render_prompt_fills_every_placeholder() {
        let (puzzle, profile) = fixtures();
        let prompt = render_prompt(DEFAULT_HINT_PROMPT, &puzzle, "what", &profile);
        assert!(prompt.contains("Alex, aged 9"));
        assert!(prompt.contains("a patient older sibling"));
        assert!(prompt.contains("What has whiskers and purrs?"));
        assert!(prompt.contains("\"what\""));
        assert!(!prompt.contains('{'));
    }

    #[tokio::test]
    async fn test_canned_generator_mentions_question() {
        let (puzzle, profile) = fixtures();
        let hint = CannedHintGenerator
            .generate_hint(&puzzle, "what", &profile)
            .await
            .unwrap();
        assert!(hint.contains("Alex"));
        assert!(hint.contains(&puzzle.question));
        assert_eq!(CannedHintGenerator.model_name(), "canned");
    }
}
