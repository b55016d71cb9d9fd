//! LLM lyric alignment
//!
//! The model sees the transcribed phrases with their timestamps and the
//! authoritative lyric lines, and answers with one start time per lyric line.

use async_trait::async_trait;
use chorus_ollama_client::{ChatMessage, GenerateOptions, OllamaClient};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::lrc::LrcLine;
use crate::models::Phrase;

/// Context window requested for alignment prompts
const ALIGNMENT_NUM_CTX: u32 = 8192;

const SYSTEM_PROMPT: &str = "You align song lyrics to a speech transcription. \
You receive timestamped transcription phrases and the numbered lyric lines of the same song. \
For every lyric line, in order, give the time in seconds at which it starts being sung. \
Answer with JSON only, shaped as {\"lines\": [{\"time\": <seconds>, \"text\": <lyric line>}]}, \
with exactly one entry per lyric line.";

/// Times each lyric line against transcribed phrases
#[async_trait]
pub trait LyricsAligner: Send + Sync {
    async fn align(&self, phrases: &[Phrase], lyrics: &[String]) -> WorkerResult<Vec<LrcLine>>;
}

#[derive(Debug, Deserialize)]
struct AlignmentAnswer {
    lines: Vec<AlignedLine>,
}

#[derive(Debug, Deserialize)]
struct AlignedLine {
    time: f64,
    #[serde(default)]
    text: String,
}

/// [`LyricsAligner`] backed by an Ollama chat model
#[derive(Clone)]
pub struct OllamaLyricsAligner {
    client: OllamaClient,
}

impl OllamaLyricsAligner {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn options(&self) -> GenerateOptions {
        let config = self.client.config();
        GenerateOptions {
            temperature: Some(config.temperature),
            num_predict: Some(config.max_tokens),
            num_ctx: Some(ALIGNMENT_NUM_CTX),
            seed: Some(0),
        }
    }
}

fn build_prompt(phrases: &[Phrase], lyrics: &[String]) -> String {
    let mut prompt = String::from("Transcription:\n");
    for phrase in phrases {
        prompt.push_str(&format!(
            "[{:.2} - {:.2}] {}\n",
            phrase.start, phrase.end, phrase.text
        ));
    }
    prompt.push_str("\nLyrics:\n");
    for (i, line) in lyrics.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, line));
    }
    prompt
}

#[async_trait]
impl LyricsAligner for OllamaLyricsAligner {
    #[instrument(skip_all, fields(phrases = phrases.len(), lines = lyrics.len()))]
    async fn align(&self, phrases: &[Phrase], lyrics: &[String]) -> WorkerResult<Vec<LrcLine>> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(phrases, lyrics)),
        ];

        let answer: AlignmentAnswer = self
            .client
            .chat_json(messages, Some(self.options()))
            .await?;
        debug!(returned = answer.lines.len(), "Alignment answer received");

        answer
            .lines
            .into_iter()
            .map(|line| {
                if !line.time.is_finite() {
                    return Err(WorkerError::Alignment(format!(
                        "non-numeric time for line '{}'",
                        line.text
                    )));
                }
                Ok(LrcLine::new(line.time.max(0.0), line.text))
            })
            .collect()
    }
}
