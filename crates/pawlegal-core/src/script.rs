use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::{conversation::Conversation, prompts, sources::SourceLog, types::Recommendations};

/// Bounds for a script run.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    /// "Please continue" prompts allowed while drafting the complaint.
    pub max_continuations: u32,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self { max_continuations: 8 }
    }
}

/// True when the model signalled that the complaint draft is finished,
/// i.e. "done" appears in the last 20 characters, ignoring case.
pub fn is_done(chunk: &str) -> bool {
    let start = chunk
        .char_indices()
        .rev()
        .nth(19)
        .map(|(i, _)| i)
        .unwrap_or(0);
    chunk[start..].to_lowercase().contains("done")
}

/// Walk the agent through the five scripted steps: strategy, case search,
/// precedent summary, complaint draft, follow-up TODOs.
///
/// `sources` must be the log the conversation's tool set records into; it
/// decides whether the search step is retried and becomes `urls`.
pub async fn run_script(
    conversation: &mut Conversation,
    sources: &SourceLog,
    situation: &str,
    additional_data: &[String],
    options: &ScriptOptions,
) -> Result<Recommendations> {
    conversation
        .send(prompts::INTRO)
        .await
        .context("intro step failed")?;

    info!(step = "strategy", "outlining course of action");
    let strategy = conversation
        .send(&prompts::scenario(situation))
        .await
        .context("strategy step failed")?;

    info!(step = "search", "searching legal database");
    conversation
        .send(prompts::SEARCH)
        .await
        .context("search step failed")?;
    if sources.is_empty() {
        warn!(step = "search", "no articles retrieved, asking for a broader query");
        conversation
            .send(prompts::SEARCH_RETRY)
            .await
            .context("search retry failed")?;
    }

    info!(step = "summarize", sources = sources.len(), "summarizing precedent");
    conversation
        .send(prompts::SUMMARIZE)
        .await
        .context("summary step failed")?;
    for (i, example) in additional_data.iter().enumerate() {
        info!(step = "summarize", example = i + 1, "summarizing uploaded example");
        conversation
            .send(&prompts::additional_example(example))
            .await
            .with_context(|| format!("summary of uploaded example {} failed", i + 1))?;
    }

    info!(step = "complaint", "drafting complaint");
    let mut chunks = vec![conversation
        .send(prompts::COMPLAINT)
        .await
        .context("complaint step failed")?];
    let mut continuations = 0;
    while !chunks.last().is_some_and(|c| is_done(c)) {
        if continuations >= options.max_continuations {
            warn!(
                step = "complaint",
                continuations, "complaint never signalled done, keeping partial draft"
            );
            break;
        }
        continuations += 1;
        chunks.push(
            conversation
                .send(prompts::CONTINUE)
                .await
                .context("complaint continuation failed")?,
        );
    }
    let complaint = chunks.join("\n");

    info!(step = "todo", "listing follow-ups");
    let todo = conversation
        .send(prompts::TODO)
        .await
        .context("todo step failed")?;

    Ok(Recommendations {
        strategy,
        complaint,
        todo,
        urls: sources.snapshot(),
        generated_at: Utc::now(),
    })
}
