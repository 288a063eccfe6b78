// Interactive session over one transcript file
// Each operation reports an Outcome; rendering is left to the caller.

use std::path::PathBuf;

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::Config;
use crate::conversation::build_messages;
use crate::provider::ChatProvider;
use crate::transcript;
use crate::types::{Classification, Completion, ModelTier, TurnKind};

/// What happened as a result of a session operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model answered and the response was appended
    Responded(Completion),
    /// The thread ends with a response; a new question is needed
    AwaitingPrompt,
    /// The thread ends with a prompt that has not been answered yet
    PendingPrompt,
    /// The file holds a single freestanding prompt, not a thread
    NoThread,
    /// Prompts and responses do not alternate
    InvalidOrdering,
    /// Nothing to send
    Empty,
    /// The thread was archived to this path and the transcript cleared
    Archived(PathBuf),
}

pub struct Session<'a, P> {
    transcript: PathBuf,
    config: &'a Config,
    provider: P,
    default_tier: ModelTier,
}

impl<'a, P: ChatProvider> Session<'a, P> {
    pub fn new(transcript: PathBuf, config: &'a Config, provider: P, default_tier: ModelTier) -> Self {
        Session {
            transcript,
            config,
            provider,
            default_tier,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn tier(&self, requested: Option<ModelTier>) -> ModelTier {
        requested.unwrap_or(self.default_tier)
    }

    /// Send `sections` as a conversation and append the reply to the transcript.
    ///
    /// Nothing is written unless the model call succeeds.
    async fn send(&self, sections: &[String], tier: ModelTier) -> Result<Outcome> {
        if sections.iter().all(|s| s.trim().is_empty()) {
            return Ok(Outcome::Empty);
        }

        let messages = build_messages(sections, self.config.options.system_prompt.as_deref());
        let completion = self.provider.complete(&messages, tier).await?;
        if completion.text.trim().is_empty() {
            warn!(model = %completion.model, "model returned an empty response");
        }

        transcript::append_turn(&self.transcript, &completion.text, TurnKind::Response)?;
        info!(model = %completion.model, tokens = completion.usage.total, "appended response");
        Ok(Outcome::Responded(completion))
    }

    /// First look at the file when the program starts.
    ///
    /// A file that does not alternate properly is refused outright.
    pub async fn start(&self) -> Result<Outcome> {
        let (classification, sections) = transcript::classify(&self.transcript)?;
        match classification {
            Classification::InvalidOrdering => Err(eyre!(
                "Invalid ordering of messages in {}. Make sure prompts and responses alternate.",
                self.transcript.display()
            )),
            Classification::ValidEndsWithResponse => Ok(Outcome::AwaitingPrompt),
            Classification::Plain | Classification::ValidEndsWithPrompt => {
                self.send(&sections, self.default_tier).await
            }
        }
    }

    /// Answer the thread as it stands in the file
    pub async fn follow(&self, tier: Option<ModelTier>) -> Result<Outcome> {
        let (classification, sections) = transcript::classify(&self.transcript)?;
        match classification {
            Classification::InvalidOrdering => Ok(Outcome::InvalidOrdering),
            Classification::ValidEndsWithResponse => Ok(Outcome::AwaitingPrompt),
            Classification::Plain | Classification::ValidEndsWithPrompt => {
                self.send(&sections, self.tier(tier)).await
            }
        }
    }

    /// Drop the last response and ask again
    pub async fn regenerate(&self, tier: Option<ModelTier>) -> Result<Outcome> {
        transcript::remove_last_turn(&self.transcript)?;
        let (classification, sections) = transcript::classify(&self.transcript)?;
        match classification {
            Classification::InvalidOrdering => Ok(Outcome::InvalidOrdering),
            Classification::ValidEndsWithResponse => Err(eyre!(
                "{} still ends with a response after removing the last turn",
                self.transcript.display()
            )),
            Classification::Plain | Classification::ValidEndsWithPrompt => {
                self.send(&sections, self.tier(tier)).await
            }
        }
    }

    /// Answer only the last prompt, without the earlier thread as context
    pub async fn respond_to_last(&self, tier: Option<ModelTier>) -> Result<Outcome> {
        let (classification, sections) = transcript::classify(&self.transcript)?;
        match classification {
            Classification::InvalidOrdering => Ok(Outcome::InvalidOrdering),
            Classification::ValidEndsWithResponse => Ok(Outcome::AwaitingPrompt),
            Classification::Plain | Classification::ValidEndsWithPrompt => {
                let last: Vec<String> = sections.last().cloned().into_iter().collect();
                self.send(&last, self.tier(tier)).await
            }
        }
    }

    /// Continue a thread that ends with a response, or start one in an empty file.
    ///
    /// The prompt is appended before the call, so a failed call leaves the
    /// thread ending with that prompt, ready for `follow`.
    pub async fn ask(&self, prompt: &str) -> Result<Outcome> {
        let (classification, mut sections) = transcript::classify(&self.transcript)?;
        match classification {
            Classification::InvalidOrdering => Ok(Outcome::InvalidOrdering),
            Classification::ValidEndsWithPrompt => Ok(Outcome::PendingPrompt),
            Classification::Plain if !sections.is_empty() => Ok(Outcome::NoThread),
            // An empty file, or a thread waiting for its next question
            Classification::Plain | Classification::ValidEndsWithResponse => {
                transcript::append_turn(&self.transcript, prompt, TurnKind::Prompt)?;
                sections.push(prompt.to_string());
                self.send(&sections, self.default_tier).await
            }
        }
    }

    /// Move the thread into the history file and clear the transcript
    pub fn dump_to_history(&self) -> Result<Outcome> {
        let target = archive::dump_to_history(
            &self.transcript,
            &self.config.directories.usage_history_file,
            self.config.options.prepend_history,
        )?;
        Ok(Outcome::Archived(target))
    }

    /// Move the thread into a new archive file and clear the transcript
    pub fn dump_to_file(&self, date: NaiveDate) -> Result<Outcome> {
        let target = archive::dump_to_file(
            &self.transcript,
            &self.config.directories.archive_directory,
            date,
        )?;
        Ok(Outcome::Archived(target))
    }
}

/// Ask a single question outside of any transcript and log the exchange
/// to the history file.
pub async fn ask_once<P: ChatProvider>(
    provider: &P,
    config: &Config,
    question: &str,
    tier: ModelTier,
) -> Result<Completion> {
    let messages = build_messages(&[question], config.options.system_prompt.as_deref());
    let completion = provider.complete(&messages, tier).await?;

    archive::record_exchange(
        &config.directories.usage_history_file,
        question,
        &completion.text,
        config.options.prepend_history,
    )?;
    debug!(history = %config.directories.usage_history_file.display(), "recorded one-off exchange");
    Ok(completion)
}
