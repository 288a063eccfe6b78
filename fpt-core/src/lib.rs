// fpt Core Library
// Transcript format, archiving, configuration, and model access for the fpt CLI

pub mod types;
pub mod blockquote;
pub mod transcript;
pub mod conversation;
pub mod archive;
pub mod config;
pub mod provider;
pub mod session;

// Re-export commonly used types
pub use types::*;
pub use config::Config;
pub use provider::ChatProvider;
pub use provider::openai::OpenAiProvider;
pub use session::{Outcome, Session};
pub use transcript::{classify, append_turn, remove_last_turn, FormatViolation, DELIMITER};
