// Chat provider trait and implementations

use std::future::Future;

use color_eyre::Result;

use crate::types::{Completion, Message, ModelTier};

pub mod openai;

/// A language model that answers a conversation.
///
/// Errors are returned as-is; callers decide what to do with the transcript.
pub trait ChatProvider {
    /// Send the messages and wait for the full reply
    fn complete(
        &self,
        messages: &[Message],
        tier: ModelTier,
    ) -> impl Future<Output = Result<Completion>> + Send;

    /// Model name used for a tier, for display
    fn model_name(&self, tier: ModelTier) -> &str;
}
