// Request construction
// Turns transcript sections into the message list sent to the model

use crate::types::{Message, Role};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const MARKDOWN_PRIMER: &str = "The following messages you will receive contain **Markdown formatting**, and you can reply to them using Markdown formatting, like links, tables, bold, italics, code blocks, inline latex, etc. You can highlight the key words with **bold**, render the math formulas using inline $equations$, and use markdown tables to show suitable information. Reply with 'understood' to continue.";

const MARKDOWN_ACK: &str = "Understood. I'm ready to proceed with your questions and messages in Markdown formatting.";

/// Build the full request: a fixed preamble followed by the sections,
/// alternating user (even index) and assistant (odd index).
pub fn build_messages<S: AsRef<str>>(sections: &[S], system_prompt: Option<&str>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(sections.len() + 3);
    messages.push(Message::new(
        Role::System,
        system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
    ));
    messages.push(Message::new(Role::User, MARKDOWN_PRIMER));
    messages.push(Message::new(Role::Assistant, MARKDOWN_ACK));

    for (idx, section) in sections.iter().enumerate() {
        let role = if idx % 2 == 0 { Role::User } else { Role::Assistant };
        messages.push(Message::new(role, section.as_ref()));
    }

    messages
}
