//! Prompt construction for one chunk.

use crate::adapters::ai::messages_to_csv;
use crate::domain::{DomainError, Message, schema};

/// Builds the per-chunk analysis prompt: participants, the chunk as CSV, and the exact JSON
/// shape the reply must take.
pub struct PromptBuilder {
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let template = serde_json::to_string_pretty(&schema::prompt_template())
            .unwrap_or_else(|_| schema::prompt_template().to_string());
        Self { template }
    }

    pub fn build(&self, participants: &[String], chunk: &[Message]) -> Result<String, DomainError> {
        let csv = messages_to_csv(chunk)
            .map_err(|e| DomainError::Format(format!("Failed to render chunk: {}", e)))?;

        let first = participants.first().map(String::as_str).unwrap_or("the first participant");
        let second = participants.get(1).map(String::as_str).unwrap_or("the second participant");

        Ok(format!(
            "Analyze this chat between {participants} and provide relationship insights \
in JSON format. Focus on communication patterns, emotional dynamics and relationship health. \
The \"sender\" is {first} and the \"receiver\" is {second}.\n\n\
Messages (semicolon-separated, columns Date;User;Message):\n{csv}\n\
Respond with ONLY a JSON object in exactly this format, \
with every number between 0 and 100:\n{template}\n",
            participants = participants.join(", "),
            template = self.template,
        ))
    }
}
