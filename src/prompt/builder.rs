use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PromptError;

/// Every explanation is introduced to the predictor with this phrase.
pub const EXPLANATION_PREFIX: &str = "the main thing this neuron does is find";

const END_OF_PROMPT: &str = "<|endofprompt|>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// How a conversation is serialized for the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    /// Message contents concatenated as-is.
    None,
    /// Concatenated, with an end-of-prompt marker closing the last user message.
    InstructionFollowing,
    /// Role-tagged message list.
    HarmonyV4,
}

impl fmt::Display for PromptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptFormat::None => "none",
            PromptFormat::InstructionFollowing => "instruction_following",
            PromptFormat::HarmonyV4 => "harmony_v4",
        };
        f.write_str(name)
    }
}

impl FromStr for PromptFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PromptFormat::None),
            "instruction_following" => Ok(PromptFormat::InstructionFollowing),
            "harmony_v4" => Ok(PromptFormat::HarmonyV4),
            other => Err(format!("invalid prompt format: {other}")),
        }
    }
}

/// A built prompt: flat completion text or a structured conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl Prompt {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Prompt::Text(text) => Some(text),
            Prompt::Messages(_) => None,
        }
    }

    pub fn messages(&self) -> Option<&[Message]> {
        match self {
            Prompt::Text(_) => None,
            Prompt::Messages(messages) => Some(messages),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
    }

    pub fn build(&self, format: PromptFormat, allow_extra_system_messages: bool) -> Result<Prompt, PromptError> {
        match format {
            PromptFormat::None => Ok(Prompt::Text(self.concatenated(None))),
            PromptFormat::InstructionFollowing => {
                let last_user = self
                    .messages
                    .iter()
                    .rposition(|m| m.role == Role::User)
                    .ok_or(PromptError::MissingUserMessage)?;
                Ok(Prompt::Text(self.concatenated(Some(last_user))))
            }
            PromptFormat::HarmonyV4 => {
                self.check_structured_layout(allow_extra_system_messages)?;
                Ok(Prompt::Messages(self.messages.clone()))
            }
        }
    }

    fn concatenated(&self, end_of_prompt_after: Option<usize>) -> String {
        let mut out = String::new();
        for (i, message) in self.messages.iter().enumerate() {
            out.push_str(&message.content);
            if Some(i) == end_of_prompt_after {
                out.push_str(END_OF_PROMPT);
            }
        }
        out
    }

    // System first; user/assistant never repeat back to back.
    fn check_structured_layout(&self, allow_extra_system_messages: bool) -> Result<(), PromptError> {
        let Some(first) = self.messages.first() else {
            return Ok(());
        };
        if first.role != Role::System {
            return Err(PromptError::MissingSystemMessage);
        }

        let mut previous: Option<Role> = None;
        for (index, message) in self.messages.iter().enumerate().skip(1) {
            if message.role == Role::System {
                if !allow_extra_system_messages {
                    return Err(PromptError::ExtraSystemMessage(index));
                }
                continue;
            }
            if previous == Some(message.role) {
                return Err(PromptError::ConsecutiveRole {
                    role: message.role.as_str(),
                    index,
                });
            }
            previous = Some(message.role);
        }
        Ok(())
    }
}
