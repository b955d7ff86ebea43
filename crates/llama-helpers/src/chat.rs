//! Chat prompt formatting.
//!
//! Llama-2:
//!
//! ```text
//! <s>[INST] <<SYS>>
//! {system}
//! <</SYS>>
//!
//! {user_1} [/INST] {assistant_1}</s><s>[INST] {user_2} [/INST]
//! ```
//!
//! Phi-2:
//!
//! ```text
//! System: {system}
//! Instruct: {user_1}
//! Output: {assistant_1}
//! Instruct: {user_2}
//! Output:
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{HelperError, Result};

const BOS: &str = "<s>";
const EOS: &str = "</s>";
const BOSYS: &str = "<<SYS>>";
const EOSYS: &str = "<</SYS>>";
const BOINST: &str = "[INST]";
const EOINST: &str = "[/INST]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Function/tool output; not part of the Llama-2 format.
    Tool,
}

/// A single chat entry (role + content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

impl ChatEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Prompt layout a model was fine-tuned on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    #[default]
    Llama2,
    Phi2,
}

impl PromptFormat {
    pub fn format(self, entries: &[ChatEntry]) -> Result<String> {
        match self {
            Self::Llama2 => format_llama2_chat(entries),
            Self::Phi2 => format_phi2_chat(entries),
        }
    }
}

/// Both layouts open with a system entry followed by a user entry.
fn opening_pair(entries: &[ChatEntry]) -> Result<(&ChatEntry, &ChatEntry)> {
    match entries {
        [s, u, ..] if s.role == Role::System && u.role == Role::User => Ok((s, u)),
        _ => Err(HelperError::IllegalContext(
            "chat must start with a system entry followed by a user entry".into(),
        )),
    }
}

/// Render a chat as a Llama-2 prompt.
///
/// The chat must open with a system entry followed by a user entry.
/// After that, assistant replies close their turn with `</s>` and every
/// user entry opens a new `[INST]` block. Each open instruction ends with
/// a trailing space so generated output does not run into `[/INST]`.
/// Tool entries are skipped.
pub fn format_llama2_chat(entries: &[ChatEntry]) -> Result<String> {
    let (system, user) = opening_pair(entries)?;

    let mut prompt = format!(
        "{BOS}{BOINST} {BOSYS}\n{}\n{EOSYS}\n\n{} {EOINST} ",
        system.content, user.content
    );

    for entry in &entries[2..] {
        match entry.role {
            Role::Assistant => {
                prompt.push_str(&entry.content);
                prompt.push_str(EOS);
            }
            Role::User => {
                prompt.push_str(&format!("{BOS}{BOINST} {} {EOINST} ", entry.content));
            }
            Role::System | Role::Tool => {}
        }
    }

    Ok(prompt)
}

/// Render a chat as a Phi-2 prompt.
///
/// Same opening rule as [`format_llama2_chat`]. Every turn sits on its own
/// line; when the chat ends on a user entry an open `Output: ` is appended
/// for the model to continue.
pub fn format_phi2_chat(entries: &[ChatEntry]) -> Result<String> {
    let (system, user) = opening_pair(entries)?;

    let mut prompt = format!("System: {}\nInstruct: {}\n", system.content, user.content);

    for entry in &entries[2..] {
        match entry.role {
            Role::Assistant => prompt.push_str(&format!("Output: {}\n", entry.content)),
            Role::User => prompt.push_str(&format!("Instruct: {}\n", entry.content)),
            Role::System | Role::Tool => {}
        }
    }

    if entries.last().is_some_and(|e| e.role == Role::User) {
        prompt.push_str("Output: ");
    }

    Ok(prompt)
}
