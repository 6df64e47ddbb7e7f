use std::{fmt, str::FromStr};

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Legal database ───────────────────────────────────────────────────────

/// Kind of material listed by the legal database search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MaterialType {
    #[default]
    All,
    Case,
    #[serde(rename = "Local Ordinance")]
    LocalOrdinance,
    Pleading,
    Statute,
}

impl MaterialType {
    pub const ALL: [MaterialType; 5] = [
        Self::All,
        Self::Case,
        Self::LocalOrdinance,
        Self::Pleading,
        Self::Statute,
    ];

    /// Value used by the search filter (and accepted from the model).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Case => "Case",
            Self::LocalOrdinance => "Local Ordinance",
            Self::Pleading => "Pleading",
            Self::Statute => "Statute",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::ALL.iter().find(|m| m.as_str() == s) {
            Some(m) => Ok(*m),
            None => bail!(
                "invalid material type {s:?}; must be one of 'All', 'Case', 'Local Ordinance', 'Pleading', 'Statute'"
            ),
        }
    }
}

/// How the search keyword is matched against database entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineOp {
    Contains,
    Word,
}

impl CombineOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Word => "word",
        }
    }
}

impl FromStr for CombineOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(Self::Contains),
            "word" => Ok(Self::Word),
            other => bail!("invalid combine op {other:?}; must be 'contains' or 'word'"),
        }
    }
}

/// One row of a legal database search results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub summary: String,
    /// Site-relative link to the full article, e.g. `/case/bear_rescue`.
    pub href: String,
}

// ── Chat ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON object string as produced by the model.
    pub arguments: String,
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on `Role::Tool` messages; matches the originating `ToolCall::id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(turn: AssistantTurn) -> Self {
        Self {
            role: Role::Assistant,
            content: turn.content,
            tool_calls: turn.tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A function the model may call, described by a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One model response: either final text or a batch of tool calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

// ── Script output ────────────────────────────────────────────────────────

/// Everything produced by one run of the five-step script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub strategy: String,
    pub complaint: String,
    pub todo: String,
    /// Legal database articles consulted during the run, sorted.
    pub urls: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
