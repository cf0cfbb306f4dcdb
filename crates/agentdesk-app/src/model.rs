// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

/// Model preselected in a fresh draft. It is not required to appear in the
/// catalog of the configured provider.
pub const DEFAULT_LLM_MODEL: &str = "GPT_3_5_TURBO_16K_0613";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub llm_model: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

const fn default_true() -> bool {
    true
}

/// Body of the agent creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub llm_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LlmProvider {
    OpenAi,
    AzureOpenAi,
    HuggingFace,
    Unknown,
}

impl LlmProvider {
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::AzureOpenAi, Self::HuggingFace];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI",
            Self::AzureOpenAi => "AZURE_OPENAI",
            Self::HuggingFace => "HUGGINGFACE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::AzureOpenAi => "Azure OpenAI",
            Self::HuggingFace => "Hugging Face",
            Self::Unknown => "Unknown provider",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPENAI" => Some(Self::OpenAi),
            "AZURE_OPENAI" => Some(Self::AzureOpenAi),
            "HUGGINGFACE" => Some(Self::HuggingFace),
            _ => None,
        }
    }

    /// Selectable models for this provider, in display order.
    pub fn model_options(self) -> &'static [ModelOption] {
        match self {
            Self::OpenAi => OPENAI_MODELS,
            Self::AzureOpenAi => AZURE_OPENAI_MODELS,
            Self::HuggingFace => HUGGINGFACE_MODELS,
            Self::Unknown => &[],
        }
    }
}

impl From<String> for LlmProvider {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or(Self::Unknown)
    }
}

impl From<LlmProvider> for String {
    fn from(value: LlmProvider) -> Self {
        value.as_str().to_owned()
    }
}

/// A configured LLM connection as returned by the model listing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Llm {
    pub id: LlmId,
    pub provider: LlmProvider,
}

impl Llm {
    pub fn title(&self) -> String {
        format!("{} ({})", self.provider.label(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOption {
    pub value: &'static str,
    pub title: &'static str,
}

const OPENAI_MODELS: &[ModelOption] = &[
    ModelOption {
        value: "GPT_3_5_TURBO_16K_0613",
        title: "gpt-3.5-turbo-16k-0613",
    },
    ModelOption {
        value: "GPT_3_5_TURBO_0613",
        title: "gpt-3.5-turbo-0613",
    },
    ModelOption {
        value: "GPT_3_5_TURBO_1106",
        title: "gpt-3.5-turbo-1106",
    },
    ModelOption {
        value: "GPT_4_0613",
        title: "gpt-4-0613",
    },
    ModelOption {
        value: "GPT_4_32K_0613",
        title: "gpt-4-32k-0613",
    },
    ModelOption {
        value: "GPT_4_1106_PREVIEW",
        title: "gpt-4-1106-preview",
    },
];

const AZURE_OPENAI_MODELS: &[ModelOption] = &[
    ModelOption {
        value: "GPT_3_5_TURBO_16K_0613",
        title: "gpt-35-turbo-16k",
    },
    ModelOption {
        value: "GPT_4_0613",
        title: "gpt-4",
    },
];

const HUGGINGFACE_MODELS: &[ModelOption] = &[ModelOption {
    value: "MISTRAL_7B_INSTRUCT_V01",
    title: "mistral-7b-instruct-v0.1",
}];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    AgentList,
    AgentDetail(AgentId),
    LlmSettings,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::AgentList => "/agents".to_owned(),
            Self::AgentDetail(id) => format!("/agents/{id}"),
            Self::LlmSettings => "/llms".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }
}
