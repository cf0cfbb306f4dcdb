// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Llm;

/// Availability of configured LLM connections. A failed load is kept apart from
/// an empty result so the dialog can say which one happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LlmOptions {
    #[default]
    Loading,
    Loaded(Vec<Llm>),
    Failed(String),
}

impl LlmOptions {
    pub fn llms(&self) -> &[Llm] {
        match self {
            Self::Loaded(llms) => llms,
            Self::Loading | Self::Failed(_) => &[],
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.llms().is_empty()
    }

    /// Connection new agents get attached to: the first one in list order.
    pub fn association_target(&self) -> Option<&Llm> {
        self.llms().first()
    }

    pub fn banner(&self) -> Option<String> {
        match self {
            Self::Loading => Some("Loading LLMs...".to_owned()),
            Self::Loaded(llms) if llms.is_empty() => {
                Some("Heads up! You haven't configured a LLM.".to_owned())
            }
            Self::Loaded(_) => None,
            Self::Failed(error) => Some(format!("Could not load LLMs: {error}")),
        }
    }
}
