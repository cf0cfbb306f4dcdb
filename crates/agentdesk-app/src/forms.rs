// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use crate::{DEFAULT_LLM_MODEL, NewAgent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Name,
    Description,
    IsActive,
    LlmModel,
}

impl FormField {
    pub const ALL: [Self; 4] = [Self::Name, Self::Description, Self::IsActive, Self::LlmModel];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Description => "Description",
            Self::IsActive => "Active",
            Self::LlmModel => "Model",
        }
    }

    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Name => "E.g My agent",
            Self::Description => "E.g this agent is an expert at...",
            Self::IsActive => "",
            Self::LlmModel => "Select a model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentFormInput {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub llm_model: String,
}

impl Default for AgentFormInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            is_active: true,
            llm_model: DEFAULT_LLM_MODEL.to_owned(),
        }
    }
}

impl AgentFormInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.name.trim().is_empty() {
            errors.push(FormField::Name, "Name is required");
        }
        if self.description.trim().is_empty() {
            errors.push(FormField::Description, "Description is required");
        }
        if self.llm_model.trim().is_empty() {
            errors.push(FormField::LlmModel, "Model is required");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validates and converts the draft into the creation payload.
    pub fn to_new_agent(&self) -> Result<NewAgent, FieldErrors> {
        self.validate()?;
        Ok(NewAgent {
            name: self.name.trim().to_owned(),
            description: self.description.trim().to_owned(),
            is_active: self.is_active,
            llm_model: self.llm_model.trim().to_owned(),
        })
    }

    pub fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        match field {
            FormField::Name => Some(&mut self.name),
            FormField::Description => Some(&mut self.description),
            FormField::LlmModel => Some(&mut self.llm_model),
            FormField::IsActive => None,
        }
    }
}

/// Field-scoped validation failures, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldErrors {
    entries: Vec<(FormField, &'static str)>,
}

impl FieldErrors {
    fn push(&mut self, field: FormField, message: &'static str) {
        self.entries.push((field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: FormField) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, message)| *message)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &'static str)> + '_ {
        self.entries.iter().copied()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = self.iter().map(|(_, message)| message).collect::<Vec<_>>();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for FieldErrors {}
