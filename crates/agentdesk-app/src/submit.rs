// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use crate::{Agent, AgentId, AppEvent, Llm, LlmId, NewAgent, Notification, Route, SubmitPlan};

/// Remote agent platform. Implementations are shared across worker threads.
pub trait AgentService: Send + Sync {
    fn list_llms(&self) -> Result<Vec<Llm>>;
    fn list_agents(&self) -> Result<Vec<Agent>>;
    fn get_agent(&self, id: &AgentId) -> Result<Agent>;
    fn create_agent(&self, agent: &NewAgent) -> Result<Agent>;
    fn attach_llm(&self, agent_id: &AgentId, llm_id: &LlmId) -> Result<()>;
}

pub trait Navigator {
    fn push(&mut self, route: &Route);
    fn refresh(&mut self);
}

pub trait Notifier {
    fn notify(&mut self, notification: &Notification);
}

/// Creates the agent, then attaches it to the planned LLM connection. The
/// second call only runs once the first one produced an id.
pub fn run_submission(service: &dyn AgentService, plan: &SubmitPlan) -> Result<Agent> {
    let span = info_span!("create_agent", name = %plan.agent.name);
    let _guard = span.enter();

    let agent = service.create_agent(&plan.agent)?;
    if agent.id.as_str().is_empty() {
        bail!("agent creation returned no id");
    }
    service
        .attach_llm(&agent.id, &plan.llm_id)
        .with_context(|| format!("attach LLM {} to agent {}", plan.llm_id, agent.id))?;
    info!(agent = %agent.id, llm = %plan.llm_id, "agent created");
    Ok(agent)
}

/// Message shown to the user for a failed submission, including any context
/// layers added above the service's own message.
pub fn submission_error_message(error: &anyhow::Error) -> String {
    format!("{error:#}")
}

/// Forwards side effects carried by dispatch events to their collaborators.
pub fn apply_effects(
    events: &[AppEvent],
    navigator: &mut dyn Navigator,
    notifier: &mut dyn Notifier,
) {
    for event in events {
        match event {
            AppEvent::Notified(notification) => notifier.notify(notification),
            AppEvent::RefreshRequested => navigator.refresh(),
            AppEvent::Navigated(route) => navigator.push(route),
            _ => {}
        }
    }
}
