// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use agentdesk_app::{
    Agent, AgentId, AgentService, Llm, SubmitPlan, run_submission, submission_error_message,
};
use agentdesk_tui::InternalEvent;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Runs service calls on worker threads so the UI keeps drawing while the
/// agent API answers.
pub struct ApiRuntime {
    service: Arc<dyn AgentService>,
    llm_load: Option<(u64, Arc<AtomicBool>)>,
}

impl ApiRuntime {
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            llm_load: None,
        }
    }
}

impl agentdesk_tui::AppRuntime for ApiRuntime {
    fn load_agents(&mut self) -> Result<Vec<Agent>> {
        self.service.list_agents()
    }

    fn load_agent(&mut self, id: &AgentId) -> Result<Agent> {
        self.service.get_agent(id)
    }

    fn load_llms(&mut self) -> Result<Vec<Llm>> {
        self.service.list_llms()
    }

    fn submit_agent(&mut self, plan: &SubmitPlan) -> Result<Agent> {
        run_submission(self.service.as_ref(), plan)
    }

    fn spawn_llm_load(&mut self, request_id: u64, tx: Sender<InternalEvent>) -> Result<()> {
        if let Some((_, previous)) = self.llm_load.take() {
            previous.store(true, Ordering::Release);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let service = Arc::clone(&self.service);
        thread::Builder::new()
            .name("llm-load".to_owned())
            .spawn(move || {
                let result = service.list_llms().map_err(|error| format!("{error:#}"));
                if flag.load(Ordering::Acquire) {
                    debug!(request_id, "llm load cancelled; dropping result");
                    return;
                }
                let _ = tx.send(InternalEvent::LlmsLoaded { request_id, result });
            })
            .context("spawn llm load thread")?;

        self.llm_load = Some((request_id, cancelled));
        Ok(())
    }

    fn cancel_llm_load(&mut self, request_id: u64) -> Result<()> {
        let pending = self
            .llm_load
            .as_ref()
            .is_some_and(|(pending, _)| *pending == request_id);
        if pending && let Some((_, flag)) = self.llm_load.take() {
            flag.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn spawn_submission(&mut self, plan: SubmitPlan, tx: Sender<InternalEvent>) -> Result<()> {
        let service = Arc::clone(&self.service);
        thread::Builder::new()
            .name("agent-submit".to_owned())
            .spawn(move || {
                let result = run_submission(service.as_ref(), &plan)
                    .map(|agent| agent.id)
                    .map_err(|error| submission_error_message(&error));
                let _ = tx.send(InternalEvent::SubmitFinished(result));
            })
            .context("spawn submission thread")?;
        Ok(())
    }
}
