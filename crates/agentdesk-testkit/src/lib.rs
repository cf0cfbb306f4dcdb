// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use agentdesk_app::{
    Agent, AgentId, AgentService, DEFAULT_LLM_MODEL, Llm, LlmId, LlmProvider, NewAgent,
};
use anyhow::{Result, anyhow};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration as StdDuration;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const AGENT_ROLES: [&str; 12] = [
    "Support",
    "Research",
    "Billing",
    "Onboarding",
    "Triage",
    "Sales",
    "Docs",
    "Release",
    "Incident",
    "Recruiting",
    "Compliance",
    "Analytics",
];

const AGENT_SUFFIXES: [&str; 6] = ["bot", "assistant", "agent", "helper", "copilot", "desk"];

const AGENT_SKILLS: [&str; 10] = [
    "answers customer tickets",
    "summarizes long documents",
    "drafts release notes",
    "reconciles invoices",
    "routes incoming requests",
    "explains API errors",
    "prepares weekly reports",
    "searches the knowledge base",
    "qualifies inbound leads",
    "checks policy compliance",
];

const MODEL_VALUES: [&str; 4] = [
    DEFAULT_LLM_MODEL,
    "GPT_3_5_TURBO_0613",
    "GPT_4_0613",
    "GPT_4_1106_PREVIEW",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of plausible agent records.
#[derive(Debug, Clone)]
pub struct AgentFaker {
    rng: DeterministicRng,
    next_id: u64,
}

impl AgentFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 0,
        }
    }

    pub fn agent(&mut self) -> Agent {
        self.next_id += 1;
        let role = self.pick(&AGENT_ROLES);
        let suffix = self.pick(&AGENT_SUFFIXES);
        let skill = self.pick(&AGENT_SKILLS);
        let created_at = reference_now() - Duration::hours(self.rng.int_n(24 * 90) as i64);
        Agent {
            id: AgentId::new(format!("agt_{:04}", self.next_id)),
            name: format!("{role} {suffix}"),
            description: format!("{role} {suffix} that {skill}."),
            is_active: self.rng.int_n(5) != 0,
            llm_model: self.pick(&MODEL_VALUES).to_owned(),
            prompt: None,
            created_at: Some(created_at),
            updated_at: Some(created_at),
        }
    }

    pub fn agents(&mut self, count: usize) -> Vec<Agent> {
        (0..count).map(|_| self.agent()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn agent(id: &str, name: &str) -> Agent {
    Agent {
        id: AgentId::new(id),
        name: name.to_owned(),
        description: format!("{name} description"),
        is_active: true,
        llm_model: DEFAULT_LLM_MODEL.to_owned(),
        prompt: None,
        created_at: Some(reference_now()),
        updated_at: None,
    }
}

pub fn llm(id: &str) -> Llm {
    Llm {
        id: LlmId::new(id),
        provider: LlmProvider::OpenAi,
    }
}

pub fn new_agent(name: &str, description: &str, llm_model: &str) -> NewAgent {
    NewAgent {
        name: name.to_owned(),
        description: description.to_owned(),
        is_active: true,
        llm_model: llm_model.to_owned(),
    }
}

pub fn reference_now() -> OffsetDateTime {
    datetime!(2026-01-01 0:00 UTC)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    ListLlms,
    ListAgents,
    GetAgent(AgentId),
    CreateAgent(NewAgent),
    AttachLlm(AgentId, LlmId),
}

#[derive(Debug, Default)]
struct ServiceData {
    llms: Vec<Llm>,
    agents: Vec<Agent>,
    calls: Vec<ServiceCall>,
    next_id: u64,
    list_llms_error: Option<String>,
    create_error: Option<String>,
    attach_error: Option<String>,
}

/// In-memory `AgentService` that records every call. Backs workflow tests and
/// the `--demo` mode of the binary.
#[derive(Debug, Default)]
pub struct RecordingService {
    data: Mutex<ServiceData>,
    latency: Option<StdDuration>,
}

impl RecordingService {
    pub fn new(llms: Vec<Llm>, agents: Vec<Agent>) -> Self {
        Self {
            data: Mutex::new(ServiceData {
                llms,
                agents,
                ..ServiceData::default()
            }),
            latency: None,
        }
    }

    /// Seeded agents, one OpenAI connection and a short artificial delay so
    /// the loading states are visible.
    pub fn demo() -> Self {
        let mut faker = AgentFaker::new(7);
        Self::new(vec![llm("llm_demo_openai")], faker.agents(24))
            .with_latency(StdDuration::from_millis(400))
    }

    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_list_llms(self, message: &str) -> Self {
        self.lock().list_llms_error = Some(message.to_owned());
        self
    }

    pub fn fail_create(self, message: &str) -> Self {
        self.lock().create_error = Some(message.to_owned());
        self
    }

    pub fn fail_attach(self, message: &str) -> Self {
        self.lock().attach_error = Some(message.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.lock().agents.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceData> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, call: ServiceCall) -> MutexGuard<'_, ServiceData> {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
        let mut data = self.lock();
        data.calls.push(call);
        data
    }
}

impl AgentService for RecordingService {
    fn list_llms(&self) -> Result<Vec<Llm>> {
        let data = self.record(ServiceCall::ListLlms);
        if let Some(error) = &data.list_llms_error {
            return Err(anyhow!("{error}"));
        }
        Ok(data.llms.clone())
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        let data = self.record(ServiceCall::ListAgents);
        Ok(data.agents.clone())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        let data = self.record(ServiceCall::GetAgent(id.clone()));
        data.agents
            .iter()
            .find(|agent| &agent.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("agent {id} not found"))
    }

    fn create_agent(&self, agent: &NewAgent) -> Result<Agent> {
        let mut data = self.record(ServiceCall::CreateAgent(agent.clone()));
        if let Some(error) = &data.create_error {
            return Err(anyhow!("{error}"));
        }
        data.next_id += 1;
        let created = Agent {
            id: AgentId::new(format!("agt_new_{}", data.next_id)),
            name: agent.name.clone(),
            description: agent.description.clone(),
            is_active: agent.is_active,
            llm_model: agent.llm_model.clone(),
            prompt: None,
            created_at: Some(OffsetDateTime::now_utc()),
            updated_at: None,
        };
        data.agents.push(created.clone());
        Ok(created)
    }

    fn attach_llm(&self, agent_id: &AgentId, llm_id: &LlmId) -> Result<()> {
        let data = self.record(ServiceCall::AttachLlm(agent_id.clone(), llm_id.clone()));
        if let Some(error) = &data.attach_error {
            return Err(anyhow!("{error}"));
        }
        if !data.llms.iter().any(|llm| &llm.id == llm_id) {
            return Err(anyhow!("llm {llm_id} not found"));
        }
        Ok(())
    }
}
