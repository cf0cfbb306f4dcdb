// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use agentdesk_app::{Agent, AgentId, AgentService, Llm, LlmId, NewAgent};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Blocking client for the agent platform's REST API. Cheap to share behind an
/// `Arc`; every request carries the same bearer token.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_llms(&self) -> Result<Vec<Llm>> {
        let envelope: LlmListResponse = self.send(self.http.get(self.url("llms")), "LLM list")?;
        if !envelope.success {
            bail!("LLM listing reported failure");
        }
        debug!(count = envelope.data.len(), "listed llms");
        Ok(envelope.data)
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        let envelope: DataEnvelope<Vec<Agent>> =
            self.send(self.http.get(self.url("agents")), "agent list")?;
        Ok(envelope.data)
    }

    pub fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        let envelope: DataEnvelope<Agent> =
            self.send(self.http.get(self.url(&format!("agents/{id}"))), "agent")?;
        Ok(envelope.data)
    }

    pub fn create_agent(&self, agent: &NewAgent) -> Result<Agent> {
        let envelope: DataEnvelope<Agent> =
            self.send(self.http.post(self.url("agents")).json(agent), "created agent")?;
        Ok(envelope.data)
    }

    pub fn create_agent_llm(&self, agent_id: &AgentId, llm_id: &LlmId) -> Result<()> {
        let body = AgentLlmRequest {
            llm_id: llm_id.as_str(),
        };
        let _: serde_json::Value = self.send(
            self.http
                .post(self.url(&format!("agents/{agent_id}/llms")))
                .json(&body),
            "agent LLM link",
        )?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Transport and HTTP errors come back as-is; only decoding `what` from a
    /// success body adds context.
    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "agent api request failed");
            return Err(clean_error_response(status, &body));
        }

        // Some endpoints answer 204 or an empty body on success.
        let text = response.text().context("read response body")?;
        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(text).with_context(|| format!("decode {what}"))
    }
}

impl AgentService for Client {
    fn list_llms(&self) -> Result<Vec<Llm>> {
        Client::list_llms(self)
    }

    fn list_agents(&self) -> Result<Vec<Agent>> {
        Client::list_agents(self)
    }

    fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        Client::get_agent(self, id)
    }

    fn create_agent(&self, agent: &NewAgent) -> Result<Agent> {
        Client::create_agent(self, agent)
    }

    fn attach_llm(&self, agent_id: &AgentId, llm_id: &LlmId) -> Result<()> {
        self.create_agent_llm(agent_id, llm_id)
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out");
    }
    anyhow!("cannot reach {base_url} ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<DetailEnvelope>(body)
        && let Some(detail) = parsed.detail.as_ref().and_then(detail_message)
    {
        return anyhow!("{detail}");
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        return anyhow!("{}", error.message);
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

/// FastAPI sends either a plain string or a list of validation entries.
fn detail_message(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Array(entries) => {
            let messages = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct LlmListResponse {
    #[serde(default = "default_success")]
    success: bool,
    data: Vec<Llm>,
}

const fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentLlmRequest<'a> {
    llm_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
