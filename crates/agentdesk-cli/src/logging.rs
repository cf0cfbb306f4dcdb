// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "AGENTDESK_LOG";

/// Directives from `AGENTDESK_LOG` win over the configured level.
pub fn env_filter(configured_level: &str) -> Result<EnvFilter> {
    let directives = match env::var(LOG_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => configured_level.to_owned(),
    };
    EnvFilter::try_new(&directives)
        .map_err(|error| anyhow!("invalid log filter {directives:?}: {error}"))
}

/// Sends log output to `path`; the terminal belongs to the UI.
pub fn init(path: &Path, configured_level: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured_level)?)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}
