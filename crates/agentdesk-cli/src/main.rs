// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use agentdesk_app::{AgentService, AppState};
use agentdesk_testkit::RecordingService;
use anyhow::{Context, Result};
use config::Config;
use runtime::ApiRuntime;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `agentdesk --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let log_file = config.log_file()?;
    logging::init(&log_file, config.log_level())?;
    info!(config = %options.config_path.display(), demo = options.demo, "starting");

    let service: Arc<dyn AgentService> = if options.demo {
        Arc::new(RecordingService::demo())
    } else {
        let client = agentdesk_api::Client::new(
            config.api_base_url(),
            &config.api_key()?,
            config.api_timeout()?,
        )
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/api_key/timeout values",
                options.config_path.display()
            )
        })?;
        Arc::new(client)
    };

    if options.check_only {
        let llms = service
            .list_llms()
            .context("reach the agent API with the configured credentials")?;
        println!("ok: {} LLM connection(s) configured", llms.len());
        return Ok(());
    }

    let mut state = AppState::default();
    let mut runtime = ApiRuntime::new(service);
    agentdesk_tui::run_app(&mut state, &mut runtime, config.ui_options())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("agentdesk");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch against an in-memory demo service");
    println!("  --check                  Validate config and reach the agent API");
    println!("  --help                   Show this help");
}
