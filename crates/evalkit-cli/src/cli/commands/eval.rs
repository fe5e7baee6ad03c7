use std::path::Path;
use std::process::ExitStatus;

use anyhow::Context;
use evalkit_core::config::{load_config, EvalConfig};
use evalkit_core::evals::hello::{self, RunSummary, Settings};
use evalkit_core::module::HelloModule;
use evalkit_core::protocol::transport::FINISH_GRACE;
use evalkit_core::{ChildTransport, LineTransport, Loopback, ProtocolError};

use super::super::args::HelloEvalArgs;
use crate::exit_codes;

pub async fn run_hello(args: HelloEvalArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(&args)?;
    let settings = Settings::from(&cfg);
    let summary_path = args.summary.clone();
    let strict = args.strict;
    // Over plain stdio, stdout belongs to the protocol.
    let report_to_stdout = args.builtin || !args.command.is_empty();

    let result = tokio::task::spawn_blocking(move || drive(&args, &cfg.module, &settings)).await?;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) if e.is_disconnect() => {
            tracing::debug!("module disconnected; stopping");
            return Ok(exit_codes::SUCCESS);
        }
        Err(e) => return Err(e).context("hello eval failed"),
    };

    if let Some(path) = summary_path {
        write_summary(&path, &summary)?;
    }
    if report_to_stdout {
        println!(
            "hello: {}/{} outputs valid, x = {} after {} round(s){}",
            summary.outcome.valid,
            summary.outcome.evaluations,
            summary.value,
            summary.iterations,
            if summary.defined { "" } else { " (module not defined)" }
        );
    }

    if strict && !summary.outcome.all_valid() {
        return Ok(exit_codes::VALIDATION_FAILED);
    }
    Ok(exit_codes::SUCCESS)
}

fn drive(
    args: &HelloEvalArgs,
    module: &str,
    settings: &Settings,
) -> Result<RunSummary, ProtocolError> {
    if args.builtin {
        let mut session = hello::session(module, Loopback::new(HelloModule), settings.tolerance);
        return hello::run(&mut session, settings);
    }

    if let Some((command, rest)) = args.command.split_first() {
        let transport = ChildTransport::spawn(command, rest)?;
        let mut session = hello::session(module, transport, settings.tolerance);
        let result = hello::run(&mut session, settings);
        let status = session.into_transport().finish(FINISH_GRACE)?;
        return settle_spawned(result, status);
    }

    let mut session = hello::session(module, LineTransport::stdio(), settings.tolerance);
    hello::run(&mut session, settings)
}

// The eval owns a spawned module, so a hang-up or a failing exit is an error
// rather than the quiet end it is over plain stdio.
fn settle_spawned(
    result: Result<RunSummary, ProtocolError>,
    status: Option<ExitStatus>,
) -> Result<RunSummary, ProtocolError> {
    let describe = |status: Option<ExitStatus>| match status {
        Some(status) => status.to_string(),
        None => "killed after ignoring end of input".to_string(),
    };
    match (result, status) {
        (Ok(summary), Some(status)) if status.success() => Ok(summary),
        (Ok(summary), None) => {
            tracing::warn!("module had to be killed after the eval finished");
            Ok(summary)
        }
        (Ok(_), status) => Err(ProtocolError::ModuleExited {
            status: describe(status),
        }),
        (Err(e), status) if e.is_disconnect() => {
            tracing::warn!(status = %describe(status), "module hung up mid-eval");
            Err(ProtocolError::ModuleExited {
                status: describe(status),
            })
        }
        (Err(e), _) => Err(e),
    }
}

fn resolve_config(args: &HelloEvalArgs) -> anyhow::Result<EvalConfig> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => EvalConfig::default(),
    };
    if let Some(module) = &args.module {
        cfg.module = module.clone();
    }
    if let Some(iterations) = args.iterations {
        cfg.iterations = iterations;
    }
    if let Some(initial) = args.initial {
        anyhow::ensure!(initial.is_finite(), "--initial must be a finite number");
        cfg.initial = initial;
    }
    Ok(cfg)
}

fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write summary {}", path.display()))
}
