//! `bulwark run` command implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use colored::Colorize;
use serde_json::json;

use bulwark_foundation::{Disposition, Execution, ResilienceSettings, Resilient};
use bulwark_kernel::{BoxError, ExecutionContext};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Shape of the simulated service.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub failures: u32,
    pub latency_ms: u64,
    pub value: String,
    pub fallback: Option<String>,
    pub calls: u32,
}

/// Run the simulated service `args.calls` times through an orchestrator
/// built from `settings`.
pub async fn run(
    settings: &ResilienceSettings,
    args: RunArgs,
    output: OutputFormat,
) -> Result<(), CliError> {
    let mut builder = settings
        .apply(Resilient::<String>::builder())?
        .when_entering(|ctx: &ExecutionContext| {
            let id = ctx.correlation_id();
            async move { tracing::debug!(%id, "execution started") }
        })
        .if_timeout(|ctx: &ExecutionContext| {
            let attempt = ctx.attempts();
            async move { tracing::info!(attempt, "attempt timed out") }
        });
    if let Some(fallback) = args.fallback.clone() {
        builder = builder.fallback_to(move || {
            let fallback = fallback.clone();
            async move { Ok::<_, BoxError>(fallback) }
        });
    }
    let resilient = builder.build()?;

    let invocations = Arc::new(AtomicU32::new(0));
    let service = {
        let invocations = Arc::clone(&invocations);
        let latency = Duration::from_millis(args.latency_ms);
        let failures = args.failures;
        let value = args.value.clone();
        move || {
            let call = invocations.fetch_add(1, Ordering::SeqCst) + 1;
            let value = value.clone();
            async move {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                if call <= failures {
                    Err(BoxError::from(format!("simulated failure {call}/{failures}")))
                } else {
                    Ok(value)
                }
            }
        }
    };

    let mut reports = Vec::with_capacity(args.calls as usize);
    for call in 1..=args.calls {
        let execution = resilient.execute(service.clone()).await;
        tracing::info!(
            call,
            disposition = %execution.disposition,
            attempts = execution.context.attempts(),
            "execution finished"
        );
        reports.push(execution);
    }

    match output {
        OutputFormat::Json => {
            let executions: Vec<_> = reports.iter().map(execution_json).collect();
            let breaker = resilient
                .circuit_breaker()
                .map(|breaker| breaker.metrics().snapshot());
            let doc = json!({
                "executions": executions,
                "invocations": invocations.load(Ordering::SeqCst),
                "circuit_breaker": breaker,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            for (index, execution) in reports.iter().enumerate() {
                print_execution(index + 1, execution);
            }
            println!();
            println!(
                "Service invoked {} time(s)",
                invocations.load(Ordering::SeqCst)
            );
            if let Some(breaker) = resilient.circuit_breaker() {
                println!("Circuit '{}' is {}", breaker.name(), breaker.state());
                print!("{}", breaker.metrics().snapshot());
            }
        }
    }

    Ok(())
}

fn execution_json(execution: &Execution<String>) -> serde_json::Value {
    json!({
        "disposition": execution.disposition,
        "value": execution.value,
        "attempts": execution.context.attempts(),
        "elapsed_ms": execution.context.elapsed().as_millis() as u64,
        "errors": execution
            .context
            .errors()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "fallback_error": execution.fallback_error.as_ref().map(ToString::to_string),
    })
}

fn print_execution(call: usize, execution: &Execution<String>) {
    let disposition = match execution.disposition {
        Disposition::Succeeded => execution.disposition.to_string().green(),
        Disposition::FellBack => execution.disposition.to_string().yellow(),
        Disposition::Throttled => execution.disposition.to_string().cyan(),
        _ => execution.disposition.to_string().red(),
    };
    println!(
        "#{call} {disposition} after {} attempt(s) in {:?}",
        execution.context.attempts(),
        execution.context.elapsed()
    );
    if let Some(value) = &execution.value {
        println!("   value: {value}");
    }
    for (i, error) in execution.context.errors().iter().enumerate() {
        println!("   {} {}", format!("error {}:", i + 1).dimmed(), error);
    }
    if let Some(error) = &execution.fallback_error {
        println!("   {} {}", "fallback error:".dimmed(), error);
    }
}
