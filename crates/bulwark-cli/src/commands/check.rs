//! `bulwark check` command implementation

use colored::Colorize;

use bulwark_foundation::{ResilienceSettings, Resilient};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Validate settings by building an orchestrator from them.
pub fn run(settings: &ResilienceSettings, output: OutputFormat) -> Result<(), CliError> {
    let resilient = settings.apply(Resilient::<()>::builder())?.build()?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        OutputFormat::Text => {
            println!("{}", "Settings are valid".green().bold());
            println!();
            match resilient.retry_policy() {
                Some(policy) if policy.is_unbounded() => println!(
                    "  retry:           forever, {} backoff from {:?}",
                    policy.backoff(),
                    policy.delay()
                ),
                Some(policy) => println!(
                    "  retry:           {} attempts, {} backoff from {:?}",
                    policy.max_attempts(),
                    policy.backoff(),
                    policy.delay()
                ),
                None => println!("  retry:           {}", "single attempt".dimmed()),
            }
            match resilient.circuit_breaker() {
                Some(breaker) => println!(
                    "  circuit breaker: '{}' opens after {} faults, resets after {:?}",
                    breaker.name(),
                    breaker.config().failure_threshold,
                    breaker.config().reset_timeout
                ),
                None => println!("  circuit breaker: {}", "none".dimmed()),
            }
            match resilient.timeout() {
                Some(timeout) => println!("  timeout:         {timeout:?}"),
                None => println!("  timeout:         {}", "none".dimmed()),
            }
            match resilient.throttle() {
                Some(throttle) => println!("  throttle:        {:?}", throttle.interval()),
                None => println!("  throttle:        {}", "none".dimmed()),
            }
        }
    }

    Ok(())
}
