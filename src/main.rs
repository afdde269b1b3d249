// ABAC Policy Generator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/abac-policy-generator
// ```
//
// Or with custom configuration:
//
// ```console
// $ ./target/release/abac-policy-generator --config policy_settings.json --max-policies 500 --seed 42 --verbose
// ```

use abac_policy_generator::engine::{GenerationStatistics, LoggingConfig, PolicyOrchestrator};
use abac_policy_generator::output::write_policy_file;
use abac_policy_generator::types::{CliArgs, DimensionKind, PolicyConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    // Handle special CLI flags that don't require full initialization
    if args.print_config {
        match PolicyConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    // --debug > --verbose > warnings only
    let logging_result = LoggingConfig::from_flags(args.verbose, args.debug).init();

    let logging_guard = match logging_result {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let failed = match run(args) {
        Ok(()) => false,
        Err(e) => {
            error!("Policy generation failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            true
        }
    };

    // process::exit skips destructors; flush buffered log lines first
    drop(logging_guard);
    if failed {
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    info!("Starting ABAC Policy Generator");
    let dry_run = args.dry_run;

    // Load configuration from CLI arguments and optional config file
    let config = PolicyConfig::from_cli_args(args).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    info!("Configuration loaded and validated successfully");

    if dry_run {
        eprintln!("Configuration validation successful!");
        eprintln!("Dry run mode - no policies will be generated.");
        print_configuration_summary(&config);
        return Ok(());
    }

    print_startup_banner(&config);

    let orchestrator =
        PolicyOrchestrator::new(config.clone()).context("Failed to initialize the generator")?;
    let outcome = orchestrator.generate().context("Policy generation failed")?;

    write_policy_file(&outcome.policy_set, config.output_format, &config.output_path)
        .with_context(|| format!("Failed to write policies to {}", config.output_path))?;

    print_final_statistics(&outcome.statistics);
    eprintln!("Wrote {} rules to {}", outcome.policy_set.rules.len(), config.output_path);
    info!(path = %config.output_path, "ABAC Policy Generator completed successfully");
    Ok(())
}

/// Print startup banner and configuration summary
fn print_startup_banner(config: &PolicyConfig) {
    eprintln!("ABAC Policy Generator");
    eprintln!("=====================");
    eprintln!("Bounded, prioritized ABAC rule sets from policy templates");
    eprintln!();

    print_configuration_summary(config);
}

/// Print a summary of the effective configuration
fn print_configuration_summary(config: &PolicyConfig) {
    eprintln!("Configuration:");
    eprintln!("  Users: {} ({} attribute rows)", config.users.len(), config.user_attributes.len());
    eprintln!("  Buildings: {}", config.buildings().len());
    eprintln!("  Floors: {}", config.expansions.floors.len());
    eprintln!("  Rooms: {}", config.expansions.rooms.len());
    eprintln!("  Device Types: {}", config.expansions.devices.len());
    eprintln!("  Base Policies: {}", config.base_policies.len());
    eprintln!("  Roles: {}", config.roles.len());
    eprintln!("  Max Policies: {}", config.max_policies);
    eprintln!(
        "  Generalization: {} / {}",
        config.generalization.grouping_key, config.generalization.distribution_strategy
    );
    eprintln!("  Output: {} ({})", config.output_path, config.output_format);
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }

    eprintln!("\nEstimated Scale:");
    let estimate: usize = config
        .base_policies
        .iter()
        .map(|policy| {
            let per_range = policy.range.map(|r| r.values().count()).unwrap_or(1);
            let combinations: usize = policy
                .expand_on
                .iter()
                .map(|kind| match kind {
                    DimensionKind::Building => config.buildings().len(),
                    DimensionKind::Floor => config.expansions.floors.len(),
                    DimensionKind::Room => config.expansions.rooms.len(),
                    DimensionKind::Device if !policy.devices.is_empty() => policy.devices.len(),
                    DimensionKind::Device => config.expansions.devices.len(),
                })
                .product();
            combinations * per_range
        })
        .sum();
    eprintln!("  Template Candidates: ~{}", estimate);
    eprintln!();
}

/// Print final statistics after generation
fn print_final_statistics(statistics: &GenerationStatistics) {
    eprintln!();
    eprintln!("{}", statistics.generate_summary_report());
    eprintln!("Summary: {}", statistics.generate_compact_summary());
}
