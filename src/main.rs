//! Cloudgate CLI
//!
//! Runs the confirmation gateway on stdio and inspects its policies and
//! configuration.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cloudgate_config::{env_vars, get_config_path, ConfigLoader, GatewayConfig};
use cloudgate_guard::{
    ActionPolicyRegistry, AuditSink, ConfirmationGuard, FileAuditSink, MemoryAuditSink,
    MultiAuditSink, Severity, TracingAuditSink,
};
use cloudgate_mcp::{DryRunApi, GatewayContext, McpServer, ServerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cloudgate",
    about = "Cloudgate - tool gateway that asks a human before dangerous cloud operations",
    version,
    author
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = env_vars::CONFIG)]
    config: Option<PathBuf>,

    /// Environment label assumed when a call carries none
    #[arg(short, long, global = true, env = env_vars::ENVIRONMENT)]
    environment: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC on stdin/stdout
    Serve,

    /// List guarded operations
    Policies(PoliciesArgs),

    /// Show the policy of one operation
    ShowPolicy {
        /// Operation name
        tool: String,
    },

    /// Validate the configuration file
    CheckConfig {
        /// Print the effective configuration as TOML
        #[arg(long)]
        print: bool,
    },
}

#[derive(Args)]
struct PoliciesArgs {
    /// Only this severity (low, medium, high, critical)
    #[arg(long)]
    severity: Option<Severity>,

    /// Group by category
    #[arg(long)]
    by_category: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_ref(), cli.environment.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve => cmd_serve(&config).await,
        Commands::Policies(args) => cmd_policies(&config, args),
        Commands::ShowPolicy { tool } => cmd_show_policy(&config, &tool),
        Commands::CheckConfig { print } => cmd_check_config(&config, print),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>, environment: Option<&str>) -> Result<GatewayConfig> {
    let mut config = match path {
        // An explicit file has to exist
        Some(path) => ConfigLoader::new(path)
            .use_defaults(false)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let path = get_config_path();
            ConfigLoader::new(&path)
                .load()
                .with_context(|| format!("loading {}", path.display()))?
        }
    };

    if let Some(environment) = environment {
        config.server.environment = Some(environment.to_string());
    }

    Ok(config)
}

fn build_audit(config: &GatewayConfig) -> Result<(Arc<dyn AuditSink>, Arc<MemoryAuditSink>)> {
    let memory = Arc::new(MemoryAuditSink::new(config.audit.memory_entries));
    let mut sinks = MultiAuditSink::new()
        .with(Arc::new(TracingAuditSink))
        .with(memory.clone());

    if let Some(path) = &config.audit.log_path {
        let file = FileAuditSink::open(path)
            .with_context(|| format!("opening audit log {}", path.display()))?;
        info!(path = %path.display(), "Writing audit log");
        sinks = sinks.with(Arc::new(file));
    }

    Ok((Arc::new(sinks), memory))
}

async fn cmd_serve(config: &GatewayConfig) -> Result<()> {
    let registry = Arc::new(config.registry()?);
    let (audit, recent) = build_audit(config)?;

    if config.server.environment.is_none() {
        warn!("No environment configured; guarded tools always require confirmation unless the caller declares one");
    }

    // No provider transport is wired in; confirmed calls are echoed back
    let remote = Arc::new(DryRunApi::with_tool_names(
        registry
            .iter()
            .map(|(tool, _)| tool.to_string())
            .collect::<Vec<_>>(),
    ));

    let guard = ConfirmationGuard::new(registry, config.guard_settings(), audit);
    let context = GatewayContext::new(Arc::new(guard), remote)
        .with_default_environment(config.server.environment.clone())
        .with_recent_events(recent);

    McpServer::new(context, ServerConfig::named(&config.server.name))
        .serve_stdio()
        .await?;
    Ok(())
}

fn cmd_policies(config: &GatewayConfig, args: PoliciesArgs) -> Result<()> {
    let registry = config.registry()?;

    if args.by_category {
        for (category, tools) in registry.by_category() {
            println!("{}", category);
            for tool in tools {
                print_policy_line(&registry, tool, args.severity);
            }
        }
        return Ok(());
    }

    for (tool, _) in registry.iter() {
        print_policy_line(&registry, tool, args.severity);
    }
    Ok(())
}

fn print_policy_line(registry: &ActionPolicyRegistry, tool: &str, severity: Option<Severity>) {
    let Some(policy) = registry.lookup(tool) else {
        return;
    };
    if severity.is_some_and(|s| s != policy.severity) {
        return;
    }
    println!(
        "  {:<40} {:<9} \"{}\"",
        tool, policy.severity, policy.required_confirmation
    );
}

fn cmd_show_policy(config: &GatewayConfig, tool: &str) -> Result<()> {
    let registry = config.registry()?;
    let Some(policy) = registry.lookup(tool) else {
        println!("{} is not guarded", tool);
        return Ok(());
    };

    println!("{}", tool);
    println!("  Category:     {}", policy.category);
    println!("  Severity:     {}", policy.severity);
    println!("  Description:  {}", policy.description);
    println!("  Warning:      {}", policy.warning_message);
    println!("  Reversible:   {}", if policy.reversible { "yes" } else { "NO" });
    println!("  Impact scope: {}", policy.impact_scope);
    println!("  Confirm with: \"{}\"", policy.required_confirmation);

    let guard_settings = config.guard_settings();
    if !guard_settings.bypass_environments.is_empty() {
        println!(
            "  Bypassed in:  {}",
            guard_settings.bypass_environments.join(", ")
        );
    }
    Ok(())
}

fn cmd_check_config(config: &GatewayConfig, print: bool) -> Result<()> {
    config.validate()?;
    let registry = config.registry()?;

    println!(
        "Configuration OK: {} guarded tools ({} overrides), timeout {}s, max {} pending",
        registry.len(),
        config.policies.len(),
        config.confirmation.timeout_secs,
        config.confirmation.max_pending
    );

    if print {
        println!();
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
