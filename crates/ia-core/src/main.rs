//! Install Audit Core - installed software inventory with install dates
//!
//! The main entry point for ia-core, handling:
//! - Package enumeration from the live registry or a snapshot
//! - Install-date resolution across registry, instrumentation and filesystem
//! - Configuration inspection and validation
//! - JSON Schema output for consumers

use clap::{Args, Parser, Subcommand};
use ia_common::error::{format_error_human, StructuredError};
use ia_common::{OutputFormat, SCHEMA_VERSION};
use ia_core::collect::{ToolRunnerBuilder, MAX_TIMEOUT_SECS};
use ia_core::config::{load_config, load_settings_file, ConfigOptions, ResolvedConfig};
use ia_core::exit_codes::ExitCode;
use ia_core::fsmeta::{StdFileMetadata, SystemPathNormalizer};
use ia_core::instrumentation::{
    CimProductQuery, DisabledInstrumentation, InstrumentationSource, StaticInstrumentation,
};
use ia_core::inventory::{collect_inventory, InventoryOptions, InventorySources};
use ia_core::log_event;
use ia_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use ia_core::registry::{system_registry, RegistryStore, SnapshotRegistry};
use ia_core::report::{render_jsonl, render_markdown, render_summary, InventoryEnvelope};
use ia_core::schema::{
    available_schemas, format_schema, generate_all_schemas, generate_schema, SchemaFormat,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

/// Install Audit Core - what is installed, and since when
#[derive(Parser)]
#[command(name = "ia-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Override config directory
    #[arg(long, global = true, env = "INSTALL_AUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed packages with resolved install dates (default)
    List(ListArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print JSON Schema for output types
    Schema(SchemaArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Read package registrations from a JSON snapshot instead of the live registry
    #[arg(long, value_name = "FILE")]
    registry_snapshot: Option<PathBuf>,

    /// Skip the instrumentation service query
    #[arg(long, conflicts_with = "instrumentation_snapshot")]
    no_instrumentation: bool,

    /// Read instrumentation rows from captured `ConvertTo-Json` output
    #[arg(long, value_name = "FILE")]
    instrumentation_snapshot: Option<PathBuf>,

    /// Kill the instrumentation query after this many seconds (at most 86400)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    instrumentation_timeout: Option<u64>,

    /// Only output packages without a resolved install date
    #[arg(long)]
    unresolved_only: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective settings and where they came from
    Show,

    /// Validate a settings file (defaults to the resolved one)
    Validate {
        /// Settings file to validate
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type to print a schema for
    #[arg(conflicts_with_all = ["list", "all"])]
    type_name: Option<String>,

    /// List available schema types
    #[arg(long)]
    list: bool,

    /// Print every schema
    #[arg(long)]
    all: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        LogLevel::Error
    } else {
        match cli.global.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    };
    // Machine payloads on stdout get machine logs on stderr
    let log_format = if cli.global.format.is_machine() {
        LogFormat::Jsonl
    } else {
        LogFormat::Human
    };
    let cli_level = (cli.global.quiet || cli.global.verbose > 0).then_some(log_level);
    let log_config = LogConfig::from_env(cli_level, Some(log_format));
    init_logging(&log_config);

    let exit_code = match cli.command {
        None => run_list(&cli.global, &ListArgs::default()),
        Some(Commands::List(args)) => run_list(&cli.global, &args),
        Some(Commands::Config(args)) => run_config(&cli.global, &args),
        Some(Commands::Schema(args)) => run_schema(&cli.global, &args),
        Some(Commands::Version) => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// list
// ============================================================================

fn run_list(global: &GlobalOpts, args: &ListArgs) -> ExitCode {
    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let config = match resolve_config(global, &ctx) {
        Ok(config) => config,
        Err(e) => return output_error(global, &e),
    };

    let registry = match open_registry(args) {
        Ok(registry) => registry,
        Err(e) => return output_error(global, &e),
    };

    let instrumentation = match open_instrumentation(args, &config) {
        Ok(source) => source,
        Err(e) => return output_error(global, &e),
    };

    let files = StdFileMetadata;
    let normalizer = SystemPathNormalizer;
    let sources = InventorySources {
        registry: registry.as_ref(),
        instrumentation: instrumentation.as_ref(),
        files: &files,
        normalizer: &normalizer,
    };
    let options = InventoryOptions {
        scopes: config.settings.scopes.clone(),
    };

    let mut inventory = collect_inventory(sources, &options, &ctx);
    let has_unresolved = inventory.unresolved().next().is_some();
    if args.unresolved_only {
        inventory.apps.retain(|a| !a.is_resolved());
    }

    log_event!(
        ctx,
        DEBUG,
        event_names::INVENTORY_FINISHED,
        Stage::Output,
        "rendering output",
        format = global.format.to_string().as_str(),
        records = inventory.apps.len()
    );

    let rendered = match global.format {
        OutputFormat::Json => {
            let envelope = InventoryEnvelope::new(ctx.run_id.clone(), config.snapshot(), inventory);
            serde_json::to_string_pretty(&envelope).map(Some)
        }
        OutputFormat::Jsonl => render_jsonl(&inventory.apps).map(|s| Some(s.trim_end().to_string())),
        OutputFormat::Md => Ok(Some(render_markdown(&inventory, &inventory.apps))),
        OutputFormat::Summary => Ok(Some(render_summary(&inventory))),
        OutputFormat::Exitcode => Ok(None),
    };

    match rendered {
        Ok(Some(text)) => println!("{}", text),
        Ok(None) => {}
        Err(e) => return output_error(global, &ia_common::Error::Json(e)),
    }

    if has_unresolved {
        ExitCode::Unresolved
    } else {
        ExitCode::Clean
    }
}

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> ia_common::Result<ResolvedConfig> {
    let options = ConfigOptions {
        config_dir: global.config.clone(),
        settings_path: None,
    };
    let config = load_config(&options)?;
    match &config.settings_path {
        Some(path) => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "settings loaded",
            path = path.display().to_string().as_str()
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no settings file, using defaults"
        ),
    }
    Ok(config)
}

fn open_registry(args: &ListArgs) -> ia_common::Result<Box<dyn RegistryStore>> {
    match &args.registry_snapshot {
        Some(path) => Ok(Box::new(SnapshotRegistry::from_path(path)?)),
        None => system_registry(),
    }
}

fn open_instrumentation(
    args: &ListArgs,
    config: &ResolvedConfig,
) -> ia_common::Result<Box<dyn InstrumentationSource>> {
    let settings = &config.settings.instrumentation;
    if args.no_instrumentation {
        return Ok(Box::new(DisabledInstrumentation));
    }
    if let Some(path) = &args.instrumentation_snapshot {
        return Ok(Box::new(StaticInstrumentation::from_path(path)?));
    }
    if !settings.enabled {
        return Ok(Box::new(DisabledInstrumentation));
    }

    let timeout = Duration::from_secs(args.instrumentation_timeout.unwrap_or(settings.timeout_secs));
    let runner = ToolRunnerBuilder::new()
        .timeout(timeout)
        .max_output(settings.max_output_bytes)
        .allow_commands([settings.powershell.as_str()])
        .build();
    Ok(Box::new(CimProductQuery::new(
        runner,
        settings.powershell.clone(),
        timeout,
    )))
}

// ============================================================================
// config
// ============================================================================

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Validate { path } => run_config_validate(global, path.as_ref()),
    }
}

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let config = match resolve_config(global, &ctx) {
        Ok(config) => config,
        Err(e) => return output_error(global, &e),
    };
    let snapshot = config.snapshot();

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": {
                    "path": snapshot.settings_path,
                    "hash": snapshot.settings_hash,
                    "using_defaults": snapshot.settings_path.is_none(),
                    "config_dir": snapshot.config_dir,
                },
                "settings": &config.settings,
            });
            print_json(global, &response)
        }
        OutputFormat::Exitcode => ExitCode::Clean,
        _ => {
            println!("# Configuration");
            println!();
            println!("Config dir: {}", snapshot.config_dir.display());
            match &snapshot.settings_path {
                Some(path) => println!("Settings:   {}", path.display()),
                None => println!("Settings:   (built-in defaults)"),
            }
            if let Some(hash) = &snapshot.settings_hash {
                println!("SHA-256:    {}", hash);
            }
            let scopes: Vec<String> = config.settings.scopes.iter().map(|s| s.to_string()).collect();
            let inst = &config.settings.instrumentation;
            println!("Scopes:     {}", scopes.join(", "));
            println!(
                "Instrumentation: {} (timeout {}s, {})",
                if inst.enabled { "enabled" } else { "disabled" },
                inst.timeout_secs,
                inst.powershell
            );
            ExitCode::Clean
        }
    }
}

fn run_config_validate(global: &GlobalOpts, path: Option<&PathBuf>) -> ExitCode {
    let result = match path {
        Some(path) => load_settings_file(path).map(|(_, hash)| (path.clone(), Some(hash))),
        None => load_config(&ConfigOptions {
            config_dir: global.config.clone(),
            settings_path: None,
        })
        .map(|c| {
            let shown = c
                .settings_path
                .clone()
                .unwrap_or_else(|| c.config_dir.join(ia_core::config::SETTINGS_FILE));
            (shown, c.settings_hash)
        }),
    };

    match result {
        Ok((path, hash)) => {
            match global.format {
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let response = serde_json::json!({
                        "schema_version": SCHEMA_VERSION,
                        "valid": true,
                        "path": path,
                        "hash": hash,
                    });
                    return print_json(global, &response);
                }
                OutputFormat::Exitcode => {}
                _ => println!("✓ {} is valid", path.display()),
            }
            ExitCode::Clean
        }
        Err(e) => output_error(global, &e.into()),
    }
}

// ============================================================================
// schema / version
// ============================================================================

fn run_schema(global: &GlobalOpts, args: &SchemaArgs) -> ExitCode {
    let format = if args.compact {
        SchemaFormat::JsonCompact
    } else {
        SchemaFormat::Json
    };

    if args.all {
        let all = serde_json::to_value(generate_all_schemas()).unwrap_or_default();
        println!("{}", format_schema(&all, format));
        return ExitCode::Clean;
    }

    match (&args.type_name, args.list) {
        (Some(name), _) => match generate_schema(name) {
            Some(schema) => {
                println!("{}", format_schema(&schema, format));
                ExitCode::Clean
            }
            None => {
                eprintln!("unknown schema type: {} (see --list)", name);
                ExitCode::ArgsError
            }
        },
        _ => {
            match global.format {
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let list: Vec<_> = available_schemas()
                        .into_iter()
                        .map(|(name, desc)| serde_json::json!({ "name": name, "description": desc }))
                        .collect();
                    return print_json(global, &serde_json::Value::Array(list));
                }
                _ => {
                    for (name, desc) in available_schemas() {
                        println!("{:<22} {}", name, desc);
                    }
                }
            }
            ExitCode::Clean
        }
    }
}

fn print_version(global: &GlobalOpts) {
    let version_info = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "ia_core_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    });

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            print_json(global, &version_info);
        }
        OutputFormat::Exitcode => {}
        _ => {
            println!("ia-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
        }
    }
}

// ============================================================================
// helpers
// ============================================================================

fn print_json(global: &GlobalOpts, value: &serde_json::Value) -> ExitCode {
    let rendered = if global.format == OutputFormat::Jsonl {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => output_error(global, &ia_common::Error::Json(e)),
    }
}

/// Report an error in the requested format and pick its exit code.
fn output_error(global: &GlobalOpts, err: &ia_common::Error) -> ExitCode {
    let code = ExitCode::for_error(err);
    let ctx = LogContext::detached();
    log_event!(
        ctx,
        ERROR,
        event_names::INTERNAL_ERROR,
        Stage::Output,
        "command failed",
        error = err.to_string().as_str(),
        exit_code = code.as_i32()
    );

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let structured = StructuredError::from(err).with_context("exit_code", code.code_name());
            println!("{}", structured.to_json());
        }
        OutputFormat::Exitcode => {}
        _ => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
    code
}
