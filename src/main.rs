//! kongctl CLI entrypoint.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kongctl::cli::{
    Cli, Commands, ConfigTarget, CreateTarget, DumpTarget, GetTarget, ItemTarget, ListTarget,
    OutputFormatter,
};
use kongctl::config::{Context, DocumentParser, ServicesDocument};
use kongctl::error::{ConfigError, Result};
use kongctl::exporter::{Exporter, render_yaml};
use kongctl::kong::{GatewayVersion, KongClient, ResourceClient, ResourceKind, Scope, Service};
use kongctl::reconciler::Reconciler;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output_format());
    let context = load_context(cli.ctx.as_deref())?.with_overrides(cli.server, cli.timeout);
    let client = ResourceClient::new(Box::new(KongClient::new(&context.client)?));
    debug!("Admin API: {}", context.client.endpoint());

    match cli.command {
        Commands::List { full, target } => cmd_list(&client, &target, full, &formatter).await,
        Commands::Get { target } => cmd_get(&client, &target, &formatter).await,
        Commands::Create { target } => cmd_create(&client, &target, &formatter).await,
        Commands::Update { target } => cmd_update(&client, &target, &formatter).await,
        Commands::Delete { recursive, target } => cmd_delete(&client, &target, recursive).await,
        Commands::Config { target } => cmd_config(&client, target, &formatter).await,
        Commands::Ensure { path } => cmd_ensure(&client, &context, &path, &formatter).await,
        Commands::Snapshot { path, file } => {
            cmd_snapshot(&client, &path, file.as_deref(), &formatter).await
        }
    }
}

/// Loads the context file, or the defaults when none is given.
fn load_context(path: Option<&Path>) -> Result<Context> {
    path.map_or_else(|| Ok(Context::default()), Context::load)
}

/// Reads a JSON object from stdin; empty input is an empty object.
fn read_body() -> Result<Map<String, Value>> {
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str(&content) {
        Ok(Value::Object(body)) => Ok(body),
        Ok(_) => Err(ConfigError::InvalidSetting {
            field: String::from("body"),
            message: String::from("expected a JSON object"),
        }
        .into()),
        Err(e) => Err(ConfigError::parse(format!("JSON parse error: {e}"), "stdin").into()),
    }
}

/// List resources.
async fn cmd_list(
    client: &ResourceClient,
    target: &ListTarget,
    full: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let Some((kind, scope)) = target.address() else {
        let names = client.enabled_plugins().await?;
        if full {
            return formatter.emit(&names);
        }
        return formatter.emit_text(&formatter.format_plugin_names(&names));
    };

    let records: Vec<Value> = client.list(kind, &scope).await?;
    if full {
        return formatter.emit(&records);
    }

    let services: Vec<Service> = match kind {
        ResourceKind::Route | ResourceKind::Plugin => {
            client.list(ResourceKind::Service, &Scope::Global).await?
        }
        _ => Vec::new(),
    };
    formatter.emit_text(&formatter.format_listing(kind, &records, &services))
}

/// Get one resource.
async fn cmd_get(client: &ResourceClient, target: &GetTarget, formatter: &OutputFormatter) -> Result<()> {
    let record = match target {
        GetTarget::Item(item) => {
            let (kind, scope, id) = item.address();
            client.get::<Value>(kind, &scope, id).await?
        }
        GetTarget::PluginSchema { plugin } => client.plugin_schema(plugin).await?,
    };
    formatter.emit(&record)
}

/// Create a resource from the body on stdin.
async fn cmd_create(
    client: &ResourceClient,
    target: &CreateTarget,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut body = read_body()?;
    let (kind, scope) = match target {
        CreateTarget::Service => (ResourceKind::Service, Scope::Global),
        CreateTarget::Route { service } => (
            ResourceKind::Route,
            service.clone().map_or(Scope::Global, Scope::Service),
        ),
        CreateTarget::Plugin { service, route } => {
            let scope = match (service, route) {
                (_, Some(route)) => Scope::Route(route.clone()),
                (Some(service), None) => Scope::Service(service.clone()),
                (None, None) => Scope::Global,
            };
            (ResourceKind::Plugin, scope)
        }
        CreateTarget::Consumer { username } => {
            if let Some(username) = username {
                body.insert(String::from("username"), Value::String(username.clone()));
            }
            (ResourceKind::Consumer, Scope::Global)
        }
        CreateTarget::KeyAuth { consumer } => (ResourceKind::KeyAuth, Scope::Consumer(consumer.clone())),
        CreateTarget::Jwt { consumer } => (ResourceKind::Jwt, Scope::Consumer(consumer.clone())),
    };

    info!("Creating {kind} ({scope})");
    let created: Value = client.create(kind, &scope, Value::Object(body)).await?;
    formatter.emit(&created)
}

/// Patch a resource with the body on stdin.
async fn cmd_update(client: &ResourceClient, target: &ItemTarget, formatter: &OutputFormatter) -> Result<()> {
    let body = read_body()?;
    let (kind, scope, id) = target.address();

    info!("Updating {kind} {id}");
    let updated: Value = client.update(kind, &scope, id, Value::Object(body)).await?;
    formatter.emit(&updated)
}

/// Delete a resource.
async fn cmd_delete(client: &ResourceClient, target: &ItemTarget, recursive: bool) -> Result<()> {
    let (kind, scope, id) = target.address();

    if recursive {
        if kind != ResourceKind::Service {
            return Err(ConfigError::InvalidSetting {
                field: String::from("--recursive"),
                message: format!("only services can be deleted recursively, not {kind}"),
            }
            .into());
        }
        client.delete_service_recursive(id).await?;
        eprintln!("Deleted service {id} with its routes and plugins");
        return Ok(());
    }

    client.delete(kind, &scope, id).await?;
    eprintln!("Deleted {kind} {id}");
    Ok(())
}

/// Print live state as documents, or dump it to files.
async fn cmd_config(client: &ResourceClient, target: ConfigTarget, formatter: &OutputFormatter) -> Result<()> {
    let version = client.gateway_version().await?;
    let exporter = Exporter::new(client, &version);

    match target {
        ConfigTarget::Service { service } => formatter.emit(&exporter.export_service(&service).await?),
        ConfigTarget::ServiceGroup { group } => {
            formatter.emit(&exporter.export_service_group(&group).await?)
        }
        ConfigTarget::Consumer { consumer } => {
            formatter.emit(&exporter.export_consumers(consumer.as_deref()).await?)
        }
        ConfigTarget::Plugin => formatter.emit(&exporter.export_orphan_plugins().await?),
        ConfigTarget::Dump { out_dir, target } => cmd_dump(&exporter, &out_dir, target).await,
    }
}

/// Write documents under `<out_dir>/config/`.
async fn cmd_dump(exporter: &Exporter<'_>, out_dir: &Path, target: DumpTarget) -> Result<()> {
    let written: Vec<PathBuf> = match target {
        DumpTarget::Service { service } => exporter.dump_services(out_dir, service.as_deref()).await?,
        DumpTarget::Consumer { consumer } => {
            vec![exporter.dump_consumers(out_dir, consumer.as_deref()).await?]
        }
        DumpTarget::Plugin => exporter.dump_plugins(out_dir).await?.into_iter().collect(),
    };

    if written.is_empty() {
        eprintln!("Nothing to dump.");
    }
    for path in &written {
        eprintln!("Written: {}", path.display());
    }
    Ok(())
}

/// Converge the gateway onto the documents at a path.
async fn cmd_ensure(
    client: &ResourceClient,
    context: &Context,
    path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let parser = DocumentParser::new().with_vars(context.var_map.clone());
    let documents = parser.load_all(path)?;
    if documents.is_empty() {
        eprintln!("No documents found at {}", path.display());
        return Ok(());
    }

    let version: GatewayVersion = client.gateway_version().await?;
    info!("Gateway version {version}, {} document(s)", documents.len());

    let reports = Reconciler::new(client, &version).reconcile_all(&documents).await?;
    for report in &reports {
        eprint!("{}", formatter.format_report(report));
    }
    Ok(())
}

/// Export the current state of every service a document names.
async fn cmd_snapshot(
    client: &ResourceClient,
    path: &Path,
    file: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string())
    })?;
    let source: ServicesDocument = serde_yaml::from_str(&content).map_err(|e| {
        ConfigError::parse(format!("YAML parse error: {e}"), path.display().to_string())
    })?;

    let version = client.gateway_version().await?;
    let snapshot = Exporter::new(client, &version).snapshot(&source).await?;
    let rendered = render_yaml(&snapshot, "snapshot")?;

    match file {
        Some(file) => {
            std::fs::write(file, rendered)?;
            eprintln!("Snapshot written to {}", file.display());
        }
        None => formatter.emit_text(&rendered)?,
    }
    Ok(())
}
