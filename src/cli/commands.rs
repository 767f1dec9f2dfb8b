//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::kong::{ResourceKind, Scope};

/// kongctl - Command-line client for the Kong admin API.
#[derive(Parser, Debug)]
#[command(name = "kongctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Context file; looked up under `~/.kongctl/` when not found as given.
    #[arg(short = 'c', long = "ctx", value_name = "PATH", global = true, env = "KONGCTL_CONTEXT")]
    pub ctx: Option<PathBuf>,

    /// Admin API URL, overriding the context file.
    #[arg(short, long, value_name = "URL", global = true, env = "KONGCTL_SERVER")]
    pub server: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Verbose output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format for records and documents.
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    pub output: OutputFormat,

    /// Shorthand for `--output yaml`.
    #[arg(short = 'y', long = "yml", global = true)]
    pub yml: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output format after applying `--yml`.
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.yml { OutputFormat::Yaml } else { self.output }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List resources.
    List {
        /// Print every record in full instead of a table.
        #[arg(short, long, global = true)]
        full: bool,

        /// What to list.
        #[command(subcommand)]
        target: ListTarget,
    },

    /// Get one resource.
    Get {
        /// What to get.
        #[command(subcommand)]
        target: GetTarget,
    },

    /// Create a resource from a JSON body on stdin.
    Create {
        /// What to create.
        #[command(subcommand)]
        target: CreateTarget,
    },

    /// Patch a resource with a JSON body on stdin.
    Update {
        /// What to update.
        #[command(subcommand)]
        target: ItemTarget,
    },

    /// Delete a resource.
    Delete {
        /// Delete a service's plugins and routes first.
        #[arg(short, long, global = true)]
        recursive: bool,

        /// What to delete.
        #[command(subcommand)]
        target: ItemTarget,
    },

    /// Print live state as a desired-state document.
    Config {
        /// What to export.
        #[command(subcommand)]
        target: ConfigTarget,
    },

    /// Converge the gateway onto desired-state documents.
    Ensure {
        /// Document file, directory of documents, or `-` for stdin.
        path: PathBuf,
    },

    /// Export the current state of every service a document names.
    Snapshot {
        /// Source services document.
        path: PathBuf,

        /// Write the snapshot to this file instead of stdout.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Collections that can be listed.
#[derive(Subcommand, Debug)]
pub enum ListTarget {
    /// Services, optionally only those with a tag.
    Services {
        /// Tag to filter by.
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Routes, optionally of one service.
    Routes {
        /// Service name or id.
        #[arg(long)]
        service: Option<String>,
    },
    /// Plugins, optionally of one service or route.
    Plugins {
        /// Service name or id.
        #[arg(long, conflicts_with = "route")]
        service: Option<String>,
        /// Route name or id.
        #[arg(short, long)]
        route: Option<String>,
    },
    /// Names of the enabled plugins.
    PluginSchemas,
    /// Consumers.
    Consumers,
    /// Key-auth credentials of a consumer.
    KeyAuth {
        /// Consumer username or id.
        consumer: String,
    },
    /// JWT credentials of a consumer.
    Jwt {
        /// Consumer username or id.
        consumer: String,
    },
}

impl ListTarget {
    /// Resource kind and scope of the listing; `None` for plugin schemas.
    #[must_use]
    pub fn address(&self) -> Option<(ResourceKind, Scope)> {
        let address = match self {
            Self::Services { tag } => (
                ResourceKind::Service,
                tag.clone().map_or(Scope::Global, Scope::Tag),
            ),
            Self::Routes { service } => (
                ResourceKind::Route,
                service.clone().map_or(Scope::Global, Scope::Service),
            ),
            Self::Plugins { service, route } => {
                let scope = match (service, route) {
                    (Some(service), _) => Scope::Service(service.clone()),
                    (None, Some(route)) => Scope::Route(route.clone()),
                    (None, None) => Scope::Global,
                };
                (ResourceKind::Plugin, scope)
            }
            Self::PluginSchemas => return None,
            Self::Consumers => (ResourceKind::Consumer, Scope::Global),
            Self::KeyAuth { consumer } => (ResourceKind::KeyAuth, Scope::Consumer(consumer.clone())),
            Self::Jwt { consumer } => (ResourceKind::Jwt, Scope::Consumer(consumer.clone())),
        };
        Some(address)
    }
}

/// One addressable resource.
#[derive(Subcommand, Debug)]
pub enum ItemTarget {
    /// A service.
    Service {
        /// Service name or id.
        service: String,
    },
    /// A route.
    Route {
        /// Route name or id.
        route: String,
    },
    /// A plugin.
    Plugin {
        /// Plugin id.
        plugin: String,
    },
    /// A consumer.
    Consumer {
        /// Consumer username or id.
        consumer: String,
    },
    /// A key-auth credential.
    KeyAuth {
        /// Consumer username or id.
        consumer: String,
        /// Credential id.
        id: String,
    },
    /// A JWT credential.
    Jwt {
        /// Consumer username or id.
        consumer: String,
        /// Credential id.
        id: String,
    },
}

impl ItemTarget {
    /// Resource kind, scope and identifier of the target.
    #[must_use]
    pub fn address(&self) -> (ResourceKind, Scope, &str) {
        match self {
            Self::Service { service } => (ResourceKind::Service, Scope::Global, service.as_str()),
            Self::Route { route } => (ResourceKind::Route, Scope::Global, route.as_str()),
            Self::Plugin { plugin } => (ResourceKind::Plugin, Scope::Global, plugin.as_str()),
            Self::Consumer { consumer } => (ResourceKind::Consumer, Scope::Global, consumer.as_str()),
            Self::KeyAuth { consumer, id } => {
                (ResourceKind::KeyAuth, Scope::Consumer(consumer.clone()), id.as_str())
            }
            Self::Jwt { consumer, id } => (ResourceKind::Jwt, Scope::Consumer(consumer.clone()), id.as_str()),
        }
    }
}

/// Targets of `get`.
#[derive(Subcommand, Debug)]
pub enum GetTarget {
    /// A resource.
    #[command(flatten)]
    Item(ItemTarget),
    /// The configuration schema of a plugin.
    PluginSchema {
        /// Plugin name.
        plugin: String,
    },
}

/// Targets of `create`.
#[derive(Subcommand, Debug)]
pub enum CreateTarget {
    /// A service.
    Service,
    /// A route of a service.
    Route {
        /// Service name or id.
        #[arg(long)]
        service: Option<String>,
    },
    /// A plugin, optionally scoped to a service or a route.
    Plugin {
        /// Service name or id.
        #[arg(long)]
        service: Option<String>,
        /// Route name or id.
        #[arg(short, long)]
        route: Option<String>,
    },
    /// A consumer.
    Consumer {
        /// Username, overriding the body.
        #[arg(short, long)]
        username: Option<String>,
    },
    /// A key-auth credential.
    KeyAuth {
        /// Consumer username or id.
        consumer: String,
    },
    /// A JWT credential.
    Jwt {
        /// Consumer username or id.
        consumer: String,
    },
}

/// Targets of `config`.
#[derive(Subcommand, Debug)]
pub enum ConfigTarget {
    /// One service with its routes and plugins.
    Service {
        /// Service name or id.
        service: String,
    },
    /// Every service tagged with a group.
    ServiceGroup {
        /// Group tag.
        group: String,
    },
    /// Consumers with their credentials.
    Consumer {
        /// Only this consumer.
        consumer: Option<String>,
    },
    /// Plugins attached to neither a service nor a route.
    Plugin,
    /// Write documents under `<out-dir>/config/`.
    Dump {
        /// Root directory of the dump.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// What to dump.
        #[command(subcommand)]
        target: DumpTarget,
    },
}

/// Targets of `config dump`.
#[derive(Subcommand, Debug)]
pub enum DumpTarget {
    /// Services, one file each.
    Service {
        /// Only this service.
        service: Option<String>,
    },
    /// Consumers.
    Consumer {
        /// Only this consumer.
        consumer: Option<String>,
    },
    /// Plugins attached to neither a service nor a route.
    Plugin,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}
