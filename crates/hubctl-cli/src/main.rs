//! hubctl - provision EKS clusters and deploy JupyterHub onto them

use clap::{Parser, Subcommand};
use hubctl_cloud::ProviderKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod exit_codes;
mod progress;

use commands::Context;
use commands::hub::CreateOptions;
use commands::render::Manifest;
use config::Settings;
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "hubctl")]
#[command(version)]
#[command(about = "Provision Kubernetes clusters and deploy JupyterHub onto them", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Log progress details
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ~/.config/hubctl/config.yaml)
    #[arg(long, global = true, env = "HUBCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig used as the cluster registry (default: $KUBECONFIG or ~/.kube/config)
    #[arg(long, global = true, env = "HUBCTL_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Cloud region
    #[arg(long, global = true, env = "HUBCTL_REGION")]
    region: Option<String>,

    /// Cluster provider
    #[arg(long, global = true, env = "HUBCTL_PROVIDER")]
    provider: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a cluster or a hub
    Create {
        #[command(subcommand)]
        resource: CreateResource,
    },

    /// Delete a cluster or a hub
    Delete {
        #[command(subcommand)]
        resource: DeleteResource,
    },

    /// List clusters or hubs, or show one
    Get {
        #[command(subcommand)]
        resource: GetResource,
    },

    /// Show details of a hub
    Describe {
        #[command(subcommand)]
        resource: DescribeResource,
    },

    /// Switch the current kube context to a cluster
    Use {
        /// Cluster name
        cluster: String,
    },

    /// Print a manifest applied to a provisioned cluster
    Render {
        /// Manifest to print
        #[arg(value_enum)]
        manifest: Manifest,

        /// Cluster name
        cluster: String,
    },
}

#[derive(Subcommand)]
enum CreateResource {
    /// Provision a cluster; re-run to resume after a failure
    Cluster {
        /// Cluster name
        name: String,
    },

    /// Install or upgrade a hub
    Hub {
        /// Hub name, also its namespace
        name: String,

        /// Target cluster (default: current context)
        #[arg(long)]
        cluster: Option<String>,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Chart version (default: hub.version from settings)
        #[arg(id = "chart_version", long = "chart-version")]
        version: Option<String>,

        /// Release name (default: hub name)
        #[arg(long)]
        release: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeleteResource {
    /// Delete every stack of a cluster
    Cluster {
        /// Cluster name
        name: String,
    },

    /// Uninstall a hub and delete its namespace
    Hub {
        /// Hub name
        name: String,

        /// Target cluster (default: current context)
        #[arg(long)]
        cluster: Option<String>,
    },
}

#[derive(Subcommand)]
enum GetResource {
    /// Registered clusters, or one cluster with its stack status
    Cluster {
        /// Cluster name
        name: Option<String>,
    },

    /// Deployed hubs with their public address
    Hub {
        /// Hub name
        name: Option<String>,

        /// Target cluster (default: current context)
        #[arg(long)]
        cluster: Option<String>,
    },
}

#[derive(Subcommand)]
enum DescribeResource {
    /// Release status of a hub
    Hub {
        /// Hub name
        name: String,

        /// Target cluster (default: current context)
        #[arg(long)]
        cluster: Option<String>,
    },
}

fn init_tracing(debug: bool, verbose: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(kubeconfig) = cli.kubeconfig {
        settings.kubeconfig = Some(kubeconfig);
    }
    if let Some(region) = cli.region {
        settings.region = Some(region);
    }
    if let Some(provider) = cli.provider {
        settings.provider = ProviderKind::from_name(&provider)?;
    }
    let ctx = Context::new(settings);

    match cli.command {
        Commands::Create { resource } => match resource {
            CreateResource::Cluster { name } => commands::cluster::create(&ctx, &name).await,
            CreateResource::Hub {
                name,
                cluster,
                values,
                set,
                version,
                release,
            } => {
                let options = CreateOptions {
                    cluster,
                    values,
                    set,
                    version,
                    release,
                };
                commands::hub::create(&ctx, &name, options).await
            }
        },

        Commands::Delete { resource } => match resource {
            DeleteResource::Cluster { name } => commands::cluster::delete(&ctx, &name).await,
            DeleteResource::Hub { name, cluster } => {
                commands::hub::delete(&ctx, &name, cluster.as_deref()).await
            }
        },

        Commands::Get { resource } => match resource {
            GetResource::Cluster { name } => commands::cluster::get(&ctx, name.as_deref()).await,
            GetResource::Hub { name, cluster } => {
                commands::hub::get(&ctx, name.as_deref(), cluster.as_deref()).await
            }
        },

        Commands::Describe { resource } => match resource {
            DescribeResource::Hub { name, cluster } => {
                commands::hub::describe(&ctx, &name, cluster.as_deref()).await
            }
        },

        Commands::Use { cluster } => commands::use_context::run(&ctx, &cluster),

        Commands::Render { manifest, cluster } => {
            commands::render::run(&ctx, manifest, &cluster).await
        }
    }
}

fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                0
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug, cli.verbose);

    let result = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run(cli)),
        Err(e) => Err(CliError::Other {
            message: format!("failed to start async runtime: {}", e),
        }),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
