use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "trantor",
    about = "Trantor: declarative cluster and workload stacks",
    version,
    propagate_version = true,
)]
struct Cli {
    /// State database shared by every stack
    #[arg(long, global = true, env = "TRANTOR_STATE", default_value = ".trantor/state.redb")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what `up` would change
    Preview {
        #[command(flatten)]
        stack: StackArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Create, update and delete resources until the stack matches its file
    Up {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Delete every resource of a stack
    Destroy {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Print the recorded outputs of a stack
    Outputs {
        /// Full stack name, e.g. ry111/foundation/day
        stack: String,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Derive the names and labels of a service
    Names {
        service: String,
        /// production or rc
        #[arg(short, long, default_value = "production")]
        tier: String,
        #[arg(short, long, default_value = trantor_core::naming::DEFAULT_DOMAIN)]
        domain: String,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the Kubernetes objects of a workload stack as a List
    Render {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Read and edit values in a stack file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct StackArgs {
    /// Stack file (Trantor.<stack>.toml)
    #[arg(short = 's', long = "stack-file")]
    file: PathBuf,
    /// Override a configuration value for this run (KEY=VALUE)
    #[arg(short, long = "config", value_name = "KEY=VALUE")]
    config: Vec<String>,
}

#[derive(Subcommand)]
enum ConfigAction {
    Get {
        #[arg(short = 's', long = "stack-file")]
        file: PathBuf,
        key: String,
    },
    Set {
        #[arg(short = 's', long = "stack-file")]
        file: PathBuf,
        key: String,
        value: String,
    },
    Rm {
        #[arg(short = 's', long = "stack-file")]
        file: PathBuf,
        key: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trantor=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state = cli.state.as_path();

    match cli.command {
        Commands::Preview { stack, format } => {
            commands::stack::preview(state, &stack.file, &stack.config, &format)
        }
        Commands::Up { stack } => commands::stack::up(state, &stack.file, &stack.config),
        Commands::Destroy { stack } => commands::stack::destroy(state, &stack.file),
        Commands::Outputs { stack, format } => commands::stack::outputs(state, &stack, &format),
        Commands::Names {
            service,
            tier,
            domain,
            format,
        } => commands::names::names(&service, &tier, &domain, &format),
        Commands::Render { stack } => commands::stack::render(&stack.file, &stack.config),
        Commands::Config { action } => match action {
            ConfigAction::Get { file, key } => commands::config::get(&file, &key),
            ConfigAction::Set { file, key, value } => commands::config::set(&file, &key, &value),
            ConfigAction::Rm { file, key } => commands::config::rm(&file, &key),
        },
    }
}
