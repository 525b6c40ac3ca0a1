use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use env_logger::Env;

mod addr;
mod cam;
mod job;
mod layers;
mod list;
mod stack;

#[derive(Parser)]
#[command(name = "pcb")]
#[command(about = "Layer addressing and CAM export planning for board layer stacks", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true, hide = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the layer groups and virtual layers of a stack
    #[command(alias = "l")]
    Layers(layers::LayersArgs),

    /// Resolve layer group (or layer) addresses to ids
    Addr(addr::AddrArgs),

    /// Show what a CAM instruction exports, and to which files
    Cam(cam::CamArgs),

    /// Run a CAM job script
    Job(job::JobArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger with default level depending on --debug (overridden by RUST_LOG)
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("warn")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Layers(args) => layers::execute(args),
        Commands::Addr(args) => addr::execute(args),
        Commands::Cam(args) => cam::execute(args),
        Commands::Job(args) => job::execute(args),
    }
}
