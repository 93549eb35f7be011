mod commands;

use clap::{Args, Parser, Subcommand};

use autorun_core::AutostartType;

#[derive(Parser)]
#[command(
    name = "autorun",
    version,
    about = "List and manage programs that start automatically on Windows"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registry, scheduled task and service autostart entries
    List {
        /// Only list entries of this type (registry, task, service)
        #[arg(long)]
        kind: Option<AutostartType>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Enable a disabled entry or disable an enabled one
    Toggle(EntryArgs),
    /// Add a new autostart entry
    Create(CreateArgs),
    /// Change an existing entry's name, location or command
    Modify(ModifyArgs),
    /// Remove an autostart entry
    Delete(EntryArgs),
}

/// Identifies an existing entry.
#[derive(Args)]
pub struct EntryArgs {
    /// Entry type: registry, task or service
    #[arg(long)]
    pub kind: AutostartType,
    /// Registry key (e.g. CurrentUser\Software\...\Run), task path or
    /// service name
    #[arg(long)]
    pub location: String,
    /// Registry value name (required for registry entries)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Entry type: registry, task or service
    #[arg(long)]
    pub kind: AutostartType,
    /// Registry value name, task name or service display name
    #[arg(long)]
    pub name: String,
    /// Program to run
    #[arg(long)]
    pub path: String,
    /// Arguments passed to the program
    #[arg(long, allow_hyphen_values = true)]
    pub args: Option<String>,
    /// Where to create the entry. Defaults to the current user's Run key
    /// for registry entries and the root folder for tasks; required for
    /// services (the service name)
    #[arg(long)]
    pub location: Option<String>,
    /// Create the entry disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Args)]
pub struct ModifyArgs {
    #[command(flatten)]
    pub entry: EntryArgs,
    /// New name
    #[arg(long)]
    pub new_name: Option<String>,
    /// New location (registry key or service name)
    #[arg(long)]
    pub new_location: Option<String>,
    /// New program path
    #[arg(long)]
    pub path: Option<String>,
    /// New arguments
    #[arg(long, allow_hyphen_values = true, conflicts_with = "clear_args")]
    pub args: Option<String>,
    /// Remove the arguments
    #[arg(long)]
    pub clear_args: bool,
}

fn main() {
    let cli = Cli::parse();

    if !autorun_windows::is_supported() {
        eprintln!("Error: autorun manages Windows autostart entries and only runs on Windows.");
        std::process::exit(1);
    }

    let config = autorun_core::config::load();
    autorun_core::log::init(&config.log);
    let manager = autorun_windows::default_manager(&config);

    match cli.command {
        Commands::List { kind, json } => commands::list::execute(&manager, kind, json),
        Commands::Toggle(args) => commands::toggle::execute(&manager, &args),
        Commands::Create(args) => commands::create::execute(&manager, &args),
        Commands::Modify(args) => commands::modify::execute(&manager, &args),
        Commands::Delete(args) => commands::delete::execute(&manager, &args),
    }
}
