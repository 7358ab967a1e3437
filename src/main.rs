use clap::Parser;
use vaultsync::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    vaultsync::cli::init_logging();

    let result = match cli.command {
        Commands::Init { bits } => vaultsync::cli::commands::init::execute(&cli, bits),
        Commands::Add { ref kind } => vaultsync::cli::commands::add::execute(&cli, kind),
        Commands::Get {
            secret_type,
            ref name,
            reveal,
            ref output,
        } => vaultsync::cli::commands::get::execute(
            &cli,
            secret_type,
            name,
            reveal,
            output.as_deref(),
        ),
        Commands::List { secret_type } => vaultsync::cli::commands::list::execute(&cli, secret_type),
        Commands::Delete {
            secret_type,
            ref name,
            force,
            remote,
            transport,
        } => vaultsync::cli::commands::delete::execute(
            &cli,
            secret_type,
            name,
            force,
            remote,
            transport,
        ),
        Commands::Sync {
            policy,
            transport,
            ref types,
        } => vaultsync::cli::commands::sync::execute(&cli, policy, transport, types),
        Commands::Download {
            ref types,
            overwrite,
            transport,
        } => vaultsync::cli::commands::download::execute(&cli, types, overwrite, transport),
        Commands::Completions { ref shell } => {
            vaultsync::cli::commands::completions::execute(shell)
        }
    };

    if let Err(e) = result {
        vaultsync::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
