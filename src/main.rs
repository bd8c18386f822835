use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use toolhub::cli::{Cli, Commands, EnvCommands, SecretCommands, ServerCommands};
use toolhub::commands;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = &cli.global;

    let result = match cli.command {
        Commands::Start { quiet, tail } => commands::start::run(global, quiet, tail).await,
        Commands::Stop => commands::stop::run(global).await,
        Commands::Status { json } => commands::status::run(global, json).await,
        Commands::Init { merge_defaults } => commands::init::run(global, merge_defaults),
        Commands::Doctor => commands::doctor::run(global),
        Commands::Validate => commands::validate::run(global),
        Commands::Server { command } => match command {
            ServerCommands::List { json } => commands::server::list(global, json),
            ServerCommands::Add { name, fields } => commands::server::add(global, &name, fields),
            ServerCommands::Update { name, fields } => {
                commands::server::update(global, &name, fields)
            }
            ServerCommands::Remove { name } => commands::server::remove(global, &name),
            ServerCommands::Toggle { name, state } => {
                commands::server::toggle(global, &name, state)
            }
        },
        Commands::Env { command } => match command {
            EnvCommands::List => commands::env::list(global),
            EnvCommands::Set { key, value } => commands::env::set(global, &key, &value),
            EnvCommands::Secret { key, secret } => {
                commands::env::set_secret(global, &key, &secret)
            }
            EnvCommands::Status { json } => commands::env::status(global, json),
            EnvCommands::Required { json } => commands::env::required(global, json),
        },
        Commands::Secret { command } => match command {
            SecretCommands::Set { name, value } => commands::secret::set(global, &name, value),
            SecretCommands::Delete { name } => commands::secret::delete(global, &name),
            SecretCommands::List => commands::secret::list(global),
        },
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "toolhub", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
