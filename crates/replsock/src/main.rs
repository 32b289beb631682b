use clap::Parser;

use replsock::commands::{Cli, Commands};
use replsock::handlers;
use replsock::telemetry::init_tracing;
use replsock_ipc::ClientError;
use replsock_server::ReplError;

const EX_USAGE: i32 = 64;
const EX_UNAVAILABLE: i32 = 69;
const EX_IOERR: i32 = 74;

fn main() {
    let cli = Cli::parse();
    let _telemetry = init_tracing(&cli.log_level);

    if let Err(e) = run(cli) {
        if let Some(client_error) = e.downcast_ref::<ClientError>() {
            eprintln!("Error: {}", client_error);
            if let Some(suggestion) = client_error.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            if client_error.is_retryable() {
                eprintln!("(This error may be transient - retry may succeed)");
            }
            std::process::exit(exit_code_for_client_error(client_error));
        } else if let Some(repl_error) = e.downcast_ref::<ReplError>() {
            eprintln!("Error: {}", repl_error);
            eprintln!("Suggestion: {}", repl_error.suggestion());
            if repl_error.is_retryable() {
                eprintln!("(This error may be transient - retry may succeed)");
            }
            std::process::exit(match repl_error {
                ReplError::Endpoint(_) => EX_USAGE,
                _ => EX_IOERR,
            });
        } else {
            eprintln!("Error: {}", e);
            std::process::exit(EX_IOERR);
        }
    }
}

fn exit_code_for_client_error(error: &ClientError) -> i32 {
    match error {
        ClientError::EndpointNotRunning { .. } | ClientError::EndpointStale { .. } => {
            EX_UNAVAILABLE
        }
        ClientError::Endpoint(_) => EX_USAGE,
        _ => EX_IOERR,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config();

    match &cli.command {
        Commands::Attach { name } => handlers::handle_attach(&config, name),
        Commands::List => handlers::handle_list(&config, cli.format),
        Commands::Clean => handlers::handle_clean(&config, cli.format),
        Commands::Demo { name } => handlers::handle_demo(config, name),
    }
}
