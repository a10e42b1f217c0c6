use clap::Parser;
use openapi_provider::cli::tracing_init::init_tracing;
use openapi_provider::cli::{Cli, Commands};
use openapi_provider::error::Error;
use openapi_provider::provider::ProviderFactory;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    init_tracing(cli.verbosity);

    if let Err(e) = run_command(cli).await {
        print_error_with_json(&e, json_errors);
        std::process::exit(1);
    }
}

async fn run_command(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Schema { provider, compact } => {
            let factory = ProviderFactory::from_plugin_config(&provider).await?;
            let schema = factory.provider_schema();
            let output = if compact {
                serde_json::to_string(&schema)?
            } else {
                serde_json::to_string_pretty(&schema)?
            };
            println!("{output}");
        }
        Commands::Resources { provider, skipped } => {
            let factory = ProviderFactory::from_plugin_config(&provider).await?;
            let schema = factory.provider_schema();
            for name in schema.resources.keys() {
                println!("resource     {name}");
            }
            for name in schema.data_sources.keys() {
                println!("data-source  {name}");
            }
            if skipped {
                for path in &factory.analysis().skipped {
                    println!("skipped      {}: {}", path.path, path.reason);
                }
            }
        }
    }
    Ok(())
}

/// Prints an error message, either as JSON or user-friendly format
fn print_error_with_json(error: &Error, json_format: bool) {
    if json_format {
        let json_error = error.to_json();
        if let Ok(json_output) = serde_json::to_string_pretty(&json_error) {
            eprintln!("{json_output}");
        } else {
            print_error(error);
        }
    } else {
        print_error(error);
    }
}

/// Prints the error with the hint for its class
fn print_error(error: &Error) {
    let title = match error {
        Error::Io(_) => "File System Error",
        Error::Yaml(_) | Error::Json(_) | Error::DocumentLoad { .. } => "Document Load Error",
        Error::DocumentValidation { .. } => "Document Validation Error",
        Error::ResourceCompilation { .. } | Error::InvalidProperty { .. } => {
            "Resource Compilation Error"
        }
        Error::RuntimeConfig { .. } | Error::NotConfigured | Error::UnknownResource { .. } => {
            "Configuration Error"
        }
        Error::Transport { .. } => "Connection Error",
        Error::ApiResponse { status, .. } => match status {
            401 => "Authentication Error (401)",
            403 => "Authorization Error (403)",
            404 => "Resource Not Found (404)",
            500..=599 => "Server Error",
            _ => "HTTP Error",
        },
        Error::Polling { .. } => "Polling Error",
        Error::Cancelled { .. } => "Cancelled",
        Error::UnsupportedOperation { .. } => "Unsupported Operation",
    };
    match error.to_json().context {
        Some(hint) => eprintln!("{title}\n{error}\n\nHint: {hint}"),
        None => eprintln!("{title}\n{error}"),
    }
}
