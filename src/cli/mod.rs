pub mod tracing_init;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Infrastructure provider synthesized from Swagger 2.0 documents",
    long_about = "Reads the Swagger 2.0 document configured for a provider and reports\n\
                  what the provider exposes to the host runtime.\n\n\
                  The document is located through OTF_VAR_<PROVIDER>_SWAGGER_URL or the\n\
                  plugin configuration file (~/.terraform.d/plugins/terraform-provider-openapi.yaml,\n\
                  overridable with OPENAPI_PROVIDER_PLUGIN_CONFIG).\n\n\
                  Examples:\n  \
                  openapi-provider schema cdn\n  \
                  openapi-provider resources cdn --skipped"
)]
pub struct Cli {
    /// Output all errors as structured JSON to stderr
    #[arg(long, global = true, help = "Output errors in JSON format")]
    pub json_errors: bool,

    /// Increase logging verbosity
    #[arg(
        short = 'v',
        global = true,
        action = ArgAction::Count,
        help = "Increase logging verbosity (-v for debug, -vv for trace)"
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the provider schema as JSON
    Schema {
        /// Provider name, lowercase letters and digits
        provider: String,
        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },
    /// List the resources and data sources the document exports
    Resources {
        /// Provider name, lowercase letters and digits
        provider: String,
        /// Also list the paths that were skipped and why
        #[arg(long)]
        skipped: bool,
    },
}
