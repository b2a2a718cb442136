//! Command-line interface implementation for Kiln.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::hooks::FailurePolicy;

/// Command-line arguments structure for Kiln.
#[derive(Parser, Debug)]
#[command(author, version, about = "Kiln: registry-driven project scaffolding", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory holding one subdirectory per template
    #[arg(long, env = "KILN_TEMPLATES_DIR", default_value = "templates", global = true)]
    pub templates_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered templates, optionally only those of one group
    List {
        #[arg(value_name = "GROUP")]
        group: Option<String>,
    },
    /// Generate a project from a template
    Generate(GenerateArgs),
    /// Print the context a template resolves to when every question takes its default
    DumpDefaults {
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Write the answers to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Template name, or a group name that has a default template
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Directory where the generated project will be created
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Write into an existing, non-empty output directory
    #[arg(short, long)]
    pub force: bool,

    /// Never prompt; questions without an answer take their default
    #[arg(long)]
    pub no_input: bool,

    /// Answer a question, e.g. `-p project_name=demo`. May be repeated.
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// YAML or JSON file with answers
    #[arg(long, value_name = "FILE")]
    pub answers: Option<PathBuf>,

    /// Do not run hook scripts or external commands
    #[arg(long)]
    pub skip_hooks: bool,

    /// Override the failure policy of post-generation commands
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_command_failure: Option<FailurePolicy>,
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 and the help text if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
