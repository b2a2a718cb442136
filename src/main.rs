//! Kiln's main application entry point.
//! Discovers the templates directory, then lists templates, generates a
//! project or dumps a template's default answers.

use std::path::Path;

use indexmap::IndexMap;
use kiln::{
    cli::{get_args, Args, Commands, GenerateArgs},
    error::{default_error_handler, Result},
    generator::{GenerateOptions, Generator},
    logger::init_logger,
    processor::SkipReason,
    prompt::{load_answers_file, parse_key_value_params, AnswerProvider, DialoguerPrompter, PreparedAnswers},
    registry::TemplateRegistry,
    renderer::MiniJinjaRenderer,
    resolver::resolve,
};
use log::error;

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => default_error_handler(err),
    }
}

/// Runs the selected subcommand and returns the process exit code.
fn run(args: Args) -> Result<i32> {
    let mut registry = TemplateRegistry::new();
    let count = registry.discover(&args.templates_dir)?;
    log::debug!("Discovered {count} template(s) in {}", args.templates_dir.display());

    match args.command {
        Commands::List { group } => {
            list(&registry, group.as_deref());
            Ok(0)
        }
        Commands::Generate(generate_args) => generate(&registry, generate_args),
        Commands::DumpDefaults { template, output } => {
            dump_defaults(&registry, &template, output.as_deref())?;
            Ok(0)
        }
    }
}

fn list(registry: &TemplateRegistry, group: Option<&str>) {
    let templates = registry.list(group);
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }
    for template in templates {
        let group = match template.group.as_deref() {
            Some(group) if registry.is_default(template) => format!("[{group}, default]"),
            Some(group) => format!("[{group}]"),
            None => String::new(),
        };
        println!("{:<24} {:<24} {}", template.name, group, template.description);
    }
}

fn generate(registry: &TemplateRegistry, args: GenerateArgs) -> Result<i32> {
    let template = registry.select(&args.template)?;

    let mut preloaded = match &args.answers {
        Some(path) => load_answers_file(path)?,
        None => IndexMap::new(),
    };
    preloaded.extend(parse_key_value_params(&args.params)?);
    let preloaded = PreparedAnswers::new(preloaded);

    let provider: Box<dyn AnswerProvider> = if args.no_input {
        Box::new(preloaded)
    } else {
        Box::new(DialoguerPrompter::with_preloaded(preloaded))
    };

    let renderer = MiniJinjaRenderer::new();
    let options = GenerateOptions {
        force: args.force,
        run_external_hooks: !args.skip_hooks,
        command_failure: args.on_command_failure,
    };
    let result = Generator::new(&renderer, options).generate(template, &*provider, &args.output_dir);

    for path in &result.written {
        println!("Generated: '{}'", result.destination.join(path).display());
    }
    for skipped in &result.skipped {
        match &skipped.reason {
            SkipReason::RemovedByPostHook => println!("Removed: '{}'", skipped.path.display()),
            reason => log::info!("Skipped '{}': {reason:?}", skipped.path.display()),
        }
    }
    for warning in &result.warnings {
        eprintln!("Warning: {warning}");
    }

    match (result.failed_stage(), &result.error) {
        (Some(stage), Some(err)) => {
            error!("Generation of '{}' failed during {stage}", result.template);
            eprintln!("Generation failed during {stage}: {err}");
        }
        _ => {
            if let Some(message) = &result.welcome_message {
                println!("\n{message}\n");
            }
            println!(
                "Template '{}' generated successfully in {}.",
                result.template,
                result.destination.display()
            );
        }
    }
    Ok(result.exit_code())
}

fn dump_defaults(registry: &TemplateRegistry, name: &str, output: Option<&Path>) -> Result<()> {
    let template = registry.select(name)?;
    let renderer = MiniJinjaRenderer::new();
    let context = resolve(&template.questions, &PreparedAnswers::default(), &renderer)?;

    let answers: IndexMap<&str, &serde_json::Value> = template
        .questions
        .iter()
        .filter(|q| !q.hidden)
        .filter_map(|q| context.lookup(&q.key).map(|value| (q.key.as_str(), value)))
        .collect();
    let yaml = serde_yaml::to_string(&answers)?;

    match output {
        Some(path) => std::fs::write(path, yaml)?,
        None => print!("{yaml}"),
    }
    Ok(())
}
