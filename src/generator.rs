//! Generation orchestrator.
//!
//! Drives one run through `Idle → ContextResolved → PreValidated → Rendered →
//! PostProcessed → Done`. Any failure ends the run in `Failed { stage }`;
//! a failed run is never resumed, the caller starts a new one.
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::hooks::{FailurePolicy, HookFilter, PostHook};
use crate::processor::{ensure_output_dir, plan, render, SkipReason, Skipped};
use crate::prompt::AnswerProvider;
use crate::renderer::TemplateRenderer;
use crate::resolver::resolve;
use crate::template::TemplateDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    PreHook,
    Render,
    PostHook,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "context resolution",
            Stage::PreHook => "pre-generation hooks",
            Stage::Render => "rendering",
            Stage::PostHook => "post-generation hooks",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    ContextResolved,
    PreValidated,
    Rendered,
    PostProcessed,
    Done,
    Failed { stage: Stage },
}

/// Options for a generation run, passed explicitly to the generator.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    /// Write into a non-empty destination.
    pub force: bool,
    /// Run hooks that start external processes (scripts and commands).
    pub run_external_hooks: bool,
    /// Overrides the failure policy of every external-command post hook.
    pub command_failure: Option<FailurePolicy>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { force: false, run_external_hooks: true, command_failure: None }
    }
}

/// Outcome of one generation run.
#[derive(Debug)]
pub struct GenerationResult {
    pub template: String,
    pub destination: PathBuf,
    /// The context after pre hooks, when resolution succeeded.
    pub context: Option<Context>,
    /// Files written and still present, relative to `destination`.
    pub written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
    /// Failures tolerated under `FailurePolicy::Warn`.
    pub warnings: Vec<String>,
    /// The template's welcome message, rendered once the context is final.
    pub welcome_message: Option<String>,
    pub state: State,
    pub error: Option<Error>,
}

impl GenerationResult {
    fn new(template: &str, destination: &Path) -> Self {
        Self {
            template: template.to_string(),
            destination: destination.to_path_buf(),
            context: None,
            written: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
            welcome_message: None,
            state: State::Idle,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == State::Done
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self.state {
            State::Failed { stage } => Some(stage),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Converts a failed result into its error.
    pub fn into_result(mut self) -> Result<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn advance(&mut self, next: State) {
        debug!("Generation of '{}': {:?} -> {:?}", self.template, self.state, next);
        self.state = next;
    }

    fn fail(mut self, stage: Stage, err: Error) -> Self {
        warn!("Generation of '{}' failed during {stage}: {err}", self.template);
        self.advance(State::Failed { stage });
        self.error = Some(err);
        self
    }
}

pub struct Generator<'a> {
    renderer: &'a dyn TemplateRenderer,
    options: GenerateOptions,
    post_hooks: Vec<(HookFilter, Box<dyn PostHook>)>,
}

impl<'a> Generator<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, options: GenerateOptions) -> Self {
        Self { renderer, options, post_hooks: Vec::new() }
    }

    /// Adds a post hook that runs after the template's own post hooks, for
    /// every template the filter accepts.
    pub fn with_post_hook<H: PostHook + 'static>(mut self, filter: HookFilter, hook: H) -> Self {
        self.post_hooks.push((filter, Box::new(hook)));
        self
    }

    /// Generates `template` into `destination`.
    ///
    /// Nothing is written before the render stage. Render and post-hook
    /// failures leave the partial tree on disk.
    pub fn generate<P: AsRef<Path>>(
        &self,
        template: &TemplateDefinition,
        answers: &dyn AnswerProvider,
        destination: P,
    ) -> GenerationResult {
        let destination = destination.as_ref();
        let mut result = GenerationResult::new(&template.name, destination);
        info!("Generating '{}' into {}", template.name, destination.display());

        let context = match resolve(&template.questions, answers, self.renderer) {
            Ok(context) => context,
            Err(err) => return result.fail(Stage::Resolve, err),
        };
        result.advance(State::ContextResolved);

        let context = match self.run_pre_hooks(template, context) {
            Ok(context) => context,
            Err(err) => return result.fail(Stage::PreHook, err),
        };
        result.context = Some(context.clone());
        result.advance(State::PreValidated);

        if let Some(message) = &template.welcome_message {
            let location = format!("welcome message of '{}'", template.name);
            match self.renderer.render(message, &context, &location) {
                Ok(rendered) => result.welcome_message = Some(rendered),
                Err(err) => return result.fail(Stage::Render, err),
            }
        }
        match self.render_tree(template, &context, destination) {
            Ok((written, skipped)) => {
                result.written = written;
                result.skipped = skipped;
            }
            Err(err) => return result.fail(Stage::Render, err),
        }
        result.advance(State::Rendered);

        let outcome = self.run_post_hooks(template, &context, destination, &mut result.warnings);
        self.collect_removed(destination, &mut result);
        if let Err(err) = outcome {
            return result.fail(Stage::PostHook, err);
        }
        result.advance(State::PostProcessed);

        result.advance(State::Done);
        info!(
            "Generated '{}': {} file(s) written, {} skipped",
            template.name,
            result.written.len(),
            result.skipped.len()
        );
        result
    }

    fn run_pre_hooks(&self, template: &TemplateDefinition, mut context: Context) -> Result<Context> {
        for hook in &template.pre_hooks {
            if hook.runs_external_command() && !self.options.run_external_hooks {
                debug!("Skipping pre hook '{}'", hook.name());
                continue;
            }
            debug!("Running pre hook '{}'", hook.name());
            context = hook.run(context).map_err(|err| match err {
                err @ Error::PreHookValidation { .. } => err,
                other => Error::PreHookValidation { hook: hook.name().to_string(), reason: other.to_string() },
            })?;
        }
        Ok(context)
    }

    fn render_tree(
        &self,
        template: &TemplateDefinition,
        context: &Context,
        destination: &Path,
    ) -> Result<(Vec<PathBuf>, Vec<Skipped>)> {
        let destination = ensure_output_dir(destination, self.options.force)?;
        let rules = template.effective_rules();
        let render_plan = plan(template.source_root(), context, &rules, self.renderer)?;
        let written = render(&render_plan, &destination, context, self.renderer)?;
        Ok((written, render_plan.skipped))
    }

    fn run_post_hooks(
        &self,
        template: &TemplateDefinition,
        context: &Context,
        destination: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let global = self
            .post_hooks
            .iter()
            .filter(|(filter, _)| filter.should_run(&template.name, template.group.as_deref()))
            .map(|(_, hook)| hook);

        for hook in template.post_hooks.iter().chain(global) {
            let external = hook.runs_external_command();
            if external && !self.options.run_external_hooks {
                debug!("Skipping post hook '{}'", hook.name());
                continue;
            }
            debug!("Running post hook '{}'", hook.name());
            let Err(err) = hook.run(destination, context) else {
                continue;
            };

            let policy = match self.options.command_failure {
                Some(policy) if external => policy,
                _ => hook.failure_policy(),
            };
            let err = match err {
                err @ Error::PostHook { .. } => err,
                other => Error::PostHook { hook: hook.name().to_string(), reason: other.to_string() },
            };
            match policy {
                FailurePolicy::Warn => {
                    warn!("{err}");
                    warnings.push(err.to_string());
                }
                FailurePolicy::Abort => return Err(err),
            }
        }
        Ok(())
    }

    /// Moves files deleted by post hooks from `written` to `skipped`.
    fn collect_removed(&self, destination: &Path, result: &mut GenerationResult) {
        let (kept, removed): (Vec<_>, Vec<_>) =
            result.written.drain(..).partition(|path| destination.join(path).exists());
        result.written = kept;
        result.skipped.extend(
            removed
                .into_iter()
                .map(|path| Skipped { path, reason: SkipReason::RemovedByPostHook }),
        );
    }
}
