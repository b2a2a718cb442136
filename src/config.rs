//! Configuration handling for Kiln templates.
//! Each template directory carries a `kiln.yaml` (or `.yml` / `.json`) that
//! declares its questions, conditional rules and hooks.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::constants::{CONFIG_FILES, HOOKS_DIR};
use crate::error::{Error, Result};
use crate::hooks::{
    CommandHook, FailurePolicy, IdentifierCheck, MakeExecutable, PostHook, PreHook, RejectWhen,
    RemoveEmptyDirs, RemovePaths, ScriptHook,
};
use crate::question::{Choice, DefaultValue, QuestionSpec, Validator, ValueType};
use crate::rules::{Condition, Rule};
use crate::template::TemplateDefinition;

/// Conventional hook script locations, used when the configuration names none.
pub const PRE_HOOK_SCRIPT: &str = "pre_gen_project";
pub const POST_HOOK_SCRIPT: &str = "post_gen_project";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    pub name: Option<String>,
    pub group: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Marks the template as the default of its group.
    #[serde(default)]
    pub default: bool,
    /// Printed after generation, rendered against the answers.
    pub welcome_message: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinValidator {
    Identifier,
    NonEmpty,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionConfig {
    pub key: String,
    #[serde(default, alias = "help")]
    pub prompt: Option<String>,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    pub default: Option<Value>,
    /// Plain values or `{ label, value }` entries.
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub multiselect: bool,
    pub validator: Option<BuiltinValidator>,
    /// Regex the answer must match.
    pub pattern: Option<String>,
    pub when: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    ExcludeIf { path: String, when: Vec<Condition> },
    IncludeIf { path: String, when: Vec<Condition> },
}

#[derive(Debug, Default, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub pre: Vec<PreHookConfig>,
    #[serde(default)]
    pub post: Vec<PostHookConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreHookConfig {
    Script { path: String },
    IdentifierCheck { keys: Vec<String> },
    RejectWhen { when: Vec<Condition>, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostHookConfig {
    Script {
        path: String,
        #[serde(default)]
        on_failure: FailurePolicy,
    },
    RemovePaths {
        #[serde(default)]
        when: Vec<Condition>,
        paths: Vec<String>,
    },
    MakeExecutable { patterns: Vec<String> },
    RemoveEmptyDirs,
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        on_failure: FailurePolicy,
    },
}

/// Returns the first configuration file present in `template_dir`.
pub fn find_config_file<P: AsRef<Path>>(template_dir: P) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|file| template_dir.as_ref().join(file))
        .find(|path| path.is_file())
}

/// Parses configuration content. `.json` files are read as JSON, everything else as YAML.
pub fn parse_config(content: &str, path: &Path) -> Result<TemplateConfig> {
    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| Error::ConfigError { path: path.to_path_buf(), reason })
}

impl QuestionConfig {
    fn into_spec(self, config_path: &Path) -> Result<QuestionSpec> {
        let validator = match (self.validator, self.pattern) {
            (Some(_), Some(_)) => {
                return Err(Error::ConfigError {
                    path: config_path.to_path_buf(),
                    reason: format!("question '{}' sets both validator and pattern", self.key),
                })
            }
            (Some(BuiltinValidator::Identifier), None) => Some(Validator::Identifier),
            (Some(BuiltinValidator::NonEmpty), None) => Some(Validator::NonEmpty),
            (None, Some(pattern)) => Some(Validator::pattern(&pattern)?),
            (None, None) => None,
        };

        Ok(QuestionSpec {
            prompt: self.prompt.unwrap_or_else(|| self.key.clone()),
            key: self.key,
            value_type: self.value_type,
            default: self.default.map(DefaultValue::Value),
            choices: self.choices,
            multiselect: self.multiselect,
            validator,
            when: self.when,
            hidden: self.hidden,
        })
    }
}

impl RuleConfig {
    fn into_rule(self) -> Result<Rule> {
        match self {
            RuleConfig::ExcludeIf { path, when } => Rule::exclude_if(&path, when),
            RuleConfig::IncludeIf { path, when } => Rule::include_if(&path, when),
        }
    }
}

impl PreHookConfig {
    fn into_hook(self, template_dir: &Path) -> Box<dyn PreHook> {
        let hook: Box<dyn PreHook> = match self {
            PreHookConfig::Script { path } => {
                Box::new(ScriptHook::new(template_dir.join(path), template_dir))
            }
            PreHookConfig::IdentifierCheck { keys } => Box::new(IdentifierCheck { keys }),
            PreHookConfig::RejectWhen { when, message } => Box::new(RejectWhen { when, message }),
        };
        hook
    }
}

impl PostHookConfig {
    fn into_hook(self, template_dir: &Path) -> Result<Box<dyn PostHook>> {
        let hook: Box<dyn PostHook> = match self {
            PostHookConfig::Script { path, on_failure } => {
                let mut hook = ScriptHook::new(template_dir.join(path), template_dir);
                hook.on_failure = on_failure;
                Box::new(hook)
            }
            PostHookConfig::RemovePaths { when, paths } => Box::new(RemovePaths { when, paths }),
            PostHookConfig::MakeExecutable { patterns } => Box::new(MakeExecutable::new(&patterns)?),
            PostHookConfig::RemoveEmptyDirs => Box::new(RemoveEmptyDirs),
            PostHookConfig::Command { program, args, on_failure } => {
                Box::new(CommandHook::new(program, args).on_failure(on_failure))
            }
        };
        Ok(hook)
    }
}

/// Loads the template in `template_dir` from its configuration file.
///
/// Scripts at `hooks/pre_gen_project` and `hooks/post_gen_project` are picked
/// up automatically when the configuration declares no script hook of that kind.
///
/// # Errors
/// * `Error::ConfigError` if no configuration file exists or it does not parse
pub fn load_template<P: AsRef<Path>>(template_dir: P) -> Result<TemplateDefinition> {
    load_template_entry(template_dir).map(|(definition, _)| definition)
}

/// Like [`load_template`], also returning whether the configuration marks the
/// template as its group's default.
pub fn load_template_entry<P: AsRef<Path>>(template_dir: P) -> Result<(TemplateDefinition, bool)> {
    let template_dir = template_dir.as_ref();
    let config_path = find_config_file(template_dir).ok_or_else(|| Error::ConfigError {
        path: template_dir.to_path_buf(),
        reason: format!("no configuration file found (tried: {})", CONFIG_FILES.join(", ")),
    })?;
    debug!("Loading configuration from {}", config_path.display());

    let content = std::fs::read_to_string(&config_path)?;
    let config = parse_config(&content, &config_path)?;

    let name = match config.name {
        Some(name) => name,
        None => template_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::ConfigError {
                path: config_path.clone(),
                reason: "template has no name".to_string(),
            })?,
    };

    if config.default && config.group.is_none() {
        return Err(Error::ConfigError {
            path: config_path,
            reason: format!("template '{name}' is marked default but has no group"),
        });
    }

    let mut definition = TemplateDefinition::new(name, template_dir).with_description(config.description);
    if let Some(group) = config.group {
        definition = definition.with_group(group);
    }
    definition.welcome_message = config.welcome_message;
    for question in config.questions {
        definition.questions.push(question.into_spec(&config_path)?);
    }
    for rule in config.rules {
        definition.rules.push(rule.into_rule()?);
    }

    let has_pre_script = config.hooks.pre.iter().any(|h| matches!(h, PreHookConfig::Script { .. }));
    let has_post_script = config.hooks.post.iter().any(|h| matches!(h, PostHookConfig::Script { .. }));

    let hooks_dir = template_dir.join(HOOKS_DIR);
    if !has_pre_script && hooks_dir.join(PRE_HOOK_SCRIPT).is_file() {
        definition
            .pre_hooks
            .push(Box::new(ScriptHook::new(hooks_dir.join(PRE_HOOK_SCRIPT), template_dir)));
    }
    for hook in config.hooks.pre {
        definition.pre_hooks.push(hook.into_hook(template_dir));
    }
    for hook in config.hooks.post {
        definition.post_hooks.push(hook.into_hook(template_dir)?);
    }
    if !has_post_script && hooks_dir.join(POST_HOOK_SCRIPT).is_file() {
        definition
            .post_hooks
            .push(Box::new(ScriptHook::new(hooks_dir.join(POST_HOOK_SCRIPT), template_dir)));
    }

    Ok((definition, config.default))
}
