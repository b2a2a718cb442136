//! Template definitions: a named source tree plus the questions, rules and
//! hooks that drive generation from it.
use std::fmt;
use std::path::{Path, PathBuf};

use globset::GlobSet;

use crate::error::{Error, Result};
use crate::hooks::{PostHook, PreHook};
use crate::ignore::parse_kilnignore_file;
use crate::question::{is_identifier, QuestionSpec};
use crate::resolver::check_unique_keys;
use crate::rules::Rule;

/// One scaffoldable template. Immutable once registered.
pub struct TemplateDefinition {
    pub name: String,
    pub group: Option<String>,
    pub description: String,
    pub source_root: PathBuf,
    pub questions: Vec<QuestionSpec>,
    pub rules: Vec<Rule>,
    pub pre_hooks: Vec<Box<dyn PreHook>>,
    pub post_hooks: Vec<Box<dyn PostHook>>,
    /// Shown after a successful generation. Rendered against the final context.
    pub welcome_message: Option<String>,
    /// Default and .kilnignore patterns, loaded at registration.
    ignore: Option<GlobSet>,
}

impl fmt::Debug for TemplateDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDefinition")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("source_root", &self.source_root)
            .field("questions", &self.questions.iter().map(|q| &q.key).collect::<Vec<_>>())
            .field("rules", &self.rules)
            .field("pre_hooks", &self.pre_hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("post_hooks", &self.post_hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateDefinition {
    pub fn new<N: Into<String>, P: Into<PathBuf>>(name: N, source_root: P) -> Self {
        Self {
            name: name.into(),
            group: None,
            description: String::new(),
            source_root: source_root.into(),
            questions: Vec::new(),
            rules: Vec::new(),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            welcome_message: None,
            ignore: None,
        }
    }

    pub fn with_group<G: Into<String>>(mut self, group: G) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_welcome_message<M: Into<String>>(mut self, message: M) -> Self {
        self.welcome_message = Some(message.into());
        self
    }

    pub fn with_question(mut self, question: QuestionSpec) -> Self {
        self.questions.push(question);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_pre_hook<H: PreHook + 'static>(mut self, hook: H) -> Self {
        self.pre_hooks.push(Box::new(hook));
        self
    }

    pub fn with_post_hook<H: PostHook + 'static>(mut self, hook: H) -> Self {
        self.post_hooks.push(Box::new(hook));
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// The rules the walker applies: ignore patterns first, then the declared rules.
    pub fn effective_rules(&self) -> Vec<Rule> {
        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        if let Some(ignore) = &self.ignore {
            rules.push(Rule::Ignore(ignore.clone()));
        }
        rules.extend(self.rules.iter().cloned());
        rules
    }

    /// Checks the registration invariants and loads the ignore patterns.
    ///
    /// # Errors
    /// * `Error::InvalidTemplate` if the source root is missing or empty, a
    ///   question key is not an identifier or repeats, or a hidden question
    ///   has no default
    pub(crate) fn prepare(&mut self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidTemplate { name: self.name.clone(), reason };

        if !self.source_root.is_dir() {
            return Err(invalid(format!(
                "source root '{}' does not exist or is not a directory",
                self.source_root.display()
            )));
        }
        let mut entries = std::fs::read_dir(&self.source_root)?;
        if entries.next().is_none() {
            return Err(invalid(format!("source root '{}' is empty", self.source_root.display())));
        }

        if let Some(question) = self.questions.iter().find(|q| !is_identifier(&q.key)) {
            return Err(invalid(format!("question key '{}' is not a valid identifier", question.key)));
        }
        check_unique_keys(&self.questions).map_err(invalid)?;

        if let Some(question) = self.questions.iter().find(|q| q.hidden && q.default.is_none()) {
            return Err(invalid(format!("hidden question '{}' has no default", question.key)));
        }

        self.ignore = Some(parse_kilnignore_file(&self.source_root)?);
        Ok(())
    }
}
