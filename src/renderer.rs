//! Template rendering for Kiln.
//! Paths, defaults and marked file contents all go through the same MiniJinja
//! environment, configured so that an undefined variable is always an error.
use cruet::Inflector;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};

use crate::context::Context;
use crate::error::{Error, Result};

/// Global functions MiniJinja resolves without consulting the context.
const BUILTIN_GLOBALS: &[&str] = &["range", "dict", "namespace", "debug", "loop", "self"];

/// Trait for template rendering engines.
pub trait TemplateRenderer: Send + Sync {
    /// Renders a template string with the given context.
    ///
    /// `location` names what is being rendered (a path, a question default)
    /// and ends up in error messages.
    fn render(&self, template: &str, context: &Context, location: &str) -> Result<String>;

    /// Renders a `when`-style condition. The rendered text must be `true` or `false`.
    fn render_condition(&self, template: &str, context: &Context, location: &str) -> Result<bool> {
        let rendered = self.render(template, context, location)?;
        match rendered.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(Error::Template {
                location: location.to_string(),
                reason: format!("condition rendered to '{other}', expected true or false"),
            }),
        }
    }
}

/// MiniJinja-based template rendering engine.
#[derive(Clone)]
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

fn snake_case(value: String) -> String {
    value.to_snake_case()
}

fn kebab_case(value: String) -> String {
    value.to_kebab_case()
}

fn pascal_case(value: String) -> String {
    value.to_pascal_case()
}

fn camel_case(value: String) -> String {
    value.to_camel_case()
}

fn title_case(value: String) -> String {
    value.to_title_case()
}

impl MiniJinjaRenderer {
    /// Creates a renderer with strict undefined handling and the case filters registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_filter("snake_case", snake_case);
        env.add_filter("kebab_case", kebab_case);
        env.add_filter("slugify", kebab_case);
        env.add_filter("pascal_case", pascal_case);
        env.add_filter("camel_case", camel_case);
        env.add_filter("title_case", title_case);
        Self { env }
    }

    /// Finds the first top-level variable the template uses that the context lacks.
    fn undefined_key(&self, template: &str, context: &Context) -> Option<String> {
        let mut env = self.env.clone();
        env.add_template_owned("__probe__", template.to_string()).ok()?;
        let probe = env.get_template("__probe__").ok()?;
        let mut missing: Vec<String> = probe
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !context.contains_key(name) && !BUILTIN_GLOBALS.contains(&name.as_str()))
            .collect();
        missing.sort();
        missing.into_iter().next()
    }

    fn convert_error(
        &self,
        err: minijinja::Error,
        template: &str,
        context: &Context,
        location: &str,
    ) -> Error {
        if err.kind() == ErrorKind::UndefinedError {
            if let Some(key) = self.undefined_key(template, context) {
                return Error::MissingContextKey { key, location: location.to_string() };
            }
        }
        Error::Template { location: location.to_string(), reason: err.to_string() }
    }
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        MiniJinjaRenderer::new()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a template string using MiniJinja.
    ///
    /// # Errors
    /// * `Error::MissingContextKey` if the template references a key absent from `context`
    /// * `Error::Template` for syntax and other evaluation errors
    fn render(&self, template: &str, context: &Context, location: &str) -> Result<String> {
        self.env
            .render_str(template, context)
            .map_err(|err| self.convert_error(err, template, context, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let mut context = Context::new();
        context.insert("project_name", json!("My Demo")).unwrap();
        context.insert("ci", json!("GitHub")).unwrap();
        context
    }

    #[test]
    fn test_render_keeps_trailing_newline() {
        let renderer = MiniJinjaRenderer::new();
        let out = renderer.render("name = {{ ci }}\n", &context(), "inline").unwrap();
        assert_eq!(out, "name = GitHub\n");
    }

    #[test]
    fn test_case_filters() {
        let renderer = MiniJinjaRenderer::new();
        let ctx = context();
        assert_eq!(renderer.render("{{ project_name | snake_case }}", &ctx, "t").unwrap(), "my_demo");
        assert_eq!(renderer.render("{{ project_name | slugify }}", &ctx, "t").unwrap(), "my-demo");
        assert_eq!(renderer.render("{{ project_name | pascal_case }}", &ctx, "t").unwrap(), "MyDemo");
    }

    #[test]
    fn test_undefined_variable_is_reported_by_name() {
        let renderer = MiniJinjaRenderer::new();
        let err = renderer.render("{{ ci }}-{{ license }}", &context(), "README.md.j2").unwrap_err();
        match err {
            Error::MissingContextKey { key, location } => {
                assert_eq!(key, "license");
                assert_eq!(location, "README.md.j2");
            }
            other => panic!("Expected MissingContextKey, got {other:?}"),
        }
    }

    #[test]
    fn test_render_condition() {
        let renderer = MiniJinjaRenderer::new();
        let ctx = context();
        assert!(renderer.render_condition("{{ ci == 'GitHub' }}", &ctx, "when").unwrap());
        assert!(!renderer.render_condition("{{ ci == 'GitLab' }}", &ctx, "when").unwrap());
        assert!(renderer.render_condition("{{ ci }}", &ctx, "when").is_err());
    }
}
