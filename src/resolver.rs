//! Turns a template's questions and an answer provider into a substitution context.
use std::collections::HashSet;

use log::{debug, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::prompt::{AnswerProvider, AnswerRequest};
use crate::question::QuestionSpec;
use crate::renderer::TemplateRenderer;

/// Fails if two questions declare the same key.
pub fn check_unique_keys(questions: &[QuestionSpec]) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for question in questions {
        if !seen.insert(question.key.as_str()) {
            return Err(format!("question key '{}' is declared more than once", question.key));
        }
    }
    Ok(())
}

/// Resolves `questions` in declared order.
///
/// Each question only sees the answers of the questions before it. Hidden
/// questions and questions whose `when` condition is false are never passed
/// to the provider; their default, or the type fallback, is stored instead.
///
/// # Errors
/// * `Error::InvalidAnswer` if an answer fails its choices or validator and
///   the provider is not interactive
/// * `Error::MissingContextKey` if a default or condition refers to a later or unknown key
pub fn resolve(
    questions: &[QuestionSpec],
    provider: &dyn AnswerProvider,
    renderer: &dyn TemplateRenderer,
) -> Result<Context> {
    let mut context = Context::new();

    for question in questions {
        let key = &question.key;
        let default = question.effective_default(&context, renderer)?;

        let ask = !question.hidden
            && match &question.when {
                Some(condition) => renderer.render_condition(
                    condition,
                    &context,
                    &format!("condition of question '{key}'"),
                )?,
                None => true,
            };

        let value = if ask {
            ask_until_valid(question, provider, renderer, &context, default.as_ref())?
        } else {
            // A synthesized fallback skips the validator.
            let value = match default {
                Some(default) => {
                    let value = question.coerce(default)?;
                    question.check(&value, &context)?;
                    value
                }
                None => question.fallback(),
            };
            debug!("Using default for '{key}': {value}");
            value
        };

        context.insert(key.clone(), value)?;
    }

    Ok(context)
}

fn ask_until_valid(
    question: &QuestionSpec,
    provider: &dyn AnswerProvider,
    renderer: &dyn TemplateRenderer,
    context: &Context,
    default: Option<&serde_json::Value>,
) -> Result<serde_json::Value> {
    let prompt = renderer
        .render(&question.prompt, context, &format!("prompt of question '{}'", question.key))?;

    let mut attempt = 0;
    loop {
        let request = AnswerRequest { question, prompt: &prompt, default, context, attempt };
        let checked = provider
            .answer(&request)
            .and_then(|raw| question.coerce(raw))
            .and_then(|value| question.check(&value, context).map(|_| value));

        match checked {
            Ok(value) => return Ok(value),
            Err(err @ Error::InvalidAnswer { .. }) if provider.is_interactive() => {
                warn!("{err}");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
