//! Template tree processing: planning which entries end up where, then
//! materializing that plan in the destination directory.
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::constants::TEMPLATE_SUFFIX;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;
use crate::rules::{evaluate, Decision, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { render_contents: bool },
}

/// One entry of a render plan. `destination` is relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
}

impl PlanEntry {
    pub fn should_render_contents(&self) -> bool {
        matches!(self.kind, EntryKind::File { render_contents: true })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A rule excluded the entry. Holds the rule's description.
    Excluded { rule: String },
    /// A path component rendered to an empty string.
    EmptyName,
    /// Written, then deleted by a post hook.
    RemovedByPostHook,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Everything the renderer will do for one (template, context) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPlan {
    pub entries: Vec<PlanEntry>,
    pub skipped: Vec<Skipped>,
}

impl RenderPlan {
    pub fn files(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| matches!(e.kind, EntryKind::File { .. }))
    }
}

/// True for names like `README.md.j2` or `Makefile.j2`.
pub fn is_jinja_template(filename: &str) -> bool {
    filename.strip_suffix(TEMPLATE_SUFFIX).is_some_and(|stem| !stem.is_empty())
}

/// Strips the template suffix when present. Returns the target name and
/// whether the file's contents are rendered.
pub fn resolve_target_name(filename: &str) -> (String, bool) {
    match filename.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stem) if !stem.is_empty() => (stem.to_string(), true),
        _ => (filename.to_string(), false),
    }
}

/// A rendered relative path is valid when it is non-empty, relative, and has
/// no empty, `.` or `..` components.
pub fn is_rendered_path_valid(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.starts_with('\\') {
        return false;
    }
    path.split(['/', '\\']).all(|part| !part.is_empty() && part != "." && part != "..")
}

fn needs_rendering(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Renders each component of a template-relative path. Returns `None` when a
/// component renders to nothing.
fn render_relative_path(
    relative: &str,
    context: &Context,
    renderer: &dyn TemplateRenderer,
) -> Result<Option<String>> {
    let mut parts = Vec::new();
    for part in relative.split('/') {
        let rendered = if needs_rendering(part) {
            renderer.render(part, context, &format!("path '{relative}'"))?
        } else {
            part.to_string()
        };
        if rendered.trim().is_empty() {
            return Ok(None);
        }
        parts.push(rendered);
    }
    Ok(Some(parts.join("/")))
}

/// Walks `source_root` in lexicographic order and computes the render plan.
///
/// Rules see the source path (relative, `/`-separated) before any rendering.
/// Directories are planned even when pruning leaves them empty.
///
/// # Errors
/// * `Error::DestinationConflict` if two entries render to the same destination
/// * `Error::InvalidPath` if a rendered path is absolute or escapes the output
/// * `Error::MissingContextKey` if a path references an undefined variable
pub fn plan<P: AsRef<Path>>(
    source_root: P,
    context: &Context,
    rules: &[Rule],
    renderer: &dyn TemplateRenderer,
) -> Result<RenderPlan> {
    let source_root = source_root.as_ref();
    let mut result = RenderPlan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    let mut walker = WalkDir::new(source_root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        let relative_path = entry.path().strip_prefix(source_root).unwrap_or(entry.path());
        let relative = to_slash_path(relative_path);

        debug!("Processing source entry: {relative}");

        let (decision, reason) = evaluate(rules, &relative, is_dir, context)?;
        match decision {
            Decision::Include => {}
            Decision::SkipEntry => {
                debug!("Skipping '{relative}' only");
                result.skipped.push(Skipped {
                    path: relative_path.to_path_buf(),
                    reason: SkipReason::Excluded { rule: reason.unwrap_or_default() },
                });
                continue;
            }
            Decision::SkipSubtree => {
                debug!("Skipping '{relative}' and everything below it");
                if is_dir {
                    walker.skip_current_dir();
                }
                result.skipped.push(Skipped {
                    path: relative_path.to_path_buf(),
                    reason: SkipReason::Excluded { rule: reason.unwrap_or_default() },
                });
                continue;
            }
        }

        let Some(rendered) = render_relative_path(&relative, context, renderer)? else {
            debug!("Skipping '{relative}' as its rendered name is empty");
            if is_dir {
                walker.skip_current_dir();
            }
            result.skipped.push(Skipped {
                path: relative_path.to_path_buf(),
                reason: SkipReason::EmptyName,
            });
            continue;
        };

        if !is_rendered_path_valid(&rendered) {
            return Err(Error::InvalidPath { source_path: relative, rendered });
        }

        let (destination, kind) = if is_dir {
            (PathBuf::from(&rendered), EntryKind::Directory)
        } else {
            let destination = PathBuf::from(&rendered);
            let filename = destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (target_name, render_contents) = resolve_target_name(&filename);
            (destination.with_file_name(target_name), EntryKind::File { render_contents })
        };

        if let Some(first) = claimed.insert(destination.clone(), relative_path.to_path_buf()) {
            return Err(Error::DestinationConflict {
                destination,
                first,
                second: relative_path.to_path_buf(),
            });
        }

        debug!("Planned '{relative}' -> '{}'", destination.display());
        result.entries.push(PlanEntry { source: entry.path().to_path_buf(), destination, kind });
    }

    Ok(result)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::RenderIo { path: path.to_path_buf(), source }
}

fn create_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(())
}

fn write_rendered(
    entry: &PlanEntry,
    target: &Path,
    context: &Context,
    renderer: &dyn TemplateRenderer,
) -> Result<()> {
    let source = &entry.source;
    let bytes = fs::read(source).map_err(io_error(source))?;
    let content = String::from_utf8(bytes).map_err(|_| Error::Template {
        location: format!("file '{}'", source.display()),
        reason: "template file is not valid UTF-8".to_string(),
    })?;
    let location = format!("file '{}'", entry.destination.display());
    let rendered = renderer.render(&content, context, &location)?;

    create_parent(target)?;
    fs::write(target, rendered).map_err(io_error(target))?;

    let permissions = fs::metadata(source).map_err(io_error(source))?.permissions();
    fs::set_permissions(target, permissions).map_err(io_error(target))?;
    Ok(())
}

/// Materializes `plan` under `destination_root`.
///
/// Returns the written files relative to `destination_root`, in plan order.
/// Not transactional: a failure leaves the entries written so far on disk.
///
/// # Errors
/// * `Error::RenderIo` naming the path that could not be read or written
pub fn render<P: AsRef<Path>>(
    plan: &RenderPlan,
    destination_root: P,
    context: &Context,
    renderer: &dyn TemplateRenderer,
) -> Result<Vec<PathBuf>> {
    let destination_root = destination_root.as_ref();
    fs::create_dir_all(destination_root).map_err(io_error(destination_root))?;

    let mut written = Vec::new();
    for entry in &plan.entries {
        let target = destination_root.join(&entry.destination);
        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target).map_err(io_error(&target))?;
            }
            EntryKind::File { render_contents: true } => {
                debug!("Writing file: {}", target.display());
                write_rendered(entry, &target, context, renderer)?;
                written.push(entry.destination.clone());
            }
            EntryKind::File { render_contents: false } => {
                debug!("Copying file: {}", target.display());
                create_parent(&target)?;
                fs::copy(&entry.source, &target).map_err(io_error(&target))?;
                written.push(entry.destination.clone());
            }
        }
    }
    Ok(written)
}

/// Ensures the output directory is safe to write to.
///
/// A missing or empty directory is always fine; a non-empty one needs `force`.
pub fn ensure_output_dir<P: AsRef<Path>>(output_dir: P, force: bool) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    if output_dir.exists() && !force {
        let mut entries = fs::read_dir(output_dir)?;
        if entries.next().is_some() {
            return Err(Error::DestinationExists { path: output_dir.to_path_buf() });
        }
    }
    Ok(output_dir.to_path_buf())
}
