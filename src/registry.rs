//! Template registry: the set of templates known to this process.
//!
//! Populated at start-up and read-only afterwards, so it can be shared freely.
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::config::{find_config_file, load_template_entry};
use crate::error::{Error, Result};
use crate::template::TemplateDefinition;

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, TemplateDefinition>,
    default_for_group: IndexMap<String, String>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template definition.
    ///
    /// # Errors
    /// * `Error::DuplicateTemplate` if the name is taken
    /// * `Error::InvalidTemplate` if the definition breaks a registration invariant
    pub fn register(&mut self, mut definition: TemplateDefinition) -> Result<()> {
        if self.templates.contains_key(&definition.name) {
            return Err(Error::DuplicateTemplate { name: definition.name });
        }
        definition.prepare()?;
        debug!(
            "Registered template: {} ({})",
            definition.name,
            definition.source_root.display()
        );
        self.templates.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Registers every immediate subdirectory of `templates_dir` that carries a
    /// configuration file, in lexicographic order. Returns how many were added.
    ///
    /// Templates marked `default: true` become their group's default. A
    /// missing directory or a template that fails to load or register is
    /// logged and skipped.
    pub fn discover<P: AsRef<Path>>(&mut self, templates_dir: P) -> Result<usize> {
        let templates_dir = templates_dir.as_ref();
        if !templates_dir.is_dir() {
            warn!("Templates directory '{}' does not exist", templates_dir.display());
            return Ok(0);
        }
        let mut dirs = std::fs::read_dir(templates_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        dirs.retain(|path| path.is_dir());
        dirs.sort();

        let mut count = 0;
        for dir in dirs {
            if find_config_file(&dir).is_none() {
                debug!("Skipping '{}': no template configuration", dir.display());
                continue;
            }
            match self.discover_one(&dir) {
                Ok(()) => count += 1,
                Err(err) => warn!("Skipping template in '{}': {err}", dir.display()),
            }
        }
        Ok(count)
    }

    fn discover_one(&mut self, dir: &Path) -> Result<()> {
        let (definition, is_default) = load_template_entry(dir)?;
        let default_of = definition.group.clone().filter(|_| is_default);
        let name = definition.name.clone();
        self.register(definition)?;
        if let Some(group) = default_of {
            self.set_default(&group, &name)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&TemplateDefinition> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::UnknownTemplate { name: name.to_string() })
    }

    /// All templates in registration order, optionally restricted to one group.
    pub fn list(&self, group: Option<&str>) -> Vec<&TemplateDefinition> {
        self.templates
            .values()
            .filter(|t| group.is_none() || t.group.as_deref() == group)
            .collect()
    }

    /// Sorted, de-duplicated group names.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self.templates.values().filter_map(|t| t.group.as_deref()).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    pub fn set_default(&mut self, group: &str, name: &str) -> Result<()> {
        let template = self.get(name)?;
        if template.group.as_deref() != Some(group) {
            return Err(Error::InvalidTemplate {
                name: name.to_string(),
                reason: format!(
                    "it belongs to group '{}', not '{group}'",
                    template.group.as_deref().unwrap_or("<none>")
                ),
            });
        }
        self.default_for_group.insert(group.to_string(), name.to_string());
        Ok(())
    }

    pub fn default_for(&self, group: &str) -> Option<&TemplateDefinition> {
        self.default_for_group.get(group).and_then(|name| self.templates.get(name))
    }

    /// Looks `name` up as a template, then as a group with a default template.
    pub fn select(&self, name: &str) -> Result<&TemplateDefinition> {
        self.get(name).or_else(|err| self.default_for(name).ok_or(err))
    }

    pub fn is_default(&self, template: &TemplateDefinition) -> bool {
        template
            .group
            .as_deref()
            .and_then(|group| self.default_for_group.get(group))
            .is_some_and(|name| *name == template.name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
