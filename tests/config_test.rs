use std::fs;
use std::path::Path;

use kiln::config::{find_config_file, load_template, parse_config};
use kiln::error::Error;
use kiln::generator::{GenerateOptions, Generator};
use kiln::hooks::PostHook;
use kiln::prompt::PreparedAnswers;
use kiln::question::ValueType;
use kiln::registry::TemplateRegistry;
use kiln::renderer::MiniJinjaRenderer;
use serde_json::json;
use tempfile::TempDir;

const CONFIG: &str = r#"
name: python_package
group: package
description: Python package with optional docs
questions:
  - key: project_name
    help: Name of the project
    validator: non_empty
  - key: package_name
    default: "{{ project_name | snake_case }}"
    hidden: true
  - key: ci
    choices: [GitHub, GitLab, None]
    default: GitHub
  - key: docs
    type: bool
    default: false
  - key: version
    pattern: '^\d+\.\d+\.\d+$'
    default: 0.1.0
rules:
  - type: exclude_if
    path: docs
    when:
      - key: docs
        value: false
  - type: include_if
    path: .github
    when:
      - key: ci
        value: GitHub
hooks:
  pre:
    - type: identifier_check
      keys: [package_name]
  post:
    - type: remove_paths
      when:
        - key: ci
          op: equals
          value: None
      paths: [ci]
    - type: make_executable
      patterns: ["scripts/*.sh"]
    - type: remove_empty_dirs
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn template(root: &Path) {
    write(root, "kiln.yaml", CONFIG);
    write(root, ".kilnignore", "*.pyc\n");
    write(root, "README.md.j2", "# {{ project_name }} {{ version }}\n");
    write(root, "{{ package_name }}/__init__.py", "");
    write(root, "{{ package_name }}/cache.pyc", "");
    write(root, "docs/index.md", "# Docs\n");
    write(root, ".github/workflows/ci.yml", "on: push\n");
    write(root, "ci/lint.sh", "ruff .\n");
    write(root, "scripts/setup.sh", "#!/bin/sh\n");
    fs::create_dir_all(root.join("scripts/.keep")).unwrap();
}

#[test]
fn test_find_config_file() {
    let temp_dir = TempDir::new().unwrap();
    assert!(find_config_file(temp_dir.path()).is_none());

    write(temp_dir.path(), "kiln.json", "{}");
    write(temp_dir.path(), "kiln.yml", "{}");
    assert_eq!(find_config_file(temp_dir.path()).unwrap(), temp_dir.path().join("kiln.yml"));
}

#[test]
fn test_parse_config_rejects_unknown_fields() {
    let err = parse_config("name: x\nquestion: []\n", Path::new("kiln.yaml")).unwrap_err();
    assert!(matches!(err, Error::ConfigError { .. }));

    let config = parse_config(r#"{"questions": [{"key": "a", "type": "number"}]}"#, Path::new("kiln.json")).unwrap();
    assert_eq!(config.questions[0].value_type, ValueType::Number);
}

#[test]
fn test_load_template() {
    let temp_dir = TempDir::new().unwrap();
    template(temp_dir.path());

    let definition = load_template(temp_dir.path()).unwrap();
    assert_eq!(definition.name, "python_package");
    assert_eq!(definition.group.as_deref(), Some("package"));
    assert_eq!(definition.questions.len(), 5);
    assert_eq!(definition.questions[0].prompt, "Name of the project");
    assert!(definition.questions[1].hidden);
    assert_eq!(definition.rules.len(), 2);
    assert_eq!(definition.pre_hooks.len(), 1);
    assert_eq!(definition.post_hooks.len(), 3);
}

#[test]
fn test_validator_and_pattern_are_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    write(
        temp_dir.path(),
        "kiln.yaml",
        "questions:\n  - key: name\n    validator: identifier\n    pattern: '^[a-z]+$'\n",
    );
    assert!(matches!(load_template(temp_dir.path()), Err(Error::ConfigError { .. })));
}

#[test]
fn test_hook_scripts_are_picked_up() {
    let temp_dir = TempDir::new().unwrap();
    write(temp_dir.path(), "kiln.yaml", "questions: []\n");
    write(temp_dir.path(), "hooks/post_gen_project", "#!/bin/sh\n");

    let definition = load_template(temp_dir.path()).unwrap();
    let dir_name = temp_dir.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(definition.name, dir_name);
    assert!(definition.pre_hooks.is_empty());
    assert_eq!(definition.post_hooks.len(), 1);
    assert_eq!(definition.post_hooks[0].name(), "post_gen_project");
}

#[test]
fn test_generate_from_configured_template() {
    let templates = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    template(&templates.path().join("python_package"));

    let mut registry = TemplateRegistry::new();
    assert_eq!(registry.discover(templates.path()).unwrap(), 1);
    let template = registry.get("python_package").unwrap();

    let renderer = MiniJinjaRenderer::new();
    let answers = PreparedAnswers::default()
        .insert("project_name", json!("My Demo"))
        .insert("ci", json!("None"));
    let out = output_dir.path().join("out");
    let result = Generator::new(&renderer, GenerateOptions::default()).generate(template, &answers, &out);

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "# My Demo 0.1.0\n");
    assert!(out.join("my_demo/__init__.py").is_file());
    assert!(!out.join("my_demo/cache.pyc").exists());
    assert!(!out.join("docs").exists());
    assert!(!out.join(".github").exists());
    assert!(!out.join("ci").exists());
    assert!(!out.join("kiln.yaml").exists());
    assert!(!out.join(".kilnignore").exists());
    assert!(!out.join("scripts/.keep").exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(out.join("scripts/setup.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o100, 0o100);
    }
}

#[test]
fn test_labeled_choices_and_welcome_message() {
    let templates = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let root = templates.path().join("streamlit_app");
    write(
        &root,
        "kiln.yaml",
        r#"
welcome_message: "Run `cd {{ project_name }}` to get started with {{ license }}."
questions:
  - key: project_name
  - key: license
    choices:
      - label: MIT License
        value: mit
      - apache-2.0
"#,
    );
    write(&root, "LICENSE.j2", "{{ license }}\n");

    let mut registry = TemplateRegistry::new();
    assert_eq!(registry.discover(templates.path()).unwrap(), 1);
    let template = registry.get("streamlit_app").unwrap();
    let license = &template.questions[1];
    assert_eq!(license.choices[0].value, "mit");
    assert_eq!(license.choices[0].to_string(), "MIT License");
    assert_eq!(license.choices[1].to_string(), "apache-2.0");

    let renderer = MiniJinjaRenderer::new();
    let generator = Generator::new(&renderer, GenerateOptions::default());

    let by_label = PreparedAnswers::default()
        .insert("project_name", json!("demo"))
        .insert("license", json!("MIT License"));
    let result = generator.generate(template, &by_label, output_dir.path().join("rejected"));
    assert!(matches!(result.error, Some(Error::InvalidAnswer { ref key, .. }) if key == "license"));
    assert!(result.welcome_message.is_none());

    let by_value = PreparedAnswers::default()
        .insert("project_name", json!("demo"))
        .insert("license", json!("mit"));
    let out = output_dir.path().join("demo");
    let result = generator.generate(template, &by_value, &out);
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(fs::read_to_string(out.join("LICENSE")).unwrap(), "mit\n");
    assert_eq!(
        result.welcome_message.as_deref(),
        Some("Run `cd demo` to get started with mit.")
    );
}
