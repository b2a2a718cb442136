use std::fs;
use std::path::Path;

use kiln::error::Error;
use kiln::question::QuestionSpec;
use kiln::registry::TemplateRegistry;
use kiln::template::TemplateDefinition;
use tempfile::TempDir;

fn template_dir(root: &Path, name: &str) -> std::path::PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("README.md.j2"), "# {{ project_name }}\n").unwrap();
    dir
}

#[test]
fn test_register_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let mut registry = TemplateRegistry::new();
    registry
        .register(TemplateDefinition::new("python_package", template_dir(temp_dir.path(), "python")))
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("python_package").unwrap().name, "python_package");
    assert!(matches!(registry.get("rust_cli"), Err(Error::UnknownTemplate { ref name }) if name == "rust_cli"));
}

#[test]
fn test_duplicate_name_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let dir = template_dir(temp_dir.path(), "python");
    let mut registry = TemplateRegistry::new();
    registry.register(TemplateDefinition::new("python_package", &dir)).unwrap();

    let err = registry.register(TemplateDefinition::new("python_package", &dir)).unwrap_err();
    assert!(matches!(err, Error::DuplicateTemplate { ref name } if name == "python_package"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_source_root_must_exist_and_be_non_empty() {
    let temp_dir = TempDir::new().unwrap();
    let mut registry = TemplateRegistry::new();

    let missing = TemplateDefinition::new("missing", temp_dir.path().join("nope"));
    assert!(matches!(registry.register(missing), Err(Error::InvalidTemplate { .. })));

    fs::create_dir_all(temp_dir.path().join("empty")).unwrap();
    let empty = TemplateDefinition::new("empty", temp_dir.path().join("empty"));
    assert!(matches!(registry.register(empty), Err(Error::InvalidTemplate { .. })));
    assert!(registry.is_empty());
}

#[test]
fn test_repeated_question_key_is_a_registration_error() {
    let temp_dir = TempDir::new().unwrap();
    let definition = TemplateDefinition::new("python_package", template_dir(temp_dir.path(), "python"))
        .with_question(QuestionSpec::new("project_name", "Project name"))
        .with_question(QuestionSpec::new("project_name", "Project name again"));

    match TemplateRegistry::new().register(definition) {
        Err(Error::InvalidTemplate { reason, .. }) => assert!(reason.contains("project_name")),
        other => panic!("Expected InvalidTemplate, got {other:?}"),
    }
}

#[test]
fn test_hidden_question_needs_default() {
    let temp_dir = TempDir::new().unwrap();
    let definition = TemplateDefinition::new("python_package", template_dir(temp_dir.path(), "python"))
        .with_question(QuestionSpec::new("package_name", "Package").hidden(true));
    assert!(matches!(
        TemplateRegistry::new().register(definition),
        Err(Error::InvalidTemplate { .. })
    ));
}

#[test]
fn test_list_groups_and_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let mut registry = TemplateRegistry::new();
    registry
        .register(TemplateDefinition::new("monorepo_base", template_dir(root, "a")).with_group("monorepo"))
        .unwrap();
    registry
        .register(TemplateDefinition::new("pkg_lib", template_dir(root, "b")).with_group("package"))
        .unwrap();
    registry.register(TemplateDefinition::new("loose", template_dir(root, "c"))).unwrap();
    registry
        .register(TemplateDefinition::new("pkg_api", template_dir(root, "d")).with_group("package"))
        .unwrap();

    let names = |group| registry.list(group).iter().map(|t| t.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(None), ["monorepo_base", "pkg_lib", "loose", "pkg_api"]);
    assert_eq!(names(Some("package")), ["pkg_lib", "pkg_api"]);
    assert!(names(Some("docs")).is_empty());
    assert_eq!(registry.groups(), ["monorepo", "package"]);

    assert!(registry.default_for("package").is_none());
    registry.set_default("package", "pkg_api").unwrap();
    assert_eq!(registry.default_for("package").unwrap().name, "pkg_api");
    assert_eq!(registry.select("package").unwrap().name, "pkg_api");
    assert_eq!(registry.select("loose").unwrap().name, "loose");
    assert!(matches!(registry.select("docs"), Err(Error::UnknownTemplate { .. })));
    assert!(matches!(
        registry.set_default("package", "monorepo_base"),
        Err(Error::InvalidTemplate { .. })
    ));
}

#[test]
fn test_discover() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let api = template_dir(root, "pkg_api");
    fs::write(
        api.join("kiln.yaml"),
        "group: package\ndefault: true\ndescription: HTTP service package\nquestions:\n  - key: project_name\n    default: api\n",
    )
    .unwrap();
    let lib = template_dir(root, "pkg_lib");
    fs::write(lib.join("kiln.json"), r#"{"group": "package", "questions": [{"key": "project_name"}]}"#).unwrap();
    template_dir(root, "not_a_template");
    fs::write(root.join("notes.txt"), "ignored").unwrap();

    let mut registry = TemplateRegistry::new();
    assert_eq!(registry.discover(root).unwrap(), 2);

    let names: Vec<_> = registry.list(None).iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["pkg_api", "pkg_lib"]);
    let api = registry.get("pkg_api").unwrap();
    assert_eq!(api.description, "HTTP service package");
    assert!(registry.is_default(api));
    assert_eq!(registry.select("package").unwrap().name, "pkg_api");
    assert!(registry.get("not_a_template").is_err());

    let question = &registry.get("pkg_lib").unwrap().questions[0];
    assert_eq!(question.key, "project_name");
    assert_eq!(question.prompt, "project_name");
    assert!(question.default.is_none());
}

#[test]
fn test_question_key_must_be_an_identifier() {
    let temp_dir = TempDir::new().unwrap();
    let definition = TemplateDefinition::new("python_package", template_dir(temp_dir.path(), "python"))
        .with_question(QuestionSpec::new("project-name", "Project name"));

    let mut registry = TemplateRegistry::new();
    match registry.register(definition) {
        Err(Error::InvalidTemplate { reason, .. }) => assert!(reason.contains("project-name")),
        other => panic!("Expected InvalidTemplate, got {other:?}"),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_discover_skips_broken_templates() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let good = template_dir(root, "good");
    fs::write(good.join("kiln.yaml"), "description: works\n").unwrap();
    let broken = template_dir(root, "broken");
    fs::write(broken.join("kiln.yaml"), "questions: [unclosed\n").unwrap();
    let bad_key = template_dir(root, "bad_key");
    fs::write(bad_key.join("kiln.yaml"), "questions:\n  - key: project-name\n").unwrap();

    let mut registry = TemplateRegistry::new();
    assert_eq!(registry.discover(root).unwrap(), 1);
    assert_eq!(registry.get("good").unwrap().description, "works");
    assert!(registry.get("broken").is_err());
    assert!(registry.get("bad_key").is_err());
}

#[test]
fn test_discover_missing_directory_finds_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let mut registry = TemplateRegistry::new();
    assert_eq!(registry.discover(temp_dir.path().join("nope")).unwrap(), 0);
    assert!(registry.is_empty());
}
