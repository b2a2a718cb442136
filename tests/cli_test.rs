use clap::Parser;
use kiln::cli::{Args, Commands};
use kiln::hooks::FailurePolicy;
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("kiln")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_basic_generate_args() {
    let args = make_args(&["generate", "python_package", "./output"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert_eq!(parsed.verbose, 0);
    match parsed.command {
        Commands::Generate(generate) => {
            assert_eq!(generate.template, "python_package");
            assert_eq!(generate.output_dir, PathBuf::from("./output"));
            assert!(!generate.force);
            assert!(!generate.no_input);
            assert!(!generate.skip_hooks);
            assert!(generate.params.is_empty());
            assert!(generate.on_command_failure.is_none());
        }
        other => panic!("Expected Generate, got {other:?}"),
    }
}

#[test]
fn test_all_generate_flags() {
    let args = make_args(&[
        "-vv",
        "--templates-dir",
        "./templates",
        "generate",
        "--force",
        "--no-input",
        "--skip-hooks",
        "-p",
        "project_name=demo",
        "--param",
        "ci=GitHub",
        "--answers",
        "answers.yaml",
        "--on-command-failure",
        "warn",
        "python_package",
        "./output",
    ]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert_eq!(parsed.verbose, 2);
    assert_eq!(parsed.templates_dir, PathBuf::from("./templates"));
    let Commands::Generate(generate) = parsed.command else {
        panic!("Expected Generate");
    };
    assert!(generate.force);
    assert!(generate.no_input);
    assert!(generate.skip_hooks);
    assert_eq!(generate.params, ["project_name=demo", "ci=GitHub"]);
    assert_eq!(generate.answers, Some(PathBuf::from("answers.yaml")));
    assert_eq!(generate.on_command_failure, Some(FailurePolicy::Warn));
}

#[test]
fn test_list_with_group() {
    let parsed = Args::try_parse_from(make_args(&["list", "package"])).unwrap();
    match parsed.command {
        Commands::List { group } => assert_eq!(group.as_deref(), Some("package")),
        other => panic!("Expected List, got {other:?}"),
    }

    let parsed = Args::try_parse_from(make_args(&["list"])).unwrap();
    assert!(matches!(parsed.command, Commands::List { group: None }));
}

#[test]
fn test_dump_defaults() {
    let parsed = Args::try_parse_from(make_args(&["dump-defaults", "python_package", "-o", "defaults.yaml"])).unwrap();
    match parsed.command {
        Commands::DumpDefaults { template, output } => {
            assert_eq!(template, "python_package");
            assert_eq!(output, Some(PathBuf::from("defaults.yaml")));
        }
        other => panic!("Expected DumpDefaults, got {other:?}"),
    }
}

#[test]
fn test_missing_args() {
    assert!(Args::try_parse_from(make_args(&["generate", "python_package"])).is_err());
    assert!(Args::try_parse_from(make_args(&[])).is_err());
}

#[test]
fn test_invalid_failure_policy() {
    let args = make_args(&["generate", "--on-command-failure", "retry", "python_package", "./output"]);
    assert!(Args::try_parse_from(args).is_err());
}

#[test]
fn test_too_many_args() {
    let args = make_args(&["generate", "python_package", "./output", "extra"]);
    assert!(Args::try_parse_from(args).is_err());
}
