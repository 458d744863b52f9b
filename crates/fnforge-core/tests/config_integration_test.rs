//! Integration tests for loading a project from disk
//!
//! Tests use temporary directories with real file fixtures to verify:
//! - Project config loading from a directory or an explicit file
//! - Program model resolution relative to the project root
//! - Semantic queries over the loaded model
//! - Configuration diagnostics

use tempfile::TempDir;
use fnforge_core::semantic::SemanticModel;
use fnforge_core::{Config, DeploymentTarget, Error, ProgramModel};

const PROGRAM: &str = r#"
name: hello
types:
  Person:
    record:
      fields:
        name: string
documents:
  - name: main
    imports:
      af: azure_functions
    listeners:
      - name: ep
        type: "af:HttpListener"
    services:
      - path: /hello
        listener: ep
        functions:
          - accessor: post
            params:
              - name: person
                type: Person
            returns:
              type: string
"#;

fn setup_project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fnforge.yaml"), config).unwrap();
    std::fs::create_dir_all(dir.path().join("model")).unwrap();
    std::fs::write(dir.path().join("model/program.yaml"), PROGRAM).unwrap();
    dir
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_from_directory_and_file() {
    let dir = setup_project("name: hello\nprogram: model/program.yaml\n");

    let from_dir = Config::load(dir.path()).unwrap();
    let from_file = Config::load(dir.path().join("fnforge.yaml")).unwrap();

    assert_eq!(from_dir.project.name, "hello");
    assert_eq!(from_dir.base_path, from_file.base_path);
    assert_eq!(from_dir.program_path(), dir.path().join("model/program.yaml"));
}

#[test]
fn test_program_loads_through_config() {
    let dir = setup_project("name: hello\nprogram: model/program.yaml\n");
    let config = Config::load(dir.path()).unwrap();

    let model = ProgramModel::load(config.program_path()).unwrap();
    let program = model.program();
    assert_eq!(program.name, "hello");
    assert_eq!(program.service_count(), 1);

    let service = &program.documents[0].services[0];
    assert_eq!(
        model.listener_type("main", &service.listener).as_deref(),
        Some("azure_functions:HttpListener")
    );
    assert!(model.is_structured(&"Person".parse().unwrap()));
}

#[test]
fn test_missing_program_model() {
    let dir = setup_project("name: hello\nprogram: nowhere.yaml\n");
    let config = Config::load(dir.path()).unwrap();
    let err = ProgramModel::load(config.program_path()).unwrap_err();
    assert!(matches!(err, Error::ProgramNotFound { .. }));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_local_target() {
    let dir = setup_project("name: hello\ndeployment:\n  target: azure-functions-local\n");
    let config = Config::load(dir.path()).unwrap();
    assert!(config.validate().is_empty());
    assert!(config.deployment_target().unwrap().is_local());
    assert_eq!(
        config.deployment_target().unwrap(),
        DeploymentTarget::AzureFunctionsLocal
    );
}

#[test]
fn test_unsupported_target_points_at_config_file() {
    let dir = setup_project("name: hello\n\ndeployment:\n    target: lambda\n");
    let config = Config::load(dir.path()).unwrap();
    let diagnostics = config.validate();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].location.to_string(), "fnforge.yaml:4:5");
    assert!(diagnostics[0].is_error());
}

#[test]
fn test_malformed_yaml() {
    let dir = setup_project("name: [unterminated\n");
    let err = Config::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::YamlParse(_)));
}
