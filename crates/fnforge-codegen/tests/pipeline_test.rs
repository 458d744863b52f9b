//! Integration tests for the full build pipeline
//!
//! Tests use temporary project directories to verify:
//! - Descriptor contents for HTTP, queue and document triggers
//! - Artifact layout, host configuration merging and settings preservation
//! - Idempotent output and fingerprints
//! - Native packaging through a fake builder

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use walkdir::WalkDir;

use fnforge_codegen::{ArtifactState, BuildReport, CompileOptions, Compiler, Error, NativeBuilder};
use fnforge_core::parser::Parser;
use fnforge_core::{Config, ProgramModel};

const HTTP_PROGRAM: &str = r#"
name: hello
types:
  Person:
    record:
      fields:
        name: string
        age: int
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
              - name: greeting
                type: string
                annotations:
                  - name: "http:Payload"
            returns:
              type: "string|error"
          - accessor: default
            path: ["any"]
            returns:
              type: string
          - accessor: get
            path: ["people", "{id}"]
            params:
              - name: verbose
                type: "boolean?"
            returns:
              type: Person
"#;

const QUEUE_PROGRAM: &str = r#"
name: queues
documents:
  - name: jobs
    imports:
      af: azure_functions
    services:
      - name: queue1
        listener_type: "af:QueueListener"
        annotations:
          - name: "af:QueueTrigger"
            fields:
              queueName: queue2
        functions:
          - name: onMessage
            params:
              - name: msg
                type: string
            returns:
              type: string
              annotations:
                - name: "af:QueueOutput"
                  fields:
                    queueName: queue3
      - name: changes
        listener_type: "af:CosmosDBListener"
        annotations:
          - name: "af:CosmosDBTrigger"
            fields:
              connectionStringSetting: CosmosDBConnection
              databaseName: db1
              collectionName: c1
        functions:
          - name: onChange
            params:
              - name: docs
                type: json
"#;

const AMBIGUOUS_PROGRAM: &str = r#"
name: ambiguous
types:
  Person:
    record:
      fields:
        name: string
documents:
  - name: main
    imports:
      af: azure_functions
    services:
      - path: /hello
        listener_type: "af:HttpListener"
        functions:
          - accessor: post
            params:
              - name: a
                type: Person
              - name: b
                type: json
                line: 12
"#;

fn setup_project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fnforge.yaml"), config).unwrap();
    std::fs::write(dir.path().join("hello.jar"), b"PK\x03\x04 fake jar").unwrap();
    dir
}

fn model(yaml: &str) -> ProgramModel {
    ProgramModel::new(Parser::new(".").parse_yaml(yaml).unwrap())
}

fn compiler(dir: &Path) -> Compiler {
    let config = Config::load(dir).unwrap();
    Compiler::new(CompileOptions::from_config(&config))
}

fn function_dir(dir: &Path) -> PathBuf {
    dir.join("target/azure_functions")
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn descriptor(dir: &Path, function: &str) -> String {
    let value = read_json(&function_dir(dir).join(function).join("function.json"));
    serde_json::to_string(&value).unwrap()
}

async fn build(dir: &Path, program: &str) -> BuildReport {
    compiler(dir).build(&model(program), None).await.unwrap()
}

/// Writes a placeholder executable instead of running a real image build
struct FakeBuilder {
    fail: bool,
}

#[async_trait]
impl NativeBuilder for FakeBuilder {
    fn describe(&self) -> String {
        "fake".to_string()
    }

    async fn build(&self, dir: &Path, binary: &str, output: &str) -> fnforge_codegen::Result<PathBuf> {
        assert!(dir.join(binary).exists());
        if self.fail {
            return Err(Error::NativeBuildFailed {
                status: "exit status: 1".to_string(),
                output: "Error: classpath is empty".to_string(),
            });
        }
        let path = dir.join(output);
        std::fs::write(&path, b"\x7fELF")?;
        Ok(path)
    }
}

// =============================================================================
// Descriptors
// =============================================================================

#[tokio::test]
async fn test_http_descriptors() {
    let dir = setup_project("name: hello\nbinary: hello.jar\n");
    let report = build(dir.path(), HTTP_PROGRAM).await;

    assert!(report.is_success(), "{:?}", report.context.diagnostics);
    let artifact = report.artifact.unwrap();
    assert_eq!(
        artifact.functions,
        vec!["post-hello", "default-hello-any", "get-hello-people-id"]
    );

    assert_eq!(
        descriptor(dir.path(), "post-hello"),
        r#"{"bindings":[{"type":"httpTrigger","authLevel":"anonymous","methods":["post"],"direction":"in","name":"httpPayload","route":"hello"},{"type":"http","direction":"out","name":"resp"}]}"#
    );

    let wildcard = read_json(&function_dir(dir.path()).join("default-hello-any/function.json"));
    assert_eq!(
        wildcard["bindings"][0]["methods"],
        json!(["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"])
    );

    let people = read_json(&function_dir(dir.path()).join("get-hello-people-id/function.json"));
    assert_eq!(people["bindings"][0]["route"], "hello/people/{id}");
}

#[tokio::test]
async fn test_queue_and_document_descriptors() {
    let dir = setup_project("name: queues\n");
    let report = build(dir.path(), QUEUE_PROGRAM).await;
    assert!(report.is_success(), "{:?}", report.context.diagnostics);

    assert_eq!(
        descriptor(dir.path(), "queue1"),
        r#"{"bindings":[{"type":"queueTrigger","connection":"AzureWebJobsStorage","queueName":"queue2","direction":"in","name":"inMsg"},{"type":"queue","connection":"AzureWebJobsStorage","queueName":"queue3","direction":"out","name":"outMsg"}]}"#
    );
    assert_eq!(
        descriptor(dir.path(), "changes"),
        r#"{"bindings":[{"type":"cosmosDBTrigger","connectionStringSetting":"CosmosDBConnection","databaseName":"db1","collectionName":"c1","createLeaseCollectionIfNotExists":true,"leasesCollectionThroughput":400,"direction":"in","name":"inMsg"}]}"#
    );
}

#[tokio::test]
async fn test_ambiguous_payload_blocks_artifact() {
    let dir = setup_project("name: ambiguous\n");
    let report = build(dir.path(), AMBIGUOUS_PROGRAM).await;

    assert_eq!(report.state, ArtifactState::Failed);
    let diagnostic = report
        .context
        .diagnostics
        .iter()
        .find(|d| d.code() == "FNF208")
        .unwrap();
    assert_eq!(diagnostic.location.line, 12);
    assert!(!function_dir(dir.path()).exists());
}

// =============================================================================
// Artifact layout
// =============================================================================

#[tokio::test]
async fn test_artifact_layout() {
    let dir = setup_project("name: hello\nbinary: hello.jar\n");
    let report = build(dir.path(), HTTP_PROGRAM).await;
    let root = function_dir(dir.path());

    for file in [
        "host.json",
        "local.settings.json",
        ".gitignore",
        ".vscode/extensions.json",
        "hello.jar",
    ] {
        assert!(root.join(file).exists(), "missing {}", file);
    }

    let host = read_json(&root.join("host.json"));
    assert_eq!(host["version"], "2.0");
    assert_eq!(host["extensions"]["http"]["routePrefix"], "");
    assert_eq!(
        host["customHandler"]["description"],
        json!({
            "defaultExecutablePath": "java",
            "arguments": ["-jar"],
            "defaultWorkerPath": "hello.jar"
        })
    );

    let settings = read_json(&root.join("local.settings.json"));
    assert_eq!(settings["Values"]["FUNCTIONS_WORKER_RUNTIME"], "custom");

    let generated = dir.path().join("target/generated");
    assert_eq!(report.shims, vec![generated.join("main.rs"), generated.join("mod.rs")]);
    let index = std::fs::read_to_string(generated.join("mod.rs")).unwrap();
    assert!(index.contains("pub mod main;"));

    let artifact = report.artifact.unwrap();
    assert_eq!(artifact.executable.as_deref(), Some("hello.jar"));
    assert!(artifact.next_steps.iter().any(|s| s.contains("functionapp publish")));
}

#[tokio::test]
async fn test_missing_binary_fails() {
    let dir = setup_project("name: hello\nbinary: missing.jar\n");
    let err = compiler(dir.path())
        .build(&model(HTTP_PROGRAM), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ArtifactNotFound { .. }));
}

#[tokio::test]
async fn test_local_settings_preserved() {
    let dir = setup_project("name: hello\n");
    let root = function_dir(dir.path());
    std::fs::create_dir_all(&root).unwrap();
    let custom = "{\n  \"IsEncrypted\": false,\n  \"Values\": { \"MY_SECRET\": \"s3cr3t\" }\n}";
    std::fs::write(root.join("local.settings.json"), custom).unwrap();
    std::fs::create_dir_all(root.join("stale-function")).unwrap();

    build(dir.path(), HTTP_PROGRAM).await;

    assert_eq!(
        std::fs::read_to_string(root.join("local.settings.json")).unwrap(),
        custom
    );
    assert!(!root.join("stale-function").exists());
}

#[tokio::test]
async fn test_host_json_merged_over_existing() {
    let dir = setup_project("name: hello\n");
    let root = function_dir(dir.path());
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join("host.json"),
        r#"{"version":"1.0","logging":{"logLevel":{"default":"Warning"}},"extensions":{"http":{"routePrefix":"api","maxConcurrentRequests":10}}}"#,
    )
    .unwrap();

    build(dir.path(), HTTP_PROGRAM).await;

    let host = read_json(&root.join("host.json"));
    assert_eq!(host["version"], "2.0");
    assert_eq!(host["logging"]["logLevel"]["default"], "Warning");
    assert_eq!(host["extensions"]["http"]["routePrefix"], "");
    assert_eq!(host["extensions"]["http"]["maxConcurrentRequests"], 10);
}

#[tokio::test]
async fn test_local_target() {
    let dir = setup_project("name: hello\ndeployment:\n  target: azure-functions-local\n");
    let report = build(dir.path(), HTTP_PROGRAM).await;

    let settings = read_json(&function_dir(dir.path()).join("local.settings.json"));
    assert_eq!(
        settings["Values"]["AzureWebJobsStorage"],
        "UseDevelopmentStorage=true"
    );
    let artifact = report.artifact.unwrap();
    assert!(artifact.next_steps.iter().any(|s| s.contains("func start")));
}

// =============================================================================
// Idempotence
// =============================================================================

fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<(PathBuf, Vec<u8>)> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, std::fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn test_rebuild_is_byte_identical() {
    let dir = setup_project("name: hello\nbinary: hello.jar\n");

    let first = build(dir.path(), HTTP_PROGRAM).await.artifact.unwrap();
    let before = snapshot(&dir.path().join("target"));
    let second = build(dir.path(), HTTP_PROGRAM).await.artifact.unwrap();
    let after = snapshot(&dir.path().join("target"));

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.fingerprint.len(), 64);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_fingerprint_tracks_descriptors() {
    let a = setup_project("name: hello\n");
    let b = setup_project("name: queues\n");
    let first = build(a.path(), HTTP_PROGRAM).await.artifact.unwrap();
    let second = build(b.path(), QUEUE_PROGRAM).await.artifact.unwrap();
    assert_ne!(first.fingerprint, second.fingerprint);
}

// =============================================================================
// Native packaging
// =============================================================================

#[tokio::test]
async fn test_native_build_replaces_binary() {
    let dir = setup_project("name: hello\nbinary: hello.jar\ndeployment:\n  native: true\n");
    let builder = FakeBuilder { fail: false };
    let report = compiler(dir.path())
        .build(&model(HTTP_PROGRAM), Some(&builder))
        .await
        .unwrap();

    let root = function_dir(dir.path());
    assert!(root.join("hello").exists());
    assert!(!root.join("hello.jar").exists());

    let host = read_json(&root.join("host.json"));
    assert_eq!(
        host["customHandler"]["description"],
        json!({ "defaultExecutablePath": "hello", "arguments": [] })
    );

    let artifact = report.artifact.unwrap();
    assert!(artifact.native);
    assert_eq!(artifact.executable.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_native_build_failure_is_fatal() {
    let dir = setup_project("name: hello\nbinary: hello.jar\ndeployment:\n  native: true\n");
    let builder = FakeBuilder { fail: true };
    let err = compiler(dir.path())
        .build(&model(HTTP_PROGRAM), Some(&builder))
        .await
        .unwrap_err();

    match err {
        Error::NativeBuildFailed { output, .. } => assert!(output.contains("classpath")),
        other => panic!("unexpected error: {}", other),
    }

    let root = function_dir(dir.path());
    assert!(root.join("hello.jar").exists());
    assert!(!root.join("hello").exists());
    let host = read_json(&root.join("host.json"));
    assert_eq!(
        host["customHandler"]["description"],
        json!({
            "defaultExecutablePath": "java",
            "arguments": ["-jar"],
            "defaultWorkerPath": "hello.jar"
        })
    );
}

#[tokio::test]
async fn test_native_without_binary_fails() {
    let dir = setup_project("name: hello
deployment:
  native: true
");
    let builder = FakeBuilder { fail: false };
    let err = compiler(dir.path())
        .build(&model(HTTP_PROGRAM), Some(&builder))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NativeUnavailable(_)));
    assert!(!function_dir(dir.path()).exists());
}

// =============================================================================
// Partial failures
// =============================================================================

const PARTIAL_PROGRAM: &str = r#"
name: partial
documents:
  - name: main
    imports:
      af: azure_functions
    services:
      - path: /hello
        listener_type: "af:HttpListener"
        functions:
          - accessor: post
            params:
              - name: greeting
                type: string
                annotations:
                  - name: "http:Payload"
            returns:
              type: string
          - accessor: get
            params:
              - name: events
                type: string
                annotations:
                  - name: "af:EventHubInput"
"#;

#[tokio::test]
async fn test_unsupported_binding_skips_only_its_handler() {
    let dir = setup_project("name: partial
");
    let report = build(dir.path(), PARTIAL_PROGRAM).await;

    assert!(report.context.diagnostics.contains_code("FNF102"));
    assert_eq!(report.state, ArtifactState::Packaged);
    let artifact = report.artifact.unwrap();
    assert_eq!(artifact.functions, vec!["post-hello"]);
    assert!(!function_dir(dir.path()).join("get-hello").exists());
}

#[tokio::test]
async fn test_foreign_output_dir_is_kept() {
    let dir = setup_project("name: hello
");
    let out = dir.path().join("src");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("main.rs"), "fn main() {}").unwrap();

    let config = Config::load(dir.path()).unwrap();
    let options = CompileOptions::from_config(&config).with_function_dir(&out);
    let err = Compiler::new(options)
        .build(&model(HTTP_PROGRAM), None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ForeignOutputDir { .. }));
    assert_eq!(std::fs::read_to_string(out.join("main.rs")).unwrap(), "fn main() {}");
}
