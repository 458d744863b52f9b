//! Initialize a new fnforge project

use anyhow::Result;
use fnforge_core::config::CONFIG_FILE;
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let abs_path = project_dir.canonicalize()?;

    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new fnforge project: {}", project_name);

    let config = format!(
        r#"# fnforge build configuration
name: {project_name}
program: program.yaml
# binary: target/{project_name}.jar

deployment:
  target: azure-functions
  native: false
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    let program = format!(
        r#"# Typed program model
name: {project_name}
types:
  Greeting:
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
          - accessor: get
            params:
              - name: name
                type: string
            returns:
              type: string
          - accessor: post
            params:
              - name: greeting
                type: Greeting
            returns:
              type: "json|error"
      - name: orders
        listener_type: "af:QueueListener"
        annotations:
          - name: "af:QueueTrigger"
            fields:
              queueName: orders-in
        functions:
          - name: onOrder
            params:
              - name: order
                type: json
            returns:
              type: json
              annotations:
                - name: "af:QueueOutput"
                  fields:
                    queueName: orders-out
"#
    );
    fs::write(project_dir.join("program.yaml"), program)?;

    let gitignore = "# fnforge build output\ntarget/\n";
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!(
        "✓ Created project '{}' at {}",
        project_name,
        abs_path.display()
    );
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", project_dir.display());
    }
    tracing::info!("  fnforge validate    # Check bindings");
    tracing::info!("  fnforge build       # Package the functions");

    Ok(())
}
