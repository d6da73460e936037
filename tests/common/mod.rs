// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides shared functionality for building template documents and temp environments

#![allow(dead_code)]

use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use cliq::engine::ExecutionConfig;
use cliq::registry::{StaticSettings, TemplateRegistry};
use std::sync::Arc;
use std::time::Duration;

pub struct TestTemplateBuilder {
    name: String,
    description: String,
    schema_version: String,
    cmds: Vec<TestCommand>,
}

pub struct TestCommand {
    pub id: String,
    pub name: String,
    pub command: String,
    pub variables: Vec<JsonValue>,
}

impl TestCommand {
    pub fn new(id: &str, command: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            command: command.to_string(),
            variables: Vec::new(),
        }
    }

    pub fn string_var(mut self, name: &str, required: bool) -> Self {
        self.variables
            .push(json!({"name": name, "type": "string", "required": required}));
        self
    }

    pub fn flag_var(mut self, name: &str, flag: &str) -> Self {
        self.variables.push(json!({
            "name": name,
            "type": "boolean",
            "arg_name": flag,
            "options": {"default": false}
        }));
        self
    }

    pub fn number_var(mut self, name: &str, min: f64, max: f64) -> Self {
        self.variables.push(json!({
            "name": name,
            "type": "number",
            "options": {"min": min, "max": max}
        }));
        self
    }

    pub fn with_variable(mut self, variable: JsonValue) -> Self {
        self.variables.push(variable);
        self
    }
}

impl TestTemplateBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Test template: {}", name),
            schema_version: "2.0".to_string(),
            cmds: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_schema_version(mut self, version: &str) -> Self {
        self.schema_version = version.to_string();
        self
    }

    pub fn with_command(mut self, command: TestCommand) -> Self {
        self.cmds.push(command);
        self
    }

    pub fn add_echo_command(self, id: &str, message: &str) -> Self {
        self.with_command(TestCommand::new(id, &format!("echo {}", message)))
    }

    pub fn to_json(&self) -> String {
        let cmds: Vec<JsonValue> = self
            .cmds
            .iter()
            .map(|cmd| {
                json!({
                    "id": cmd.id,
                    "name": cmd.name,
                    "command": cmd.command,
                    "variables": cmd.variables,
                })
            })
            .collect();

        let document = json!({
            "name": self.name,
            "description": self.description,
            "version": "1.0",
            "cliq_template_version": self.schema_version,
            "cmds": cmds,
        });
        serde_json::to_string_pretty(&document).unwrap()
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn template_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.json", name))
    }

    pub async fn create_template_file(&self, name: &str, builder: &TestTemplateBuilder) -> PathBuf {
        let path = self.template_file(name);
        fs::write(&path, builder.to_json())
            .await
            .expect("Failed to write template file");
        path
    }

    pub async fn write_raw(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.path().join(file_name);
        fs::write(&path, content)
            .await
            .expect("Failed to write file");
        path
    }
}

/// Registry with a short kill grace so cancellation tests stay quick
pub fn test_registry() -> TemplateRegistry {
    let execution = ExecutionConfig {
        kill_grace: Duration::from_millis(500),
        ..ExecutionConfig::default()
    };
    TemplateRegistry::new(execution, Arc::new(StaticSettings::default()))
}
