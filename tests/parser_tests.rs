// ABOUTME: Integration tests specifically for the template parser module
// ABOUTME: Tests loading of JSON and YAML templates across schema versions and error handling

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::fs;

use cliq::parser::{
    DocumentFormat, FileMode, ParserError, TemplateParser, ValidationError, VariableKind,
};

mod common;
use common::{TestCommand, TestEnvironment, TestTemplateBuilder};

#[tokio::test]
async fn test_parse_valid_yaml_template() {
    let temp_dir = TempDir::new().unwrap();
    let template_file = temp_dir.path().join("network.yaml");

    let template_yaml = r#"
name: Network Tools
description: Everyday network diagnostics
version: 1.2
author: Integration Test
cliq_template_version: "2.0"
cmds:
  - id: ping
    name: Ping
    description: Ping a host
    command: ping -c {{count}} {{target}}
    variables:
      - name: target
        type: string
        label: Target host
        required: true
      - name: count
        type: number
        options:
          min: 1
          max: 10
          default: 4
  - id: curl
    name: Fetch headers
    command: curl -I {{url}}
    variables:
      - name: url
        type: string
        required: true
      - name: verbose
        type: boolean
        arg_name: -v
"#;

    fs::write(&template_file, template_yaml).await.unwrap();

    let parser = TemplateParser::new();
    let template = parser.parse_file(&template_file).await.unwrap();

    assert_eq!(template.name, "Network Tools");
    assert_eq!(template.version, "1.2");
    assert_eq!(template.author, "Integration Test");
    assert_eq!(template.command_ids(), vec!["ping", "curl"]);

    let ping = template.get_command("ping").unwrap();
    assert_eq!(ping.variables[0].label, "Target host");
    assert!(ping.variables[0].required);
    match &ping.variables[1].kind {
        VariableKind::Number(opts) => {
            assert_eq!(opts.min, Some(1.0));
            assert_eq!(opts.max, Some(10.0));
            assert_eq!(opts.default, Some(4.0));
        }
        other => panic!("expected number, got {:?}", other),
    }

    let curl = template.get_command("curl").unwrap();
    assert_eq!(curl.variables[1].flag(), Some("-v"));
}

#[tokio::test]
async fn test_legacy_and_current_documents_load_identically() {
    let env = TestEnvironment::new();

    let legacy = env
        .write_raw(
            "legacy.json",
            r#"{
                "name": "Images",
                "version": "1.0",
                "cliq_template_version": "1.0",
                "cmds": [{
                    "id": "convert",
                    "name": "Convert",
                    "command": "convert {{src}} {{dest}}",
                    "variables": {
                        "src": {"type": "file_input", "required": true},
                        "dest": {"type": "file_output", "required": true}
                    }
                }]
            }"#,
        )
        .await;

    let current = env
        .write_raw(
            "current.json",
            r#"{
                "name": "Images",
                "version": "1.0",
                "cliq_template_version": "2.0",
                "cmds": [{
                    "id": "convert",
                    "name": "Convert",
                    "command": "convert {{src}} {{dest}}",
                    "variables": [
                        {"name": "dest", "type": "file", "required": true,
                         "options": {"mode": "output"}},
                        {"name": "src", "type": "file", "required": true}
                    ]
                }]
            }"#,
        )
        .await;

    let parser = TemplateParser::new();
    let from_legacy = parser.parse_file(&legacy).await.unwrap();
    let from_current = parser.parse_file(&current).await.unwrap();

    assert_eq!(from_legacy, from_current);
    assert_eq!(from_legacy.cliq_template_version, "2.0");
    match &from_legacy.cmds[0].variables[0].kind {
        VariableKind::File(opts) => assert_eq!(opts.mode, FileMode::Output),
        other => panic!("expected file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_schema_version() {
    let env = TestEnvironment::new();
    let builder = TestTemplateBuilder::new("future")
        .with_schema_version("3.0")
        .add_echo_command("hello", "hi");
    let path = env.create_template_file("future", &builder).await;

    let err = TemplateParser::new().parse_file(&path).await.unwrap_err();
    match err {
        ParserError::UnsupportedSchemaVersion { version, supported } => {
            assert_eq!(version, "3.0");
            assert_eq!(supported, vec!["1.0", "2.0"]);
        }
        other => panic!("expected unsupported version, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_required_top_level_fields() {
    let parser = TemplateParser::new();

    for (content, field) in [
        (r#"{"cliq_template_version": "2.0", "cmds": []}"#, "name"),
        (r#"{"name": "x", "cmds": []}"#, "cliq_template_version"),
        (r#"{"name": "x", "cliq_template_version": "2.0"}"#, "cmds"),
    ] {
        match parser.parse_string(content, DocumentFormat::Json) {
            Err(ParserError::MalformedTemplate { field: got, .. }) => assert_eq!(got, field),
            other => panic!("expected malformed {}, got {:?}", field, other),
        }
    }
}

#[tokio::test]
async fn test_undeclared_placeholder_rejects_template() {
    let builder = TestTemplateBuilder::new("broken").with_command(
        TestCommand::new("ping", "ping {{target}} {{count}}").string_var("target", true),
    );

    let err = TemplateParser::new()
        .parse_string(&builder.to_json(), DocumentFormat::Json)
        .unwrap_err();
    match err {
        ParserError::MalformedTemplate { field, reason } => {
            assert_eq!(field, "cmds[0].command");
            assert!(reason.contains("{{count}}"));
        }
        other => panic!("expected malformed template, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_command_ids_reported() {
    let builder = TestTemplateBuilder::new("dupes")
        .add_echo_command("hello", "one")
        .add_echo_command("hello", "two");

    let report = TemplateParser::new()
        .check_string(&builder.to_json(), DocumentFormat::Json)
        .unwrap();

    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| matches!(
        e,
        ValidationError::DuplicateCommandId { id, .. } if id == "hello"
    )));
}

#[tokio::test]
async fn test_invalid_number_bounds_reported() {
    let builder = TestTemplateBuilder::new("bounds").with_command(
        TestCommand::new("count", "seq {{n}}").number_var("n", 10.0, 1.0),
    );

    let report = TemplateParser::new()
        .check_string(&builder.to_json(), DocumentFormat::Json)
        .unwrap();

    assert!(!report.is_valid);
    assert!(matches!(
        report.first_error(),
        Some(ValidationError::InvalidOptions { .. })
    ));
}

#[tokio::test]
async fn test_invalid_syntax() {
    let parser = TemplateParser::new();
    assert!(matches!(
        parser.parse_string("{not json", DocumentFormat::Json),
        Err(ParserError::JsonError(_))
    ));
    assert!(matches!(
        parser.parse_string("name: [unclosed", DocumentFormat::Yaml),
        Err(ParserError::YamlError(_))
    ));
}

#[tokio::test]
async fn test_nonexistent_file() {
    let result = TemplateParser::new()
        .parse_file("/nonexistent/template.json")
        .await;
    assert!(matches!(result, Err(ParserError::IoError(_))));
}

#[tokio::test]
async fn test_save_then_reload_yields_same_template() {
    let env = TestEnvironment::new();
    let builder = TestTemplateBuilder::new("roundtrip").with_command(
        TestCommand::new("ls", "ls {{all}} {{dir}}")
            .string_var("dir", false)
            .flag_var("all", "-a"),
    );
    let parser = TemplateParser::new();
    let template = parser
        .parse_string(&builder.to_json(), DocumentFormat::Json)
        .unwrap();

    let yaml = parser.to_string(&template, DocumentFormat::Yaml).unwrap();
    let path = env.write_raw("roundtrip.yaml", &yaml).await;
    let reloaded = parser.parse_file(&path).await.unwrap();

    assert_eq!(reloaded, template);
}
