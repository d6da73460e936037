// ABOUTME: Integration tests for the CLI application
// ABOUTME: Tests command-line interface functionality against the built cliq binary

use std::process::{Command, Output};

mod common;
use common::{TestCommand, TestEnvironment, TestTemplateBuilder};

fn cliq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cliq"))
        .args(args)
        .env_remove("CLIQ_TEMPLATE_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute cliq")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn greeting_template() -> TestTemplateBuilder {
    TestTemplateBuilder::new("Greetings").with_command(
        TestCommand::new("greet", "echo hello {{name}}")
            .string_var("name", true)
            .flag_var("shout", "--shout"),
    )
}

#[test]
fn test_cli_help_command() {
    let output = cliq(&["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("cliq"));
    assert!(text.contains("run"));
    assert!(text.contains("validate"));
}

#[test]
fn test_cli_version_command() {
    let output = cliq(&["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn test_cli_run_streams_output() {
    let env = TestEnvironment::new();
    let file = env.create_template_file("greet", &greeting_template()).await;

    let output = cliq(&["run", file.to_str().unwrap(), "greet", "-V", "name=world"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "hello world\n");
}

#[tokio::test]
async fn test_cli_run_json_format() {
    let env = TestEnvironment::new();
    let file = env.create_template_file("greet", &greeting_template()).await;

    let output = cliq(&[
        "run",
        file.to_str().unwrap(),
        "greet",
        "-V",
        "name=json",
        "--format",
        "json",
    ]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["status"], "succeeded");
    assert_eq!(value["stdout"], "hello json\n");
}

#[tokio::test]
async fn test_cli_run_missing_variable_fails() {
    let env = TestEnvironment::new();
    let file = env.create_template_file("greet", &greeting_template()).await;

    let output = cliq(&["run", file.to_str().unwrap(), "greet"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing required variable 'name'"));
}

#[tokio::test]
async fn test_cli_run_failing_command() {
    let env = TestEnvironment::new();
    let builder = TestTemplateBuilder::new("Fail")
        .with_command(TestCommand::new("fail", "exit 2"));
    let file = env.create_template_file("fail", &builder).await;

    let output = cliq(&["run", file.to_str().unwrap(), "fail"]);

    assert!(!output.status.success());
}

#[tokio::test]
async fn test_cli_render() {
    let env = TestEnvironment::new();
    let file = env.create_template_file("greet", &greeting_template()).await;

    let output = cliq(&[
        "render",
        file.to_str().unwrap(),
        "greet",
        "-V",
        "name=a b",
        "-V",
        "shout=yes",
    ]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "echo hello 'a b' --shout\n");
}

#[tokio::test]
async fn test_cli_validate() {
    let env = TestEnvironment::new();
    let good = env.create_template_file("greet", &greeting_template()).await;
    let bad = env
        .create_template_file(
            "bad",
            &TestTemplateBuilder::new("Bad").with_command(TestCommand::new("x", "echo {{ghost}}")),
        )
        .await;

    let output = cliq(&["validate", good.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("is valid"));

    let output = cliq(&["validate", bad.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("{{ghost}}"));
}

#[tokio::test]
async fn test_cli_list_and_show() {
    let env = TestEnvironment::new();
    let file = env.create_template_file("greet", &greeting_template()).await;

    let output = cliq(&["list", file.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Greetings (greet)"));
    assert!(text.contains("- greet"));

    let output = cliq(&["show", file.to_str().unwrap(), "greet"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("name (string) required"));
    assert!(text.contains("shout (boolean) flag --shout"));
}

#[tokio::test]
async fn test_cli_generate_and_migrate() {
    let env = TestEnvironment::new();
    let generated = env.path().join("generated.json");
    let migrated = env.path().join("generated.yaml");

    let output = cliq(&[
        "generate",
        "ls {{show_all}} {{dir_path}}",
        "-o",
        generated.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    assert!(generated.exists());

    let output = cliq(&[
        "migrate",
        generated.to_str().unwrap(),
        "-o",
        migrated.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let yaml = std::fs::read_to_string(&migrated).unwrap();
    assert!(yaml.contains("generated_cmd_1"));
}

#[tokio::test]
async fn test_cli_nonexistent_template() {
    let output = cliq(&["run", "/nonexistent/template.json", "x"]);
    assert!(!output.status.success());
}
