// ABOUTME: Builds a starter template from a raw command line containing placeholders
// ABOUTME: Infers variable types and labels from placeholder names

use super::error::{ParserError, Result};
use super::model::{
    BooleanOptions, Command, FileFilter, FileMode, FileOptions, NumberOptions, TemplateFile,
    VariableDefinition, VariableKind,
};
use crate::template::placeholder;

pub const GENERATED_COMMAND_ID: &str = "generated_cmd_1";

/// Filter given to generated file variables: any file
const ANY_FILE_PATTERN: &str = ".*";

/// Turn `command_line` into a one-command template.
///
/// Every distinct `{{name}}` becomes a required variable, in order of first
/// appearance.
pub fn template_from_command(command_line: &str) -> Result<TemplateFile> {
    if command_line.trim().is_empty() {
        return Err(ParserError::malformed("command", "command text cannot be empty"));
    }

    let variables = placeholder::referenced_names(command_line)
        .into_iter()
        .map(|name| {
            let mut variable = VariableDefinition::new(name, infer_kind(name)).required(true);
            variable.label = label_from_name(name);
            variable.description = format!("The {} parameter", name);
            variable
        })
        .collect();

    let mut template = TemplateFile::new("Generated Template");
    template.description = "Automatically generated template from command".to_string();
    template.author = "cliq".to_string();
    template.cmds.push(Command {
        id: GENERATED_COMMAND_ID.to_string(),
        name: "Generated Command".to_string(),
        description: "Automatically generated command".to_string(),
        command: command_line.to_string(),
        variables,
    });
    Ok(template)
}

/// Guess a variable kind from its name.
///
/// `input`/`src` win over `output`/`dest`, so `src_to_dest_path` is an
/// input file.
pub fn infer_kind(name: &str) -> VariableKind {
    let lower = name.to_ascii_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("file") || has("path") {
        let mode = if has("input") || has("src") {
            FileMode::Input
        } else if has("output") || has("dest") {
            FileMode::Output
        } else {
            FileMode::Input
        };
        VariableKind::File(FileOptions {
            mode,
            filters: vec![FileFilter {
                name: ANY_FILE_PATTERN.to_string(),
                pattern: ANY_FILE_PATTERN.to_string(),
            }],
        })
    } else if has("number") || has("size") || has("width") || has("height") {
        VariableKind::Number(NumberOptions {
            min: Some(0.0),
            max: Some(100.0),
            step: None,
            default: Some(1.0),
        })
    } else if has("enable") || has("use") || has("flag") || has("show") {
        VariableKind::Boolean(BooleanOptions {
            default: Some(false),
        })
    } else {
        VariableKind::string()
    }
}

/// `output_file` -> `Output file`
pub fn label_from_name(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
