// ABOUTME: Variable resolution and substitution for command templates
// ABOUTME: Scans placeholders, coerces input values and renders shell-safe command lines

pub mod engine;
pub mod error;
pub mod escape;
pub mod placeholder;
pub mod value;

pub use engine::{RenderedCommand, TemplateEngine};
pub use error::{FieldError, Result, ValidationFailure};
pub use value::{input_values_from_strings, InputValues, ResolvedValue};
