// ABOUTME: POSIX shell quoting for values substituted into command templates
// ABOUTME: Guarantees a substituted value stays inert text in whatever quoting context it lands in

use std::borrow::Cow;

use super::placeholder::{Context, Quote};

/// Quote `value` for POSIX `sh` so it is read back as exactly one word.
///
/// Words made only of letters, digits and `-_=/,.+` are returned unchanged;
/// everything else is single-quoted with embedded `'` written as `'\''`.
/// The empty string becomes `''`.
pub fn quote(value: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(value))
}

/// Escape `value` for the shell context a placeholder sits in.
///
/// Bare placeholders become one quoted word. Inside quotes the value is
/// escaped so it cannot close the quotes or trigger expansion, and each
/// enclosing backquote substitution adds one more escaping layer. Returns
/// `None` for a multi-line value in a comment or here-document, where a
/// line break would end the surrounding construct.
pub fn quote_in(value: &str, context: Context) -> Option<String> {
    let single_line = !value.contains(['\n', '\r']);
    let mut escaped = match context.quote {
        Quote::Bare => quote(value).into_owned(),
        Quote::Single => value.replace('\'', "'\\''"),
        Quote::Double => backslash(value, &['\\', '"', '$', '`']),
        Quote::Heredoc { expand: true } if single_line => backslash(value, &['\\', '$', '`']),
        Quote::Heredoc { expand: false } | Quote::Comment if single_line => value.to_string(),
        Quote::Heredoc { .. } | Quote::Comment => return None,
    };
    for _ in 0..context.backticks {
        escaped = backslash(&escaped, &['\\', '$', '`']);
    }
    Some(escaped)
}

fn backslash(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Join already-tokenized words into a copy-pasteable command line
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|word| quote(word.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
