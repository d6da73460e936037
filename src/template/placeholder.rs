// ABOUTME: Single-pass scanner for {{name}} placeholders in command templates
// ABOUTME: Splits a command string into literal text and placeholders tagged with their shell quoting context

/// Shell lexical state at the position of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    /// Outside any quotes
    Bare,
    /// Inside `'...'`
    Single,
    /// Inside `"..."`
    Double,
    /// After `#` up to the end of the line
    Comment,
    /// Here-document body; `expand` is false when the delimiter was quoted
    Heredoc { expand: bool },
}

/// Where a placeholder sits: its quoting plus how many backquoted command
/// substitutions enclose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub quote: Quote,
    pub backticks: usize,
}

impl Context {
    pub const BARE: Context = Context {
        quote: Quote::Bare,
        backticks: 0,
    };

    pub fn new(quote: Quote) -> Self {
        Self {
            quote,
            backticks: 0,
        }
    }
}

/// Piece of a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder { name: &'a str, context: Context },
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Placeholder names: ASCII letters, digits, `_`, `-` and `.`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    End,
    Paren,
    Backtick,
}

#[derive(Debug, Clone)]
struct Frame {
    quote: Quote,
    closer: Closer,
    parens: usize,
}

impl Frame {
    fn new(closer: Closer) -> Self {
        Self {
            quote: Quote::Bare,
            closer,
            parens: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Delimiter {
    word: String,
    quoted: bool,
    strip_tabs: bool,
    started: bool,
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    word: String,
    expand: bool,
    strip_tabs: bool,
}

/// Tracks enough POSIX shell lexing to know the quoting context of any
/// offset: quotes, backslash escapes, comments, `$(...)` and backquote
/// nesting, and here-document bodies.
#[derive(Debug, Clone)]
struct ShellState {
    frames: Vec<Frame>,
    escaped: bool,
    prev: Option<char>,
    delimiter: Option<Delimiter>,
    pending: Vec<PendingHeredoc>,
    body: Option<PendingHeredoc>,
    line: String,
}

impl ShellState {
    fn new() -> Self {
        Self {
            frames: vec![Frame::new(Closer::End)],
            escaped: false,
            prev: None,
            delimiter: None,
            pending: Vec::new(),
            body: None,
            line: String::new(),
        }
    }

    fn context(&self) -> Context {
        let quote = self.frames.last().map_or(Quote::Bare, |frame| frame.quote);
        let backticks = self
            .frames
            .iter()
            .filter(|frame| frame.closer == Closer::Backtick)
            .count();
        Context { quote, backticks }
    }

    /// A `{{` right after an unconsumed backslash is escaped text
    fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Account for substituted text: it is one opaque word
    fn substituted(&mut self) {
        self.prev = Some('_');
        if self.body.is_some() {
            // A line holding a value can never be the delimiter line
            self.line.push('\0');
        }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            self.step(c);
        }
    }

    fn top(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::new(Closer::End));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn step(&mut self, c: char) {
        if self.delimiter.is_some() && self.read_delimiter(c) {
            self.prev = Some(c);
            return;
        }

        if self.escaped {
            self.escaped = false;
            if let Some(Quote::Heredoc { .. }) = self.frames.last().map(|f| f.quote) {
                if c != '\n' {
                    self.line.push(c);
                }
            }
            self.prev = Some(c);
            return;
        }

        let prev = self.prev;
        let quote = self.top().quote;
        match quote {
            Quote::Single => {
                if c == '\'' {
                    self.top().quote = Quote::Bare;
                }
            }
            Quote::Comment => {
                if c == '\n' {
                    self.top().quote = Quote::Bare;
                    self.start_pending_body();
                }
            }
            Quote::Heredoc { expand } => {
                if c == '\n' {
                    self.end_body_line();
                } else if expand && c == '\\' {
                    self.escaped = true;
                } else {
                    self.line.push(c);
                }
            }
            Quote::Double => match c {
                '\\' => self.escaped = true,
                '"' => self.top().quote = Quote::Bare,
                '`' => self.frames.push(Frame::new(Closer::Backtick)),
                '(' if prev == Some('$') => self.frames.push(Frame::new(Closer::Paren)),
                _ => {}
            },
            Quote::Bare => self.step_bare(c, prev),
        }

        self.prev = Some(c);
    }

    fn step_bare(&mut self, c: char, prev: Option<char>) {
        match c {
            '\\' => self.escaped = true,
            '\'' => self.top().quote = Quote::Single,
            '"' => self.top().quote = Quote::Double,
            '#' if prev.map_or(true, |p| p.is_whitespace() || ";&|()<>".contains(p)) => {
                self.top().quote = Quote::Comment;
            }
            '`' => {
                if self.top().closer == Closer::Backtick {
                    self.frames.pop();
                } else {
                    self.frames.push(Frame::new(Closer::Backtick));
                }
            }
            '(' if prev == Some('$') => self.frames.push(Frame::new(Closer::Paren)),
            '(' => self.top().parens += 1,
            ')' => {
                let frame = self.top();
                if frame.parens > 0 {
                    frame.parens -= 1;
                } else if frame.closer == Closer::Paren {
                    self.frames.pop();
                }
            }
            '<' if prev == Some('<') && self.top().parens == 0 => {
                self.delimiter = Some(Delimiter::default());
            }
            '\n' => self.start_pending_body(),
            _ => {}
        }
    }

    /// Consume one character of a `<<` delimiter word. Returns false when
    /// the character ends the word and still needs normal processing.
    fn read_delimiter(&mut self, c: char) -> bool {
        let Some(delimiter) = self.delimiter.as_mut() else {
            return false;
        };

        if !delimiter.started {
            match c {
                '-' if !delimiter.strip_tabs => {
                    delimiter.strip_tabs = true;
                    return true;
                }
                ' ' | '\t' => return true,
                // `<<<` is not a here-document
                '<' => {
                    self.delimiter = None;
                    return true;
                }
                _ => delimiter.started = true,
            }
        }

        match c {
            '\'' | '"' | '\\' => {
                delimiter.quoted = true;
                true
            }
            c if c.is_whitespace() || ";&|<>()".contains(c) => {
                if let Some(done) = self.delimiter.take() {
                    if !done.word.is_empty() {
                        self.pending.push(PendingHeredoc {
                            word: done.word,
                            expand: !done.quoted,
                            strip_tabs: done.strip_tabs,
                        });
                    }
                }
                false
            }
            c => {
                delimiter.word.push(c);
                true
            }
        }
    }

    fn start_pending_body(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let heredoc = self.pending.remove(0);
        self.top().quote = Quote::Heredoc {
            expand: heredoc.expand,
        };
        self.body = Some(heredoc);
        self.line.clear();
    }

    fn end_body_line(&mut self) {
        let finished = match &self.body {
            Some(heredoc) => {
                let line = if heredoc.strip_tabs {
                    self.line.trim_start_matches('\t')
                } else {
                    self.line.as_str()
                };
                line == heredoc.word
            }
            None => true,
        };
        self.line.clear();

        if finished {
            self.body = None;
            self.top().quote = Quote::Bare;
            self.start_pending_body();
        }
    }
}

/// Split `template` into segments.
///
/// Anything that does not form a valid placeholder (an unterminated `{{`,
/// an empty or invalid name, a backslash-escaped `\{{`) stays literal text.
/// Each placeholder carries the shell context it appears in so values can
/// be escaped for that context.
pub fn parse(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = ShellState::new();
    let mut literal_start = 0;
    let mut scanned = 0;
    let mut cursor = 0;

    while let Some(offset) = template[cursor..].find(OPEN) {
        let open = cursor + offset;
        let inner_start = open + OPEN.len();

        let Some(close_offset) = template[inner_start..].find(CLOSE) else {
            break;
        };
        let close = inner_start + close_offset;
        let name = template[inner_start..close].trim();

        state.advance(&template[scanned..open]);
        scanned = open;

        if is_valid_name(name) && !state.is_escaped() {
            if open > literal_start {
                segments.push(Segment::Literal(&template[literal_start..open]));
            }
            segments.push(Segment::Placeholder {
                name,
                context: state.context(),
            });
            state.substituted();
            cursor = close + CLOSE.len();
            literal_start = cursor;
            scanned = cursor;
        } else {
            // `{{{name}}}` and similar: retry from the next brace
            cursor = open + 1;
        }
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }

    segments
}

/// Distinct placeholder names in order of first appearance
pub fn referenced_names(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for segment in parse(template) {
        if let Segment::Placeholder { name, .. } = segment {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

pub fn has_placeholders(template: &str) -> bool {
    parse(template)
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare(name: &str) -> Segment<'_> {
        Segment::Placeholder {
            name,
            context: Context::BARE,
        }
    }

    fn contexts(template: &str) -> Vec<Context> {
        parse(template)
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder { context, .. } => Some(context),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_simple_placeholder() {
        assert_eq!(
            parse("ping {{target}}"),
            vec![Segment::Literal("ping "), bare("target")]
        );
    }

    #[test]
    fn test_parse_trims_inner_whitespace() {
        assert_eq!(
            parse("{{ a }}-{{b}}"),
            vec![bare("a"), Segment::Literal("-"), bare("b")]
        );
    }

    #[test]
    fn test_unterminated_and_invalid_placeholders_stay_literal() {
        assert_eq!(parse("echo {{oops"), vec![Segment::Literal("echo {{oops")]);
        assert_eq!(parse("echo {{}}"), vec![Segment::Literal("echo {{}}")]);
        assert_eq!(
            parse("awk '{{print $1}}'"),
            vec![Segment::Literal("awk '{{print $1}}'")]
        );
    }

    #[test]
    fn test_escaped_braces_stay_literal() {
        assert_eq!(parse("echo \\{{x}}"), vec![Segment::Literal("echo \\{{x}}")]);
        assert_eq!(
            parse("echo \\\\{{x}}"),
            vec![Segment::Literal("echo \\\\"), bare("x")]
        );
    }

    #[test]
    fn test_triple_braces_keep_outer_brace_literal() {
        assert_eq!(
            parse("{{{x}}}"),
            vec![Segment::Literal("{"), bare("x"), Segment::Literal("}")]
        );
    }

    #[test]
    fn test_quote_contexts() {
        assert_eq!(
            contexts(r#"git commit -m "{{msg}}" && echo '{{a}}' {{b}}"#),
            vec![
                Context::new(Quote::Double),
                Context::new(Quote::Single),
                Context::BARE,
            ]
        );
        assert_eq!(
            contexts(r#"echo "it's {{x}}" 'say "{{y}}"'"#),
            vec![Context::new(Quote::Double), Context::new(Quote::Single)]
        );
        assert_eq!(contexts(r#"echo \"{{x}}"#), vec![Context::BARE]);
    }

    #[test]
    fn test_command_substitution_contexts() {
        assert_eq!(
            contexts(r#"echo "$(printf '%s' {{x}})" "{{y}}""#),
            vec![Context::BARE, Context::new(Quote::Double)]
        );
        assert_eq!(
            contexts("echo `echo {{x}}` {{y}}"),
            vec![
                Context {
                    quote: Quote::Bare,
                    backticks: 1
                },
                Context::BARE,
            ]
        );
        assert_eq!(contexts("echo $((1 << 2)) {{x}}"), vec![Context::BARE]);
    }

    #[test]
    fn test_comment_and_heredoc_contexts() {
        assert_eq!(
            contexts("echo {{a}} # note {{b}}\necho {{c}}"),
            vec![Context::BARE, Context::new(Quote::Comment), Context::BARE]
        );
        assert_eq!(contexts("echo a#{{x}}"), vec![Context::BARE]);
        assert_eq!(
            contexts("cat <<EOF\nhi {{a}}\nEOF\necho {{b}}"),
            vec![Context::new(Quote::Heredoc { expand: true }), Context::BARE]
        );
        assert_eq!(
            contexts("cat <<-'END'\n\t{{a}}\n\tEND\n{{b}}"),
            vec![Context::new(Quote::Heredoc { expand: false }), Context::BARE]
        );
    }

    #[test]
    fn test_referenced_names_are_distinct_and_ordered() {
        assert_eq!(
            referenced_names("cp {{src}} {{dest}} && ls {{src}}"),
            vec!["src", "dest"]
        );
        assert!(referenced_names("build").is_empty());
        assert!(has_placeholders("x {{y}}"));
        assert!(!has_placeholders("x {{ }}"));
    }
}
