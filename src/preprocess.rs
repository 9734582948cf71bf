//! Source preprocessing: comments, metadata, `EQU` substitution and
//! `FOR`/`ROF` expansion.
//!
//! The output is a flat list of lines still to be assembled. Nothing here
//! knows about opcodes or addressing modes; only the words `EQU`, `FOR`,
//! `ROF` and `END` are recognised.

use std::collections::HashMap;

use tracing::debug;

use crate::config::MarsConfig;
use crate::error::{AsmError, Location, Result};
use crate::expr::{self, EvalContext, predefined};
use crate::lexer::{Token, TokenKind, is_ident_char, tokenize};

/// Guard against runaway `FOR` nesting.
const MAX_EXPANDED_LINES: usize = 1 << 20;

/// Bound on `ROF` passes, so blocks that emit nothing still terminate.
const MAX_FOR_ITERATIONS: usize = 1 << 20;

/// How many rounds of `EQU` replacement a line may need before it is
/// considered self-referential.
const MAX_EQU_DEPTH: usize = 32;

/// A line of code tagged with the source line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub line: usize,
    pub text: String,
}

/// Information carried in structured comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// The `;redcode` line as written, e.g. `redcode-94`.
    pub redcode: Option<String>,
    pub name: Option<String>,
    pub author: Option<String>,
    pub strategy: Vec<String>,
}

/// Result of preprocessing a warrior.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub lines: Vec<SourceLine>,
    pub metadata: Metadata,
}

enum LineKind {
    For {
        counter: Option<String>,
        count: String,
    },
    Rof,
    Plain(String),
}

struct RawLine {
    line: usize,
    kind: LineKind,
}

/// One active `FOR` block.
struct Frame {
    counter: Option<String>,
    index: i64,
    count: i64,
    body_start: usize,
}

struct ForContext<'a> {
    config: &'a MarsConfig,
    frames: &'a [Frame],
}

impl EvalContext for ForContext<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.counter.as_deref() == Some(name))
            .map(|f| f.index)
            .or_else(|| predefined(name, self.config))
    }
}

/// Index of a keyword that may follow a single (optionally colon-terminated)
/// label, or start the line.
fn keyword_index(tokens: &[Token], word: &str) -> Option<usize> {
    if tokens.first()?.is_word(word) {
        return Some(0);
    }
    if tokens[0].kind != TokenKind::Ident {
        return None;
    }
    match tokens.get(1) {
        Some(t) if t.is_word(word) => Some(1),
        Some(t) if t.is_punct(":") && tokens.get(2).is_some_and(|t| t.is_word(word)) => Some(2),
        _ => None,
    }
}

fn split_comment(raw: &str) -> (&str, Option<&str>) {
    match raw.find(';') {
        Some(pos) => (&raw[..pos], Some(&raw[pos + 1..])),
        None => (raw, None),
    }
}

fn read_metadata(comment: &str, line: usize, metadata: &mut Metadata, asserts: &mut Vec<(String, usize)>) {
    let comment = comment.trim_end();
    let (word, rest) = match comment.find(char::is_whitespace) {
        Some(pos) => (&comment[..pos], comment[pos..].trim()),
        None => (comment, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        w if w.starts_with("redcode") => metadata.redcode = Some(comment.to_string()),
        "name" => metadata.name = Some(rest.to_string()),
        "author" => metadata.author = Some(rest.to_string()),
        "strategy" => metadata.strategy.push(rest.to_string()),
        "assert" => asserts.push((rest.to_string(), line)),
        _ => {}
    }
}

/// Replace identifiers for which `map` returns text. Identifiers right after
/// a `.` are modifiers and are left alone.
fn substitute_idents(
    text: &str,
    line: usize,
    map: impl Fn(&str) -> Option<String>,
) -> Result<Option<String>> {
    let tokens = tokenize(text, line)?;
    let mut out = text.to_string();
    let mut changed = false;
    for (i, token) in tokens.iter().enumerate().rev() {
        if token.kind != TokenKind::Ident || (i > 0 && tokens[i - 1].is_punct(".")) {
            continue;
        }
        if let Some(replacement) = map(&token.text) {
            out.replace_range(token.start..token.end(), &replacement);
            changed = true;
        }
    }
    Ok(changed.then_some(out))
}

/// Replace `&counter` with the two-digit iteration index.
fn paste_counters(text: &str, frames: &[Frame]) -> String {
    let mut out = text.to_string();
    for frame in frames.iter().rev() {
        let Some(name) = &frame.counter else {
            continue;
        };
        let pattern = format!("&{name}");
        let mut search = 0;
        while let Some(found) = out[search..].find(&pattern) {
            let at = search + found;
            let end = at + pattern.len();
            if out.as_bytes().get(end).copied().is_some_and(is_ident_char) {
                search = end;
                continue;
            }
            let index = format!("{:02}", frame.index);
            out.replace_range(at..end, &index);
            search = at + index.len();
        }
    }
    out
}

fn substitute_equ(text: &str, line: usize, equs: &HashMap<String, String>) -> Result<String> {
    let mut current = text.to_string();
    for _ in 0..MAX_EQU_DEPTH {
        match substitute_idents(&current, line, |name| equs.get(name).cloned())? {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
    Err(AsmError::syntax(
        "recursive EQU definition",
        Location::line(line),
    ))
}

fn substitute_counters(text: &str, line: usize, frames: &[Frame]) -> Result<String> {
    let replaced = substitute_idents(text, line, |name| {
        frames
            .iter()
            .rev()
            .find(|f| f.counter.as_deref() == Some(name))
            .map(|f| f.index.to_string())
    })?;
    Ok(replaced.unwrap_or_else(|| text.to_string()))
}

/// Apply every substitution a line is subject to inside the current frames.
fn substitute_line(
    text: &str,
    line: usize,
    equs: &HashMap<String, String>,
    frames: &[Frame],
) -> Result<String> {
    let pasted = paste_counters(text, frames);
    let expanded = substitute_equ(&pasted, line, equs)?;
    substitute_counters(&expanded, line, frames)
}

/// Find the `ROF` matching each `FOR`.
fn match_blocks(lines: &[RawLine]) -> Result<HashMap<usize, usize>> {
    let mut open = Vec::new();
    let mut matching = HashMap::new();
    for (i, raw) in lines.iter().enumerate() {
        match raw.kind {
            LineKind::For { .. } => open.push(i),
            LineKind::Rof => {
                let start = open.pop().ok_or(AsmError::UnterminatedForBlock {
                    at: Location::line(raw.line),
                })?;
                matching.insert(start, i);
            }
            LineKind::Plain(_) => {}
        }
    }
    if let Some(&start) = open.last() {
        return Err(AsmError::UnterminatedForBlock {
            at: Location::line(lines[start].line),
        });
    }
    Ok(matching)
}

/// Preprocess a warrior's source into a flat line stream.
pub fn expand(source: &str, config: &MarsConfig) -> Result<Expansion> {
    let mut metadata = Metadata::default();
    let mut asserts = Vec::new();
    let mut equs: HashMap<String, String> = HashMap::new();
    let mut raw_lines = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let (code, comment) = split_comment(raw);
        if code.trim().is_empty() {
            if let Some(comment) = comment {
                read_metadata(comment, line, &mut metadata, &mut asserts);
            }
            continue;
        }

        let tokens = tokenize(code, line)?;

        if let Some(at) = keyword_index(&tokens, "EQU") {
            if at == 0 {
                return Err(AsmError::syntax("EQU without a name", tokens[0].location()));
            }
            let name = tokens[0].text.clone();
            if equs.contains_key(&name) {
                return Err(AsmError::DuplicateLabel {
                    name,
                    at: tokens[0].location(),
                });
            }
            let value = code[tokens[at].end()..].trim().to_string();
            equs.insert(name, value);
            continue;
        }

        if let Some(at) = keyword_index(&tokens, "FOR") {
            let counter = (at > 0).then(|| tokens[0].text.clone());
            let count = code[tokens[at].end()..].trim().to_string();
            raw_lines.push(RawLine {
                line,
                kind: LineKind::For { counter, count },
            });
            continue;
        }

        if tokens.len() == 1 && tokens[0].is_word("ROF") {
            raw_lines.push(RawLine {
                line,
                kind: LineKind::Rof,
            });
            continue;
        }

        let is_end = keyword_index(&tokens, "END").is_some();
        raw_lines.push(RawLine {
            line,
            kind: LineKind::Plain(code.to_string()),
        });
        if is_end {
            break;
        }
    }

    for (text, line) in &asserts {
        let substituted = substitute_equ(text, *line, &equs)?;
        let tokens = tokenize(&substituted, *line)?;
        let value = expr::evaluate(
            &tokens,
            Location::line(*line),
            &expr::ConstantContext { config },
        )?;
        if value == 0 {
            return Err(AsmError::AssertionFailed {
                expression: text.clone(),
                at: Location::line(*line),
            });
        }
    }

    let matching = match_blocks(&raw_lines)?;
    let mut frames: Vec<Frame> = Vec::new();
    let mut lines = Vec::new();
    let mut iterations = 0;
    let mut i = 0;

    while i < raw_lines.len() {
        let raw = &raw_lines[i];
        match &raw.kind {
            LineKind::For { counter, count } => {
                let text = substitute_line(count, raw.line, &equs, &frames)?;
                let tokens = tokenize(&text, raw.line)?;
                let n = expr::evaluate(
                    &tokens,
                    Location::line(raw.line),
                    &ForContext {
                        config,
                        frames: &frames,
                    },
                )?;
                if n < 0 {
                    return Err(AsmError::InvalidForCount {
                        count: n,
                        at: Location::line(raw.line),
                    });
                }
                if n == 0 {
                    i = matching[&i] + 1;
                    continue;
                }
                frames.push(Frame {
                    counter: counter.clone(),
                    index: 1,
                    count: n,
                    body_start: i + 1,
                });
                i += 1;
            }
            LineKind::Rof => {
                let Some(frame) = frames.last_mut() else {
                    return Err(AsmError::UnterminatedForBlock {
                        at: Location::line(raw.line),
                    });
                };
                if frame.index < frame.count {
                    iterations += 1;
                    if iterations > MAX_FOR_ITERATIONS {
                        return Err(AsmError::syntax(
                            "FOR expansion is too large",
                            Location::line(raw.line),
                        ));
                    }
                    frame.index += 1;
                    i = frame.body_start;
                } else {
                    frames.pop();
                    i += 1;
                }
            }
            LineKind::Plain(text) => {
                let text = substitute_line(text, raw.line, &equs, &frames)?;
                lines.push(SourceLine {
                    line: raw.line,
                    text,
                });
                if lines.len() > MAX_EXPANDED_LINES {
                    return Err(AsmError::syntax(
                        "FOR expansion is too large",
                        Location::line(raw.line),
                    ));
                }
                i += 1;
            }
        }
    }

    debug!(lines = lines.len(), equs = equs.len(), "source expanded");
    Ok(Expansion { lines, metadata })
}
