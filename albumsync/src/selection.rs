use std::collections::BTreeSet;
use std::io::{BufRead, StdinLock, Stdout, Write};

/// Picks which pending directories to mirror, and in what order.
///
/// The result should be a subset of `candidates`; the runner drops anything
/// else.
pub trait SelectionPolicy {
    fn select(&mut self, candidates: &[String]) -> Vec<String>;
}

impl<F> SelectionPolicy for F
where
    F: FnMut(&[String]) -> Vec<String>,
{
    fn select(&mut self, candidates: &[String]) -> Vec<String> {
        self(candidates)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl SelectionPolicy for SelectAll {
    fn select(&mut self, candidates: &[String]) -> Vec<String> {
        candidates.to_vec()
    }
}

/// Selects the given names, in the given order, when they are pending.
#[derive(Debug, Clone, Default)]
pub struct SelectNames {
    names: Vec<String>,
}

impl SelectNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SelectionPolicy for SelectNames {
    fn select(&mut self, candidates: &[String]) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| candidates.contains(name))
            .cloned()
            .collect()
    }
}

/// Numbered menu on a terminal (or any reader/writer pair).
pub struct PromptSelection<R, W> {
    input: R,
    output: W,
}

impl PromptSelection<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptSelection<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, candidates: &[String]) -> std::io::Result<Vec<String>> {
        for (index, name) in candidates.iter().enumerate() {
            writeln!(self.output, "{index}) {name}")?;
        }
        write!(self.output, "Which folders to sync? ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let parsed = parse_indices(&line, candidates.len());
        for token in &parsed.rejected {
            writeln!(self.output, "ignoring {token:?}")?;
        }

        let selected: Vec<String> = parsed
            .indices
            .iter()
            .map(|&index| candidates[index].clone())
            .collect();
        writeln!(self.output, "Selected: {}", selected.join(", "))?;
        Ok(selected)
    }
}

impl<R: BufRead, W: Write> SelectionPolicy for PromptSelection<R, W> {
    fn select(&mut self, candidates: &[String]) -> Vec<String> {
        if candidates.is_empty() {
            return Vec::new();
        }
        match self.prompt(candidates) {
            Ok(selected) => selected,
            Err(err) => {
                tracing::warn!(%err, "selection prompt failed; nothing selected");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ParsedIndices {
    indices: Vec<usize>,
    rejected: Vec<String>,
}

/// Accepts `0 2`, `0,2`, ranges like `1-3`, and `all` / `*`.
fn parse_indices(line: &str, len: usize) -> ParsedIndices {
    let mut parsed = ParsedIndices::default();
    let mut seen = BTreeSet::new();
    let mut push = |index: usize, parsed: &mut ParsedIndices| {
        if seen.insert(index) {
            parsed.indices.push(index);
        }
    };

    for token in line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        if token.eq_ignore_ascii_case("all") || token == "*" {
            for index in 0..len {
                push(index, &mut parsed);
            }
            continue;
        }
        let range = match token.split_once('-') {
            Some((start, end)) => start.parse::<usize>().ok().zip(end.parse::<usize>().ok()),
            None => token.parse::<usize>().ok().map(|index| (index, index)),
        };
        match range {
            Some((start, end)) if start <= end && end < len => {
                for index in start..=end {
                    push(index, &mut parsed);
                }
            }
            _ => parsed.rejected.push(token.to_string()),
        }
    }
    parsed
}
