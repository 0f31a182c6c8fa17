//! Line editing collaborators.
//!
//! The engine's loop only talks to the [`LineEditor`] trait. Two
//! implementations ship with the crate:
//!
//! - [`RustylineEditor`]: interactive editing, history and tab completion
//!   backed by `rustyline`.
//! - [`ScriptedLines`]: an in-memory queue of lines, for tests and for
//!   running command scripts non-interactively.

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LineEditorError {
    #[error("line editor error: {0}")]
    Readline(#[from] ReadlineError),

    #[error("history file {}: {source}", path.display())]
    History {
        path: PathBuf,
        #[source]
        source: ReadlineError,
    },
}

/// What a single read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C.
    Interrupted,
    /// Ctrl-D or end of script.
    Eof,
}

/// Completion candidates, two levels deep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionTree {
    pub items: Vec<CompletionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionItem {
    pub name: String,
    pub children: Vec<String>,
}

impl CompletionItem {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }
}

impl CompletionTree {
    /// Candidates for the word ending at `pos`, with the byte offset the
    /// replacement starts at.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let head = &line[..pos];
        let start = head
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &head[start..];
        let before: Vec<&str> = head[..start].split_whitespace().collect();

        let candidates = match before.as_slice() {
            [] => self
                .items
                .iter()
                .map(|item| item.name.as_str())
                .filter(|name| name.starts_with(word))
                .map(String::from)
                .collect(),
            [first] => self
                .items
                .iter()
                .filter(|item| item.name == *first)
                .flat_map(|item| item.children.iter())
                .filter(|child| child.starts_with(word))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        (start, candidates)
    }
}

/// The engine's view of an input source.
pub trait LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, LineEditorError>;
    fn add_history(&mut self, line: &str) -> Result<(), LineEditorError>;
    fn history(&self) -> Vec<String>;
    fn set_completions(&mut self, tree: CompletionTree);
}

struct ShellHelper {
    tree: Arc<RwLock<CompletionTree>>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, candidates) = self.tree.read().complete(line, pos);
        let pairs = candidates
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Interactive editor backed by `rustyline`.
pub struct RustylineEditor {
    editor: Editor<ShellHelper, DefaultHistory>,
    tree: Arc<RwLock<CompletionTree>>,
    history: Vec<String>,
    history_file: Option<PathBuf>,
}

impl std::fmt::Debug for RustylineEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustylineEditor")
            .field("history", &self.history.len())
            .field("history_file", &self.history_file)
            .finish_non_exhaustive()
    }
}

impl RustylineEditor {
    pub fn new(history_limit: usize) -> Result<Self, LineEditorError> {
        let config = Config::builder()
            .max_history_size(history_limit)?
            .auto_add_history(false)
            .build();
        let mut editor = Editor::with_config(config)?;
        let tree = Arc::new(RwLock::new(CompletionTree::default()));
        editor.set_helper(Some(ShellHelper {
            tree: Arc::clone(&tree),
        }));
        Ok(Self {
            editor,
            tree,
            history: Vec::new(),
            history_file: None,
        })
    }

    /// Loads history from `path` if it exists and saves to it on every
    /// accepted line.
    pub fn with_history_file(mut self, path: impl AsRef<Path>) -> Result<Self, LineEditorError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            self.editor
                .load_history(&path)
                .map_err(|source| LineEditorError::History {
                    path: path.clone(),
                    source,
                })?;
            self.history = self.editor.history().iter().cloned().collect();
            debug!(path = %path.display(), entries = self.history.len(), "loaded history");
        }
        self.history_file = Some(path);
        Ok(self)
    }
}

impl LineEditor for RustylineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, LineEditorError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn add_history(&mut self, line: &str) -> Result<(), LineEditorError> {
        self.editor.add_history_entry(line)?;
        self.history.push(line.to_string());
        if let Some(path) = &self.history_file {
            if let Err(source) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %source, "failed to save history");
                return Err(LineEditorError::History {
                    path: path.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    fn history(&self) -> Vec<String> {
        self.history.clone()
    }

    fn set_completions(&mut self, tree: CompletionTree) {
        *self.tree.write() = tree;
    }
}

/// A fixed queue of input lines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
    history: Vec<String>,
    prompts: Vec<String>,
    completions: CompletionTree,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Reads every line from `reader`.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let lines = reader.lines().collect::<io::Result<Vec<String>>>()?;
        Ok(Self::new(lines))
    }

    /// Prompts shown so far, one per read.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// The most recent completion tree pushed by the engine.
    pub fn completions(&self) -> &CompletionTree {
        &self.completions
    }
}

impl LineEditor for ScriptedLines {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, LineEditorError> {
        self.prompts.push(prompt.to_string());
        Ok(match self.lines.pop_front() {
            Some(line) => ReadOutcome::Line(line),
            None => ReadOutcome::Eof,
        })
    }

    fn add_history(&mut self, line: &str) -> Result<(), LineEditorError> {
        self.history.push(line.to_string());
        Ok(())
    }

    fn history(&self) -> Vec<String> {
        self.history.clone()
    }

    fn set_completions(&mut self, tree: CompletionTree) {
        self.completions = tree;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> CompletionTree {
        CompletionTree {
            items: vec![
                CompletionItem {
                    name: "servers".into(),
                    children: vec!["list".into(), "show".into(), "add".into()],
                },
                CompletionItem::leaf("sleep"),
                CompletionItem::leaf("echo"),
            ],
        }
    }

    #[test]
    fn test_complete_first_word() {
        let (start, found) = tree().complete("s", 1);
        assert_eq!(start, 0);
        assert_eq!(found, vec!["servers", "sleep"]);
    }

    #[test]
    fn test_complete_second_word() {
        let line = "servers s";
        let (start, found) = tree().complete(line, line.len());
        assert_eq!(start, 8);
        assert_eq!(found, vec!["show"]);

        let (_, all) = tree().complete("servers ", 8);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_complete_deeper_is_empty() {
        let line = "servers show x";
        assert!(tree().complete(line, line.len()).1.is_empty());
    }

    #[test]
    fn test_scripted_lines() {
        let mut lines = ScriptedLines::from_reader("a\nb\n".as_bytes()).unwrap();
        assert_eq!(lines.read_line("> ").unwrap(), ReadOutcome::Line("a".into()));
        assert_eq!(lines.read_line(">> ").unwrap(), ReadOutcome::Line("b".into()));
        assert_eq!(lines.read_line("> ").unwrap(), ReadOutcome::Eof);
        assert_eq!(lines.prompts(), &["> ", ">> ", "> "]);

        lines.add_history("a").unwrap();
        assert_eq!(lines.history(), vec!["a"]);
    }
}
