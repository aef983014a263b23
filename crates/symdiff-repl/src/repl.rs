use itertools::Itertools;
use lazy_regex::regex_find;
use log::warn;
use std::borrow::Cow::{self, Borrowed, Owned};
use strum::IntoEnumIterator;

use rustyline::completion::{Completer, Pair};
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter, MatchingBracketHighlighter};
use rustyline::validate::MatchingBracketValidator;
use rustyline::{Completer, Helper, Hinter, Validator};
use rustyline::{CompletionType, Config, Editor};

use symdiff::tree::OpKind;

use crate::exec::{ExecContext, ExecResult, exec_line};

const HISTORY: &str = "symdiff_history.txt";

#[derive(Helper, Completer, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Completer)]
    completer: KeywordCompleter,
    highlighter: MatchingBracketHighlighter,
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
    colored_prompt: String,
}

struct KeywordCompleter {}

impl Completer for KeywordCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        if pos == line.len()
            && let Some(partial) = regex_find!(r"[a-z]+$", line)
        {
            let start = pos - partial.len();
            let pairs = OpKind::iter()
                .filter_map(OpKind::keyword)
                .filter(|keyword| keyword.starts_with(partial))
                .map(|keyword| Pair {
                    display: keyword.to_owned(),
                    replacement: format!("{keyword}("),
                })
                .collect_vec();
            Ok((start, pairs))
        } else {
            Ok((0, Vec::with_capacity(0)))
        }
    }
}

impl Highlighter for ReplHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Borrowed(&self.colored_prompt)
        } else {
            Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned("\x1b[1m".to_owned() + hint + "\x1b[m")
    }

    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_char(&self, line: &str, pos: usize, kind: CmdKind) -> bool {
        self.highlighter.highlight_char(line, pos, kind)
    }
}

pub fn repl(exec_ctx: &mut ExecContext) -> rustyline::Result<()> {
    println!("\nStarting symdiff REPL...");

    let prompt = "d> ";

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();
    let helper = ReplHelper {
        completer: KeywordCompleter {},
        highlighter: MatchingBracketHighlighter::new(),
        colored_prompt: format!("\x1b[1;32m{prompt}\x1b[0m"),
        validator: MatchingBracketValidator::new(),
    };

    let mut editor = Editor::with_config(config)?;
    editor.set_helper(Some(helper));

    editor.set_auto_add_history(true);

    if editor.load_history(HISTORY).is_err() {
        println!("No history file found. Creating empty file \n");
    }

    exec_ctx.is_repl = true;

    loop {
        println!();
        let read_result = editor.readline(prompt);

        let line = match read_result {
            Ok(line) => line,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                break;
            }
            Err(err) => {
                println!("Encountered error while reading input: {err}");
                continue;
            }
        };

        if let Err(err) = editor.save_history(HISTORY) {
            warn!("could not save history to {HISTORY}: {err}");
        }

        if let Some(ExecResult::Exit) = exec_line(&line, exec_ctx) {
            println!("Exiting...");
            break;
        }
    }
    Ok(())
}
