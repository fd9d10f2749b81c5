//! Confirmation prompts

use super::context::UiContext;
use crate::error::{DockyardError, DockyardResult};
use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stdin
///
/// Answers yes without asking when `--yes` was given. An empty answer
/// takes `default`.
pub fn confirm(ctx: &UiContext, question: &str, default: bool) -> DockyardResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }

    let suffix = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {} ", question, suffix);
    io::stdout()
        .flush()
        .map_err(|e| DockyardError::io("writing prompt", e))?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| DockyardError::io("reading confirmation", e))?;

    Ok(parse_answer(&input, default))
}

fn parse_answer(input: &str, default: bool) -> bool {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}
