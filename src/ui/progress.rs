//! Build progress rendering with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Writer handed to the build pipeline as its output sink.
///
/// Cache status lines are always printed. Build output is condensed: in a
/// terminal, `STEP N/M:` lines drive an indicatif bar and other lines show
/// as its message; in CI only the step lines are printed.
pub struct BuildOutput {
    bar: Option<ProgressBar>,
    pending: Vec<u8>,
}

impl BuildOutput {
    pub fn new(ctx: &UiContext) -> Self {
        let bar = ctx.is_interactive().then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
            {
                bar.set_style(
                    bar_style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self {
            bar,
            pending: Vec::new(),
        }
    }

    fn on_line(&self, line: &str) {
        if let Some(image) = building_header(line) {
            match self.bar {
                Some(ref bar) => {
                    bar.set_prefix(format!("Building {}", image));
                    bar.set_length(0);
                    bar.set_position(0);
                    bar.set_message(String::new());
                    bar.reset_elapsed();
                }
                None => println!("{}", line),
            }
            return;
        }

        if is_status_line(line) {
            match self.bar {
                Some(ref bar) => bar.println(status_style(line)),
                None => println!("{}", line),
            }
            return;
        }

        if let Some((n, total, instruction)) = parse_step_line(line) {
            match self.bar {
                Some(ref bar) => {
                    bar.set_length(total);
                    bar.set_position(n);
                    bar.set_message(instruction.to_string());
                }
                None => println!("  STEP {}/{}: {}", n, total, instruction),
            }
            return;
        }

        if let Some(ref bar) = self.bar {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !is_build_noise(trimmed) {
                bar.set_message(truncate(trimmed, 60));
            }
        }
    }

    /// Flush any partial line and remove the bar
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
            self.on_line(&rest);
        }
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

impl Write for BuildOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]);
            self.on_line(line.trim_end_matches('\r'));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// `Building [image]...` header, as written by the runtime builder
fn building_header(line: &str) -> Option<&str> {
    line.strip_prefix("Building [")?.strip_suffix("]...")
}

fn is_status_line(line: &str) -> bool {
    line.starts_with("Checking cache")
        || line.starts_with(" - ")
        || line.starts_with("Warning:")
}

fn status_style(line: &str) -> String {
    if line.ends_with(": Found") {
        format!("{}", style(line).green())
    } else if line.starts_with("Warning:") {
        format!("{}", style(line).yellow())
    } else {
        line.to_string()
    }
}

fn truncate(line: &str, max: usize) -> String {
    if line.chars().count() > max {
        let head: String = line.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}

/// Runtime bookkeeping lines not worth showing
fn is_build_noise(line: &str) -> bool {
    line.starts_with("--->")
        || line.starts_with("-->")
        || line.starts_with("Removing intermediate")
        || line.starts_with("COMMIT")
}

/// Parse a build step line like `STEP N/M: INSTRUCTION args...`
fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    let rest = line.strip_prefix("STEP ")?;
    let slash = rest.find('/')?;
    let colon = rest.find(':')?;
    if colon <= slash {
        return None;
    }
    let n: u64 = rest[..slash].parse().ok()?;
    let total: u64 = rest[slash + 1..colon].parse().ok()?;
    Some((n, total, rest[colon + 1..].trim()))
}
