use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

/// Where the shell gets its input lines from.
pub trait LineSource {
    /// The next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads lines from stdin, showing the prompt only when a user is typing.
pub struct ShellPrompt {
    prompt: String,
    interactive: bool,
}

impl ShellPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        ShellPrompt {
            prompt: prompt.into(),
            interactive: io::stdin().is_terminal(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn show_prompt(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(self.prompt.as_bytes())?;
        stdout.flush()
    }
}

impl LineSource for ShellPrompt {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.is_interactive() {
            self.show_prompt()?;
        }
        let mut buf = String::new();
        if io::stdin().lock().read_line(&mut buf)? == 0 {
            // EOF (e.g., Ctrl-D)
            if self.is_interactive() {
                println!();
            }
            return Ok(None);
        }
        Ok(Some(strip_terminator(buf)))
    }
}

/// Feeds a fixed list of lines, for embedding and tests.
#[derive(Debug, Default)]
pub struct ScriptSource {
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptSource {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptSource {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

fn strip_terminator(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
