#![forbid(unsafe_code)]

//! Line-oriented UI event scripts.
//!
//! Each non-blank line not starting with `#` is one event:
//!
//! ```text
//! name Sam        # replace the field text
//! type son        # type characters one by one
//! backspace
//! blur
//! gender Male
//! show
//! quit
//! ```

use std::fmt;
use std::io::BufRead;

use crate::app::Gender;

/// One simulated user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SetName(String),
    TypeName(String),
    Backspace,
    Blur,
    SelectGender(Gender),
    Show,
    Quit,
}

/// A script line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Parse a single line. Blank lines and comments yield `Ok(None)`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<UiEvent>, ScriptError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    let err = |message: String| ScriptError {
        line: line_no,
        message,
    };

    let event = match command.to_ascii_lowercase().as_str() {
        "name" => UiEvent::SetName(rest.to_string()),
        "type" if !rest.is_empty() => UiEvent::TypeName(rest.to_string()),
        "type" => return Err(err("type needs text".into())),
        "backspace" => UiEvent::Backspace,
        "blur" => UiEvent::Blur,
        "gender" => match rest.parse() {
            Ok(gender) => UiEvent::SelectGender(gender),
            Err(bad) => return Err(err(bad)),
        },
        "show" => UiEvent::Show,
        "quit" | "exit" => UiEvent::Quit,
        other => return Err(err(format!("unknown command '{other}'"))),
    };
    Ok(Some(event))
}

/// Read events from `reader`, handing each one to `sink` in order.
///
/// Bad lines are passed to `on_error` and skipped. Reading stops at end of
/// input, at a `quit` event (which is still delivered), or when `sink`
/// returns `false`.
pub fn read_events<R: BufRead>(
    reader: R,
    mut sink: impl FnMut(UiEvent) -> bool,
    mut on_error: impl FnMut(ScriptError),
) -> std::io::Result<()> {
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(idx + 1, &line) {
            Ok(Some(event)) => {
                let quit = event == UiEvent::Quit;
                if !sink(event) || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => on_error(e),
        }
    }
    Ok(())
}
