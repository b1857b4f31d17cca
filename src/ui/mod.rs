pub mod headless;
pub mod term;

use crate::secret::SecretString;

/// Display-ready content for one dialog, produced by the dispatcher. Labels
/// are already decoded and accelerator-escaped (`&X` marks X, `&&` is a
/// literal ampersand).
#[derive(Debug, Clone)]
pub struct DialogFields {
    pub title: String,
    pub description: String,
    pub error: String,
    pub body: DialogBody,
}

#[derive(Debug, Clone)]
pub enum DialogBody {
    SecretEntry {
        prompt: String,
        quality_bar: Option<QualityBar>,
        ok: String,
        cancel: String,
    },
    Message {
        buttons: ButtonRow,
    },
}

#[derive(Debug, Clone, Default)]
pub struct QualityBar {
    pub label: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonRow {
    One { ok: String },
    Two { ok: String, cancel: String },
    Three { ok: String, not_ok: String, cancel: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Ok,
    Cancel,
    NotOk,
}

#[derive(thiserror::Error, Debug)]
pub enum UiError {
    #[error("no usable terminal for prompting")]
    NoTerminal,
    #[error("prompt fields were not set")]
    NoDialog,
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The dispatcher drives any prompt backend through this seam: push the
/// resolved fields, block until the user acts, then (for secret entry)
/// collect the entered value. `take_secret` leaves the backend's own copy
/// wiped.
pub trait PromptUi {
    fn set_fields(&mut self, fields: DialogFields);
    fn run(&mut self) -> Result<UserAction, UiError>;
    fn take_secret(&mut self) -> SecretString;
}

/// Split a display label into visible text and the char index of its
/// accelerator. A dangling trailing `&` is dropped.
pub fn parse_label(label: &str) -> (String, Option<usize>) {
    let mut text = String::with_capacity(label.len());
    let mut accel = None;
    let mut chars = label.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '&' {
            match chars.next() {
                Some('&') => text.push('&'),
                Some(marked) => {
                    if accel.is_none() {
                        accel = Some(text.chars().count());
                    }
                    text.push(marked);
                }
                None => {}
            }
        } else {
            text.push(ch);
        }
    }
    (text, accel)
}

#[cfg(test)]
mod tests {
    use super::parse_label;

    #[test]
    fn parse_label_finds_accelerator() {
        assert_eq!(parse_label("&OK"), ("OK".to_string(), Some(0)));
        assert_eq!(parse_label("Do &not"), ("Do not".to_string(), Some(3)));
    }

    #[test]
    fn parse_label_unescapes_double_ampersand() {
        assert_eq!(parse_label("Salt && Pepper"), ("Salt & Pepper".to_string(), None));
    }

    #[test]
    fn parse_label_first_marker_wins() {
        assert_eq!(parse_label("&a&b"), ("ab".to_string(), Some(0)));
    }

    #[test]
    fn parse_label_drops_trailing_ampersand() {
        assert_eq!(parse_label("x&"), ("x".to_string(), None));
    }
}
