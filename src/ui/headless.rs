use super::{DialogFields, PromptUi, UiError, UserAction};
use crate::secret::SecretString;

/// Stands in when no terminal can be opened. Every prompt fails with
/// `NoTerminal`, which the dispatcher contains as a canceled decline, so the
/// calling agent gets a clean answer instead of a hang.
#[derive(Default)]
pub struct HeadlessUi;

impl PromptUi for HeadlessUi {
    fn set_fields(&mut self, _fields: DialogFields) {}

    fn run(&mut self) -> Result<UserAction, UiError> {
        Err(UiError::NoTerminal)
    }

    fn take_secret(&mut self) -> SecretString {
        SecretString::new(String::new())
    }
}
