use crate::request::{Outcome, Request};
use crate::secret::{write_secret, SecretSink};
use crate::text::{decode_text, escape_accelerator, DecodePolicy, TextError};
use crate::ui::{ButtonRow, DialogBody, DialogFields, PromptUi, QualityBar, UiError, UserAction};

pub const DEFAULT_OK: &str = "&OK";
pub const DEFAULT_CANCEL: &str = "&Cancel";

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidText(#[from] TextError),
    #[error("prompt backend failed: {0}")]
    Ui(#[from] UiError),
}

fn button_label(
    explicit: Option<&[u8]>,
    default: Option<&[u8]>,
    builtin: &str,
    policy: DecodePolicy,
) -> Result<String, TextError> {
    match explicit.or(default) {
        Some(raw) => Ok(escape_accelerator(&decode_text(raw, policy)?)),
        None => Ok(builtin.to_string()),
    }
}

fn plain_field(raw: Option<&[u8]>, policy: DecodePolicy) -> Result<String, TextError> {
    match raw {
        Some(raw) => decode_text(raw, policy),
        None => Ok(String::new()),
    }
}

/// Run one request against the UI. The request is a secret-entry prompt
/// exactly when a sink is supplied; otherwise it is a notification. All text
/// is decoded before the UI is constructed, so a strict-policy decode
/// failure never shows a dialog with corrupted text.
pub fn dispatch(
    request: &mut Request,
    ui: &mut dyn PromptUi,
    sink: Option<&mut dyn SecretSink>,
    policy: DecodePolicy,
) -> Result<Outcome, DispatchError> {
    let ok = button_label(
        request.ok_label.as_deref(),
        request.default_ok_label.as_deref(),
        DEFAULT_OK,
        policy,
    )?;
    let cancel = button_label(
        request.cancel_label.as_deref(),
        request.default_cancel_label.as_deref(),
        DEFAULT_CANCEL,
        policy,
    )?;
    let title = plain_field(request.title.as_deref(), policy)?;
    let description = plain_field(request.description.as_deref(), policy)?;
    let error = plain_field(request.error.as_deref(), policy)?;

    if let Some(sink) = sink {
        let prompt = plain_field(request.prompt.as_deref(), policy)?;
        let quality_bar = if request.has_quality_bar {
            Some(QualityBar {
                label: plain_field(request.quality_bar_label.as_deref(), policy)?,
                tooltip: plain_field(request.quality_bar_tooltip.as_deref(), policy)?,
            })
        } else {
            None
        };
        ui.set_fields(DialogFields {
            title,
            description,
            error,
            body: DialogBody::SecretEntry {
                prompt,
                quality_bar,
                ok,
                cancel,
            },
        });
        match ui.run()? {
            UserAction::Ok => match write_secret(sink, ui.take_secret()) {
                Some(len) => Ok(Outcome::SecretLength(len)),
                None => Ok(Outcome::Declined),
            },
            UserAction::Cancel | UserAction::NotOk => Ok(Outcome::Declined),
        }
    } else {
        let buttons = if request.one_button {
            ButtonRow::One { ok }
        } else if request.has_not_ok() {
            let raw = request.not_ok_label.as_deref().unwrap_or(&[]);
            let not_ok = escape_accelerator(&decode_text(raw, policy)?);
            ButtonRow::Three {
                ok,
                not_ok,
                cancel,
            }
        } else {
            ButtonRow::Two { ok, cancel }
        };
        ui.set_fields(DialogFields {
            title,
            description,
            error,
            body: DialogBody::Message { buttons },
        });
        let action = ui.run()?;
        if request.one_button {
            // The lone button is the acknowledgement; closing the dialog any
            // other way means the same thing.
            return Ok(Outcome::Confirmed);
        }
        match action {
            UserAction::Ok => Ok(Outcome::Confirmed),
            UserAction::NotOk => Ok(Outcome::NotConfirmed),
            UserAction::Cancel => {
                request.canceled = true;
                Ok(Outcome::Declined)
            }
        }
    }
}

/// Containment wrapper around `dispatch`: the caller always gets a
/// well-formed outcome, with the failure class recorded on the request. A
/// decode failure marks `locale_error`; any backend fault marks `canceled`.
pub fn handle_request(
    request: &mut Request,
    ui: &mut dyn PromptUi,
    sink: Option<&mut dyn SecretSink>,
    policy: DecodePolicy,
) -> Outcome {
    match dispatch(request, ui, sink, policy) {
        Ok(outcome) => outcome,
        Err(DispatchError::InvalidText(_)) => {
            request.locale_error = true;
            Outcome::Declined
        }
        Err(DispatchError::Ui(_)) => {
            request.canceled = true;
            Outcome::Declined
        }
    }
}
