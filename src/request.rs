/// One prompt request as assembled from the wire. Text fields hold raw
/// percent-decoded bytes; whether they are valid UTF-8 is only decided at
/// dispatch time. Output flags are written back by the dispatcher and read
/// by the server when it maps an outcome to a reply.
#[derive(Debug, Default, Clone)]
pub struct Request {
    pub title: Option<Vec<u8>>,
    pub description: Option<Vec<u8>>,
    pub prompt: Option<Vec<u8>>,
    pub error: Option<Vec<u8>>,
    pub quality_bar_label: Option<Vec<u8>>,
    pub quality_bar_tooltip: Option<Vec<u8>>,
    pub ok_label: Option<Vec<u8>>,
    pub default_ok_label: Option<Vec<u8>>,
    pub cancel_label: Option<Vec<u8>>,
    pub default_cancel_label: Option<Vec<u8>>,
    pub not_ok_label: Option<Vec<u8>>,
    pub has_quality_bar: bool,
    pub one_button: bool,
    pub canceled: bool,
    pub locale_error: bool,
}

impl Request {
    /// Three-choice mode is keyed off the presence of the third label, even
    /// an empty one.
    pub fn has_not_ok(&self) -> bool {
        self.not_ok_label.is_some()
    }

    /// Clear the per-dispatch output flags. Text fields persist across
    /// requests; the caller re-sets them as needed.
    pub fn reset_outputs(&mut self) {
        self.canceled = false;
        self.locale_error = false;
    }
}

/// What the user did, as reported back to the caller. `SecretLength` carries
/// the number of secret bytes written to the caller's buffer, excluding the
/// terminating zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    SecretLength(usize),
    Declined,
    Confirmed,
    NotConfirmed,
}
