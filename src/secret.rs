use std::fmt;

use zeroize::Zeroize;

/// Caller-owned destination for the secret. A single operation covers both
/// "request capacity" and "expose writable bytes": `grant(n)` either returns
/// a buffer of at least `n` bytes or refuses.
pub trait SecretSink {
    fn grant(&mut self, len: usize) -> Option<&mut [u8]>;
}

/// Copy the accepted secret into the caller's buffer with a terminating
/// zero. Returns the secret's byte length, or `None` when the sink refuses
/// the required capacity; nothing is written in that case. The transient
/// value is consumed either way and wiped on drop.
pub fn write_secret(sink: &mut dyn SecretSink, secret: SecretString) -> Option<usize> {
    let len = secret.as_bytes().len();
    let buf = sink.grant(len + 1)?;
    buf[..len].copy_from_slice(secret.as_bytes());
    buf[len] = 0;
    Some(len)
}

/// Secret bytes in transit between the UI and the sink. Wiped on drop and
/// redacted from Debug output.
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        SecretString(value)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(****)")
    }
}

/// Sink backed by a plain byte vector, used by the server to stage the
/// secret for the reply line. Grants above `limit` are refused so the reply
/// always fits one wire line. The whole capacity is wiped on drop and on
/// `wipe`.
pub struct VecSink {
    buf: Vec<u8>,
    limit: usize,
}

impl VecSink {
    pub fn with_limit(limit: usize) -> Self {
        VecSink {
            buf: Vec::new(),
            limit,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn wipe(&mut self) {
        self.buf.zeroize();
    }
}

impl SecretSink for VecSink {
    fn grant(&mut self, len: usize) -> Option<&mut [u8]> {
        if len > self.limit {
            return None;
        }
        self.buf.resize(len, 0);
        Some(&mut self.buf[..])
    }
}

impl Drop for VecSink {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// Line editor for the secret entry field. Cursor positions are in chars.
/// Capacity is reserved up front so typing rarely reallocates; reallocation
/// would leave stale copies the final wipe cannot reach.
pub struct SecretInput {
    buffer: Vec<char>,
    cursor: usize,
}

impl Default for SecretInput {
    fn default() -> Self {
        SecretInput {
            buffer: Vec::with_capacity(256),
            cursor: 0,
        }
    }
}

impl SecretInput {
    pub fn char_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Read-only view of the entered chars for rendering-side scoring.
    /// Callers must not copy these out; `take` is the only exit path.
    pub fn chars(&self) -> &[char] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.buffer.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.buffer.len() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    /// Ctrl-U: discard the whole entry, wiping the stored chars.
    pub fn wipe(&mut self) {
        self.buffer.zeroize();
        self.cursor = 0;
    }

    /// Hand the entered value over, leaving the editor empty and wiped.
    pub fn take(&mut self) -> SecretString {
        let value: String = self.buffer.iter().collect();
        self.wipe();
        SecretString::new(value)
    }
}

impl Drop for SecretInput {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}
