use unicode_width::UnicodeWidthChar;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextError {
    #[error("text is not valid utf-8")]
    InvalidText,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    #[default]
    Fallback,
    Strict,
}

/// Convert the caller's underscore accelerator convention (`_Save`) into the
/// `&` convention the dialog renderer understands, escaping characters that
/// would otherwise be taken as markers.
pub fn escape_accelerator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut marked = false;
    for ch in raw.chars() {
        if marked {
            // `__` collapses to a literal underscore; anything else becomes
            // the `&`-marked accelerator character.
            if ch != '_' {
                out.push('&');
            }
            out.push(ch);
            marked = false;
        } else if ch == '_' {
            marked = true;
        } else if ch == '&' {
            out.push_str("&&");
        } else {
            out.push(ch);
        }
    }
    if marked {
        // A dangling trailing marker is kept rather than dropped.
        out.push('_');
    }
    out
}

/// Decode nominally-UTF-8 bytes from the wire. Callers historically mix
/// encodings, so a failed strict decode retries as Latin-1 unless the strict
/// policy is active. A literal U+FFFD in the input is indistinguishable from
/// a decoder-introduced one and takes the same path, which keeps the
/// guarantee that fallback output never contains the replacement character.
pub fn decode_text(raw: &[u8], policy: DecodePolicy) -> Result<String, TextError> {
    let decoded = String::from_utf8_lossy(raw);
    if !decoded.contains(char::REPLACEMENT_CHARACTER) {
        return Ok(decoded.into_owned());
    }
    match policy {
        DecodePolicy::Fallback => Ok(raw.iter().map(|&b| char::from(b)).collect()),
        DecodePolicy::Strict => Err(TextError::InvalidText),
    }
}

/// Strip ANSI escape sequences and normalize control characters so text from
/// the wire cannot move the cursor or draw outside the dialog.
pub fn sanitize_display(value: &str) -> String {
    let mut out = String::new();
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => {
                let Some(next) = chars.peek().copied() else {
                    continue;
                };
                if next == '[' {
                    // CSI: ESC [ ... final byte in 0x40..=0x7e
                    chars.next();
                    for seq in chars.by_ref() {
                        let code = seq as u32;
                        if (0x40..=0x7e).contains(&code) {
                            break;
                        }
                    }
                    continue;
                }
                if next == ']' {
                    // OSC: ESC ] ... BEL or ST (ESC \)
                    chars.next();
                    loop {
                        match chars.next() {
                            None => break,
                            Some('\x07') => break,
                            Some('\x1b') => {
                                if chars.peek().copied() == Some('\\') {
                                    chars.next();
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    continue;
                }
                let _ = chars.next();
            }
            '\t' => out.push_str("    "),
            '\n' => out.push('\n'),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Cells a char occupies on screen. Zero-width and control characters count
/// as one; anything unprintable is stripped by `sanitize_display` before
/// measuring.
pub fn char_width(ch: char) -> usize {
    match UnicodeWidthChar::width(ch) {
        Some(width) => width.max(1),
        None => 1,
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Greedy wrap at a cell width: breaks at spaces where the next word would
/// overflow, and splits a word wider than a whole line mid-word.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for (index, word) in line.split(' ').enumerate() {
        let word_width = display_width(word);
        let sep = usize::from(index > 0 && current_width > 0);
        if current_width + sep + word_width <= width {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            current_width += sep + word_width;
        } else if word_width <= width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            for ch in word.chars() {
                let ch_width = char_width(ch);
                if current_width + ch_width > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(ch);
                current_width += ch_width;
            }
        }
    }
    lines.push(current);
    lines
}
