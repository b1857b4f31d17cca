use std::io::{self, BufRead, Write};

/// Raw wire-line limit, matching the classic Assuan line buffer.
pub const MAX_LINE_LEN: usize = 1000;

// GPG-style status codes: error source 5 (pinentry) in the top byte, the
// error number in the low bits.
pub const ERR_CANCELED: u32 = (5 << 24) | 99;
pub const ERR_NOT_CONFIRMED: u32 = (5 << 24) | 114;
pub const ERR_LOCALE_PROBLEM: u32 = (5 << 24) | 166;
pub const ERR_UNKNOWN_COMMAND: u32 = (5 << 24) | 275;
pub const ERR_PROTOCOL: u32 = (5 << 24) | 257;

/// One parsed request line: the command word and its raw argument bytes
/// (still percent-escaped). `name` is compared case-insensitively by the
/// server.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub name: &'a [u8],
    pub args: &'a [u8],
}

/// Split a request line into command and argument bytes. Returns `None` for
/// blank lines and `#` comments, which the protocol ignores.
pub fn parse_line(line: &[u8]) -> Option<CommandLine<'_>> {
    let trimmed = trim_ascii(line);
    if trimmed.is_empty() || trimmed[0] == b'#' {
        return None;
    }
    match trimmed.iter().position(|&b| b == b' ') {
        Some(split) => Some(CommandLine {
            name: &trimmed[..split],
            args: &trimmed[split + 1..],
        }),
        None => Some(CommandLine {
            name: trimmed,
            args: &[],
        }),
    }
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &line[start..end]
}

/// Decode `%XX` escapes. Malformed escapes are passed through literally
/// rather than rejected; agents in the wild are sloppy here.
pub fn percent_unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                raw.get(i + 1).copied().and_then(hex_value),
                raw.get(i + 2).copied().and_then(hex_value),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

/// Escape the bytes that would break line framing: `%`, CR, and LF.
pub fn percent_escape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        match b {
            b'%' | b'\r' | b'\n' => {
                out.push(b'%');
                out.extend_from_slice(format!("{b:02X}").as_bytes());
            }
            _ => out.push(b),
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Read one LF-terminated request line, without the terminator. `None` at
/// end of stream. Storage is capped at `MAX_LINE_LEN + 1` bytes; the rest of
/// an overlong line is drained without buffering it, and the extra byte lets
/// the server tell an at-limit line from one past the limit.
pub fn read_request_line(reader: &mut impl BufRead) -> io::Result<Option<Vec<u8>>> {
    let mut line: Vec<u8> = Vec::new();
    let mut saw_input = false;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            if !saw_input {
                return Ok(None);
            }
            break;
        }
        saw_input = true;
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            push_capped(&mut line, &buf[..pos]);
            reader.consume(pos + 1);
            break;
        }
        let chunk_len = buf.len();
        push_capped(&mut line, buf);
        reader.consume(chunk_len);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn push_capped(line: &mut Vec<u8>, chunk: &[u8]) {
    let room = (MAX_LINE_LEN + 1).saturating_sub(line.len());
    line.extend_from_slice(&chunk[..chunk.len().min(room)]);
}

pub fn write_ok(writer: &mut impl Write, note: &str) -> io::Result<()> {
    if note.is_empty() {
        writer.write_all(b"OK\n")
    } else {
        writer.write_all(format!("OK {note}\n").as_bytes())
    }
}

pub fn write_err(writer: &mut impl Write, code: u32, text: &str) -> io::Result<()> {
    writer.write_all(format!("ERR {code} {text}\n").as_bytes())
}

pub fn write_data(writer: &mut impl Write, data: &[u8]) -> io::Result<()> {
    writer.write_all(b"D ")?;
    writer.write_all(&percent_escape(data))?;
    writer.write_all(b"\n")
}

pub fn write_comment(writer: &mut impl Write, text: &str) -> io::Result<()> {
    writer.write_all(format!("# {text}\n").as_bytes())
}
