use std::io::{self, BufRead, Write};

use crate::assuan::{
    parse_line, percent_unescape, read_request_line, write_comment, write_data, write_err,
    write_ok, CommandLine, ERR_CANCELED, ERR_LOCALE_PROBLEM, ERR_NOT_CONFIRMED, ERR_PROTOCOL,
    ERR_UNKNOWN_COMMAND, MAX_LINE_LEN,
};
use crate::dispatch::handle_request;
use crate::request::{Outcome, Request};
use crate::secret::VecSink;
use crate::text::DecodePolicy;
use crate::ui::PromptUi;

/// Largest secret accepted from the dialog. The reply has to ride a single
/// wire line even fully percent-escaped: `D ` plus three output bytes per
/// secret byte plus the newline must stay within `MAX_LINE_LEN`.
pub const MAX_SECRET_LEN: usize = (MAX_LINE_LEN - 3) / 3;

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub policy: DecodePolicy,
    pub debug: bool,
    /// Terminal device the prompts appear on, reported by `GETINFO ttyinfo`.
    pub tty: Option<String>,
}

fn trace(config: &ServerConfig, dir: &str, text: &str) {
    if config.debug {
        eprintln!("[pinprompt] {dir} {text}");
    }
}

/// Run one protocol session: greet, then serve commands until BYE or end of
/// stream. The descriptor lives for the whole session; callers set fields
/// once and prompt repeatedly.
pub fn serve<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    ui: &mut dyn PromptUi,
    config: &ServerConfig,
) -> io::Result<()> {
    let mut request = Request::default();
    write_ok(writer, "Pleased to meet you")?;
    writer.flush()?;
    while let Some(line) = read_request_line(reader)? {
        if line.len() > MAX_LINE_LEN {
            trace(config, "<-", "(overlong line)");
            write_err(writer, ERR_PROTOCOL, "Line too long")?;
            writer.flush()?;
            continue;
        }
        trace(config, "<-", &String::from_utf8_lossy(&line));
        let Some(cmd) = parse_line(&line) else {
            continue;
        };
        let quit = execute(cmd, &mut request, ui, writer, config)?;
        writer.flush()?;
        if quit {
            break;
        }
    }
    Ok(())
}

fn execute<W: Write>(
    cmd: CommandLine<'_>,
    request: &mut Request,
    ui: &mut dyn PromptUi,
    writer: &mut W,
    config: &ServerConfig,
) -> io::Result<bool> {
    let name = cmd.name;
    let args = percent_unescape(cmd.args);

    if let Some(field) = text_field(name, request) {
        *field = Some(args);
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"SETQUALITYBAR") {
        request.has_quality_bar = true;
        if !args.is_empty() {
            request.quality_bar_label = Some(args);
        }
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"OPTION") {
        apply_option(request, &args);
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"GETPIN") {
        getpin(request, ui, writer, config)?;
    } else if name.eq_ignore_ascii_case(b"CONFIRM") {
        let one_button = args.windows(12).any(|w| w == b"--one-button");
        confirm(request, ui, writer, config, one_button)?;
    } else if name.eq_ignore_ascii_case(b"MESSAGE") {
        confirm(request, ui, writer, config, true)?;
    } else if name.eq_ignore_ascii_case(b"GETINFO") {
        getinfo(&args, writer, config)?;
    } else if name.eq_ignore_ascii_case(b"RESET") {
        *request = Request::default();
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"NOP") {
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"HELP") {
        for line in [
            "SETDESC SETPROMPT SETTITLE SETOK SETCANCEL SETNOTOK SETERROR",
            "SETQUALITYBAR SETQUALITYBAR_TT OPTION GETPIN CONFIRM MESSAGE",
            "GETINFO RESET NOP BYE",
        ] {
            write_comment(writer, line)?;
        }
        reply_ok(writer, config, "")?;
    } else if name.eq_ignore_ascii_case(b"BYE") {
        reply_ok(writer, config, "closing connection")?;
        return Ok(true);
    } else {
        reply_err(writer, config, ERR_UNKNOWN_COMMAND, "Unknown IPC command")?;
    }
    Ok(false)
}

/// The plain store-the-bytes commands, mapped to their descriptor fields.
fn text_field<'a>(name: &[u8], request: &'a mut Request) -> Option<&'a mut Option<Vec<u8>>> {
    if name.eq_ignore_ascii_case(b"SETDESC") {
        Some(&mut request.description)
    } else if name.eq_ignore_ascii_case(b"SETPROMPT") {
        Some(&mut request.prompt)
    } else if name.eq_ignore_ascii_case(b"SETTITLE") {
        Some(&mut request.title)
    } else if name.eq_ignore_ascii_case(b"SETERROR") {
        Some(&mut request.error)
    } else if name.eq_ignore_ascii_case(b"SETOK") {
        Some(&mut request.ok_label)
    } else if name.eq_ignore_ascii_case(b"SETCANCEL") {
        Some(&mut request.cancel_label)
    } else if name.eq_ignore_ascii_case(b"SETNOTOK") {
        Some(&mut request.not_ok_label)
    } else if name.eq_ignore_ascii_case(b"SETQUALITYBAR_TT") {
        Some(&mut request.quality_bar_tooltip)
    } else {
        None
    }
}

fn apply_option(request: &mut Request, args: &[u8]) {
    let (name, value) = match args.iter().position(|&b| b == b'=') {
        Some(pos) => (&args[..pos], &args[pos + 1..]),
        None => (args, &[][..]),
    };
    if name.eq_ignore_ascii_case(b"default-ok") {
        request.default_ok_label = Some(value.to_vec());
    } else if name.eq_ignore_ascii_case(b"default-cancel") {
        request.default_cancel_label = Some(value.to_vec());
    }
    // Anything else (grab options, tty hints, locale names) is accepted and
    // ignored so existing agent configurations keep working.
}

fn getpin<W: Write>(
    request: &mut Request,
    ui: &mut dyn PromptUi,
    writer: &mut W,
    config: &ServerConfig,
) -> io::Result<()> {
    request.reset_outputs();
    // The grant covers the terminating NUL on top of the secret itself.
    let mut sink = VecSink::with_limit(MAX_SECRET_LEN + 1);
    let outcome = handle_request(request, ui, Some(&mut sink), config.policy);
    match outcome {
        Outcome::SecretLength(0) => reply_ok(writer, config, "")?,
        Outcome::SecretLength(len) => {
            write_data(writer, &sink.data()[..len])?;
            trace(config, "->", "D (redacted)");
            reply_ok(writer, config, "")?;
        }
        _ => reply_decline(writer, config, request, ERR_CANCELED, "Operation cancelled")?,
    }
    sink.wipe();
    Ok(())
}

fn confirm<W: Write>(
    request: &mut Request,
    ui: &mut dyn PromptUi,
    writer: &mut W,
    config: &ServerConfig,
    one_button: bool,
) -> io::Result<()> {
    request.reset_outputs();
    request.one_button = one_button;
    match handle_request(request, ui, None, config.policy) {
        Outcome::Confirmed => reply_ok(writer, config, ""),
        Outcome::NotConfirmed => reply_err(writer, config, ERR_NOT_CONFIRMED, "Not confirmed"),
        _ => reply_decline(writer, config, request, ERR_CANCELED, "Operation cancelled"),
    }
}

fn getinfo<W: Write>(args: &[u8], writer: &mut W, config: &ServerConfig) -> io::Result<()> {
    let reply: String = if args.eq_ignore_ascii_case(b"version") {
        env!("CARGO_PKG_VERSION").to_string()
    } else if args.eq_ignore_ascii_case(b"pid") {
        std::process::id().to_string()
    } else if args.eq_ignore_ascii_case(b"flavor") {
        "tui".to_string()
    } else if args.eq_ignore_ascii_case(b"ttyinfo") {
        format!("{} - -", config.tty.as_deref().unwrap_or("-"))
    } else {
        return reply_err(writer, config, ERR_PROTOCOL, "Unknown info item");
    };
    write_data(writer, reply.as_bytes())?;
    trace(config, "->", &format!("D {reply}"));
    reply_ok(writer, config, "")
}

/// A declined prompt reports the locale failure if that is what stopped it;
/// otherwise it reads as a user cancel.
fn reply_decline<W: Write>(
    writer: &mut W,
    config: &ServerConfig,
    request: &Request,
    code: u32,
    text: &str,
) -> io::Result<()> {
    if request.locale_error {
        reply_err(writer, config, ERR_LOCALE_PROBLEM, "Locale problem")
    } else {
        reply_err(writer, config, code, text)
    }
}

fn reply_ok<W: Write>(writer: &mut W, config: &ServerConfig, note: &str) -> io::Result<()> {
    if note.is_empty() {
        trace(config, "->", "OK");
    } else {
        trace(config, "->", &format!("OK {note}"));
    }
    write_ok(writer, note)
}

fn reply_err<W: Write>(
    writer: &mut W,
    config: &ServerConfig,
    code: u32,
    text: &str,
) -> io::Result<()> {
    trace(config, "->", &format!("ERR {code} {text}"));
    write_err(writer, code, text)
}
