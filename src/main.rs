mod assuan;
mod dispatch;
mod request;
mod secret;
mod server;
mod text;
mod ui;

use std::io;

use crate::server::{serve, ServerConfig};
use crate::text::DecodePolicy;
use crate::ui::headless::HeadlessUi;
use crate::ui::term::TermUi;
use crate::ui::PromptUi;

const DEFAULT_TTY: &str = "/dev/tty";

/// Flags other pinentries take a value for. Consumed and ignored so an agent
/// configured for one of them can point here unchanged.
const IGNORED_VALUE_FLAGS: &[&str] = &[
    "--display",
    "-D",
    "--ttytype",
    "-N",
    "--lc-ctype",
    "-C",
    "--lc-messages",
    "-M",
    "--timeout",
    "-o",
    "--parent-wid",
    "--colors",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    version: bool,
    debug: bool,
    ttyname: String,
    require_utf8: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            version: false,
            debug: false,
            ttyname: DEFAULT_TTY.to_string(),
            require_utf8: false,
        }
    }
}

fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .as_deref()
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_options(args: impl IntoIterator<Item = String>) -> Options {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let (flag, inline_value) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        match flag.as_str() {
            "--version" | "-V" => options.version = true,
            "--debug" | "-d" => options.debug = true,
            "--require-utf8" => options.require_utf8 = true,
            "--ttyname" | "-T" => {
                if let Some(value) = inline_value.or_else(|| args.next()) {
                    options.ttyname = value;
                }
            }
            _ if IGNORED_VALUE_FLAGS.contains(&flag.as_str()) => {
                if inline_value.is_none() {
                    let _ = args.next();
                }
            }
            // Remaining flags (grab control and other compatibility extras)
            // are accepted and ignored.
            _ => {}
        }
    }
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = parse_options(std::env::args().skip(1));
    if options.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let debug = options.debug || env_truthy("PINPROMPT_DEBUG");
    let config = ServerConfig {
        policy: if options.require_utf8 {
            DecodePolicy::Strict
        } else {
            DecodePolicy::Fallback
        },
        debug,
        tty: Some(options.ttyname.clone()),
    };
    // Strategy choice happens once, here: a usable terminal gets the real
    // dialog backend, anything else gets the refusing one so every request
    // still receives a clean answer.
    let mut ui: Box<dyn PromptUi> = match TermUi::open(&options.ttyname) {
        Ok(term) => Box::new(term),
        Err(error) => {
            if debug {
                eprintln!(
                    "[pinprompt] no terminal at {}: {error}; refusing prompts",
                    options.ttyname
                );
            }
            Box::new(HeadlessUi)
        }
    };
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();
    serve(&mut reader, &mut writer, ui.as_mut(), &config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_options, Options, DEFAULT_TTY};

    fn parse(args: &[&str]) -> Options {
        parse_options(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_when_no_arguments() {
        let options = parse(&[]);
        assert_eq!(options, Options::default());
        assert_eq!(options.ttyname, DEFAULT_TTY);
    }

    #[test]
    fn recognizes_own_flags() {
        let options = parse(&["--debug", "--require-utf8", "--version"]);
        assert!(options.debug);
        assert!(options.require_utf8);
        assert!(options.version);
    }

    #[test]
    fn ttyname_takes_a_value_in_both_forms() {
        assert_eq!(parse(&["--ttyname", "/dev/pts/3"]).ttyname, "/dev/pts/3");
        assert_eq!(parse(&["--ttyname=/dev/pts/4"]).ttyname, "/dev/pts/4");
        assert_eq!(parse(&["-T", "/dev/pts/5"]).ttyname, "/dev/pts/5");
    }

    #[test]
    fn compatibility_flags_consume_their_values() {
        // `--display` eats `:0`; `--debug` afterwards must still apply.
        let options = parse(&["--display", ":0", "--lc-ctype=C.UTF-8", "--debug"]);
        assert!(options.debug);
        assert_eq!(options.ttyname, DEFAULT_TTY);
    }

    #[test]
    fn unknown_flags_are_ignored() {
        let options = parse(&["--no-global-grab", "-g", "--frobnicate"]);
        assert_eq!(options, Options::default());
    }
}
