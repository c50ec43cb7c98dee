use std::io::{self, IsTerminal, Read, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, info};
use winargv::{ArgVector, CodePage, parser};

#[derive(Debug, Parser)]
#[command(name = "winargv")]
#[command(about = "Split a Windows command line into the arguments a process would receive")]
struct Cli {
    /// Command line to split; read from stdin when omitted
    command_line: Option<String>,

    /// Narrow encoding of the command line (ansi, oem, utf8 or a number).
    /// Only stdin can carry encodings other than utf8.
    #[arg(short, long, env = "WINARGV_CODE_PAGE", default_value = "utf8")]
    code_page: CodePage,

    /// Split with the built-in model of the native rules
    #[arg(long, conflicts_with = "check")]
    model: bool,

    /// Split with both the native splitter and the model and fail on a difference
    #[arg(long)]
    check: bool,

    /// Write raw tokens separated by NUL bytes
    #[arg(short = '0', long)]
    print0: bool,

    /// Read command lines from the terminal, one per line
    #[arg(short, long, conflicts_with = "command_line")]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Which splitter runs a command line.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Native,
    Model,
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mode = if cli.model {
        Mode::Model
    } else if cli.check {
        Mode::Check
    } else {
        Mode::Native
    };

    if let Some(line) = &cli.command_line {
        require_utf8(cli.code_page, "a command line given as an argument")?;
        return run_line(line.as_bytes(), mode, &cli);
    }
    if cli.interactive || io::stdin().is_terminal() {
        require_utf8(cli.code_page, "interactive input")?;
        return interactive(mode, &cli);
    }

    let line = read_command_line(io::stdin().lock())
        .context("failed to read command line from stdin")?;
    run_line(&line, mode, &cli)
}

/// Text that arrives as `String` is UTF-8 whatever `--code-page` says.
fn require_utf8(code_page: CodePage, source: &str) -> Result<()> {
    if code_page != CodePage::Utf8 {
        bail!(
            "{} is always utf8; pipe it through stdin to use code page {}",
            source,
            code_page
        );
    }
    Ok(())
}

/// Reads the whole input as raw bytes, dropping one trailing line break.
fn read_command_line<R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.read_to_end(&mut line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(line)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "winargv=debug,info"
    } else {
        "winargv=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize logger: {}", err))
}

/// Splits one line and prints its tokens.
fn run_line(line: &[u8], mode: Mode, cli: &Cli) -> Result<()> {
    debug!(?mode, code_page = %cli.code_page, len = line.len(), "splitting command line");
    let tokens = split(line, mode, cli.code_page)?;
    let mut stdout = io::stdout().lock();
    print_tokens(&tokens, cli.print0, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn split(line: &[u8], mode: Mode, code_page: CodePage) -> Result<Vec<Vec<u8>>> {
    match mode {
        Mode::Native => native(line, code_page, winargv::tokenize_with),
        Mode::Model => model(line, code_page),
        Mode::Check => {
            // Both sides must be in the same encoding to compare bytes.
            let model = model(line, code_page)?;
            let native = native(line, code_page, winargv::tokenize_with)?;
            if !line.is_empty() && native != model {
                bail!(
                    "native splitter and model disagree:\n  native: {:?}\n  model:  {:?}",
                    lossy(&native),
                    lossy(&model)
                );
            }
            info!(argc = native.len(), "native splitter and model agree");
            Ok(native)
        }
    }
}

fn native<F>(line: &[u8], code_page: CodePage, tokenize: F) -> Result<Vec<Vec<u8>>>
where
    F: FnOnce(Option<&[u8]>, CodePage) -> winargv::Result<ArgVector>,
{
    let tokens = tokenize(Some(line), code_page)
        .with_context(|| format!("failed to split command line with code page {}", code_page))?;
    Ok(tokens.into_iter().map(|t| t.to_vec()).collect())
}

/// The model reads UTF-8 only.
fn model(line: &[u8], code_page: CodePage) -> Result<Vec<Vec<u8>>> {
    if code_page != CodePage::Utf8 {
        bail!("the model only splits utf8 command lines, not code page {}", code_page);
    }
    let line = std::str::from_utf8(line).context("command line is not valid utf8")?;
    Ok(parser::split(line)
        .into_iter()
        .map(String::into_bytes)
        .collect())
}

fn lossy(tokens: &[Vec<u8>]) -> Vec<String> {
    tokens
        .iter()
        .map(|t| String::from_utf8_lossy(t).into_owned())
        .collect()
}

fn print_tokens<W: Write>(tokens: &[Vec<u8>], print0: bool, out: &mut W) -> io::Result<()> {
    if print0 {
        for token in tokens {
            out.write_all(token)?;
            out.write_all(b"\0")?;
        }
        return Ok(());
    }
    for (i, token) in tokens.iter().enumerate() {
        writeln!(out, "{:>5}  {}", i, String::from_utf8_lossy(token))?;
    }
    Ok(())
}

/// Puts the terminal in raw mode until dropped.
struct RawMode;

impl RawMode {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            debug!(%err, "failed to disable raw mode");
        }
    }
}

enum LineInput {
    Line(String),
    Cancelled,
    Eof,
}

fn interactive(mode: Mode, cli: &Cli) -> Result<()> {
    loop {
        print!("argv> ");
        io::stdout().flush()?;

        let line = match read_line()? {
            LineInput::Line(line) => line,
            LineInput::Cancelled => continue,
            LineInput::Eof => return Ok(()),
        };

        // A bad line is reported and the session carries on.
        if let Err(err) = run_line(line.as_bytes(), mode, cli) {
            eprintln!("error: {:#}", err);
        }
    }
}

/// Reads one line with minimal editing, echoing as it goes.
fn read_line() -> Result<LineInput> {
    let _raw = RawMode::enter()?;
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        let key = match event::read().context("failed to read terminal input")? {
            Event::Key(key) if key.kind != KeyEventKind::Release => key,
            _ => continue,
        };
        match key {
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers,
                ..
            } if modifiers.contains(KeyModifiers::CONTROL) => {
                write!(stdout, "\r\n")?;
                return Ok(LineInput::Cancelled);
            }
            KeyEvent {
                code: KeyCode::Char('d'),
                modifiers,
                ..
            } if modifiers.contains(KeyModifiers::CONTROL) => {
                if buffer.is_empty() {
                    write!(stdout, "\r\n")?;
                    return Ok(LineInput::Eof);
                }
            }
            KeyEvent {
                code: KeyCode::Enter,
                ..
            } => {
                write!(stdout, "\r\n")?;
                stdout.flush()?;
                return Ok(LineInput::Line(buffer));
            }
            KeyEvent {
                code: KeyCode::Backspace,
                ..
            } => {
                if buffer.pop().is_some() {
                    // Move cursor back, erase char with space, move back again
                    write!(stdout, "\x08 \x08")?;
                    stdout.flush()?;
                }
            }
            KeyEvent {
                code: KeyCode::Tab, ..
            } => {
                buffer.push('\t');
                write!(stdout, "\t")?;
                stdout.flush()?;
            }
            KeyEvent {
                code: KeyCode::Char(c),
                ..
            } => {
                buffer.push(c);
                write!(stdout, "{}", c)?;
                stdout.flush()?;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn tokens_print_with_indices() {
        let tokens = vec![b"prog".to_vec(), b"a b".to_vec()];
        let mut out = Vec::new();
        print_tokens(&tokens, false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "    0  prog\n    1  a b\n");
    }

    #[test]
    fn print0_writes_raw_tokens() {
        let tokens = vec![b"prog".to_vec(), Vec::new(), vec![0xff]];
        let mut out = Vec::new();
        print_tokens(&tokens, true, &mut out).unwrap();
        assert_eq!(out, b"prog\0\0\xff\0");
    }

    #[test]
    fn model_mode_runs_everywhere() {
        let tokens = split(br#"p "a b" c\"d"#, Mode::Model, CodePage::Utf8).unwrap();
        assert_eq!(lossy(&tokens), vec!["p", "a b", r#"c"d"#]);
    }

    #[test]
    fn stdin_bytes_reach_the_splitter_unchanged() {
        let input: &[u8] = b"p caf\xe9 \"a b\"\r\n";
        let line = read_command_line(input).unwrap();
        assert_eq!(line, b"p caf\xe9 \"a b\"");

        let mut seen = None;
        let tokens = native(&line, CodePage::Ansi, |bytes, code_page| {
            seen = Some((bytes.map(<[u8]>::to_vec), code_page));
            Ok(vec![
                Bytes::from_static(b"p"),
                Bytes::from_static(b"caf\xe9"),
                Bytes::from_static(b"a b"),
            ])
        })
        .unwrap();
        assert_eq!(seen, Some((Some(line.clone()), CodePage::Ansi)));
        assert_eq!(tokens[1], b"caf\xe9");
    }

    #[test]
    fn stdin_keeps_inner_line_breaks() {
        assert_eq!(read_command_line(&b"a\nb\n\n"[..]).unwrap(), b"a\nb\n");
        assert_eq!(read_command_line(&b""[..]).unwrap(), b"");
    }

    #[test]
    fn model_and_check_refuse_other_code_pages() {
        let line = "p \u{3042}".as_bytes();
        assert!(split(line, Mode::Model, CodePage::Other(932)).is_err());
        assert!(split(b"p caf\xe9", Mode::Check, CodePage::Ansi).is_err());
        assert!(split(b"p caf\xe9", Mode::Model, CodePage::Utf8).is_err());
    }

    #[test]
    fn text_input_must_be_utf8() {
        assert!(require_utf8(CodePage::Utf8, "interactive input").is_ok());
        let err = require_utf8(CodePage::Other(932), "interactive input").unwrap_err();
        assert_eq!(
            err.to_string(),
            "interactive input is always utf8; pipe it through stdin to use code page 932"
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn native_mode_reports_unsupported_platform() {
        let err = split(b"a b", Mode::Native, CodePage::Utf8).unwrap_err();
        assert_eq!(
            err.downcast_ref::<winargv::Error>(),
            Some(&winargv::Error::UnsupportedPlatform)
        );
    }

    #[test]
    fn cli_parses_code_page_names() {
        let cli = Cli::try_parse_from(["winargv", "--code-page", "oem", "a b"]).unwrap();
        assert_eq!(cli.code_page, CodePage::Oem);
        assert_eq!(cli.command_line.as_deref(), Some("a b"));
        assert!(Cli::try_parse_from(["winargv", "--model", "--check", "x"]).is_err());
    }
}
