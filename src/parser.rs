use std::iter::Peekable;

const SPACE: u16 = b' ' as u16;
const TAB: u16 = b'\t' as u16;
const QUOTE: u16 = b'"' as u16;
const BACKSLASH: u16 = b'\\' as u16;

/// Splits a command line into arguments using the rules of
/// `CommandLineToArgvW`.
///
/// This is a model of the native splitter, not a substitute for it: it is
/// what `--model` and the parity checks run, and it is available on every
/// platform. The rules:
/// - The program name (argument 0) is everything up to the next quote when it
///   starts with one, otherwise everything up to the first space or tab.
///   Backslashes are not special in it.
/// - Other arguments are separated by spaces and tabs outside quotes.
/// - `2n` backslashes before a quote produce `n` backslashes and toggle
///   quoting; `2n+1` produce `n` backslashes and a literal quote.
/// - Inside quotes, every third consecutive quote is a literal quote.
///
/// Works on UTF-16 code units, so unpaired surrogates pass through intact.
/// An empty line yields a single empty argument (the native splitter
/// substitutes the path of the running executable there).
pub fn split_wide(line: &[u16]) -> Vec<Vec<u16>> {
    let mut args = Vec::new();
    let mut units = line.iter().copied().peekable();

    let mut program = Vec::new();
    if units.next_if_eq(&QUOTE).is_some() {
        for u in units.by_ref() {
            if u == QUOTE {
                break;
            }
            program.push(u);
        }
    } else {
        while let Some(u) = units.next_if(|&u| !is_blank(u)) {
            program.push(u);
        }
    }
    args.push(program);

    loop {
        while units.next_if(|&u| is_blank(u)).is_some() {}
        if units.peek().is_none() {
            break;
        }
        args.push(next_arg(&mut units));
    }
    args
}

/// Splits a UTF-8 command line with [`split_wide`].
///
/// # Example
/// ```
/// let args = winargv::parser::split(r#"git commit -m "two words""#);
/// assert_eq!(args, vec!["git", "commit", "-m", "two words"]);
/// ```
pub fn split(line: &str) -> Vec<String> {
    let wide: Vec<u16> = line.encode_utf16().collect();
    split_wide(&wide)
        .iter()
        .map(|arg| String::from_utf16_lossy(arg))
        .collect()
}

fn next_arg<I: Iterator<Item = u16>>(units: &mut Peekable<I>) -> Vec<u16> {
    let mut arg = Vec::new();
    // Quote state: 0 outside, 1 inside, 2 means a quote just closed.
    let mut quotes = 0u8;
    let mut backslashes = 0usize;

    while let Some(&u) = units.peek() {
        match u {
            u if quotes == 0 && is_blank(u) => break,
            BACKSLASH => {
                arg.push(BACKSLASH);
                backslashes += 1;
                units.next();
            }
            QUOTE => {
                units.next();
                if backslashes % 2 == 0 {
                    arg.truncate(arg.len() - backslashes / 2);
                    quotes += 1;
                } else {
                    arg.truncate(arg.len() - backslashes / 2 - 1);
                    arg.push(QUOTE);
                }
                backslashes = 0;

                while units.next_if_eq(&QUOTE).is_some() {
                    quotes += 1;
                    if quotes == 3 {
                        arg.push(QUOTE);
                        quotes = 0;
                    }
                }
                if quotes == 2 {
                    quotes = 0;
                }
            }
            u => {
                arg.push(u);
                backslashes = 0;
                units.next();
            }
        }
    }
    arg
}

fn is_blank(u: u16) -> bool {
    u == SPACE || u == TAB
}
