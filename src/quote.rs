//! Building command lines that split back into a known argument vector.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Quotes one argument (not the program name) so that the native splitter
/// reads it back unchanged.
///
/// Arguments without spaces, tabs or quotes are returned as is. Quotes are
/// escaped with a backslash, doubling any backslashes in front of them, and
/// the whole argument is wrapped in quotes if it is empty or contains
/// whitespace.
pub fn quote_arg(arg: &str) -> Cow<'_, str> {
    let needs_quotes = arg.is_empty() || arg.contains([' ', '\t']);
    if !needs_quotes && !arg.contains('"') {
        return Cow::Borrowed(arg);
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    if needs_quotes {
        quoted.push('"');
    }
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat_n('\\', backslashes + 1));
                backslashes = 0;
            }
            _ => backslashes = 0,
        }
        quoted.push(c);
    }
    if needs_quotes {
        quoted.extend(std::iter::repeat_n('\\', backslashes));
        quoted.push('"');
    }
    Cow::Owned(quoted)
}

/// Joins a program name and its arguments into one command line.
///
/// The program name follows different rules: it can be quoted but nothing in
/// it can be escaped, so a name containing a quote is rejected.
pub fn join<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    if program.contains('"') {
        return Err(Error::UnquotableProgram(program.to_string()));
    }

    let mut line = if program.is_empty() || program.contains([' ', '\t']) {
        format!("\"{}\"", program)
    } else {
        program.to_string()
    };
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg.as_ref()));
    }
    Ok(line)
}
