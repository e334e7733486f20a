//! Secret input from arguments or piped stdin.

use std::io::{IsTerminal, Read, Stdin};

use secrecy::SecretString;

use crate::error::UsageError;

/// Stdin, but only when something is piped into it.
pub fn piped_stdin() -> Option<Stdin> {
    let stdin = std::io::stdin();
    (!stdin.is_terminal()).then_some(stdin)
}

/// Resolve the secret to store.
///
/// Positional words are joined with single spaces. Without them the secret is
/// read from `stdin` (`None` when stdin is a terminal) with one trailing
/// newline removed. Stdin is never read when arguments are given, so an
/// idle pipe cannot block the command. An empty secret is a usage error.
pub fn read_secret<R: Read>(args: &[String], stdin: Option<R>) -> Result<SecretString, UsageError> {
    if !args.is_empty() {
        let joined = args.join(" ");
        if joined.is_empty() {
            return Err(UsageError::MissingSecret);
        }
        return Ok(SecretString::from(joined));
    }

    let Some(mut reader) = stdin else {
        return Err(UsageError::MissingSecret);
    };

    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .map_err(UsageError::ReadStdin)?;
    if buf.ends_with('\n') {
        buf.pop();
    }
    if buf.is_empty() {
        return Err(UsageError::MissingSecret);
    }

    Ok(SecretString::from(buf))
}
