//! Splitting stored launch commands into program and arguments.
//!
//! Run values and service image paths hold a single command-line string.
//! The program is the first token under the Windows argv[0] rules: a
//! leading quote runs to the next quote, anything else runs to the first
//! space or tab. Quotes in the middle of a bare token are literal and
//! backslashes never escape anything in argv[0]. An empty quoted token
//! (`"" --flag`) is a valid, empty program name.
//!
//! Leading blanks are skipped before argv[0]. `CommandLineToArgvW` would
//! return an empty argv[0] for them and push the whole command into the
//! arguments.

/// Splits a command line into `(executable_path, arguments)`.
///
/// Blank input yields `("", None)`. Arguments are whatever follows the
/// first token, trimmed, or `None` when nothing does.
pub fn split(command_line: &str) -> (String, Option<String>) {
    if command_line.trim().is_empty() {
        return (String::new(), None);
    }

    let (path, end) = first_token(command_line);
    let rest = command_line[end..].trim();
    let arguments = (!rest.is_empty()).then(|| rest.to_string());
    (path.to_string(), arguments)
}

/// Returns only the program part of a command line.
///
/// Accepts either a bare path or a full command line.
pub fn executable_path(command_line: &str) -> String {
    split(command_line).0
}

/// Builds the stored form of a command: `"path" arguments`, trimmed.
pub fn compose(executable_path: &str, arguments: Option<&str>) -> String {
    format!("\"{executable_path}\" {}", arguments.unwrap_or_default())
        .trim()
        .to_string()
}

/// Extracts argv[0] and the byte offset just past it (closing quote
/// included).
fn first_token(command_line: &str) -> (&str, usize) {
    let start = command_line.len() - command_line.trim_start().len();
    let rest = &command_line[start..];

    let (token, consumed) = if let Some(quoted) = rest.strip_prefix('"') {
        match quoted.find('"') {
            Some(close) => (&quoted[..close], close + 2),
            None => (quoted, rest.len()),
        }
    } else {
        let len = rest.find([' ', '\t']).unwrap_or(rest.len());
        (&rest[..len], len)
    };

    (token, start + consumed)
}
