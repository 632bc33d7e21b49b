//! Operator input
//!
//! Classifies loose command-line tokens, validates serial numbers, session
//! names and durations, and re-prompts interactively until input is valid.

use crate::capture::Modality;
use crate::recorder::{record_path, TerminationPolicy};
use crate::utils::error::{AppError, AppResult};
use std::io::{BufRead, Write};
use std::path::Path;

/// Serial numbers are exactly this many ASCII digits
pub const SERIAL_LEN: usize = 12;

/// Values recognized among positional tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub serial: Option<String>,
    pub duration: Option<u64>,
    pub name: Option<String>,
}

/// Sort up to three positional tokens into serial, duration and name by
/// their shape. Later tokens of the same kind win.
///
/// A 12-digit token is always a serial, so such a token can never be used
/// as a duration.
pub fn classify_args<S: AsRef<str>>(tokens: &[S]) -> ParsedArgs {
    let mut parsed = ParsedArgs::default();
    for token in tokens.iter().take(3).map(AsRef::as_ref) {
        if is_valid_serial(token) {
            parsed.serial = Some(token.to_string());
        } else if let Some(secs) = parse_duration(token) {
            parsed.duration = Some(secs);
        } else if is_valid_session_name(token) {
            parsed.name = Some(token.to_string());
        } else {
            tracing::debug!("Ignoring unrecognized argument {:?}", token);
        }
    }
    parsed
}

pub fn is_valid_serial(s: &str) -> bool {
    s.len() == SERIAL_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Positive whole number of seconds
pub fn parse_duration(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok().filter(|&secs| secs > 0)
}

/// Alphanumeric with a leading letter
pub fn is_valid_session_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() => chars.all(char::is_alphanumeric),
        _ => false,
    }
}

/// Upper-case the first character and lower-case the rest
pub fn normalize_session_name(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Whether a session of this name already holds a depth record
pub fn session_exists(root: &Path, name: &str) -> bool {
    record_path(&root.join(name), name, Modality::Depth).is_file()
}

/// Line-oriented prompts over any reader/writer pair
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `message` and return the trimmed reply
    fn ask(&mut self, message: &str) -> AppResult<String> {
        write!(self.output, "{message}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(AppError::InvalidInput("input closed".to_string()));
        }
        Ok(line.trim().to_string())
    }

    fn complain(&mut self, message: &str) -> AppResult<()> {
        writeln!(self.output, "Error! {message}")?;
        Ok(())
    }

    pub fn serial_number(&mut self) -> AppResult<String> {
        loop {
            let reply = self.ask("Enter the device serial number: ")?;
            if is_valid_serial(&reply) {
                return Ok(reply);
            }
            self.complain("Invalid serial number!")?;
        }
    }

    /// Ask until the name is valid and no session of that name exists
    pub fn session_name(&mut self, root: &Path) -> AppResult<String> {
        loop {
            let reply = normalize_session_name(&self.ask("Choose the session name: ")?);
            if !is_valid_session_name(&reply) {
                self.complain(
                    "The name must start with a letter and contain only letters and digits!",
                )?;
            } else if session_exists(root, &reply) {
                self.complain("A session with this name already exists!")?;
            } else {
                return Ok(reply);
            }
        }
    }

    pub fn duration(&mut self) -> AppResult<u64> {
        loop {
            let reply = self.ask("Enter the recording duration in seconds: ")?;
            if let Some(secs) = parse_duration(&reply) {
                return Ok(secs);
            }
            self.complain("Invalid duration!")?;
        }
    }

    /// Let the operator pick a fixed duration or recording until interrupted
    pub fn policy(&mut self) -> AppResult<TerminationPolicy> {
        loop {
            let reply = self.ask(
                "Press 'y' to choose the recording duration.\n\
                 Press 'n' to record until stopped with Ctrl+C: ",
            )?;
            match reply.to_lowercase().as_str() {
                "y" => {
                    let secs = self.duration()?;
                    return TerminationPolicy::fixed_secs(secs)
                        .ok_or_else(|| AppError::InvalidInput("duration must be positive".into()));
                }
                "n" => return Ok(TerminationPolicy::UntilInterrupt),
                _ => self.complain("Invalid choice!")?,
            }
        }
    }

    pub fn say(&mut self, message: &str) -> AppResult<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn prompter(script: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_classify_args() {
        let parsed = classify_args(&["012345678901", "30", "Walk"]);
        assert_eq!(
            parsed,
            ParsedArgs {
                serial: Some("012345678901".into()),
                duration: Some(30),
                name: Some("Walk".into()),
            }
        );
    }

    #[test]
    fn test_classify_args_order_free_and_bounded() {
        let parsed = classify_args(&["Walk", "012345678901", "5", "Other"]);
        assert_eq!(parsed.name.as_deref(), Some("Walk"));
        assert_eq!(parsed.duration, Some(5));
        assert_eq!(parsed.serial.as_deref(), Some("012345678901"));
    }

    #[test]
    fn test_classify_args_rejects_bad_tokens() {
        let parsed = classify_args(&["0", "1abc", "a-b"]);
        assert_eq!(parsed, ParsedArgs::default());
    }

    #[test]
    fn test_validators() {
        assert!(is_valid_serial("012345678901"));
        assert!(!is_valid_serial("01234567890"));
        assert!(!is_valid_serial("01234567890a"));

        assert_eq!(parse_duration("15"), Some(15));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("-3"), None);
        assert_eq!(parse_duration("+3"), None);
        assert_eq!(parse_duration(""), None);

        assert!(is_valid_session_name("Run2"));
        assert!(!is_valid_session_name("2run"));
        assert!(!is_valid_session_name("run 2"));
        assert!(!is_valid_session_name(""));

        assert_eq!(normalize_session_name("wALK"), "Walk");
        assert_eq!(normalize_session_name(""), "");
    }

    #[test]
    fn test_session_exists() {
        let dir = tempdir().unwrap();
        assert!(!session_exists(dir.path(), "Walk"));

        std::fs::create_dir_all(dir.path().join("Walk")).unwrap();
        assert!(!session_exists(dir.path(), "Walk"));

        std::fs::write(dir.path().join("Walk").join("Walk depth data.csv"), "").unwrap();
        assert!(session_exists(dir.path(), "Walk"));
    }

    #[test]
    fn test_prompt_serial_reprompts() {
        let mut p = prompter("123\n012345678901\n");
        assert_eq!(p.serial_number().unwrap(), "012345678901");
        let out = String::from_utf8(p.output.clone()).unwrap();
        assert_eq!(out.matches("Invalid serial number").count(), 1);
    }

    #[test]
    fn test_prompt_session_name_skips_existing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Walk")).unwrap();
        std::fs::write(dir.path().join("Walk").join("Walk depth data.csv"), "").unwrap();

        let mut p = prompter("9lives\nwalk\nrun\n");
        assert_eq!(p.session_name(dir.path()).unwrap(), "Run");
        let out = String::from_utf8(p.output.clone()).unwrap();
        assert!(out.contains("already exists"));
        assert!(out.contains("start with a letter"));
    }

    #[test]
    fn test_prompt_policy() {
        let mut p = prompter("x\nY\n0\n12\n");
        assert_eq!(p.policy().unwrap(), TerminationPolicy::fixed_secs(12).unwrap());

        let mut p = prompter("n\n");
        assert_eq!(p.policy().unwrap(), TerminationPolicy::UntilInterrupt);
    }

    #[test]
    fn test_prompt_eof_is_error() {
        let mut p = prompter("");
        let err = p.duration().unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
