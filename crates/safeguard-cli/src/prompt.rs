//! Password entry.
//!
//! Interactive entry puts the terminal in raw mode and echoes `*` per
//! character. Every keystroke goes straight into a [`SecretBuilder`], so the
//! password never sits in an ordinary `String`.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use zeroize::Zeroizing;

use safeguard_core::{SecretBuilder, SecretMaterial};

/// Restores cooked mode when dropped, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// What a keystroke did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Appended,
    Erased,
    Ignored,
    Submit,
    Abort,
}

fn apply_key(builder: &mut SecretBuilder, key: KeyEvent) -> KeyOutcome {
    if key.kind == KeyEventKind::Release {
        return KeyOutcome::Ignored;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Abort,
        KeyCode::Esc => KeyOutcome::Abort,
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Backspace => {
            if builder.pop() {
                KeyOutcome::Erased
            } else {
                KeyOutcome::Ignored
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            builder.push(ch);
            KeyOutcome::Appended
        }
        _ => KeyOutcome::Ignored,
    }
}

/// Prompt on stderr and read a masked password from the terminal.
pub fn masked(label: &str) -> Result<SecretMaterial> {
    let mut stderr = io::stderr();
    write!(stderr, "{}: ", label)?;
    stderr.flush()?;

    let mut builder = SecretBuilder::new();
    {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read().context("Failed to read from terminal")? else {
                continue;
            };
            match apply_key(&mut builder, key) {
                KeyOutcome::Appended => write!(stderr, "*")?,
                KeyOutcome::Erased => write!(stderr, "\u{8} \u{8}")?,
                KeyOutcome::Ignored => continue,
                KeyOutcome::Submit => break,
                KeyOutcome::Abort => {
                    // Raw mode swallows the newline.
                    write!(stderr, "\r\n")?;
                    bail!("Password entry cancelled");
                }
            }
            stderr.flush()?;
        }
    }
    writeln!(stderr)?;

    Ok(builder.finish())
}

/// Read a password from the first line of `reader`.
pub fn from_reader<R: BufRead>(mut reader: R) -> Result<SecretMaterial> {
    let mut line = Zeroizing::new(Vec::new());
    reader
        .read_until(b'\n', &mut line)
        .context("Failed to read password")?;

    let text = std::str::from_utf8(&line).context("Password is not valid UTF-8")?;
    let text = text.trim_end_matches(['\r', '\n']);
    if text.is_empty() {
        bail!("No password given on stdin");
    }

    let mut builder = SecretBuilder::new();
    for ch in text.chars() {
        builder.push(ch);
    }
    Ok(builder.finish())
}

/// Read a password from stdin.
pub fn from_stdin() -> Result<SecretMaterial> {
    from_reader(io::stdin().lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typed_characters_build_the_secret() {
        let mut builder = SecretBuilder::new();
        for ch in "hunter2".chars() {
            assert_eq!(apply_key(&mut builder, key(KeyCode::Char(ch))), KeyOutcome::Appended);
        }
        assert_eq!(apply_key(&mut builder, key(KeyCode::Enter)), KeyOutcome::Submit);
        assert_eq!(builder.finish().expose_str(), Some("hunter2"));
    }

    #[test]
    fn backspace_erases_last_character() {
        let mut builder = SecretBuilder::new();
        apply_key(&mut builder, key(KeyCode::Char('a')));
        apply_key(&mut builder, key(KeyCode::Char('b')));
        assert_eq!(apply_key(&mut builder, key(KeyCode::Backspace)), KeyOutcome::Erased);
        apply_key(&mut builder, key(KeyCode::Char('c')));
        assert_eq!(builder.finish().expose_str(), Some("ac"));
    }

    #[test]
    fn backspace_on_empty_entry_is_ignored() {
        let mut builder = SecretBuilder::new();
        assert_eq!(apply_key(&mut builder, key(KeyCode::Backspace)), KeyOutcome::Ignored);
        assert!(builder.is_empty());
    }

    #[test]
    fn ctrl_c_aborts() {
        let mut builder = SecretBuilder::new();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_key(&mut builder, ctrl_c), KeyOutcome::Abort);
        assert!(builder.is_empty());
    }

    #[test]
    fn reads_first_line_without_terminator() {
        let secret = from_reader("s3cret\r\nignored\n".as_bytes()).unwrap();
        assert_eq!(secret.expose_str(), Some("s3cret"));
    }

    #[test]
    fn reads_line_without_newline() {
        let secret = from_reader("pässwörd".as_bytes()).unwrap();
        assert_eq!(secret.expose_str(), Some("pässwörd"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(from_reader("".as_bytes()).is_err());
        assert!(from_reader("\n".as_bytes()).is_err());
    }
}
