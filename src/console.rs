//! Terminal [`InteractionPort`]: prompts on stdout, answers from stdin.

use std::path::Path;

use async_trait::async_trait;
use testhost_core::InteractionPort;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::debug;

pub struct ConsolePort<R> {
    input: Mutex<Lines<R>>,
}

impl ConsolePort<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsolePort<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: Mutex::new(reader.lines()),
        }
    }

    /// Show a prompt and read one answer line. `None` on end of input.
    async fn ask(&self, title: &str, prompt: &str) -> Option<String> {
        let mut input = self.input.lock().await;
        println!("[{}] {}", title, prompt);
        print!("> ");
        let _ = std::io::Write::flush(&mut std::io::stdout());

        match input.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!("Failed to read answer: {}", e);
                None
            }
        }
    }
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

fn parse_text(answer: String) -> Option<String> {
    (!answer.is_empty()).then_some(answer)
}

/// Passkeys are six decimal digits.
const MAX_PASSKEY: u32 = 999_999;

fn parse_int(answer: &str) -> Option<u32> {
    answer.parse().ok().filter(|value| *value <= MAX_PASSKEY)
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> InteractionPort for ConsolePort<R> {
    async fn prompt_text(&self, title: &str, prompt: &str) -> Option<String> {
        self.ask(title, prompt).await.and_then(parse_text)
    }

    async fn prompt_int(&self, title: &str, prompt: &str) -> Option<u32> {
        self.ask(title, prompt).await.as_deref().and_then(parse_int)
    }

    async fn prompt_yes_no(&self, title: &str, prompt: &str) -> bool {
        let prompt = format!("{} [y/N]", prompt);
        self.ask(title, &prompt).await.as_deref().is_some_and(parse_yes)
    }

    async fn notify_info(&self, title: &str, message: &str) {
        println!("[{}] {}", title, message);
    }

    async fn notify_warning(&self, title: &str, message: &str) {
        eprintln!("[{}] warning: {}", title, message);
    }

    async fn notify_error(&self, title: &str, message: &str) {
        eprintln!("[{}] error: {}", title, message);
    }

    async fn confirm_incoming_file(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.prompt_yes_no("Incoming File", &format!("Accept incoming file {}?", name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(input: &'static str) -> ConsolePort<&'static [u8]> {
        ConsolePort::new(input.as_bytes())
    }

    #[test]
    fn yes_answers() {
        assert!(parse_yes("y"));
        assert!(parse_yes("YES"));
        assert!(!parse_yes(""));
        assert!(!parse_yes("no"));
    }

    #[tokio::test]
    async fn answers_are_read_in_order() {
        let port = port("0000\n123456\ny\n");
        assert_eq!(port.prompt_text("PIN", "Enter PIN").await.as_deref(), Some("0000"));
        assert_eq!(port.prompt_int("Passkey", "Enter passkey").await, Some(123456));
        assert!(port.prompt_yes_no("Confirm", "Pair?").await);
    }

    #[tokio::test]
    async fn blank_or_invalid_answers_cancel() {
        let port = port("\nabc\n");
        assert_eq!(port.prompt_text("PIN", "Enter PIN").await, None);
        assert_eq!(port.prompt_int("Passkey", "Enter passkey").await, None);
    }

    #[test]
    fn passkey_above_six_digits_is_rejected() {
        assert_eq!(parse_int("999999"), Some(999_999));
        assert_eq!(parse_int("1000000"), None);
        assert_eq!(parse_int("4294967295"), None);
    }

    #[tokio::test]
    async fn oversized_passkey_cancels() {
        let port = port("1234567\n");
        assert_eq!(port.prompt_int("Passkey", "Enter passkey").await, None);
    }

    #[tokio::test]
    async fn end_of_input_declines() {
        let port = port("");
        assert_eq!(port.prompt_text("PIN", "Enter PIN").await, None);
        assert!(!port.prompt_yes_no("Confirm", "Pair?").await);
        assert!(!port.confirm_incoming_file(Path::new("/tmp/a.txt")).await);
    }

    #[tokio::test]
    async fn incoming_file_accepted() {
        let port = port("yes\n");
        assert!(port.confirm_incoming_file(Path::new("/srv/inbox/photo.jpg")).await);
    }
}
