//! Tracing setup with secret redaction
//!
//! Every formatted log line passes through [`Redactor`] before reaching
//! stderr, so Telegram bot tokens and Gemini API keys never hit the logs
//! even when they appear in request URLs or error bodies.

use crate::config::get_log_level;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Ordered list of secret patterns and their replacements
pub struct Redactor {
    rules: Vec<(Regex, &'static str)>,
}

impl Redactor {
    /// Compile the built-in patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        let rules = [
            // Bot API URLs: https://api.telegram.org/bot<token>/method
            (
                r"(https?://[^/]+/bot)[0-9]+:[A-Za-z0-9_-]+",
                "${1}[TELEGRAM_TOKEN]",
            ),
            (r"[0-9]{8,10}:[A-Za-z0-9_-]{35}", "[TELEGRAM_TOKEN]"),
            (r"AIza[0-9A-Za-z_-]{35}", "[GEMINI_KEY]"),
            (
                r#"(?i)(x-goog-api-key"?\s*[:=]\s*"?)[^\s",}]+"#,
                "${1}[MASKED]",
            ),
            (r"(GEMINI_API_KEY=)[^\s&]+", "${1}[MASKED]"),
        ];

        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, replacement)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Apply every rule in order
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, (pattern, replacement)| {
                pattern.replace_all(&text, *replacement).into_owned()
            })
    }
}

/// Writer that redacts each buffer before forwarding it
pub struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Arc<Redactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.redactor.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // Callers track progress against their own buffer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// [`MakeWriter`] producing [`RedactingWriter`]s around `make_inner()`
pub struct RedactingMakeWriter<F> {
    make_inner: F,
    redactor: Arc<Redactor>,
}

impl<F> RedactingMakeWriter<F> {
    /// Wrap a writer factory such as `io::stderr`
    pub const fn new(make_inner: F, redactor: Arc<Redactor>) -> Self {
        Self {
            make_inner,
            redactor,
        }
    }
}

impl<'a, F, W> MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            redactor: Arc::clone(&self.redactor),
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (falling back to
/// `LOG_LEVEL`) and a redacting stderr formatter.
///
/// # Errors
///
/// Returns an error if the redaction patterns fail to compile.
pub fn init_logging() -> Result<(), regex::Error> {
    let redactor = Arc::new(Redactor::new()?);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(RedactingMakeWriter::new(io::stderr, redactor)),
        )
        .init();
    Ok(())
}
