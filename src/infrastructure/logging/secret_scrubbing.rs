use regex::Regex;
use std::fmt;
use std::io;
use std::sync::LazyLock;
use tracing_subscriber::fmt::MakeWriter;

const REDACTED: &str = "[REDACTED]";

/// Match GitHub-issued tokens: classic and fine-grained PATs, OAuth, user,
/// server and refresh tokens
static GITHUB_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:github_pat_|gh[pousr]_)[A-Za-z0-9_]+").expect("GitHub token pattern is valid")
});

/// Match Bearer tokens in Authorization headers
static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9._-]+").expect("bearer pattern is valid"));

/// Scrubs credentials from text that may end up in logs or error messages
#[derive(Clone, Default)]
pub struct SecretScrubber {
    known: Vec<String>,
}

impl SecretScrubber {
    /// Create a scrubber that recognises GitHub token formats and bearer headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Also redact this exact value wherever it appears
    pub fn with_secret(mut self, secret: &str) -> Self {
        if !secret.is_empty() {
            self.known.push(secret.to_string());
        }
        self
    }

    /// Scrub a message of sensitive data
    pub fn scrub_message(&self, message: &str) -> String {
        let mut scrubbed = message.to_string();
        for secret in &self.known {
            scrubbed = scrubbed.replace(secret.as_str(), REDACTED);
        }
        scrubbed = GITHUB_TOKEN_PATTERN
            .replace_all(&scrubbed, REDACTED)
            .into_owned();
        BEARER_PATTERN
            .replace_all(&scrubbed, "Bearer [REDACTED]")
            .into_owned()
    }

    /// Alias of [`scrub_message`](Self::scrub_message)
    pub fn scrub(&self, message: &str) -> String {
        self.scrub_message(message)
    }

    /// Wrap a log writer so every formatted event is scrubbed on its way out
    pub fn writer<M>(self, inner: M) -> ScrubbingMakeWriter<M> {
        ScrubbingMakeWriter {
            inner,
            scrubber: self,
        }
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber")
            .field("known", &self.known.len())
            .finish()
    }
}

/// [`MakeWriter`] that scrubs each log line before handing it to `M`
#[derive(Debug)]
pub struct ScrubbingMakeWriter<M> {
    inner: M,
    scrubber: SecretScrubber,
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for ScrubbingMakeWriter<M> {
    type Writer = ScrubbingWriter<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ScrubbingWriter {
            inner: self.inner.make_writer(),
            scrubber: &self.scrubber,
        }
    }
}

/// The fmt layer writes one formatted event per `write` call.
pub struct ScrubbingWriter<'a, W> {
    inner: W,
    scrubber: &'a SecretScrubber,
}

impl<W: io::Write> io::Write for ScrubbingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match std::str::from_utf8(buf) {
            Ok(text) => self
                .inner
                .write_all(self.scrubber.scrub_message(text).as_bytes())?,
            Err(_) => self.inner.write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
