//! Transfer progress reporting for downloads.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};

const KNOWN_LENGTH_TEMPLATE: &str =
    "{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const UNKNOWN_LENGTH_TEMPLATE: &str = "{msg} {spinner} {bytes} ({bytes_per_sec})";

/// Whether progress is drawn at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressMode {
    /// Draw on stderr.
    #[default]
    Visible,
    /// Track progress without drawing anything.
    Hidden,
}

/// Progress bar for a single download.
///
/// Dropping an unfinished bar abandons it, leaving the last drawn state on
/// screen so interrupted transfers remain visible.
#[derive(Debug)]
pub struct TransferProgress {
    bar: ProgressBar,
    finished: bool,
}

impl TransferProgress {
    /// Start tracking a transfer of `total` bytes, or an unknown amount.
    #[must_use]
    pub fn start(label: &str, total: Option<u64>, mode: ProgressMode) -> Self {
        let target = match mode {
            ProgressMode::Visible => ProgressDrawTarget::stderr_with_hz(4),
            ProgressMode::Hidden => ProgressDrawTarget::hidden(),
        };
        let (bar, template) = match total {
            Some(len) => (
                ProgressBar::with_draw_target(Some(len), target),
                KNOWN_LENGTH_TEMPLATE,
            ),
            None => (
                ProgressBar::with_draw_target(None, target),
                UNKNOWN_LENGTH_TEMPLATE,
            ),
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(label.to_owned());
        Self {
            bar,
            finished: false,
        }
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Wrap `inner` so every byte written advances the bar.
    pub fn writer<W: Write>(&self, inner: W) -> ProgressWriter<'_, W> {
        ProgressWriter {
            inner,
            progress: self,
        }
    }

    /// Mark the transfer complete.
    pub fn finish(mut self) {
        self.bar.finish();
        self.finished = true;
    }
}

impl Drop for TransferProgress {
    fn drop(&mut self) {
        if !self.finished {
            self.bar.abandon();
        }
    }
}

/// Writer adapter that reports written bytes to a [`TransferProgress`].
#[derive(Debug)]
pub struct ProgressWriter<'a, W> {
    inner: W,
    progress: &'a TransferProgress,
}

impl<W> ProgressWriter<'_, W> {
    /// Unwrap the adapter, returning the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.progress.bar.inc(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
