//! Shared test utilities for the installer crate.

use crate::fetch::{ContentFetcher, FetchError, FetchResponse};
use crate::runner::CommandExecutor;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::Duration;

/// A stub [`CommandExecutor`] that replays scripted exit codes.
///
/// Every invocation is recorded as a full argument vector so tests can
/// check exactly what would have been started.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    codes: RefCell<VecDeque<Option<i32>>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl RecordingExecutor {
    /// Creates an executor that answers successive calls with `codes`.
    pub fn new(codes: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            codes: RefCell::new(codes.into_iter().collect()),
            calls: RefCell::default(),
        }
    }

    /// Creates an executor whose single call exits with `code`.
    pub fn exiting_with(code: i32) -> Self {
        Self::new([Some(code)])
    }

    /// Returns every argument vector executed so far, program first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Asserts that all scripted exit codes have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if scripted codes remain.
    pub fn assert_finished(&self) {
        assert!(
            self.codes.borrow().is_empty(),
            "expected no further process invocations"
        );
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, program: &str, args: &[String]) -> io::Result<Option<i32>> {
        let mut argv = vec![program.to_owned()];
        argv.extend(args.iter().cloned());
        self.calls.borrow_mut().push(argv);
        self.codes.borrow_mut().pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("unexpected run of {program}"))
        })
    }
}

/// A [`ContentFetcher`] that serves a fixed body and counts requests.
#[derive(Debug)]
pub struct ScriptedFetcher {
    body: Vec<u8>,
    status: u16,
    fail_after: Option<usize>,
    calls: Cell<usize>,
    urls: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    /// Creates a fetcher answering every request with 200 and `body`.
    pub fn serving(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            status: 200,
            fail_after: None,
            calls: Cell::new(0),
            urls: RefCell::default(),
        }
    }

    /// Answer with `status` instead of 200.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Break the connection after `bytes` bytes of the body.
    #[must_use]
    pub fn interrupted_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    /// Number of requests issued so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// URLs requested so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl ContentFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, _timeout: Option<Duration>) -> Result<FetchResponse, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.urls.borrow_mut().push(url.to_owned());
        let body: Box<dyn Read> = match self.fail_after {
            Some(limit) => Box::new(InterruptedReader::new(self.body.clone(), limit)),
            None => Box::new(io::Cursor::new(self.body.clone())),
        };
        Ok(FetchResponse {
            status: self.status,
            content_length: Some(self.body.len() as u64),
            body,
        })
    }
}

/// A reader that yields `limit` bytes and then fails with a reset.
#[derive(Debug)]
pub struct InterruptedReader {
    inner: io::Cursor<Vec<u8>>,
    remaining: usize,
}

impl InterruptedReader {
    /// Creates a reader over `data` that fails after `limit` bytes.
    pub fn new(data: Vec<u8>, limit: usize) -> Self {
        Self {
            inner: io::Cursor::new(data),
            remaining: limit,
        }
    }
}

impl Read for InterruptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let cap = buf.len().min(self.remaining);
        let window = buf.get_mut(..cap).unwrap_or_default();
        let read = self.inner.read(window)?;
        self.remaining -= read;
        if read == 0 {
            self.remaining = 0;
        }
        Ok(read)
    }
}
