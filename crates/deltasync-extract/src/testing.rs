//! In-memory transport and log capture for unit tests

use crate::error::TransportFailure;
use crate::transport::{FormRequest, Transport};
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// A request as seen by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub url: String,
    pub form: Vec<(String, String)>,
    pub authenticated: bool,
}

impl Recorded {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

type Handler = dyn Fn(&Recorded, usize) -> Result<String, TransportFailure> + Send + Sync;

/// Answers requests with a handler and records every call.
///
/// The handler receives the request and the number of earlier calls made to the
/// same URL.
#[derive(Clone)]
pub struct ScriptedTransport {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&Recorded, usize) -> Result<String, TransportFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, suffix: &str) -> Vec<Recorded> {
        self.calls()
            .into_iter()
            .filter(|r| r.url.ends_with(suffix))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_form(&self, request: FormRequest<'_>) -> Result<String, TransportFailure> {
        let recorded = Recorded {
            url: request.url.to_string(),
            form: request
                .form
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            authenticated: request.credentials.is_some(),
        };

        let previous = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| TransportFailure::Connection("poisoned".into()))?;
            let previous = calls.iter().filter(|c| c.url == recorded.url).count();
            calls.push(recorded.clone());
            previous
        };

        (self.handler)(&recorded, previous)
    }
}

/// Collects formatted log lines written while its guard is installed
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Route events of the current thread here until the guard drops
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let needle = format!(" {} ", level);
        let buffer = self.buffer.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(&needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
