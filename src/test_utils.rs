//! Shared helpers for capturing log output in tests.

use std::io;
use std::sync::{Arc, Mutex};
use tracing_core::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

use crate::logging::routed_layers;

/// In-memory writer standing in for the log file or standard output.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Lines containing `needle`, in the order they were written.
    pub fn lines_with(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(String::from)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Subscriber routed like the production one, with the main log and the
/// execution log captured separately.
pub fn capture_logs() -> (impl Subscriber + Send + Sync + 'static, Captured, Captured) {
    let main = Captured::default();
    let exec = Captured::default();
    let main_writer = main.clone();
    let exec_writer = exec.clone();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new("gitlab_webhook=debug"))
        .with(routed_layers(
            move || main_writer.clone(),
            move || exec_writer.clone(),
        ));

    (subscriber, main, exec)
}
