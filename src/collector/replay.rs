//! Landmark frame collection from a JSON Lines stream.
//!
//! The face-mesh extractor runs outside this crate (browser, Python, native
//! camera app). It writes one `FrameEvent` per line to a file or pipe, and
//! this collector forwards the parsed frames to the scoring loop over a
//! bounded channel.

use crate::collector::types::FrameEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Where landmark frames are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    /// Standard input (an extractor piping into this process)
    Stdin,
    /// A recorded JSON Lines file
    File(PathBuf),
}

impl FrameSource {
    /// Parse a CLI argument; `-` selects standard input.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            FrameSource::Stdin
        } else {
            FrameSource::File(PathBuf::from(arg))
        }
    }
}

/// Configuration for the replay collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub source: FrameSource,
    /// Replay pace in frames per second; `None` forwards frames as fast as
    /// they are read.
    pub fps: Option<f64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source: FrameSource::Stdin,
            fps: None,
        }
    }
}

/// Errors that can occur during frame collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyStarted,
    Io(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyStarted => write!(f, "Collector was already started"),
            CollectorError::Io(e) => write!(f, "Could not open frame source: {e}"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Reads landmark frames on a background thread.
///
/// The channel disconnects once the source is exhausted, which is how the
/// consumer learns that the stream ended.
pub struct ReplayCollector {
    config: CollectorConfig,
    sender: Option<Sender<FrameEvent>>,
    receiver: Receiver<FrameEvent>,
    running: Arc<AtomicBool>,
    skipped_lines: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReplayCollector {
    /// Create a new collector. Nothing is read until [`start`](Self::start).
    pub fn new(config: CollectorConfig) -> Self {
        // Bounded so a fast file replay cannot outrun the scoring loop by much
        let (sender, receiver) = bounded(1_024);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            skipped_lines: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Open the source and start forwarding frames.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        let sender = self.sender.take().ok_or(CollectorError::AlreadyStarted)?;

        let reader: Box<dyn BufRead + Send> = match &self.config.source {
            FrameSource::Stdin => Box::new(BufReader::new(std::io::stdin())),
            FrameSource::File(path) => {
                let file = File::open(path)
                    .map_err(|e| CollectorError::Io(format!("{}: {e}", path.display())))?;
                Box::new(BufReader::new(file))
            }
        };

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let skipped = self.skipped_lines.clone();
        let pace = self
            .config
            .fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps));

        let handle = thread::spawn(move || {
            read_frames(reader, sender, running.clone(), skipped, pace);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop forwarding frames.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // A reader blocked on stdin cannot be interrupted; leave it detached.
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    /// Check if the reader thread is still forwarding frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for frame events.
    pub fn receiver(&self) -> &Receiver<FrameEvent> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<FrameEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of lines that could not be parsed as frames.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines.load(Ordering::Relaxed)
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_frames(
    reader: Box<dyn BufRead + Send>,
    sender: Sender<FrameEvent>,
    running: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
    pace: Option<Duration>,
) {
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Frame source read error: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<FrameEvent>(trimmed) {
            Ok(event) => {
                if sender.send(event).is_err() {
                    // Receiver dropped
                    break;
                }
            }
            Err(e) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Skipping malformed frame line: {e}");
            }
        }

        if let Some(pace) = pace {
            thread::sleep(pace);
        }
    }
}
