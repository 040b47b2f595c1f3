use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::foundation::error::{StudioError, StudioResult};

/// Why no incremental destination was obtained.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PickError {
    /// Streaming is not possible here; capture falls back to buffering in memory.
    #[error("streaming destination unavailable: {0}")]
    Unavailable(String),
    /// The user declined to pick a destination; the export is abandoned.
    #[error("destination selection cancelled")]
    Cancelled,
}

/// Sink accepting encoded chunks in order.
pub trait WriteDestination: Send {
    /// Append one chunk.
    fn write(&mut self, chunk: &[u8]) -> StudioResult<()>;

    /// Finish the output so it becomes visible at its final location.
    fn close(self: Box<Self>) -> StudioResult<()>;

    /// Discard everything written so far.
    fn abort(self: Box<Self>) -> StudioResult<()>;

    /// Where the finished output lands, when it is a file.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Asks for an incremental write destination.
pub trait DestinationPicker {
    /// Pick a destination for an output suggested as `suggested_name`.
    fn pick(&mut self, suggested_name: &str) -> Result<Box<dyn WriteDestination>, PickError>;
}

/// Picks `<dir>/<suggested_name>` without asking.
#[derive(Clone, Debug)]
pub struct FileDestinationPicker {
    dir: PathBuf,
}

impl FileDestinationPicker {
    /// Picker writing into `dir`, created on demand.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DestinationPicker for FileDestinationPicker {
    fn pick(&mut self, suggested_name: &str) -> Result<Box<dyn WriteDestination>, PickError> {
        if suggested_name.is_empty() {
            return Err(PickError::Cancelled);
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PickError::Unavailable(format!(
                "cannot create output directory '{}': {e}",
                self.dir.display()
            ))
        })?;
        let dest = FileDestination::create(self.dir.join(suggested_name))
            .map_err(|e| PickError::Unavailable(e.to_string()))?;
        Ok(Box::new(dest))
    }
}

/// Picker for hosts without incremental writes.
#[derive(Clone, Debug)]
pub struct UnavailablePicker {
    reason: String,
}

impl UnavailablePicker {
    /// Picker that always fails with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailablePicker {
    fn default() -> Self {
        Self::new("incremental writes are disabled")
    }
}

impl DestinationPicker for UnavailablePicker {
    fn pick(&mut self, _suggested_name: &str) -> Result<Box<dyn WriteDestination>, PickError> {
        Err(PickError::Unavailable(self.reason.clone()))
    }
}

/// File written as `<path>.part` and renamed into place on close.
#[derive(Debug)]
pub struct FileDestination {
    final_path: PathBuf,
    part_path: PathBuf,
    out: BufWriter<File>,
}

impl FileDestination {
    /// Open the temporary `.part` file next to `final_path`.
    pub fn create(final_path: PathBuf) -> StudioResult<Self> {
        use anyhow::Context as _;
        let mut part = final_path.clone().into_os_string();
        part.push(".part");
        let part_path = PathBuf::from(part);
        let file = File::create(&part_path)
            .with_context(|| format!("create '{}'", part_path.display()))?;
        Ok(Self {
            final_path,
            part_path,
            out: BufWriter::new(file),
        })
    }
}

impl WriteDestination for FileDestination {
    fn write(&mut self, chunk: &[u8]) -> StudioResult<()> {
        use anyhow::Context as _;
        self.out
            .write_all(chunk)
            .with_context(|| format!("write to '{}'", self.part_path.display()))?;
        Ok(())
    }

    fn close(self: Box<Self>) -> StudioResult<()> {
        use anyhow::Context as _;
        let Self {
            final_path,
            part_path,
            out,
        } = *self;
        let file = out
            .into_inner()
            .map_err(|e| StudioError::capture(format!("flush '{}': {e}", part_path.display())))?;
        file.sync_all()
            .with_context(|| format!("sync '{}'", part_path.display()))?;
        drop(file);
        std::fs::rename(&part_path, &final_path).with_context(|| {
            format!(
                "rename '{}' to '{}'",
                part_path.display(),
                final_path.display()
            )
        })?;
        Ok(())
    }

    fn abort(self: Box<Self>) -> StudioResult<()> {
        use anyhow::Context as _;
        let Self { part_path, out, .. } = *self;
        drop(out);
        std::fs::remove_file(&part_path)
            .with_context(|| format!("remove '{}'", part_path.display()))?;
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.final_path)
    }
}

enum WriteCmd {
    Chunk(Vec<u8>),
    Close,
    Abort,
}

/// Totals reported when a [`DestinationWriter`] finishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Chunks handed to the destination.
    pub chunks: u64,
    /// Chunks whose write failed.
    pub failed: u64,
    /// Bytes successfully written.
    pub bytes: u64,
    /// Final location, when the destination is a file.
    pub location: Option<PathBuf>,
}

type WriterResult = (WriteReport, StudioResult<()>);
type WriterJob = Box<dyn FnOnce() -> WriterResult + Send>;

/// Serializes writes to one destination on a dedicated thread.
///
/// Only one write is ever in flight. [`DestinationWriter::write`] never blocks: chunks that do
/// not fit the bounded channel wait in a local backlog and are handed over on later writes or
/// at close. A failed write is logged and counted, and later chunks are still attempted.
pub struct DestinationWriter {
    tx: Option<mpsc::SyncSender<WriteCmd>>,
    handle: Option<JoinHandle<WriterResult>>,
    backlog: VecDeque<Vec<u8>>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for DestinationWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationWriter")
            .field("location", &self.location)
            .field("backlog", &self.backlog.len())
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl DestinationWriter {
    /// Move `dest` onto a writer thread with room for `queue` pending chunks.
    pub fn spawn(dest: Box<dyn WriteDestination>, queue: usize) -> StudioResult<Self> {
        Self::spawn_with(dest, queue, |job| {
            std::thread::Builder::new()
                .name("capture-writer".to_owned())
                .spawn(job)
        })
    }

    /// Like [`DestinationWriter::spawn`] with a custom thread spawner.
    ///
    /// The destination is only handed to the job once the thread exists, so a spawn failure
    /// aborts it here instead of leaking a half-written file.
    pub(crate) fn spawn_with(
        dest: Box<dyn WriteDestination>,
        queue: usize,
        spawner: impl FnOnce(WriterJob) -> std::io::Result<JoinHandle<WriterResult>>,
    ) -> StudioResult<Self> {
        let location = dest.location().map(Path::to_path_buf);
        let (tx, rx) = mpsc::sync_channel::<WriteCmd>(queue.max(1));
        let (dest_tx, dest_rx) = mpsc::channel::<Box<dyn WriteDestination>>();
        let report_location = location.clone();
        let job: WriterJob = Box::new(move || match dest_rx.recv() {
            Ok(dest) => writer_loop(dest, rx, report_location),
            Err(_) => (
                WriteReport {
                    location: report_location,
                    ..WriteReport::default()
                },
                Err(StudioError::capture("destination never reached the writer thread")),
            ),
        });

        let handle = match spawner(job) {
            Ok(handle) => handle,
            Err(e) => {
                discard(dest);
                return Err(StudioError::capture(format!(
                    "failed to spawn writer thread: {e}"
                )));
            }
        };
        if let Err(mpsc::SendError(dest)) = dest_tx.send(dest) {
            discard(dest);
            return Err(StudioError::capture("destination writer thread exited"));
        }
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            backlog: VecDeque::new(),
            location,
        })
    }

    /// Final location of the destination, if known.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Chunks waiting for room in the writer queue.
    pub fn backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Queue a chunk without blocking; it joins the backlog while the writer queue is full.
    pub fn write(&mut self, chunk: Vec<u8>) -> StudioResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| StudioError::capture("destination writer already finished"))?;
        self.backlog.push_back(chunk);
        while let Some(next) = self.backlog.pop_front() {
            match tx.try_send(WriteCmd::Chunk(next)) {
                Ok(()) => {}
                Err(mpsc::TrySendError::Full(WriteCmd::Chunk(next))) => {
                    self.backlog.push_front(next);
                    debug!(backlog = self.backlog.len(), "writer queue full; chunk held back");
                    break;
                }
                Err(_) => {
                    return Err(StudioError::capture("destination writer thread exited"));
                }
            }
        }
        Ok(())
    }

    /// Flush queued chunks, then close the destination.
    pub fn close(mut self) -> StudioResult<WriteReport> {
        self.finish(WriteCmd::Close)
    }

    /// Abort the destination once queued chunks have drained.
    pub fn abort(mut self) -> StudioResult<WriteReport> {
        self.backlog.clear();
        self.finish(WriteCmd::Abort)
    }

    fn finish(&mut self, cmd: WriteCmd) -> StudioResult<WriteReport> {
        if let Some(tx) = self.tx.take() {
            // Send failures mean the thread is gone; join below reports why.
            for chunk in self.backlog.drain(..) {
                if tx.send(WriteCmd::Chunk(chunk)).is_err() {
                    break;
                }
            }
            let _ = tx.send(cmd);
        }
        self.backlog.clear();
        let handle = self
            .handle
            .take()
            .ok_or_else(|| StudioError::capture("destination writer already finished"))?;
        let (report, result) = handle
            .join()
            .map_err(|_| StudioError::capture("destination writer thread panicked"))?;
        result.map(|()| report)
    }
}

fn discard(dest: Box<dyn WriteDestination>) {
    if let Err(e) = dest.abort() {
        warn!(error = %e, "discarding unstarted destination failed");
    }
}

impl Drop for DestinationWriter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.backlog.clear();
            if let Err(e) = self.finish(WriteCmd::Abort) {
                warn!(error = %e, "destination abort on drop failed");
            }
        }
    }
}

fn writer_loop(
    mut dest: Box<dyn WriteDestination>,
    rx: mpsc::Receiver<WriteCmd>,
    location: Option<PathBuf>,
) -> WriterResult {
    let mut report = WriteReport {
        location,
        ..WriteReport::default()
    };
    loop {
        match rx.recv() {
            Ok(WriteCmd::Chunk(chunk)) => {
                report.chunks += 1;
                match dest.write(&chunk) {
                    Ok(()) => report.bytes += chunk.len() as u64,
                    Err(e) => {
                        report.failed += 1;
                        warn!(chunk = report.chunks, error = %e, "chunk write failed");
                    }
                }
            }
            Ok(WriteCmd::Close) => {
                debug!(chunks = report.chunks, bytes = report.bytes, "closing destination");
                let result = dest.close();
                return (report, result);
            }
            Ok(WriteCmd::Abort) | Err(_) => {
                debug!(chunks = report.chunks, "aborting destination");
                let result = dest.abort();
                return (report, result);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/destination.rs"]
mod tests;
