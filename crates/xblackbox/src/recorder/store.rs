//! Where trace files are created.

use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::Path;

/// Creates and finalizes the sinks traces are written to.
pub trait TraceStore {
    /// An open trace.
    type Sink: Write + Seek + Debug;

    /// Create a new, empty trace at `path`.
    ///
    /// # Errors
    ///
    /// Must fail with `AlreadyExists` if `path` is taken, so the recorder can
    /// pick another name.
    fn create(&mut self, path: &Path) -> io::Result<Self::Sink>;

    /// Make a finished trace durable.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the data cannot be synced.
    fn sync(&mut self, sink: Self::Sink) -> io::Result<()>;
}

/// Traces as plain files on the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl TraceStore for FileStore {
    type Sink = File;

    fn create(&mut self, path: &Path) -> io::Result<File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    fn sync(&mut self, sink: File) -> io::Result<()> {
        sink.sync_all()
    }
}
