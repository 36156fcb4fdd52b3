//! # Output Sinks
//!
//! Encoded instances are handed to a sink as complete byte buffers, so a sink
//! never sees a partially encoded instance.

use std::{
    ffi::OsStr,
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::instances::fio::compressed_uncompressed_write;

/// Destination of encoded instances
pub trait Sink {
    /// Commits one encoded instance. `name` is the instance's name if it has
    /// one, `extension` the writer's file extension. Returns the path of the
    /// written file, if the sink writes files.
    ///
    /// # Errors
    ///
    /// If writing fails
    fn commit(
        &mut self,
        name: Option<&str>,
        extension: &str,
        data: &[u8],
    ) -> io::Result<Option<PathBuf>>;
}

/// Writes all instances one after another to a single stream
pub struct StreamSink<W: Write> {
    out: W,
}

impl StreamSink<io::Stdout> {
    /// A sink writing to standard output
    #[must_use]
    pub fn stdout() -> Self {
        StreamSink { out: io::stdout() }
    }
}

impl<W: Write> StreamSink<W> {
    /// Creates a sink writing to a stream
    pub fn new(out: W) -> Self {
        StreamSink { out }
    }

    /// Gets the underlying stream back
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn commit(&mut self, _: Option<&str>, _: &str, data: &[u8]) -> io::Result<Option<PathBuf>> {
        self.out.write_all(data)?;
        self.out.flush()?;
        Ok(None)
    }
}

impl<W: Write> fmt::Debug for StreamSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink").finish_non_exhaustive()
    }
}

/// Writes every instance to its own file in a directory. Files are named
/// after the instance, or `instance-<n>` for unnamed instances, and get the
/// writer's extension. A file appears only once it is completely written.
#[derive(Debug)]
pub struct DirSink {
    dir: PathBuf,
    compression: Option<String>,
    n_unnamed: usize,
}

impl DirSink {
    /// Creates a sink writing into an existing directory
    ///
    /// # Errors
    ///
    /// If the path is not a directory
    pub fn new<P: Into<PathBuf>>(dir: P) -> io::Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("output directory {} does not exist", dir.display()),
            ));
        }
        Ok(DirSink {
            dir,
            compression: None,
            n_unnamed: 0,
        })
    }

    /// Appends a compression extension, e.g., `gz`, to every file. With
    /// feature `compression` the files are compressed accordingly.
    #[must_use]
    pub fn with_compression<S: Into<String>>(mut self, ext: S) -> Self {
        self.compression = Some(ext.into());
        self
    }

    /// The output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&mut self, name: Option<&str>, extension: &str) -> PathBuf {
        let stem = match name.filter(|n| is_file_stem(n)) {
            Some(name) => name.to_owned(),
            None => {
                self.n_unnamed += 1;
                format!("instance-{}", self.n_unnamed)
            }
        };
        let mut file = format!("{stem}.{extension}");
        if let Some(comp) = &self.compression {
            file.push('.');
            file.push_str(comp);
        }
        self.dir.join(file)
    }
}

/// Whether a name can be used as a file name as is
fn is_file_stem(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && Path::new(name).file_name() == Some(OsStr::new(name))
        && !name.contains(['/', '\\'])
}

impl Sink for DirSink {
    fn commit(
        &mut self,
        name: Option<&str>,
        extension: &str,
        data: &[u8],
    ) -> io::Result<Option<PathBuf>> {
        let path = self.file_name(name, extension);
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = compressed_uncompressed_write(&path, tmp.reopen()?);
            writer.write_all(data)?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{DirSink, Sink, StreamSink};

    #[test]
    fn stream() {
        let mut sink = StreamSink::new(Vec::new());
        assert_eq!(sink.commit(Some("a"), "csp", b"one\n").unwrap(), None);
        sink.commit(None, "csp", b"two\n").unwrap();
        assert_eq!(sink.into_inner(), b"one\ntwo\n");
    }

    #[test]
    fn directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirSink::new(dir.path()).unwrap();
        let named = sink.commit(Some("knap1"), "lp", b"a").unwrap().unwrap();
        assert_eq!(named, dir.path().join("knap1.lp"));
        let unnamed = sink.commit(None, "lp", b"b").unwrap().unwrap();
        assert_eq!(unnamed, dir.path().join("instance-1.lp"));
        let unsafe_name = sink.commit(Some("../x"), "lp", b"c").unwrap().unwrap();
        assert_eq!(unsafe_name, dir.path().join("instance-2.lp"));
        assert_eq!(fs::read(&named).unwrap(), b"a");
        assert_eq!(fs::read(&unnamed).unwrap(), b"b");
        // no temporary files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirSink::new(dir.path().join("nope")).is_err());
    }
}
