//! Output destinations.
//!
//! A [`Sink`] owns the file or standard-output handle for one run. Rust
//! never translates line endings on standard output, so the `-` target is
//! binary safe without touching any process-wide mode. Buffered data is
//! flushed by [`Sink::finish`], or on drop when a run bails out early.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::error::{Error, Result};

const SINK_BUFFER_SIZE: usize = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl From<&str> for OutputTarget {
    fn from(target: &str) -> Self {
        if target == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(target))
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("to stdout"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct Sink {
    target: OutputTarget,
    inner: BufWriter<Box<dyn Write>>,
}

impl Sink {
    pub fn open(target: &OutputTarget) -> Result<Self> {
        let inner: Box<dyn Write> = match target {
            OutputTarget::Stdout => Box::new(io::stdout().lock()),
            OutputTarget::File(path) => {
                Box::new(File::create(path).map_err(|source| Error::SinkOpenFailed {
                    target: path.display().to_string(),
                    source,
                })?)
            }
        };
        Ok(Self {
            target: target.clone(),
            inner: BufWriter::with_capacity(SINK_BUFFER_SIZE, inner),
        })
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    /// Flushes everything still buffered and releases the handle.
    pub fn finish(mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn dash_is_stdout() {
        assert_eq!(OutputTarget::from("-"), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::from("out.wav"),
            OutputTarget::File(PathBuf::from("out.wav"))
        );
        assert_eq!(OutputTarget::Stdout.to_string(), "to stdout");
    }

    #[test]
    fn file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.raw");
        let target = OutputTarget::File(path.clone());

        let mut sink = Sink::open(&target).unwrap();
        assert_eq!(sink.target(), &target);
        sink.write_all(b"RIFF\r\n\x00").unwrap();
        sink.finish().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"RIFF\r\n\x00");
    }

    #[test]
    fn dropped_sink_is_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.raw");
        {
            let mut sink = Sink::open(&OutputTarget::File(path.clone())).unwrap();
            sink.write_all(&[1, 2, 3]).unwrap();
        }
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unopenable_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget::File(dir.path().join("missing").join("out.wav"));
        assert!(matches!(
            Sink::open(&target),
            Err(Error::SinkOpenFailed { .. })
        ));
    }
}
