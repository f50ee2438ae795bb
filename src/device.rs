//! Raw byte-addressable access to the device under test.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use aligned_vec::{AVec, RuntimeAlign};

#[cfg(target_os = "linux")]
use std::os::unix::fs::OpenOptionsExt;

use crate::plan::Direction;

pub const DIRECT_IO_ALIGNMENT: usize = 4096;

pub type IoBuffer = AVec<u8, RuntimeAlign>;

/// An open device. Dropping it closes the device.
pub trait BlockHandle {
    /// Fill `buf` from `offset`. A short read is an error.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write all of `buf` at `offset`.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

/// Something that can be opened once per pass and read or written by offset.
pub trait BlockIo {
    type Handle: BlockHandle;

    /// Human-readable name used in messages.
    fn label(&self) -> String;

    fn size_bytes(&self) -> io::Result<u64>;

    fn open(&self, direction: Direction) -> io::Result<Self::Handle>;

    /// Whether I/O buffers must be aligned to [`DIRECT_IO_ALIGNMENT`].
    fn needs_aligned_buffers(&self) -> bool {
        false
    }
}

/// A block device or regular file.
#[derive(Debug, Clone)]
pub struct FileDevice {
    path: PathBuf,
    direct_io: bool,
}

impl FileDevice {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), direct_io: false }
    }

    /// Bypass the page cache (`O_DIRECT` on Linux, `F_NOCACHE` on macOS).
    pub fn with_direct_io(mut self, direct_io: bool) -> Self {
        self.direct_io = direct_io;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_options(&self, direction: Direction) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match direction {
            Direction::Read => opts.read(true),
            Direction::Write => opts.write(true),
        };
        #[cfg(target_os = "linux")]
        {
            if self.direct_io {
                opts.custom_flags(libc::O_DIRECT);
            }
        }
        opts
    }
}

impl BlockIo for FileDevice {
    type Handle = FileHandle;

    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn size_bytes(&self) -> io::Result<u64> {
        let file = File::open(&self.path)?;
        let metadata = file.metadata()?;
        if metadata.is_file() {
            return Ok(metadata.len());
        }
        // Block devices report a zero length in their metadata.
        let mut file = file;
        file.seek(SeekFrom::End(0))
    }

    fn open(&self, direction: Direction) -> io::Result<FileHandle> {
        let file = self.open_options(direction).open(&self.path)?;
        #[cfg(target_os = "macos")]
        {
            if self.direct_io {
                disable_cache(&file)?;
            }
        }
        Ok(FileHandle { file })
    }

    fn needs_aligned_buffers(&self) -> bool {
        self.direct_io
    }
}

#[cfg(target_os = "macos")]
fn disable_cache(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[derive(Debug)]
pub struct FileHandle {
    file: File,
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        impl BlockHandle for FileHandle {
            fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
                use std::os::unix::fs::FileExt;
                self.file.read_exact_at(buf, offset)
            }

            fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
                use std::os::unix::fs::FileExt;
                self.file.write_all_at(buf, offset)
            }
        }
    } else if #[cfg(windows)] {
        impl BlockHandle for FileHandle {
            fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
                use std::os::windows::fs::FileExt;
                let mut done = 0;
                while done < buf.len() {
                    match self.file.seek_read(&mut buf[done..], offset + done as u64)? {
                        0 => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read")),
                        n => done += n,
                    }
                }
                Ok(())
            }

            fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
                use std::os::windows::fs::FileExt;
                let mut done = 0;
                while done < buf.len() {
                    match self.file.seek_write(&buf[done..], offset + done as u64)? {
                        0 => return Err(io::Error::new(io::ErrorKind::WriteZero, "short write")),
                        n => done += n,
                    }
                }
                Ok(())
            }
        }
    } else {
        impl BlockHandle for FileHandle {
            fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
                use std::io::Read;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.read_exact(buf)
            }

            fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
                use std::io::Write;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(buf)
            }
        }
    }
}

/// Zeroed scratch buffer of `len` bytes, page-aligned when `aligned` is set.
pub fn create_buffer(len: usize, aligned: bool) -> IoBuffer {
    let alignment = if aligned { DIRECT_IO_ALIGNMENT } else { 1 };
    let mut v = IoBuffer::with_capacity(alignment, len);
    // safe, works on every version
    for _ in 0..len {
        v.push(0);
    }
    v
}
