//! Status transport over a named pipe
//!
//! Frames are a 4-byte little-endian length prefix followed by that many
//! bytes of ASCII. The requesting side creates and removes the FIFO; the
//! daemon only ever opens it for one write.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::debug;

use super::DaemonError;

/// Upper bound on a status frame; anything larger is a protocol violation.
pub const MAX_FRAME_LEN: usize = 4096;

const LEN_PREFIX: usize = 4;

/// Length-prefix a message for the wire.
pub fn encode_frame(message: &str) -> Vec<u8> {
    let body = message.as_bytes();
    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Daemon side: push one frame into an existing FIFO.
///
/// Opens write-only without blocking, so a vanished reader surfaces as an
/// error instead of a hang. The reader owns pipe teardown; the write end is
/// left open deliberately.
pub fn write_frame(path: &Path, message: &str) -> Result<(), DaemonError> {
    let mut pipe = File::options()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    pipe.write_all(&encode_frame(message))?;
    debug!("wrote status frame to {}", path.display());
    std::mem::forget(pipe);
    Ok(())
}

/// Fill `buf` from a non-blocking reader, polling until `deadline`.
fn read_exact_by(file: &mut File, buf: &mut [u8], deadline: Instant) -> Result<(), DaemonError> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return Err(DaemonError::StatusTimeout);
        };
        let timeout = PollTimeout::from(remaining.as_millis().min(u16::MAX as u128) as u16);
        let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
        if poll(&mut fds, timeout)? == 0 {
            continue;
        }
        match file.read(&mut buf[filled..]) {
            // Writer not there yet; poll reported a hangup, not data.
            Ok(0) => thread::sleep(Duration::from_millis(20)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Requesting side: read one frame, giving up after `timeout`.
pub fn read_frame(file: &mut File, timeout: Duration) -> Result<String, DaemonError> {
    let deadline = Instant::now() + timeout;

    let mut prefix = [0u8; LEN_PREFIX];
    read_exact_by(file, &mut prefix, deadline)?;
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(DaemonError::BadFrame("oversized"));
    }

    let mut body = vec![0u8; len];
    read_exact_by(file, &mut body, deadline)?;
    if !body.is_ascii() {
        return Err(DaemonError::BadFrame("not ascii"));
    }
    String::from_utf8(body).map_err(|_| DaemonError::BadFrame("not ascii"))
}

/// The requester-owned FIFO. Created on demand, unlinked on drop.
pub struct StatusPipe {
    path: PathBuf,
}

impl StatusPipe {
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self, DaemonError> {
        let path = path.into();
        match mkfifo(&path, Mode::from_bits_truncate(0o644)) {
            Ok(()) => debug!("created status pipe {}", path.display()),
            // A pipe left over from an earlier request is fine.
            Err(nix::errno::Errno::EEXIST) => debug!("status pipe already exists"),
            Err(e) => return Err(e.into()),
        }
        Ok(Self { path })
    }

    /// Open the read end without blocking on a writer.
    pub fn open_reader(&self) -> Result<File, DaemonError> {
        Ok(File::options()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.path)?)
    }
}

impl Drop for StatusPipe {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::OwnedFd;

    fn fd_pair() -> (File, File) {
        let (read, write): (OwnedFd, OwnedFd) = nix::unistd::pipe().unwrap();
        (File::from(read), File::from(write))
    }

    #[test]
    fn test_frame_round_trip() {
        let (mut reader, mut writer) = fd_pair();
        writer.write_all(&encode_frame("Daemon running.")).unwrap();
        let msg = read_frame(&mut reader, Duration::from_secs(1)).unwrap();
        assert_eq!(msg, "Daemon running.");
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode_frame("ok");
        assert_eq!(frame, vec![2, 0, 0, 0, b'o', b'k']);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let (mut reader, mut writer) = fd_pair();
        writer.write_all(&(1_000_000u32).to_le_bytes()).unwrap();
        assert!(matches!(
            read_frame(&mut reader, Duration::from_secs(1)),
            Err(DaemonError::BadFrame("oversized"))
        ));
    }

    #[test]
    fn test_non_ascii_frame_rejected() {
        let (mut reader, mut writer) = fd_pair();
        let mut frame = (2u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&[0xfe, 0xff]);
        writer.write_all(&frame).unwrap();
        assert!(matches!(
            read_frame(&mut reader, Duration::from_secs(1)),
            Err(DaemonError::BadFrame("not ascii"))
        ));
    }

    #[test]
    fn test_read_times_out_on_silence() {
        let (mut reader, _writer) = fd_pair();
        let begin = Instant::now();
        let result = read_frame(&mut reader, Duration::from_millis(100));
        assert!(matches!(result, Err(DaemonError::StatusTimeout)));
        assert!(begin.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_truncated_frame_times_out() {
        let (mut reader, mut writer) = fd_pair();
        // Length says 10 bytes, body delivers 3.
        let mut frame = (10u32).to_le_bytes().to_vec();
        frame.extend_from_slice(b"abc");
        writer.write_all(&frame).unwrap();
        assert!(matches!(
            read_frame(&mut reader, Duration::from_millis(100)),
            Err(DaemonError::StatusTimeout)
        ));
    }

    #[test]
    fn test_status_pipe_lifecycle() {
        let path = std::env::temp_dir()
            .join(format!("fadestick-pipe-test-{}.pipe", std::process::id()));
        {
            let pipe = StatusPipe::create(&path).unwrap();
            assert!(path.exists());
            // Creating over an existing FIFO is tolerated.
            let again = StatusPipe::create(&path).unwrap();
            drop(again);
            drop(pipe);
        }
        assert!(!path.exists());
    }
}
