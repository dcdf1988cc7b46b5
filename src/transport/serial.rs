//! # Serial TTY Transport
//!
//! This module talks to the printer over a serial or USB-serial TTY
//! (`/dev/ttyS0`, `/dev/ttyUSB0`, ...). Unix only: the line is configured
//! through termios.
//!
//! ## TTY Configuration
//!
//! The device is opened in raw mode so binary frames pass through untouched:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL off
//! - **No flow control**: IXON, IXOFF, IXANY off (0x11/0x13 appear in BCD data)
//! - **No output processing**: OPOST off
//! - **8N1**: CS8, no parity, one stop bit
//! - **Non-canonical, no echo**: ICANON, ECHO, ECHONL, ISIG, IEXTEN off
//!
//! ## Polling
//!
//! `VMIN = 0` and `VTIME = read timeout` make a read return after the
//! timeout with zero bytes when the printer is quiet. That empty read is
//! reported as `None`, and [`crate::transport::Link`] decides how many of
//! those to tolerate.
//!
//! ## Permissions (Linux)
//!
//! ```bash
//! # The device usually belongs to the dialout group
//! $ sudo usermod -aG dialout $USER
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use crate::error::{FiscalError, Result};
use crate::transport::Transport;

/// Default TTY device path
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Default line speed
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default time a single read waits for the first byte
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(300);

/// # Serial Printer Transport
///
/// ## Example
///
/// ```no_run
/// use bematech::transport::{SerialTransport, Transport};
///
/// let mut transport = SerialTransport::open("/dev/ttyUSB0", 115_200)?;
/// transport.write(&[0x02, 0x04, 0x00, 0x1B, 0x13, 0x2E, 0x00])?;
/// let reply = transport.read(3)?;
/// # Ok::<(), bematech::FiscalError>(())
/// ```
pub struct SerialTransport {
    file: File,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open a TTY with the default read timeout.
    pub fn open<P: AsRef<Path>>(device: P, baud_rate: u32) -> Result<Self> {
        Self::open_with_timeout(device, baud_rate, DEFAULT_READ_TIMEOUT)
    }

    /// Open a TTY.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The device doesn't exist
    /// - Permission denied (may need the dialout group)
    /// - The baud rate is not a standard one
    /// - TTY configuration fails
    pub fn open_with_timeout<P: AsRef<Path>>(
        device: P,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self> {
        let path = device.as_ref();

        let file = open_device(path).map_err(|e| {
            FiscalError::Transport(format!("Failed to open {}: {}", path.display(), e))
        })?;

        configure_tty_raw(&file, baud_rate, read_timeout)?;
        log::debug!(
            "opened {} at {} baud, read timeout {:?}",
            path.display(),
            baud_rate,
            read_timeout
        );

        Ok(Self { file, read_timeout })
    }

    /// Open the default device at the default speed.
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DEVICE, DEFAULT_BAUD_RATE)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .map_err(|e| FiscalError::Transport(format!("Write failed: {}", e)))?;
        self.file
            .flush()
            .map_err(|e| FiscalError::Transport(format!("Flush failed: {}", e)))
    }

    fn read(&mut self, max: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; max];
        match self.file.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(FiscalError::Transport(format!("Read failed: {}", e))),
        }
    }
}

fn open_device(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)
}

/// Map a numeric baud rate to its termios speed constant.
fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        _ => return None,
    };
    Some(speed)
}

/// VTIME is in tenths of a second and fits in one byte.
fn vtime_for(timeout: Duration) -> u8 {
    let tenths = timeout.as_millis().div_ceil(100);
    tenths.clamp(1, 255) as u8
}

/// Configure the file descriptor for raw 8N1 polling reads.
fn configure_tty_raw(file: &File, baud_rate: u32, read_timeout: Duration) -> Result<()> {
    use std::mem::MaybeUninit;

    let fd = file.as_raw_fd();
    let speed = speed_for(baud_rate)
        .ok_or_else(|| FiscalError::Transport(format!("Unsupported baud rate: {}", baud_rate)))?;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(FiscalError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CSTOPB);
    termios.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = vtime_for(read_timeout);

    let result = unsafe {
        libc::cfsetispeed(&mut termios, speed);
        libc::cfsetospeed(&mut termios, speed)
    };
    if result != 0 {
        return Err(FiscalError::Transport(format!(
            "cfsetspeed failed: {}",
            io::Error::last_os_error()
        )));
    }

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(FiscalError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    // Drop whatever a previous session left in the buffers
    unsafe { libc::tcflush(fd, libc::TCIOFLUSH) };

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_path() {
        assert_eq!(DEFAULT_DEVICE, "/dev/ttyUSB0");
    }

    #[test]
    fn test_vtime_rounding() {
        assert_eq!(vtime_for(Duration::from_millis(300)), 3);
        assert_eq!(vtime_for(Duration::from_millis(250)), 3);
        assert_eq!(vtime_for(Duration::from_millis(0)), 1);
        assert_eq!(vtime_for(Duration::from_secs(60)), 255);
    }

    #[test]
    fn test_supported_speeds() {
        assert_eq!(speed_for(9600), Some(libc::B9600));
        assert_eq!(speed_for(115_200), Some(libc::B115200));
        assert_eq!(speed_for(12_345), None);
    }

    #[test]
    fn test_open_missing_device() {
        let err = SerialTransport::open("/dev/does-not-exist-bematech", 9600)
            .err()
            .unwrap();
        assert!(matches!(err, FiscalError::Transport(_)));
    }

    #[test]
    fn test_open_non_tty_fails() {
        // termios calls are rejected on anything that is not a terminal
        let err = SerialTransport::open("/dev/null", 9600).err().unwrap();
        match err {
            FiscalError::Transport(message) => assert!(message.contains("tcgetattr")),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_speed_fails_before_termios() {
        let err = SerialTransport::open("/dev/null", 12_345).err().unwrap();
        match err {
            FiscalError::Transport(message) => assert!(message.contains("baud")),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    // Note: reading and writing need a connected printer.
}
