use std::{fmt, io};

/// The outcome of a failed or short-circuited I/O operation.
///
/// I/O primitives never panic on runtime conditions; they report one of
/// these values instead. Programming errors (waiting twice on the same
/// handle, reading zero bytes) do panic, and an uncaught panic inside a
/// task terminates the process.
#[derive(Debug)]
pub enum Error {
    /// The peer closed a readable endpoint.
    Eof,
    /// The operation's soft deadline expired. The file descriptor is left
    /// usable for future operations.
    Timeout,
    /// The operation was canceled via `cancel()`. The file descriptor is
    /// left usable for future operations.
    Canceled,
    /// The destination buffer has no room.
    BufferFull,
    /// The underlying system call failed.
    Os(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Eof => fmt.write_str("eof"),
            Error::Timeout => fmt.write_str("timeout"),
            Error::Canceled => fmt.write_str("canceled"),
            Error::BufferFull => fmt.write_str("buffer is full"),
            Error::Os(err) => fmt::Display::fmt(err, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Os(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Os(err)
    }
}
