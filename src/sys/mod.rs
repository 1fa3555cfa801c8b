#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use self::unix::{set_nonblocking, Events, Selector};
