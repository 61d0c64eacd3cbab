#[cfg(test)]
mod mock;
#[cfg(unix)]
mod unix;

#[cfg(test)]
pub(crate) use mock::{MockCall, MockProcessManager};
#[cfg(unix)]
pub use unix::UnixProcessManager;
