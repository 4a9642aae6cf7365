//! Process environment access.

/// Source of environment variables.
pub trait Environment: Send + Sync {
    /// Value of `name`, or `None` if unset or not valid Unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// [`Environment`] backed by the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}
