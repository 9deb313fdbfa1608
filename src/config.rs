//! Open-flag and idle-timer configuration, spec §4.5.

use std::time::Duration;

/// Default wait before the first idle-close check after the last request.
pub const DEFAULT_IDLE_INITIAL_WAIT: Duration = Duration::from_secs(60);
/// Default recheck interval once the idle-close timer is armed.
pub const DEFAULT_IDLE_MONITOR_INTERVAL: Duration = Duration::from_secs(10);

/// Flags and timing controlling how [`crate::file::LedgerFile::open`] behaves.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub(crate) create: bool,
    pub(crate) overwrite: bool,
    pub(crate) read_only: bool,
    pub(crate) sys: bool,
    pub(crate) no_log_if_missing: bool,
    pub(crate) idle_initial_wait: Duration,
    pub(crate) idle_monitor_interval: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            create: false,
            overwrite: false,
            read_only: false,
            sys: false,
            no_log_if_missing: false,
            idle_initial_wait: DEFAULT_IDLE_INITIAL_WAIT,
            idle_monitor_interval: DEFAULT_IDLE_MONITOR_INTERVAL,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the file if it does not already exist.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// If the file exists and is non-empty, truncate it to empty instead of
    /// returning [`crate::error::FileError::AlreadyExists`].
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Open for reads only; any mutating request is rejected.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Mark this as a system file, exempt from the usual idle-close timer.
    pub fn sys(mut self, sys: bool) -> Self {
        self.sys = sys;
        self
    }

    /// Suppress the warning log line when `create` is false and the file is
    /// missing — the caller considers a missing file an expected outcome.
    pub fn no_log_if_missing(mut self, no_log_if_missing: bool) -> Self {
        self.no_log_if_missing = no_log_if_missing;
        self
    }

    /// Override how long the actor waits after its last request before the
    /// first idle-close check (default 60s).
    pub fn idle_initial_wait(mut self, wait: Duration) -> Self {
        self.idle_initial_wait = wait;
        self
    }

    /// Override the recheck interval once the idle-close timer is armed
    /// (default 10s).
    pub fn idle_monitor_interval(mut self, interval: Duration) -> Self {
        self.idle_monitor_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_timing() {
        let opts = OpenOptions::new();
        assert_eq!(opts.idle_initial_wait, Duration::from_secs(60));
        assert_eq!(opts.idle_monitor_interval, Duration::from_secs(10));
        assert!(!opts.create);
        assert!(!opts.read_only);
    }

    #[test]
    fn builder_overrides_flags() {
        let opts = OpenOptions::new()
            .create(true)
            .overwrite(true)
            .no_log_if_missing(true)
            .idle_initial_wait(Duration::from_millis(5))
            .idle_monitor_interval(Duration::from_millis(1));
        assert!(opts.create);
        assert!(opts.overwrite);
        assert!(opts.no_log_if_missing);
        assert_eq!(opts.idle_initial_wait, Duration::from_millis(5));
    }
}
