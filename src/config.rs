//! Tunables for an [`crate::Application`]. Construction is in-process
//! only: there is no file format to parse, just a plain struct with
//! sensible defaults.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    /// How long a page may sit idle before the sweeper evicts it.
    pub session_ttl: Duration,
    /// How often the background sweeper scans for expired pages.
    pub sweep_interval: Duration,
    /// Recursion bound for `range`/`with`/`if` nesting during a render,
    /// guarding against cyclic host data.
    pub max_traversal_depth: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            session_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            max_traversal_depth: 128,
        }
    }
}
