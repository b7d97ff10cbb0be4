/// Macro for prefixed status logging to stderr.
///
/// Usage:
/// ```ignore
/// log_status!("trigger", "Triggering downstream pipeline on {}", project);
/// log_status!("wait", "pipeline #{} is {}", id, status);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {{
        eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
    }};
}

pub mod core;

// Re-export everything from core for ergonomic library use
// Users can write `roadie::poller` instead of `roadie::core::poller`
pub use core::*;

#[cfg(test)]
mod tests {
    #[test]
    fn log_status_expands_to_an_expression() {
        // The macro body must stay a block so callers can use it as a
        // match arm or branch value.
        let url: Option<&str> = None;
        match url {
            Some(url) => log_status!("trigger", "Triggered {}", url),
            None => log_status!("trigger", "Triggered pipeline"),
        }
    }
}
