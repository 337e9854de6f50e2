//! Development-only pass tracing, gated behind the `detailed_timers`
//! feature the same way the teacher gates `token_log!`/`header_log!`
//! (`compiler_frontend::compiler_messages::compiler_dev_logging`):
//! compiled out entirely in a normal build rather than checked at
//! runtime, so it costs nothing unless a developer opts in.

#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! pass_log {
    ($($arg:tt)*) => {
        eprintln!("[pass] {}", format!($($arg)*));
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! pass_log {
    ($($arg:tt)*) => {
        let _ = || { let _ = format_args!($($arg)*); };
    };
}
