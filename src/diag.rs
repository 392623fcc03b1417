//! Log-once helpers for diagnostics that would otherwise repeat for every frame of every file.

/// Emit a `log` record the first time this call site is reached; later hits are silent.
macro_rules! log_once {
    ($lvl:expr, $($arg:tt)+) => {{
        static FIRED: ::std::sync::atomic::AtomicBool = ::std::sync::atomic::AtomicBool::new(false);
        if !FIRED.swap(true, ::std::sync::atomic::Ordering::Relaxed) {
            ::log::log!($lvl, $($arg)+);
        }
    }};
}

macro_rules! warn_once {
    ($($arg:tt)+) => {
        $crate::diag::log_once!(::log::Level::Warn, $($arg)+)
    };
}

macro_rules! debug_once {
    ($($arg:tt)+) => {
        $crate::diag::log_once!(::log::Level::Debug, $($arg)+)
    };
}

pub(crate) use {debug_once, log_once, warn_once};
