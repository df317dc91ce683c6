#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

#[cfg(feature = "log")]
#[macro_use]
mod log {
    macro_rules! fmi_log {
        (trace, $($arg:expr),*) => { log::trace!($($arg),*); };
        (warn, $($arg:expr),*) => { log::warn!($($arg),*); };
    }
}

#[cfg(feature = "defmt")]
#[macro_use]
mod log {
    macro_rules! fmi_log {
        (trace, $($arg:expr),*) => { ::defmt::trace!($($arg),*); };
        (warn, $($arg:expr),*) => { ::defmt::warn!($($arg),*); };
    }
}

#[cfg(all(not(feature = "log"), not(feature = "defmt")))]
#[macro_use]
mod log {
    macro_rules! fmi_log {
        ($level:ident, $($arg:expr),*) => { $( let _ = $arg; )* }
    }
}

macro_rules! fmi_trace {
    ($($arg:expr),*) => (fmi_log!(trace, $($arg),*));
}

macro_rules! fmi_warn {
    ($($arg:expr),*) => (fmi_log!(warn, $($arg),*));
}
