//! Logger initialization for binaries/tests that want output. The
//! library itself only ever emits through the `log` macros and never
//! initializes a sink — wiring one up is outer-layer setup.

use logforth::append;

/// Installs a colored stdout logger. Only the first call in a process
/// actually installs anything (mirrors `log`'s own global-logger-once
/// semantics).
pub fn init_logger() {
    logforth::builder()
        .dispatch(|d| d.append(append::Stdout::default()))
        .apply();
}
