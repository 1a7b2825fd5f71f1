use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering;

static INIT: AtomicBool = AtomicBool::new(false);

/// Initializes the logger with debug mode, logging all messages including debug messages.
pub fn init_logger_debug() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

/// Initializes the logger with default mode, only logging errors and above.
pub fn init_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(false);
    }
}

fn init(debug: bool) {
    let env = if debug {
        "compilscript_core=trace"
    } else {
        "compilscript_core=error"
    };
    flexi_logger::Logger::try_with_env_or_str(env)
        .expect("Failed to initialize logger")
        .start()
        .expect("Failed to start logger");
}
