//! Optional `tracing` subscriber for hosts that do not install their own.

use tracing::Level;

/// Install a formatting subscriber writing to stderr at `level` and above.
///
/// Returns `false` if a global subscriber was already set; the existing one stays.
pub fn init_logging(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Map the C ABI's numeric level (0 = error ... 4 = trace) to a `tracing` level.
pub fn level_from_index(index: i32) -> Option<Level> {
    match index {
        0 => Some(Level::ERROR),
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        4 => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels() {
        assert_eq!(level_from_index(0), Some(Level::ERROR));
        assert_eq!(level_from_index(4), Some(Level::TRACE));
        assert_eq!(level_from_index(5), None);
        assert_eq!(level_from_index(-1), None);
    }

    #[test]
    fn second_install_is_refused() {
        init_logging(Level::WARN);
        assert!(!init_logging(Level::DEBUG));
    }
}
