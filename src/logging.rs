//! Logger initialization and reconfiguration.
//!
//! Uses the `log` facade, backed by `env_logger`'s formatter. `log_level`
//! in the config is re-applied on SIGHUP without tearing down and
//! rebuilding the logger.

use log::LevelFilter;

/// Install the global logger, setting its initial level from `log_level`.
/// Safe to call exactly once per process; a second call is a no-op (and
/// logged as such), since `env_logger` can only be installed once.
pub fn init(log_level: &str) {
    let level = parse_level(log_level);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if builder.try_init().is_err() {
        log::warn!("logger already initialized, leaving existing configuration in place");
    }
}

/// Change the effective log level at runtime (SIGHUP reload). `env_logger`
/// doesn't expose a handle to reconfigure itself, but the `log` facade's
/// global max level is the thing call sites actually check, so updating it
/// here is sufficient to raise or lower verbosity without a restart.
pub fn set_level(log_level: &str) {
    log::set_max_level(parse_level(log_level));
}

fn parse_level(log_level: &str) -> LevelFilter {
    log_level.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("not-a-level"), LevelFilter::Info);
    }

    #[test]
    fn test_known_levels_parse() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
    }
}
