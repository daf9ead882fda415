use std::{env, io, str::FromStr, time::Instant};

pub use log::LevelFilter;

/// Logger configuration object.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggerConfig {
    /// Whether to use color output when logging to the terminal or not.
    pub use_colors: bool,
    /// Sets the overarching level filter for the logger.
    pub level_filter: LevelFilter,
    /// Per-module overrides, e.g. `auto_rig::solver` at `Debug`.
    pub module_levels: Vec<(String, LevelFilter)>,
}

impl Default for LoggerConfig {
    fn default() -> LoggerConfig {
        let use_colors = env::var("AUTO_RIG_LOG_DISABLE_COLORS").is_err();
        let level_filter = env::var("AUTO_RIG_LOG_LEVEL")
            .ok()
            .and_then(|lf| LevelFilter::from_str(&lf).ok())
            .unwrap_or(LevelFilter::Info);
        let module_levels = env::var("AUTO_RIG_LOG_MODULES")
            .map(|directives| parse_module_levels(&directives))
            .unwrap_or_default();
        LoggerConfig {
            use_colors,
            level_filter,
            module_levels,
        }
    }
}

/// Parses `module=level` pairs separated by commas; malformed entries are skipped.
pub fn parse_module_levels(directives: &str) -> Vec<(String, LevelFilter)> {
    directives
        .split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let module = module.trim();
            if module.is_empty() {
                return None;
            }
            let level = LevelFilter::from_str(level.trim()).ok()?;
            Some((module.to_string(), level))
        })
        .collect()
}

/// Starts a logger writing to stderr, colored on supported terminals.
///
/// Each line carries the time elapsed since the logger started.
pub fn start_logger(config: LoggerConfig) {
    let color_config = fern::colors::ColoredLevelConfig::new();
    let started = Instant::now();
    let use_colors = config.use_colors;

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            let (color, color_reset) = if use_colors {
                (
                    format!(
                        "\x1B[{}m",
                        color_config.get_color(&record.level()).to_fg_str()
                    ),
                    "\x1B[0m",
                )
            } else {
                (String::new(), "")
            };
            out.finish(format_args!(
                "{color}[{elapsed:>8.3}s][{level}][{target}] {message}{color_reset}",
                elapsed = started.elapsed().as_secs_f64(),
                level = record.level(),
                target = record.target(),
            ))
        })
        .level(config.level_filter);
    for (module, level) in config.module_levels {
        dispatch = dispatch.level_for(module, level);
    }

    dispatch
        .chain(io::stderr())
        .apply()
        .unwrap_or_else(|_| log::debug!("Global logger already set, keeping it"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_levels() {
        let levels = parse_module_levels("auto_rig::solver=debug, auto_rig::io = TRACE");
        assert_eq!(
            levels,
            vec![
                ("auto_rig::solver".to_string(), LevelFilter::Debug),
                ("auto_rig::io".to_string(), LevelFilter::Trace),
            ]
        );
    }

    #[test]
    fn test_parse_module_levels_skips_malformed() {
        let levels = parse_module_levels("auto_rig=loud,=info,auto_rig::pipeline,auto_rig=warn");
        assert_eq!(levels, vec![("auto_rig".to_string(), LevelFilter::Warn)]);
    }

    #[test]
    fn test_empty_module_directives() {
        assert!(parse_module_levels("").is_empty());
    }
}
