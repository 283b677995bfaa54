use std::{sync::OnceLock, time::Duration};

use clap::Parser;

/// Environment variable holding whitespace-separated options, e.g.
/// `VMSYNC_OPTIONS="--monitor-spin-count 0"`.
pub const OPTIONS_ENV: &str = "VMSYNC_OPTIONS";

#[derive(Parser, Debug, Clone)]
#[command(name = "vmsync")]
pub struct Options {
    /// Ownership CAS attempts a contending thread makes before parking on the
    /// monitor's ready queue.
    #[clap(long, default_value_t = 16)]
    pub monitor_spin_count: u32,

    /// How long a deflating owner waits for stragglers to acknowledge the detach
    /// before posting to them again, in microseconds.
    #[clap(long, default_value_t = 200)]
    pub deflate_ack_timeout_us: u64,

    /// Warn once a deflation needed this many rounds.
    #[clap(long, default_value_t = 1000)]
    pub deflate_warn_rounds: u32,
}

impl Options {
    /// Parse options from [`OPTIONS_ENV`]. Invalid input is logged and replaced by
    /// the defaults.
    pub fn from_env() -> Self {
        let Ok(flags) = std::env::var(OPTIONS_ENV) else {
            return Self::default();
        };
        let args = std::iter::once("vmsync").chain(flags.split_whitespace());
        match Self::try_parse_from(args) {
            Ok(options) => options,
            Err(err) => {
                log::warn!("ignoring invalid {}: {}", OPTIONS_ENV, err);
                Self::default()
            }
        }
    }

    pub fn deflate_ack_timeout(&self) -> Duration {
        Duration::from_micros(self.deflate_ack_timeout_us)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::parse_from(["vmsync"])
    }
}

static OPTIONS: OnceLock<Options> = OnceLock::new();

pub fn options() -> &'static Options {
    OPTIONS.get_or_init(Options::from_env)
}

/// Install `options` for the rest of the process. Fails, handing them back, if options
/// were already installed or read.
pub fn set_options(options: Options) -> Result<(), Options> {
    OPTIONS.set(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.monitor_spin_count, 16);
        assert_eq!(options.deflate_ack_timeout(), Duration::from_micros(200));
        assert_eq!(options.deflate_warn_rounds, 1000);
    }

    #[test]
    fn parses_flags() {
        let options = Options::try_parse_from([
            "vmsync",
            "--monitor-spin-count",
            "0",
            "--deflate-ack-timeout-us",
            "5",
        ])
        .unwrap();
        assert_eq!(options.monitor_spin_count, 0);
        assert_eq!(options.deflate_ack_timeout_us, 5);
    }
}
