#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the voucher map binaries.
//!
//! [`init_logger`] routes `log` output through an `indicatif`
//! [`MultiProgress`] so log lines print above live bars, and
//! [`IndicatifProgress`] renders the proximity engine's chunk progress.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use voucher_map_proximity::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// A [`ProgressBar`] driven by a [`ProgressCallback`].
///
/// Starts as a spinner and becomes a counted bar once the total is known.
pub struct IndicatifProgress {
    bar: ProgressBar,
    counted_style: ProgressStyle,
}

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const COUNTED_TEMPLATE: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} units [{elapsed_precise}]";

impl IndicatifProgress {
    /// Adds a subject-count bar for a distance matrix to `multi`.
    #[must_use]
    pub fn distance_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let spinner = ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let counted_style = ProgressStyle::with_template(COUNTED_TEMPLATE)
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=> "));

        let bar = multi.add(ProgressBar::new_spinner().with_style(spinner));
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        Arc::new(Self { bar, counted_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_style(self.counted_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Logs at `info` unless `RUST_LOG` says otherwise. Returns the
/// [`MultiProgress`] every bar must be added to. A logger that is already
/// installed is left in place.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}
