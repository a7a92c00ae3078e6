//! Progress reporting while waiting for the control plane.

use stackkit::{Error, PollCallback};
use std::time::Duration;

use crate::ui;

/// Prints a dim line for every pending status check.
pub struct PollReporter;

impl PollCallback for PollReporter {
    fn on_pending(&self, resource: &str, desired: &str, observed: Option<&str>, delay: Duration) {
        let seen = observed.unwrap_or("unknown");
        log::debug!("{resource}: '{seen}' != '{desired}', retrying in {delay:?}");
        ui::dim(&format!(
            "{resource} is {seen}, waiting for {desired} (next check in {})",
            ui::format_duration(delay)
        ));
    }

    fn on_query_error(&self, resource: &str, error: &Error) {
        log::warn!("Status query for {resource} failed: {error}");
    }
}
