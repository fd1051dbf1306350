use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;

use crate::counter::ShardedCounter;

/// Band completion bar for interactive runs
///
/// Plugs into [`BandMapper::try_map_with`](super::BandMapper::try_map_with) as
/// the progress callback via [`BandProgress::update`].
#[derive(Clone)]
pub struct BandProgress {
    bar: ProgressBar,
    updates: Arc<ShardedCounter>,
}

impl BandProgress {
    /// Bar drawn on stderr
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} bands {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix(label.to_string());

        Self {
            bar,
            updates: Arc::new(ShardedCounter::with_shards(1)),
        }
    }

    /// Bar that tracks state but never draws
    pub fn hidden() -> Self {
        let progress = Self::new("");
        progress.bar.set_draw_target(ProgressDrawTarget::hidden());
        progress
    }

    pub fn update(&self, completed: usize, total: usize, band: usize) {
        self.updates.increment();
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!("last: band {band}"));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn updates(&self) -> i64 {
        self.updates.sum()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_tracks_position() {
        let progress = BandProgress::hidden();
        progress.update(1, 3, 2);
        progress.update(3, 3, 0);
        assert_eq!(progress.position(), 3);
        assert_eq!(progress.updates(), 2);
        progress.finish();
    }
}
