//! Live rendering of a progress feed.
//!
//! Interactive terminals get one indicatif bar per transfer; `--json` prints
//! every feed event as a JSON line on stdout.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use multiloader_core::{Progress, ProgressEvent, ProgressFeed, TransferStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewMode {
    Bars,
    Json,
    Hidden,
}

/// Spawns the renderer. It stops once `stop` fires, after flushing events
/// that were already queued. Returns `None` for [`ViewMode::Hidden`].
pub(crate) fn spawn_progress_view(
    mode: ViewMode,
    mut feed: ProgressFeed,
    stop: CancellationToken,
) -> Option<JoinHandle<()>> {
    let mut sink: Box<dyn EventSink> = match mode {
        ViewMode::Hidden => return None,
        ViewMode::Json => Box::new(JsonLines),
        ViewMode::Bars => Box::new(BarSet::new(MultiProgress::new())),
    };

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = feed.next() => match event {
                    Some(event) => sink.show(&event),
                    None => break,
                },
                () = stop.cancelled() => {
                    while let Some(event) = feed.try_next() {
                        sink.show(&event);
                    }
                    break;
                }
            }
        }
        sink.finish();
        debug!("progress view stopped");
    }))
}

trait EventSink: Send {
    fn show(&mut self, event: &ProgressEvent);
    fn finish(&mut self) {}
}

struct JsonLines;

impl EventSink for JsonLines {
    fn show(&mut self, event: &ProgressEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => debug!(error = %e, "failed to encode progress event"),
        }
    }
}

/// One bar per transfer id.
pub(crate) struct BarSet {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

fn sized_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:.bold} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}

fn unsized_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} {spinner} {bytes} {bytes_per_sec} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl BarSet {
    pub(crate) fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self::new(MultiProgress::with_draw_target(
            indicatif::ProgressDrawTarget::hidden(),
        ))
    }

    pub(crate) fn apply(&mut self, progress: &Progress) {
        let multi = &self.multi;
        let bar = self.bars.entry(progress.id.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::no_length());
            bar.set_style(unsized_style());
            bar.set_prefix(progress.file_name.clone());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        if let Some(total) = progress.total_bytes
            && bar.length() != Some(total)
        {
            bar.set_length(total);
            bar.set_style(sized_style());
        }
        bar.set_position(progress.downloaded_bytes);

        match progress.status {
            TransferStatus::Downloading => {}
            TransferStatus::Completed => bar.finish_with_message("done"),
            TransferStatus::Cancelled => bar.abandon_with_message("cancelled"),
            TransferStatus::Error => bar.abandon_with_message(format!(
                "error: {}",
                progress.error_message.as_deref().unwrap_or("unknown")
            )),
        }
    }

    #[cfg(test)]
    fn bar(&self, id: &str) -> Option<&ProgressBar> {
        self.bars.get(id)
    }
}

impl EventSink for BarSet {
    fn show(&mut self, event: &ProgressEvent) {
        if let ProgressEvent::Progress(progress) = event {
            self.apply(progress);
        }
    }

    fn finish(&mut self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        let _ = self.multi.clear();
    }
}
