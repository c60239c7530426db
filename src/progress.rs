// Progress sink (SPEC_FULL.md §6.3): a plain callback, invoked from the merge
// thread, that must not block. Replaces the reference crate's Tauri
// AppHandle-based job progress events with a transport-agnostic closure the
// CLI (or any other caller) can wire up however it likes.

pub type ProgressSink = Box<dyn FnMut(&str, u8) + Send>;

pub struct ProgressReporter {
    sink: Option<ProgressSink>,
}

impl ProgressReporter {
    pub fn new(sink: Option<ProgressSink>) -> Self {
        Self { sink }
    }

    pub fn report(&mut self, message: &str, percent: u8) {
        log::info!("{percent}% {message}");
        if let Some(sink) = self.sink.as_mut() {
            sink(message, percent.min(100));
        }
    }
}
