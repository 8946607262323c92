use std::collections::HashSet;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use depflow::exec::Processor;
use depflow::module::ModuleRef;

/// A fake processor that:
/// - records which modules were processed, in order
/// - fails for the ids in `failing`
/// - optionally sleeps to widen race windows in concurrent tests.
#[derive(Default)]
pub struct RecordingProcessor {
    processed: Mutex<Vec<String>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }
}

impl Processor for RecordingProcessor {
    fn process(&self, module: &ModuleRef) -> Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let id = module.id().to_string();
        if self.failing.contains(&id) {
            bail!("simulated failure in {id}");
        }

        self.processed.lock().unwrap().push(id);
        Ok(())
    }
}
