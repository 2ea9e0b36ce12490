use async_trait::async_trait;
use docgate::{Document, DocumentSubmitter, SubmitError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness's captured stdout.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("docgate=debug").try_init();
    });
}

/// Submitter that records every document it sees and optionally fails.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubmitter {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(Option<String>, String)>>>,
    fail_status: Option<u16>,
}

impl RecordingSubmitter {
    pub fn failing(status: u16) -> Self {
        Self { fail_status: Some(status), ..Default::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(doc_id, signature)` pairs in submission order.
    pub fn seen(&self) -> Vec<(Option<String>, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSubmitter for RecordingSubmitter {
    async fn submit(&self, document: &Document, signature: &str) -> Result<(), SubmitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push((document.doc_id.clone(), signature.to_string()));
        match self.fail_status {
            Some(status) => Err(SubmitError::Status { status, body: "unavailable".into() }),
            None => Ok(()),
        }
    }
}

pub fn document(id: &str) -> Document {
    Document { doc_id: Some(id.to_string()), ..Default::default() }
}
