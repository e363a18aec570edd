use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{DownloadHandle, FormatTag};
use convertr_processing::mime::content_type_for;
use convertr_processing::{ConversionError, ConversionInput, ConversionManager, Converter};
use std::time::Duration;

use super::{EventSink, JobTicket, StatusSource, StatusUpdate};
use crate::blob::{Blob, BlobStore};

/// Returns the input bytes unchanged. The output is only renamed to the
/// target extension.
pub struct PassthroughConverter;

#[async_trait]
impl Converter for PassthroughConverter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn handles(&self, _source: &FormatTag, _target: &FormatTag) -> bool {
        true
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        Ok(input.data)
    }
}

/// Advances progress on a fixed timer, then converts in-process and keeps
/// the result in a [`BlobStore`]. Needs no server.
pub struct SimulatedStatusSource {
    blobs: BlobStore,
    manager: ConversionManager,
    step: u8,
    interval: Duration,
}

impl SimulatedStatusSource {
    /// Uses [`PassthroughConverter`] for every conversion
    pub fn new(blobs: BlobStore, step: u8, interval: Duration) -> Self {
        Self::with_manager(
            blobs,
            ConversionManager::new().with_converter(PassthroughConverter),
            step,
            interval,
        )
    }

    pub fn with_manager(
        blobs: BlobStore,
        manager: ConversionManager,
        step: u8,
        interval: Duration,
    ) -> Self {
        Self {
            blobs,
            manager,
            step: step.clamp(1, 100),
            interval,
        }
    }

    async fn finish(&self, ticket: &JobTicket) -> StatusUpdate {
        let input = ConversionInput {
            data: ticket.data.clone(),
            file_name: ticket.file.original_name.clone(),
            source: ticket.file.source_format.clone(),
            target: ticket.target.clone(),
            options: ticket.options.clone(),
        };

        match self.manager.convert(input).await {
            Ok(data) => {
                let file_name = ticket.output_name();
                let location = self.blobs.insert(Blob {
                    file_name: file_name.clone(),
                    content_type: content_type_for(&ticket.target),
                    data,
                });
                StatusUpdate::Completed(DownloadHandle {
                    location,
                    file_name,
                })
            }
            Err(e) => StatusUpdate::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl StatusSource for SimulatedStatusSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    #[tracing::instrument(skip(self, ticket, sink), fields(job_id = %ticket.job_id, attempt = ticket.attempt))]
    async fn run(&self, ticket: JobTicket, sink: EventSink) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        let mut progress: u8 = 0;
        loop {
            ticker.tick().await;
            progress = progress.saturating_add(self.step).min(100);
            if progress >= 100 {
                break;
            }
            if !ticket.emit(&sink, StatusUpdate::Progress(progress)) {
                tracing::debug!("Attempt abandoned");
                return;
            }
        }

        let update = self.finish(&ticket).await;
        if !ticket.emit(&sink, update.clone()) {
            if let StatusUpdate::Completed(handle) = update {
                self.blobs.remove(&handle.location);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertr_core::models::{ConversionOptions, UploadedFile};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn ticket(name: &str, format: &str, target: &str) -> JobTicket {
        let file = UploadedFile::new(name, FormatTag::new(format), 5);
        JobTicket {
            job_id: file.id,
            attempt: 1,
            options: ConversionOptions::for_category(file.category),
            file,
            data: Bytes::from_static(b"hello"),
            target: FormatTag::new(target),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_then_completes_with_blob() {
        let blobs = BlobStore::new();
        let source = SimulatedStatusSource::new(blobs.clone(), 10, Duration::from_millis(200));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = tokio::time::Instant::now();
        source.run(ticket("photo.png", "png", "jpg"), tx).await;
        assert!(started.elapsed() >= Duration::from_millis(2000));

        let mut updates = Vec::new();
        while let Ok(event) = rx.try_recv() {
            updates.push(event.update);
        }
        let progress: Vec<StatusUpdate> = (1..=9).map(|i| StatusUpdate::Progress(i * 10)).collect();
        assert_eq!(&updates[..9], progress.as_slice());

        let StatusUpdate::Completed(handle) = &updates[9] else {
            panic!("expected completion, got {:?}", updates[9]);
        };
        assert_eq!(handle.file_name, "photo.jpg");
        let blob = blobs.get(&handle.location).unwrap();
        assert_eq!(blob.data, Bytes::from_static(b"hello"));
        assert_eq!(blob.content_type, "image/jpeg");
        assert_eq!(updates.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_illegal_pair_fails_after_progress() {
        let source = SimulatedStatusSource::new(BlobStore::new(), 50, Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();

        source.run(ticket("notes.txt", "txt", "mp3"), tx).await;

        assert_eq!(rx.try_recv().unwrap().update, StatusUpdate::Progress(50));
        let last = rx.try_recv().unwrap().update;
        assert!(matches!(last, StatusUpdate::Failed(ref detail) if detail.contains("not supported")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_is_gone() {
        let blobs = BlobStore::new();
        let source = SimulatedStatusSource::new(blobs.clone(), 10, Duration::from_millis(10));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        source.run(ticket("a.png", "png", "jpg"), tx).await;
        assert!(blobs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_released_when_completion_is_undelivered() {
        let blobs = BlobStore::new();
        let source = SimulatedStatusSource::new(blobs.clone(), 100, Duration::from_millis(10));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        source.run(ticket("a.png", "png", "jpg"), tx).await;
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_ticket_ids_are_preserved() {
        let t = ticket("a.png", "png", "jpg");
        assert_ne!(t.job_id, Uuid::nil());
        assert_eq!(t.output_name(), "a.jpg");
    }
}
