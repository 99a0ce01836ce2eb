use futures::StreamExt;

use super::{EnvelopeCmd, PublisherTask};
use crate::{pipeline::Pipeline, session::Settings};

/// Closing the frame channel flushes and terminates the task with Eof, even
/// when no frame was ever published.
#[tokio::test]
async fn empty_source_terminates_with_eof() {
    let task = PublisherTask::new();
    let mut envelopes = task.subscribe();

    let (tx, rx) = tokio::sync::mpsc::channel(4);
    task.start(Pipeline::new(Settings::default()), rx).await;
    drop(tx);

    let cmd = tokio::time::timeout(std::time::Duration::from_secs(5), envelopes.recv())
        .await
        .expect("task should terminate")
        .expect("broadcast should stay open until Eof");
    assert!(matches!(cmd, EnvelopeCmd::Eof));
}

#[tokio::test]
async fn envelope_stream_ends_with_none() {
    let task = PublisherTask::new();
    let mut stream = task.envelope_stream();

    let (tx, rx) = tokio::sync::mpsc::channel(4);
    task.start(Pipeline::new(Settings::default()), rx).await;
    drop(tx);

    let item = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
        .await
        .expect("stream should yield");
    assert_eq!(item, Some(None));
}
