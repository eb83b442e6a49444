//! Stage trait and pipeline runner
//!
//! Stages are long-lived tasks joined by bounded mpsc channels. A stage
//! pulls from its input until the channel closes, pushes downstream, and
//! exits; closing its sender is the end-of-stream signal for the next
//! stage. There is no sentinel item. Backpressure falls out of the bounded
//! capacity: a fast stage blocks on send until downstream catches up.
//!
//! Failure tears the pipeline down: an erroring stage drops both channel
//! ends, upstream sends then fail with `StageAborted` and downstream
//! inputs close early. The runner reports the root error, not the
//! secondary aborts.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{MirrorError, Result};
use crate::sync::descriptor::ContentDescriptor;

pub type StageReceiver = mpsc::Receiver<ContentDescriptor>;
pub type StageSender = mpsc::Sender<ContentDescriptor>;

/// Send a descriptor downstream, mapping a closed channel to the stage
/// abort error.
pub async fn send_or_abort(
    tx: &StageSender,
    descriptor: ContentDescriptor,
    stage: &'static str,
) -> Result<()> {
    tx.send(descriptor)
        .await
        .map_err(|_| MirrorError::StageAborted(stage))
}

#[async_trait]
pub trait SyncStage: Send + 'static {
    fn name(&self) -> &'static str;

    /// Consume the input stream and produce the output stream. The
    /// implementation must forward or emit every descriptor it does not
    /// deliberately drop, and must return once its input is exhausted.
    async fn run(self: Box<Self>, input: StageReceiver, output: StageSender) -> Result<()>;
}

/// Feeds an already drained set of descriptors into a pipeline. Used to
/// run the interrelate pass over the collected output of the download
/// groups.
pub struct ReplayStage {
    items: Vec<ContentDescriptor>,
}

impl ReplayStage {
    pub fn new(items: Vec<ContentDescriptor>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl SyncStage for ReplayStage {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn run(self: Box<Self>, _input: StageReceiver, output: StageSender) -> Result<()> {
        for descriptor in self.items {
            send_or_abort(&output, descriptor, "replay").await?;
        }
        Ok(())
    }
}

/// An ordered chain of stages over bounded queues.
pub struct SyncPipeline {
    stages: Vec<Box<dyn SyncStage>>,
    capacity: usize,
}

impl SyncPipeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            stages: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push<S: SyncStage>(&mut self, stage: S) {
        self.stages.push(Box::new(stage));
    }

    /// Spawn every stage, drain the terminal queue, and wait for all
    /// stages to finish. Returns the drained descriptors, or the first
    /// root-cause error any stage raised.
    pub async fn run(self) -> Result<Vec<ContentDescriptor>> {
        // The first stage sees an already closed input.
        let (head_tx, head_rx) = mpsc::channel(1);
        drop(head_tx);
        let mut rx = head_rx;

        let mut handles = Vec::with_capacity(self.stages.len());
        for stage in self.stages {
            let (tx, next_rx) = mpsc::channel(self.capacity);
            let name = stage.name();
            handles.push((name, tokio::spawn(stage.run(rx, tx))));
            rx = next_rx;
        }

        // Drain before joining; joining first would deadlock once the
        // terminal queue fills.
        let mut drained = Vec::new();
        while let Some(descriptor) = rx.recv().await {
            drained.push(descriptor);
        }

        let mut fatal: Option<MirrorError> = None;
        let mut aborted: Option<MirrorError> = None;
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(MirrorError::Pipeline(format!(
                    "stage '{}' panicked: {}",
                    name, join_error
                ))),
            };
            if let Err(error) = result {
                tracing::debug!(stage = name, %error, "stage finished with error");
                if matches!(error, MirrorError::StageAborted(_)) {
                    aborted.get_or_insert(error);
                } else if fatal.is_none() {
                    fatal = Some(error);
                }
            }
        }

        match fatal.or(aborted) {
            Some(error) => Err(error),
            None => Ok(drained),
        }
    }
}
