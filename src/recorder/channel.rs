//! Recording pipeline workers
//!
//! Each present pipeline runs one worker task: it waits for the record
//! command, encodes every new frame of its stream, and forwards the encoded
//! chunks to the session loop. On stop it drains the encoder and reports
//! `Stopped` after its last chunk, so the session sees a pipeline's chunks
//! strictly before its completion.

use super::state::PipelineKind;
use crate::capture::LiveStream;
use crate::encoder::{EncodedChunk, EncodingError, FrameEncoder};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Lifecycle command broadcast to every worker of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Created but not recording yet
    Standby,
    Record,
    Stop,
}

/// What a worker reports to the session loop
#[derive(Debug)]
pub enum PipelineEvent {
    Chunk {
        kind: PipelineKind,
        chunk: EncodedChunk,
    },
    /// The encoder failed; no more chunks will follow from this pipeline
    Failed {
        kind: PipelineKind,
        error: EncodingError,
    },
    /// Final event of a pipeline
    Stopped { kind: PipelineKind },
}

/// One capture+encode unit
pub struct PipelineWorker {
    kind: PipelineKind,
    stream: LiveStream,
    encoder: Box<dyn FrameEncoder>,
    commands: watch::Receiver<PipelineCommand>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineWorker {
    pub fn new(
        kind: PipelineKind,
        stream: LiveStream,
        encoder: Box<dyn FrameEncoder>,
        commands: watch::Receiver<PipelineCommand>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            kind,
            stream,
            encoder,
            commands,
            events,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let PipelineWorker {
            kind,
            mut stream,
            mut encoder,
            mut commands,
            events,
        } = self;

        // Standby until told to record
        loop {
            let command = *commands.borrow_and_update();
            match command {
                PipelineCommand::Record => break,
                PipelineCommand::Stop => {
                    // Record may have been overwritten before we saw it; the
                    // session still counts on this completion
                    tracing::debug!("{} pipeline stopped before recording", kind);
                    let _ = events.send(PipelineEvent::Stopped { kind });
                    return;
                }
                PipelineCommand::Standby => {}
            }
            if commands.changed().await.is_err() {
                return;
            }
        }

        tracing::info!("{} pipeline recording from '{}'", kind, stream.label());

        let mut encoding = true;
        let mut source_open = true;
        let mut frames = 0u64;

        loop {
            tokio::select! {
                biased;
                changed = commands.changed() => {
                    if changed.is_err() || *commands.borrow_and_update() == PipelineCommand::Stop {
                        break;
                    }
                }
                frame = stream.next_frame(), if encoding && source_open => {
                    let Some(frame) = frame else {
                        tracing::warn!("{} source ended while recording", kind);
                        source_open = false;
                        continue;
                    };
                    let failure = match encoder.encode(&frame).await {
                        Ok(chunks) => {
                            frames += 1;
                            if !forward(&events, kind, chunks) {
                                return;
                            }
                            encoder.take_error()
                        }
                        Err(error) => Some(error),
                    };
                    if let Some(error) = failure {
                        tracing::error!("{} encoder failed: {}", kind, error);
                        encoding = false;
                        if events.send(PipelineEvent::Failed { kind, error }).is_err() {
                            return;
                        }
                    }
                }
            }
        }

        if encoding {
            let failure = match encoder.finish().await {
                Ok(chunks) => {
                    if !forward(&events, kind, chunks) {
                        return;
                    }
                    encoder.take_error()
                }
                Err(error) => Some(error),
            };
            if let Some(error) = failure {
                tracing::error!("{} encoder failed to finish: {}", kind, error);
                let _ = events.send(PipelineEvent::Failed { kind, error });
            }
        }

        tracing::info!("{} pipeline stopped after {} frames", kind, frames);
        let _ = events.send(PipelineEvent::Stopped { kind });
    }
}

/// Send chunks in order. False once the session loop is gone.
fn forward(
    events: &mpsc::UnboundedSender<PipelineEvent>,
    kind: PipelineKind,
    chunks: Vec<EncodedChunk>,
) -> bool {
    chunks
        .into_iter()
        .all(|chunk| events.send(PipelineEvent::Chunk { kind, chunk }).is_ok())
}
