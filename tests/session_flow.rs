//! End-to-end session tests: in-memory capture, scripted encoders, real
//! output directories.

use async_trait::async_trait;
use parking_lot::Mutex;
use pip_recorder::capture::{
    CaptureSource, MemoryCaptureBackend, Resolution, SourceKind, VideoFrame,
};
use pip_recorder::encoder::{EncodedChunk, EncoderFactory, EncodingError, FrameEncoder};
use pip_recorder::output::{FsOutputStore, LocationOpener};
use pip_recorder::recorder::{
    PipelineKind, PipelineState, RecordingCoordinator, RecordingEvent, RecordingState,
    SessionError, SessionSnapshot,
};
use pip_recorder::RecorderConfig;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SOURCE_ID: &str = "screen:main";

/// Emits one chunk per frame whose length equals the frame's first red value
struct SizedEncoder {
    fail: bool,
}

#[async_trait]
impl FrameEncoder for SizedEncoder {
    async fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<EncodedChunk>, EncodingError> {
        if self.fail {
            return Err(EncodingError::Other("encoder crashed".to_string()));
        }
        let tag = frame.data[0];
        Ok(vec![EncodedChunk::new(vec![tag; tag as usize])])
    }

    async fn finish(&mut self) -> Result<Vec<EncodedChunk>, EncodingError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct SizedEncoderFactory {
    failing: HashSet<PipelineKind>,
}

impl EncoderFactory for SizedEncoderFactory {
    fn create(
        &self,
        kind: PipelineKind,
        _resolution: Option<Resolution>,
    ) -> Result<Box<dyn FrameEncoder>, EncodingError> {
        Ok(Box::new(SizedEncoder {
            fail: self.failing.contains(&kind),
        }))
    }
}

#[derive(Default)]
struct CapturingOpener {
    opened: Mutex<Vec<PathBuf>>,
}

impl LocationOpener for CapturingOpener {
    fn open(&self, dir: &Path) -> std::io::Result<()> {
        self.opened.lock().push(dir.to_path_buf());
        Ok(())
    }
}

struct Harness {
    backend: Arc<MemoryCaptureBackend>,
    opener: Arc<CapturingOpener>,
    coordinator: RecordingCoordinator,
    source: CaptureSource,
    root: PathBuf,
    _tmp: TempDir,
}

impl Harness {
    fn new(camera: bool, failing: &[PipelineKind]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("videos");
        Self::with_root(tmp, root, camera, failing)
    }

    fn with_root(tmp: TempDir, root: PathBuf, camera: bool, failing: &[PipelineKind]) -> Self {
        let backend = Arc::new(MemoryCaptureBackend::new());
        let source = CaptureSource::new(SOURCE_ID, "Main display", SourceKind::Screen);
        backend.add_source(source.clone(), Some(Resolution::new(40, 30)));
        if camera {
            backend.attach_camera(Some(Resolution::new(10, 8)));
        }

        let opener = Arc::new(CapturingOpener::default());
        let factory = SizedEncoderFactory {
            failing: failing.iter().copied().collect(),
        };
        let coordinator = RecordingCoordinator::new(
            RecorderConfig::default(),
            backend.clone(),
            Arc::new(factory),
            Arc::new(FsOutputStore::new(&root)),
            opener.clone(),
        );

        Self {
            backend,
            opener,
            coordinator,
            source,
            root,
            _tmp: tmp,
        }
    }

    fn screen(&self, tag: u8) {
        assert!(self
            .backend
            .publish_screen(SOURCE_ID, VideoFrame::solid(40, 30, [tag, 0, 0, 255], 0.0)));
    }

    fn camera(&self, tag: u8) {
        assert!(self
            .backend
            .publish_camera(VideoFrame::solid(10, 8, [tag, 0, 0, 255], 0.0)));
    }

    async fn wait_for(&self, what: &str, pred: impl FnMut(&SessionSnapshot) -> bool) {
        let mut rx = self.coordinator.watch_snapshot().unwrap();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
            .unwrap();
    }

    async fn wait_for_chunks(&self, kind: PipelineKind, count: usize) {
        self.wait_for(&format!("{} chunks", kind), |s| {
            s.pipeline(kind).is_some_and(|p| p.chunk_count >= count)
        })
        .await;
    }

    fn files(&self, session: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.root.join(session))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }
}

fn is_canonical_uuid(s: &str) -> bool {
    s.len() == 36
        && s.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            14 => c == '4',
            19 => matches!(c, '8' | '9' | 'a' | 'b'),
            _ => c.is_ascii_digit() || ('a'..='f').contains(&c),
        })
}

#[tokio::test]
async fn screen_only_session_writes_screen_file() {
    let mut h = Harness::new(false, &[]);

    let snapshot = h
        .coordinator
        .start_session(&h.source, false, Some("solo"))
        .await
        .unwrap();
    assert_eq!(snapshot.expected_completions, 2);

    h.coordinator.start_recording().unwrap();
    h.screen(100);
    h.wait_for_chunks(PipelineKind::Screen, 1).await;
    h.screen(200);
    h.wait_for_chunks(PipelineKind::Screen, 2).await;
    h.wait_for_chunks(PipelineKind::Composite, 1).await;

    let report = h.coordinator.stop_session().await.unwrap();

    assert_eq!(h.files("solo"), vec!["screen.webm"]);
    let screen = std::fs::read(h.root.join("solo/screen.webm")).unwrap();
    assert_eq!(screen.len(), 300);
    assert!(screen[..100].iter().all(|b| *b == 100));
    assert!(screen[100..].iter().all(|b| *b == 200));
    assert!(report.composite_discarded);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn camera_session_writes_all_three_files() {
    let mut h = Harness::new(true, &[]);
    let mut events = h.coordinator.subscribe();

    h.coordinator
        .start_session(&h.source, true, Some("with-camera"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    h.screen(50);
    h.camera(60);
    for kind in PipelineKind::ALL {
        h.wait_for_chunks(kind, 1).await;
    }

    let report = h.coordinator.stop_session().await.unwrap();
    assert_eq!(
        h.files("with-camera"),
        vec!["final.webm", "screen.webm", "webcam.webm"]
    );
    assert!(!report.composite_discarded);
    assert_eq!(
        std::fs::read(h.root.join("with-camera/webcam.webm")).unwrap(),
        vec![60; 60]
    );

    let snapshot = h.coordinator.snapshot().unwrap();
    assert!(snapshot.finalized);
    assert!(snapshot
        .pipelines
        .iter()
        .all(|p| p.state == PipelineState::Stopped && p.buffered_bytes == 0));

    let mut stopped = 0;
    let mut finalized = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            RecordingEvent::PipelineStopped(_) => stopped += 1,
            RecordingEvent::Finalized(_) => finalized += 1,
            _ => {}
        }
    }
    assert_eq!(stopped, 3);
    assert_eq!(finalized, 1);
}

#[tokio::test]
async fn silent_camera_drops_camera_and_composite_files() {
    let mut h = Harness::new(true, &[]);

    h.coordinator
        .start_session(&h.source, true, Some("silent"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    h.screen(10);
    h.wait_for_chunks(PipelineKind::Screen, 1).await;
    h.wait_for_chunks(PipelineKind::Composite, 1).await;

    let report = h.coordinator.stop_session().await.unwrap();

    assert_eq!(h.files("silent"), vec!["screen.webm"]);
    assert!(report.composite_discarded);
    assert_eq!(h.coordinator.snapshot().unwrap().expected_completions, 3);
}

#[tokio::test]
async fn unnamed_session_uses_generated_id() {
    let mut h = Harness::new(false, &[]);

    let snapshot = h
        .coordinator
        .start_session(&h.source, false, None)
        .await
        .unwrap();
    assert!(is_canonical_uuid(&snapshot.session_id), "{}", snapshot.session_id);

    h.coordinator.start_recording().unwrap();
    h.screen(5);
    h.wait_for_chunks(PipelineKind::Screen, 1).await;
    let report = h.coordinator.stop_session().await.unwrap();
    assert_eq!(report.output_dir, h.root.join(&snapshot.session_id));
}

#[tokio::test]
async fn unwritable_root_fails_finalization_without_files() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("not-a-dir");
    std::fs::write(&root, b"occupied").unwrap();
    let mut h = Harness::with_root(tmp, root, false, &[]);

    h.coordinator
        .start_session(&h.source, false, Some("blocked"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    h.screen(9);
    h.wait_for_chunks(PipelineKind::Screen, 1).await;

    let err = h.coordinator.stop_session().await.unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)), "{:?}", err);
    assert_eq!(h.coordinator.state(), RecordingState::Complete);

    let snapshot = h.coordinator.snapshot().unwrap();
    assert!(snapshot.finalized);
    assert!(snapshot.pipelines.iter().all(|p| p.chunk_count == 0));

    assert!(matches!(
        h.coordinator.notify_finalized(),
        Err(SessionError::NotFinalized)
    ));
    assert!(h.opener.opened.lock().is_empty());
}

#[tokio::test]
async fn failed_camera_encoder_does_not_block_finalization() {
    let mut h = Harness::new(true, &[PipelineKind::Secondary]);
    let mut events = h.coordinator.subscribe();

    h.coordinator
        .start_session(&h.source, true, Some("cam-crash"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    h.screen(20);
    h.camera(30);
    h.wait_for("camera failure", |s| {
        s.pipeline(PipelineKind::Secondary).is_some_and(|p| p.failed)
    })
    .await;
    h.wait_for_chunks(PipelineKind::Screen, 1).await;
    h.wait_for_chunks(PipelineKind::Composite, 1).await;

    let report = h.coordinator.stop_session().await.unwrap();
    assert_eq!(h.files("cam-crash"), vec!["screen.webm"]);
    assert!(report.composite_discarded);

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RecordingEvent::PipelineFailed { kind, .. } = event {
            failures.push(kind);
        }
    }
    assert_eq!(failures, vec![PipelineKind::Secondary]);
}

#[tokio::test]
async fn open_location_after_finalization() {
    let mut h = Harness::new(false, &[]);

    h.coordinator
        .start_session(&h.source, false, Some("reveal"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    h.screen(1);
    h.wait_for_chunks(PipelineKind::Screen, 1).await;
    h.coordinator.stop_session().await.unwrap();

    let dir = h.coordinator.notify_finalized().unwrap();
    assert_eq!(dir, h.root.join("reveal"));
    assert_eq!(h.opener.opened.lock().as_slice(), &[dir]);

    // a stopped session can't be restarted
    assert!(matches!(
        h.coordinator.start_recording(),
        Err(SessionError::AlreadyFinalized)
    ));
}

#[tokio::test]
async fn stop_immediately_after_start_still_finalizes() {
    let mut h = Harness::new(true, &[]);

    h.coordinator
        .start_session(&h.source, true, Some("instant"))
        .await
        .unwrap();
    h.coordinator.start_recording().unwrap();
    let report = h.coordinator.stop_session().await.unwrap();

    assert!(report.written.is_empty());
    assert!(h.files("instant").is_empty());

    let snapshot = h.coordinator.snapshot().unwrap();
    assert!(snapshot.finalized);
    assert_eq!(snapshot.completion_count, 3);
    assert_eq!(h.coordinator.state(), RecordingState::Complete);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_instant_sessions_all_finalize() {
    let mut h = Harness::new(true, &[]);

    for round in 0..20 {
        let name = format!("take-{}", round);
        h.coordinator
            .start_session(&h.source, true, Some(&name))
            .await
            .unwrap();
        h.coordinator.start_recording().unwrap();

        let report = h
            .coordinator
            .stop_session()
            .await
            .unwrap_or_else(|e| panic!("{} failed to finalize: {}", name, e));
        assert_eq!(report.output_dir, h.root.join(&name));
        assert!(h.files(&name).is_empty());

        let snapshot = h.coordinator.snapshot().unwrap();
        assert_eq!(snapshot.completion_count, snapshot.expected_completions);
    }
}
