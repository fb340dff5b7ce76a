#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use tokio::sync::mpsc;

    use crate::analysis::sprite::SpriteManifest;
    use crate::analysis::WaveformEnvelope;
    use crate::app::pipeline::*;
    use crate::domain::errors::DomainError;
    use crate::domain::model::*;
    use crate::ports::*;

    struct FakeProbe {
        has_video: bool,
    }

    #[async_trait]
    impl ProbePort for FakeProbe {
        async fn probe_media(&self, _path: &Path) -> Result<MediaProbe, DomainError> {
            Ok(MediaProbe {
                duration_s: 10.0,
                frame_rate: 30.0,
                has_video: self.has_video,
                has_audio: true,
                width: 640,
                height: 360,
            })
        }
    }

    enum Audio {
        Samples(Vec<f32>),
        Missing,
        Broken,
    }

    struct FakeDecode {
        audio: Audio,
        /// Number of leading extract calls that fail
        failing_frames: u32,
        calls: AtomicU32,
    }

    impl FakeDecode {
        fn healthy() -> Self {
            Self {
                audio: Audio::Samples((0..4096).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect()),
                failing_frames: 0,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DecodePort for FakeDecode {
        async fn extract_frame(&self, _path: &Path, at_s: f64, _max_width: u32) -> Result<RgbImage, DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failing_frames {
                return Err(DomainError::ProcessingError(format!("no frame at {}", at_s)));
            }
            Ok(RgbImage::from_pixel(64, 36, Rgb([(at_s * 10.0) as u8, 0, 0])))
        }

        async fn read_audio_mono(&self, _path: &Path, _rate: u32) -> Result<Option<Vec<f32>>, DomainError> {
            match &self.audio {
                Audio::Samples(samples) => Ok(Some(samples.clone())),
                Audio::Missing => Ok(None),
                Audio::Broken => Err(DomainError::ProcessingError("decoder crashed".to_string())),
            }
        }
    }

    struct FakeTranscode {
        failures_before_success: u32,
        hang: bool,
        calls: AtomicU32,
    }

    impl FakeTranscode {
        fn ok() -> Self {
            Self {
                failures_before_success: 0,
                hang: false,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscodePort for FakeTranscode {
        async fn transcode_proxy(&self, _source: &Path, dest: &Path, _settings: &ProxySettings) -> Result<(), DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if call < self.failures_before_success {
                return Err(DomainError::ProcessingError("encoder busy".to_string()));
            }
            std::fs::write(dest, b"proxy").map_err(|e| DomainError::ProcessingError(e.to_string()))
        }
    }

    fn pipeline(root: &Path, probe: FakeProbe, decode: FakeDecode, transcode: FakeTranscode) -> MediaPipeline {
        let mut config = crate::config::PipelineConfig::default();
        config.max_attempts = 2;
        MediaPipeline::new(
            Arc::new(probe),
            Arc::new(decode),
            Arc::new(transcode),
            PipelineSettings::from_config(&config, root),
        )
    }

    fn asset(duration_s: f64) -> MediaAsset {
        MediaAsset::new("/videos/case.mp4", duration_s, 30.0)
    }

    async fn run(pipeline: &MediaPipeline, asset: &MediaAsset) -> (PipelineReport, Vec<AssetPatch>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = pipeline.run(asset, &tx).await;
        drop(tx);
        let mut patches = Vec::new();
        while let Some(patch) = rx.recv().await {
            patches.push(patch);
        }
        (report, patches)
    }

    #[tokio::test]
    async fn test_all_stages_complete() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), FakeProbe { has_video: true }, FakeDecode::healthy(), FakeTranscode::ok());
        let asset = asset(7.0);

        let (report, patches) = run(&pipeline, &asset).await;
        assert!(report.stages.iter().all(|s| s.succeeded()), "{:?}", report);
        assert_eq!(patches.len(), 3);
        assert!(patches.iter().all(|p| p.asset_id == asset.id));

        let out = dir.path().join("derived").join(asset.id.as_str());
        assert!(out.join("proxy.mp4").exists());
        assert!(out.join("sprite.jpg").exists());

        let manifest: SpriteManifest =
            serde_json::from_slice(&std::fs::read(out.join("sprite.json")).unwrap()).unwrap();
        assert_eq!(manifest.frame_times_s, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!((manifest.layout.columns, manifest.layout.rows), (4, 1));

        let envelope: WaveformEnvelope =
            serde_json::from_slice(&std::fs::read(out.join("waveform.json")).unwrap()).unwrap();
        assert_eq!(envelope.values.len(), 4);
        assert!(envelope.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[tokio::test]
    async fn test_zero_duration_asset_gets_single_frame_sprite() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), FakeProbe { has_video: true }, FakeDecode::healthy(), FakeTranscode::ok());
        let asset = asset(0.0);

        let uri = pipeline.generate_thumbnail_sprite(&asset, 2.0).await.unwrap();
        let sprite = image::open(&uri).unwrap();
        assert_eq!((sprite.width(), sprite.height()), (64, 36));
    }

    #[tokio::test]
    async fn test_sprite_falls_back_to_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let decode = FakeDecode {
            failing_frames: 1,
            ..FakeDecode::healthy()
        };
        let pipeline = pipeline(dir.path(), FakeProbe { has_video: true }, decode, FakeTranscode::ok());

        let uri = pipeline.generate_thumbnail_sprite(&asset(0.0), 2.0).await.unwrap();
        assert!(uri.ends_with("sprite.jpg"));
    }

    #[tokio::test]
    async fn test_missing_audio_yields_empty_envelope() {
        let dir = tempfile::tempdir().unwrap();
        for audio in [Audio::Missing, Audio::Broken] {
            let decode = FakeDecode {
                audio,
                ..FakeDecode::healthy()
            };
            let pipeline = pipeline(dir.path(), FakeProbe { has_video: true }, decode, FakeTranscode::ok());
            let uri = pipeline.generate_waveform(&asset(5.0), 1024).await.unwrap();
            let envelope: WaveformEnvelope = serde_json::from_slice(&std::fs::read(uri).unwrap()).unwrap();
            assert!(envelope.is_empty());
        }
    }

    #[tokio::test]
    async fn test_failed_stage_does_not_block_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let decode = FakeDecode {
            failing_frames: u32::MAX,
            ..FakeDecode::healthy()
        };
        let pipeline = pipeline(dir.path(), FakeProbe { has_video: false }, decode, FakeTranscode::ok());
        let asset = asset(4.0);

        let (report, patches) = run(&pipeline, &asset).await;
        assert!(matches!(
            report.stage(DerivedField::Proxy).unwrap().outcome,
            StageOutcome::Failed { .. }
        ));
        // Missing video track is not retried
        assert_eq!(report.stage(DerivedField::Proxy).unwrap().attempts, 1);
        assert!(!report.stage(DerivedField::ThumbnailSprite).unwrap().succeeded());
        assert!(report.stage(DerivedField::Waveform).unwrap().succeeded());
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].field, DerivedField::Waveform);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let transcode = FakeTranscode {
            failures_before_success: 1,
            ..FakeTranscode::ok()
        };
        let pipeline = pipeline(dir.path(), FakeProbe { has_video: true }, FakeDecode::healthy(), transcode);

        let (report, _) = run(&pipeline, &asset(3.0)).await;
        let proxy = report.stage(DerivedField::Proxy).unwrap();
        assert!(proxy.succeeded());
        assert_eq!(proxy.attempts, 2);
    }

    #[tokio::test]
    async fn test_cancelled_stage_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transcode = FakeTranscode {
            hang: true,
            ..FakeTranscode::ok()
        };
        let pipeline = Arc::new(pipeline(dir.path(), FakeProbe { has_video: true }, FakeDecode::healthy(), transcode));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let run = Arc::clone(&pipeline).spawn(asset(3.0), tx);
        let mut received = Vec::new();
        while received.len() < 2 {
            received.push(rx.recv().await.unwrap());
        }
        run.cancel();

        let report = run.join().await.unwrap();
        assert_eq!(report.stage(DerivedField::Proxy).unwrap().outcome, StageOutcome::Cancelled);
        assert!(rx.recv().await.is_none());
        assert!(received.iter().all(|p| p.field != DerivedField::Proxy));
        assert!(!dir.path().join("derived").join(report.asset_id.as_str()).join("proxy.mp4").exists());
    }

    #[tokio::test]
    async fn test_dropped_run_abandons_stages() {
        let dir = tempfile::tempdir().unwrap();
        let transcode = FakeTranscode {
            hang: true,
            ..FakeTranscode::ok()
        };
        let pipeline = Arc::new(pipeline(dir.path(), FakeProbe { has_video: true }, FakeDecode::healthy(), transcode));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let asset = asset(3.0);

        let run = Arc::clone(&pipeline).spawn(asset.clone(), tx);
        let mut received = Vec::new();
        while received.len() < 2 {
            received.push(rx.recv().await.unwrap());
        }
        drop(run);

        // The task ends and releases the sender without sending the proxy
        assert!(rx.recv().await.is_none());
        assert!(!dir.path().join("derived").join(asset.id.as_str()).join("proxy.mp4").exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_affect_later_runs() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Arc::new(pipeline(
            dir.path(),
            FakeProbe { has_video: true },
            FakeDecode::healthy(),
            FakeTranscode::ok(),
        ));

        let (tx, _rx) = mpsc::unbounded_channel();
        let run = Arc::clone(&pipeline).spawn(asset(3.0), tx);
        run.cancel();
        let cancelled = run.join().await.unwrap();
        assert!(cancelled.stages.iter().all(|s| s.outcome == StageOutcome::Cancelled));

        let (tx, _rx) = mpsc::unbounded_channel();
        let report = Arc::clone(&pipeline).spawn(asset(3.0), tx).join().await.unwrap();
        assert!(report.stages.iter().all(|s| s.succeeded()));
    }

    #[test]
    fn test_report_patches() {
        let report = PipelineReport {
            asset_id: AssetId::from("a1"),
            stages: vec![
                StageReport {
                    field: DerivedField::Proxy,
                    outcome: StageOutcome::Failed { error: "x".to_string() },
                    attempts: 2,
                },
                StageReport {
                    field: DerivedField::Waveform,
                    outcome: StageOutcome::Completed { uri: "/w.json".to_string() },
                    attempts: 1,
                },
            ],
        };
        assert_eq!(
            report.patches(),
            vec![AssetPatch {
                asset_id: AssetId::from("a1"),
                field: DerivedField::Waveform,
                uri: "/w.json".to_string(),
            }]
        );
    }

    #[test]
    fn test_source_path_strips_file_scheme() {
        let mut asset = asset(1.0);
        asset.source_uri = "file:///videos/a.mp4".to_string();
        assert_eq!(source_path(&asset), std::path::PathBuf::from("/videos/a.mp4"));
    }
}
