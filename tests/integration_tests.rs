use std::path::Path;
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use reelcut::adapters::{FileDraftStore, RecordingFeedback};
use reelcut::app::editor::{EditorSettings, TimelineEditor};
use reelcut::domain::model::*;
use reelcut::domain::usecases::export_timeline;
use reelcut::ports::DraftStorePort;

/// Test utilities for drafts and media
mod test_utils {
    use super::*;

    /// Whether an ffmpeg executable is on PATH
    pub fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Create a short test video with a tone using FFmpeg's built-in sources
    pub fn create_test_video(output_path: &Path, duration: f64) -> bool {
        std::process::Command::new("ffmpeg")
            .args(["-f", "lavfi", "-i", "testsrc=size=320x240:rate=25"])
            .args(["-f", "lavfi", "-i", "sine=frequency=440"])
            .args(["-t", &duration.to_string(), "-c:v", "mpeg4", "-c:a", "aac", "-y"])
            .arg(output_path)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// A draft over a 10 s asset with two adjacent segments
    pub fn sample_draft() -> Draft {
        let mut draft = Draft::new(MediaAsset::new("/cases/knee.mp4", 10.0, 30.0), "Knee scope");
        for (start, end, label) in [(0.0, 2.0, "Entry"), (2.0, 5.0, "Inspection")] {
            let segment = Segment::new(&draft.asset, start, end, label).unwrap();
            draft.timeline.segment_order.push(segment.id.clone());
            draft.segments.insert(segment.id.clone(), segment);
        }
        draft
    }

    /// `reelcut --store <root>` isolated from any user configuration
    pub fn reelcut(root: &Path) -> Command {
        let mut cmd = Command::cargo_bin("reelcut").unwrap();
        cmd.env_remove("REELCUT_CONFIG")
            .env_remove("REELCUT_STORE_ROOT")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", root.join("config"))
            .arg("--store")
            .arg(root);
        cmd
    }

    pub async fn store_draft(root: &Path, draft: &Draft) {
        FileDraftStore::new(root).save_snapshot(draft).await.unwrap();
    }
}

use test_utils::*;

fn open(draft: Draft) -> TimelineEditor {
    TimelineEditor::new(
        draft,
        EditorSettings::default(),
        Arc::new(RecordingFeedback::new()),
        |_| {},
    )
}

#[test]
fn test_add_segment_scenario() {
    let mut editor = open(Draft::new(MediaAsset::new("/a.mp4", 10.0, 30.0), "Scenario"));
    assert_eq!(editor.set_in(2.02).unwrap(), 2.0);
    editor.set_out(2.5).unwrap();
    let id = editor.add_segment().unwrap();

    let segment = editor.draft().segment(&id).unwrap();
    assert_eq!((segment.start_s, segment.end_s, segment.speed), (2.0, 2.5, 1.0));
}

#[test]
fn test_ripple_delete_scenario() {
    let mut editor = open(sample_draft());
    editor.select_index(0).unwrap();
    editor.delete_selected().unwrap();

    let remaining: Vec<_> = editor.draft().ordered_segments().map(|s| (s.start_s, s.end_s)).collect();
    assert_eq!(remaining, vec![(0.0, 3.0)]);
}

#[test]
fn test_export_tolerates_empty_timeline() {
    let draft = Draft::new(MediaAsset::new("/a.mp4", 3.0, 30.0), "Empty");
    let export = export_timeline(&draft);
    assert!(export.steps.is_empty());
}

#[tokio::test]
async fn test_nan_playhead_is_stored_as_zero() {
    let dir = TempDir::new().unwrap();
    let store = FileDraftStore::new(dir.path());
    let mut draft = sample_draft();
    draft.ui.playhead_s = f64::NAN;

    store.save_snapshot(&draft).await.unwrap();

    let loaded = store.load_draft(&draft.id).await.unwrap().unwrap();
    assert_eq!(loaded.ui.playhead_s, 0.0);
}

#[tokio::test]
async fn test_edits_survive_reload() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileDraftStore::new(dir.path()));
    let draft = sample_draft();

    let mut editor = open(draft.clone());
    editor.select_index(1).unwrap();
    editor.cycle_speed().unwrap();
    editor.seek(3.0);
    editor.add_marker().unwrap();
    store.save_snapshot(editor.draft()).await.unwrap();

    let loaded = store.load_draft(&draft.id).await.unwrap().unwrap();
    let steps = export_timeline(&loaded).steps;
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].speed, 1.25);
    assert_eq!(steps[1].markers[0].source_time_s, 3.0);
    assert_eq!(steps[1].markers[0].label, "Marker 1");
}

#[test]
fn test_cli_list_empty_store() {
    let dir = TempDir::new().unwrap();
    reelcut(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No drafts"));
}

#[test]
fn test_cli_import_missing_file() {
    let dir = TempDir::new().unwrap();
    reelcut(dir.path())
        .args(["import", "--input"])
        .arg(dir.path().join("missing.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_cli_show_unknown_draft() {
    let dir = TempDir::new().unwrap();
    reelcut(dir.path())
        .args(["show", "--draft", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Draft not found: nope"));
}

#[test]
fn test_cli_rejects_unknown_edit_operation() {
    let dir = TempDir::new().unwrap();
    reelcut(dir.path())
        .args(["edit", "--draft", "d1", "explode"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown edit operation: explode"));
}

#[test]
fn test_cli_rejects_missing_config_file() {
    let dir = TempDir::new().unwrap();
    reelcut(dir.path())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file does not exist"));
}

#[tokio::test]
async fn test_cli_edit_show_steps_delete() {
    let dir = TempDir::new().unwrap();
    let draft = sample_draft();
    store_draft(dir.path(), &draft).await;
    let id = draft.id.to_string();

    reelcut(dir.path())
        .args(["show", "--draft", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Knee scope").and(predicate::str::contains("Inspection")));

    reelcut(dir.path())
        .args(["edit", "--draft", &id, "select=0", "delete", "in=6", "out=8", "add", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("00:06.000 - 00:08.000"));

    let output = reelcut(dir.path()).args(["steps", "--draft", &id]).output().unwrap();
    assert!(output.status.success());
    let export: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = export["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["start_s"], 0.0);
    assert_eq!(steps[0]["end_s"], 3.0);
    assert_eq!(steps[1]["speed"], 1.25);
    assert!(export.get("ui").is_none());

    reelcut(dir.path())
        .args(["delete", "--draft", &id])
        .assert()
        .success();
    reelcut(dir.path()).args(["show", "--draft", &id]).assert().failure();
}

#[tokio::test]
async fn test_cli_strict_edit_stops_at_rejection() {
    let dir = TempDir::new().unwrap();
    let draft = sample_draft();
    store_draft(dir.path(), &draft).await;
    let id = draft.id.to_string();

    reelcut(dir.path())
        .args(["edit", "--strict", "--draft", &id, "select=1", "merge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no following segment"));

    reelcut(dir.path())
        .args(["edit", "--draft", &id, "undo", "redo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to undo"));
}

#[test]
fn test_cli_import_real_video() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let video = dir.path().join("clip.mp4");
    if !create_test_video(&video, 3.0) {
        eprintln!("could not create test video; skipping");
        return;
    }

    let output = reelcut(dir.path())
        .args(["import", "--title", "Generated"])
        .arg("--input")
        .arg(&video)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();

    let shown = reelcut(dir.path()).args(["show", "--json", "--draft", &id]).output().unwrap();
    let draft: serde_json::Value = serde_json::from_slice(&shown.stdout).unwrap();
    let waveform = draft["asset"]["waveform_uri"].as_str().unwrap();
    assert!(Path::new(waveform).exists());
    assert!(draft["asset"]["duration_s"].as_f64().unwrap() > 2.5);
}
