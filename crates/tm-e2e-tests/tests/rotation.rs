//! E2E tests for repeated runs over growing and rotating log files.

mod helpers;

use helpers::{TestHarness, lines};
use tm_tail::{OffsetStore, Tailer};

/// Every line is delivered exactly once across runs.
#[tokio::test]
async fn e2e_incremental_runs() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: one\ncron: tick\n");

    let first = h.run(false).await;
    assert_eq!(first.lines("app"), lines(&["sshd: one"]));
    assert_eq!(first.results["app"].stats.ignored, 1);

    let second = h.run(false).await;
    assert!(second.results["app"].is_empty());

    h.append("app.log", "sshd: two\n-- MARK --\n");
    let third = h.run(false).await;
    assert_eq!(third.lines("app"), lines(&["sshd: two"]));
    assert_eq!(third.results["app"].stats.garbage, 1);
}

/// Lines written just before a numeric rotation are read from `app.log.1`.
#[tokio::test]
async fn e2e_numeric_rotation() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: a\n");
    h.run(false).await;

    h.append("app.log", "sshd: b\n");
    h.rename("app.log", "app.log.1");
    h.write("app.log", "sshd: c\n");

    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: b", "sshd: c"]));
    assert!(h.run(false).await.results["app"].is_empty());
}

/// Dated rotations (`app.log-YYYYMMDD`) are found too; the latest one wins.
#[tokio::test]
async fn e2e_dated_rotation() {
    let h = TestHarness::single_log();
    h.write("app.log-20240101", "sshd: ancient\n");
    h.write("app.log", "sshd: a\n");
    h.run(false).await;

    h.append("app.log", "sshd: b\n");
    h.rename("app.log", "app.log-20240102");
    h.write("app.log", "");

    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: b"]));
}

/// A rotated file that is not the one we were reading is never trusted.
#[tokio::test]
async fn e2e_rotation_without_matching_predecessor() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: a\n");
    h.run(false).await;

    // copy, not rename: the `.1` file has a different identity
    std::fs::copy(h.path("app.log"), h.path("app.log.1")).unwrap();
    h.rename("app.log", "app.log.old");
    h.write("app.log", "sshd: fresh\n");

    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: fresh"]));
}

/// Copy-truncate rotation: the file shrinks in place and is re-read from the start.
#[tokio::test]
async fn e2e_copy_truncate() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: first line\nsshd: second line\n");
    h.run(false).await;

    h.write("app.log", "sshd: x\n");
    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: x"]));
}

/// A dry run never writes markers, so the next real run sees the same lines.
#[tokio::test]
async fn e2e_dry_run_redelivers() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: one\n");

    let dry = h.run(true).await;
    assert_eq!(dry.lines("app"), lines(&["sshd: one"]));
    assert!(!h.exists("app.log.offset"));

    let real = h.run(false).await;
    assert_eq!(real.lines("app"), lines(&["sshd: one"]));
    assert!(h.exists("app.log.offset"));
}

/// Missing files are skipped; the other files of the log are still read.
#[tokio::test]
async fn e2e_missing_file_is_skipped() {
    let h = TestHarness::new(
        r#"
[actions]

[logs.app]
files = ["{dir}/a.log", "{dir}/b.log"]
regex = "plain"
"#,
    );
    h.write("b.log", "sshd: from b\n");

    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: from b"]));
    assert!(!h.exists("a.log.offset"));
    assert!(h.exists("b.log.offset"));
}

/// Files of one log are read in sorted path order.
#[tokio::test]
async fn e2e_files_in_path_order() {
    let h = TestHarness::new(
        r#"
[actions]

[logs.app]
files = ["{dir}/z.log", "{dir}/a.log"]
regex = "plain"
"#,
    );
    h.write("z.log", "sshd: z\n");
    h.write("a.log", "sshd: a\n");

    let run = h.run(false).await;
    assert_eq!(run.lines("app"), lines(&["sshd: a", "sshd: z"]));
}

/// Markers written by a run are readable through the public store API.
#[tokio::test]
async fn e2e_marker_matches_file_size() {
    let h = TestHarness::single_log();
    h.write("app.log", "sshd: one\nsshd: two\n");
    h.run(false).await;

    let store = Tailer::new().store_for(&h.path("app.log"));
    assert_eq!(store, OffsetStore::beside(&h.path("app.log")));
    let marker = store.read().expect("marker written");
    let size = std::fs::metadata(h.path("app.log")).unwrap().len();
    assert_eq!(marker.offset, size);
}
