//! CLI integration tests
//!
//! Drive the built `wikicat` binary against a temporary page directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;
use wikicat_core::PageStore;
use wikicat_store::DirPageStore;

fn setup(pages: &[(&str, &str)], rows: &str) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let pages_dir = temp_dir.path().join("pages");
    fs::create_dir_all(&pages_dir).unwrap();
    let store = DirPageStore::new(&pages_dir);
    for (title, text) in pages {
        store.save(title, text, "seed", false).unwrap();
    }
    let rows_path = temp_dir.path().join("rows.tsv");
    fs::write(&rows_path, rows).unwrap();
    (temp_dir, pages_dir, rows_path)
}

fn wikicat(dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wikicat"))
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn read_page(pages_dir: &Path, title: &str) -> String {
    DirPageStore::new(pages_dir).read(title).unwrap()
}

const ROW: &str = "Category:Old Topic\tCategory:New Topic\tmerge\n";

#[test]
fn test_cli_run_non_interactive_rewrites_links() {
    let (tmp, pages_dir, rows) = setup(
        &[
            ("Category:Old Topic", "Topic description"),
            ("Page", "Text\n[[Category:Old Topic|Sort]]\n"),
        ],
        ROW,
    );

    let output = wikicat(
        tmp.path(),
        &[
            "run",
            rows.to_str().unwrap(),
            "--pages",
            pages_dir.to_str().unwrap(),
            "--non-interactive",
            "--report",
            "report.json",
        ],
        "",
    );

    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1/1 rows, 1 moved, 1 pages changed"), "stdout: {}", stdout);

    assert_eq!(read_page(&pages_dir, "Page"), "Text\n[[Category:New Topic|Sort]]\n");
    assert_eq!(read_page(&pages_dir, "Category:New Topic"), "Topic description");
    assert!(!DirPageStore::new(&pages_dir).exists("Category:Old Topic").unwrap());

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["rows"][0]["move_outcome"], "moved");
    assert_eq!(report["saves"], 1);
}

#[test]
fn test_cli_run_confirms_on_terminal_and_learns_rule() {
    let (tmp, pages_dir, rows) = setup(
        &[
            ("Category:Old Topic", ""),
            ("Page", "{{InfoBox|location=Old Topic}} [[Category:Old Topic]]"),
        ],
        ROW,
    );
    let rules = tmp.path().join("rules.json");

    let output = wikicat(
        tmp.path(),
        &[
            "run",
            rows.to_str().unwrap(),
            "--pages",
            pages_dir.to_str().unwrap(),
            "--rules",
            rules.to_str().unwrap(),
        ],
        "y\n",
    );

    assert!(
        output.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("+ {{InfoBox|location=New Topic}}"));
    assert_eq!(
        read_page(&pages_dir, "Page"),
        "{{InfoBox|location=New Topic}} [[Category:New Topic]]"
    );

    let shown = wikicat(
        tmp.path(),
        &["rules", "--rules", rules.to_str().unwrap(), "show", "--json"],
        "",
    );
    let doc: serde_json::Value = serde_json::from_slice(&shown.stdout).unwrap();
    let bucket = &doc["en:wikipedia"]["templates"]["InfoBox"];
    assert_eq!(bucket["rules"][0]["to"], "New Topic");
}

#[test]
fn test_cli_rules_approve_and_show() {
    let tmp = TempDir::new().unwrap();
    let rules = tmp.path().join("rules.json");
    let rules_arg = rules.to_str().unwrap();

    let approved = wikicat(tmp.path(), &["rules", "--rules", rules_arg, "approve", "Template:Nav"], "");
    assert!(approved.status.success());
    assert!(String::from_utf8_lossy(&approved.stdout).contains("approve on"));

    let shown = wikicat(tmp.path(), &["rules", "--rules", rules_arg, "show"], "");
    let stdout = String::from_utf8_lossy(&shown.stdout);
    assert!(stdout.contains("en:wikipedia"));
    assert!(stdout.contains("[approve]"));

    let cleared = wikicat(tmp.path(), &["rules", "--rules", rules_arg, "clear"], "");
    assert!(cleared.status.success());
    let shown = wikicat(tmp.path(), &["rules", "--rules", rules_arg, "show"], "");
    assert!(String::from_utf8_lossy(&shown.stdout).contains("No rules stored"));
}

#[test]
fn test_cli_missing_page_dir_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("rows.tsv"), ROW).unwrap();

    let output = wikicat(
        tmp.path(),
        &["run", "rows.tsv", "--pages", "nowhere", "--non-interactive"],
        "",
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: page directory"));
}
