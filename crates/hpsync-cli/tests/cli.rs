//! Integration tests for the hpsync CLI binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CARGO_TOML: &str = r#"
[package]
name = "hp"
version = "3.3.5"
"#;

const MANIFEST: &str = r#"{
    "version": "3.3.4",
    "architecture": {
        "64bit": {
            "url": "https://github.com/Super1Windcloud/hp/releases/download/3.3.4/hp.exe",
            "hash": "0000000000000000000000000000000000000000000000000000000000000000"
        }
    },
    "url": "https://github.com/Super1Windcloud/hp/releases/download/3.3.4/hp.exe",
    "hash": "0000000000000000000000000000000000000000000000000000000000000000"
}
"#;

const ARTIFACT: &[u8] = b"hp x64 build";

fn expected_hash() -> String {
    hpsync_core::hashing::digest_reader(ARTIFACT)
        .unwrap()
        .to_string()
}

/// Test context with a release workspace in a temp dir
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".hpsync");
        std::fs::create_dir_all(&home).expect("failed to create hpsync home");
        Self { temp_dir, home }
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn write_artifact_to(dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).expect("failed to create artifact dir");
        let path = dir.join("hp.exe");
        std::fs::write(&path, ARTIFACT).expect("failed to write artifact");
        path
    }

    /// Cargo.toml, one x64 artifact and the given mirrors (created when `true`).
    fn workspace(&self, mirrors: &[(&str, bool)]) -> PathBuf {
        let root = self.root();
        std::fs::write(root.join("Cargo.toml"), CARGO_TOML).unwrap();
        Self::write_artifact_to(&root.join("target/release"));

        let mut listed = Vec::new();
        for (mirror, exists) in mirrors {
            if *exists {
                let path = root.join(mirror);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, MANIFEST).unwrap();
            }
            listed.push(format!("\"{mirror}\""));
        }

        let config = format!(
            "owner = \"Super1Windcloud\"\nrepo = \"hp\"\nmirrors = [{}]\n\n[artifacts.x64]\npath = \"target/release/hp.exe\"\n",
            listed.join(", ")
        );
        let path = root.join("hpsync.toml");
        std::fs::write(&path, config).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_hpsync");
        let mut cmd = Command::new(bin_path);
        cmd.current_dir(self.root());
        cmd.env("HOME", self.root());
        cmd.env("HPSYNC_HOME", &self.home);
        cmd.env_remove("HPSYNC_CONFIG");
        cmd.env_remove("HPSYNC_TOKEN_FILE");
        cmd.env_remove("HPSYNC_API_URL");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run hpsync")
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    ctx.workspace(&[]);
    let output = ctx.run(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("current:  3.3.5"));
    assert!(stdout.contains("previous: 3.3.4"));

    let output = ctx.run(&["--json", "version"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["current"], "3.3.5");
    assert_eq!(value["previous"], "3.3.4");
}

#[test]
fn test_version_without_build_config_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["version"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cargo.toml"));
}

#[test]
fn test_digest_command() {
    let ctx = TestContext::new();
    let artifact = TestContext::write_artifact_to(ctx.root());
    let output = ctx.cmd().arg("digest").arg(&artifact).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let (hash, path) = stdout.trim().split_once(' ').unwrap();
    assert_eq!(hash, expected_hash());
    assert_eq!(path, artifact.display().to_string());
}

#[test]
fn test_sync_updates_mirrors() {
    let ctx = TestContext::new();
    ctx.workspace(&[("bucket/hp.json", true), ("scoop/hp.json", true)]);

    let output = ctx.run(&["--json", "sync"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["stage"], "done");
    assert_eq!(report["version"], "3.3.5");
    assert_eq!(report["architectures"]["64bit"]["status"], "ok");

    let hash = expected_hash();
    for mirror in ["bucket/hp.json", "scoop/hp.json"] {
        let text = std::fs::read_to_string(ctx.root().join(mirror)).unwrap();
        assert!(text.contains("\"version\": \"3.3.5\""));
        assert!(text.contains(&hash));
        assert!(text.contains("/download/3.3.5/hp.exe"));
    }
}

#[test]
fn test_apply_without_checkpoint_aborts() {
    let ctx = TestContext::new();
    ctx.workspace(&[("bucket/hp.json", true)]);
    let output = ctx.run(&["apply"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("aborted"));

    let text = std::fs::read_to_string(ctx.root().join("bucket/hp.json")).unwrap();
    assert_eq!(text, MANIFEST);
}

#[test]
fn test_missing_mirror_is_partial_failure() {
    let ctx = TestContext::new();
    ctx.workspace(&[("bucket/hp.json", true), ("scoop/hp.json", false)]);

    let output = ctx.run(&["sync"]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bucket/hp.json updated"));
    assert!(stdout.contains("scoop/hp.json failed"));

    // The checkpoint survives, so `apply` finishes the job once fixed.
    let checkpoint = ctx.root().join("target/hpsync/checkpoint.json");
    assert!(checkpoint.exists());
    std::fs::create_dir_all(ctx.root().join("scoop")).unwrap();
    std::fs::write(ctx.root().join("scoop/hp.json"), MANIFEST).unwrap();

    let output = ctx.run(&["apply"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert!(!checkpoint.exists());
    let text = std::fs::read_to_string(ctx.root().join("scoop/hp.json")).unwrap();
    assert!(text.contains("\"version\": \"3.3.5\""));
}

#[test]
fn test_hash_writes_checkpoint_only() {
    let ctx = TestContext::new();
    ctx.workspace(&[("bucket/hp.json", true)]);

    let output = ctx.run(&["hash"]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let checkpoint =
        std::fs::read_to_string(ctx.root().join("target/hpsync/checkpoint.json")).unwrap();
    assert!(checkpoint.contains("\"version\": \"3.3.5\""));
    assert!(checkpoint.contains(&expected_hash()));

    let text = std::fs::read_to_string(ctx.root().join("bucket/hp.json")).unwrap();
    assert_eq!(text, MANIFEST);
}

#[test]
fn test_notes_command() {
    let ctx = TestContext::new();
    ctx.workspace(&[]);
    std::fs::write(
        ctx.root().join("CHANGELOG.md"),
        "## v3.3.5\n\n- faster hashing\n\n## v3.3.4\n\n- older\n",
    )
    .unwrap();

    let output = ctx.run(&["notes"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("faster hashing"));
    assert!(!stdout.contains("older"));
}

#[test]
fn test_publish_dry_run_prints_payload() {
    let ctx = TestContext::new();
    ctx.workspace(&[]);

    let output = ctx.run(&["publish", "--dry-run", "--notes", "hello", "--prerelease"]);
    assert!(output.status.success(), "{output:?}");
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["tag_name"], "v3.3.5");
    assert_eq!(payload["name"], "hp 3.3.5");
    assert_eq!(payload["body"], "hello");
    assert_eq!(payload["prerelease"], true);
    assert_eq!(payload["target_commitish"], "main");
}

#[test]
fn test_publish_without_token_fails() {
    let ctx = TestContext::new();
    ctx.workspace(&[]);
    let output = ctx.run(&["publish"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(".github_token"));
}
