//! Integration tests for sticky

mod scenarios;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const HELLO_HEX: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    /// Binary isolated from the user's config and state
    fn sticky(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("sticky");
        cmd.env("STICKY_CONFIG", dir.path().join("config.toml"))
            .env("STICKY_STATE_DIR", dir.path().join("state"))
            .env("CI", "true");
        cmd
    }

    fn write_manifest(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("manifest.json");
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("verified offline cache"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("sticky"));
    }

    #[test]
    fn manifest_build_hashes_directory() {
        let dir = TempDir::new().unwrap();
        let site = dir.path().join("site");
        fs::create_dir_all(site.join("about")).unwrap();
        fs::write(site.join("index.html"), "hello").unwrap();
        fs::write(site.join("about").join("index.html"), "hello").unwrap();

        sticky(&dir)
            .args(["manifest", "build", "--scheme", "content"])
            .arg(&site)
            .assert()
            .success()
            .stdout(predicate::str::contains("/about/index.html"))
            .stdout(predicate::str::contains("/index.html"))
            .stdout(predicate::str::contains(HELLO_HEX));
    }

    #[test]
    fn manifest_build_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["manifest", "build"])
            .arg(dir.path().join("nope"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn resolve_follows_fallback_rules() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            &format!(
                r#"{{"/about/index.html": "{h}", "/about.html": "{h}"}}"#,
                h = HELLO_HEX
            ),
        );
        fs::write(
            dir.path().join("config.toml"),
            "[proxy]\ndigest_scheme = \"content-hash\"\n",
        )
        .unwrap();

        sticky(&dir)
            .args(["resolve", "/about/", "--manifest", &manifest])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("/about/index.html\tdir-index"));

        sticky(&dir)
            .args(["resolve", "/about", "--all", "--manifest", &manifest])
            .assert()
            .success()
            .stdout(predicate::str::contains("/about.html\thtml-suffix"));
    }

    #[test]
    fn resolve_unlisted_path_fails() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir, &format!(r#"[["/index.html", "{}"]]"#, HELLO_HEX));
        fs::write(
            dir.path().join("config.toml"),
            "[proxy]\ndigest_scheme = \"content-hash\"\n",
        )
        .unwrap();

        sticky(&dir)
            .args(["resolve", "/missing", "--manifest", &manifest])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No manifest entry serves /missing"));
    }

    #[test]
    fn resolve_missing_manifest_fails() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["resolve", "/", "--manifest"])
            .arg(dir.path().join("absent.json"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("absent.json"));
    }

    #[test]
    fn status_json_on_fresh_state() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"bricked\": false"))
            .stdout(predicate::str::contains("\"generations\": []"));
    }

    #[test]
    fn status_reports_bricked_state() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(
            state.join("storage.json"),
            r#"{"service_worker.current.version": "abc123", "service_worker.bricked": true}"#,
        )
        .unwrap();

        sticky(&dir)
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"bricked\": true"))
            .stdout(predicate::str::contains("\"current_version\": \"abc123\""));
    }

    #[test]
    fn reset_clears_brick_flag() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        fs::create_dir_all(state.join("caches").join("2361")).unwrap();
        // "foreign", not carrying the generation prefix
        fs::create_dir_all(state.join("caches").join("666f726569676e")).unwrap();
        fs::write(
            state.join("storage.json"),
            r#"{"service_worker.bricked": true}"#,
        )
        .unwrap();
        fs::write(
            state.join("worker.json"),
            r#"{"script_url": "https://example.com/sw.abc123.js", "state": "active"}"#,
        )
        .unwrap();

        sticky(&dir)
            .args(["reset", "--yes", "--caches"])
            .assert()
            .success();

        let stored = fs::read_to_string(state.join("storage.json")).unwrap();
        assert!(!stored.contains("bricked"));
        assert!(!state.join("worker.json").exists());
        assert!(!state.join("caches").join("2361").exists());
        assert!(state.join("caches").join("666f726569676e").exists());
    }

    #[test]
    fn reset_without_confirmation_keeps_state() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(
            state.join("storage.json"),
            r#"{"service_worker.bricked": true}"#,
        )
        .unwrap();

        sticky(&dir).arg("reset").assert().success();

        let stored = fs::read_to_string(state.join("storage.json")).unwrap();
        assert!(stored.contains("bricked"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[proxy]"))
            .stdout(predicate::str::contains("strict_header_check = true"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        sticky(&dir).args(["config", "init"]).assert().success();

        let written = fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(written.contains("[general]"));
        assert!(written.contains("cache_prefix"));
    }

    #[test]
    fn invalid_config_fails_with_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), "[proxy]\nversion_length = \"six\"\n").unwrap();

        sticky(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("config.toml"));
    }

    #[test]
    fn completions_generate() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sticky"));
    }

    #[test]
    fn register_rejects_invalid_url() {
        let dir = TempDir::new().unwrap();
        sticky(&dir)
            .args(["register", "not a url"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }
}
