use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::common::{free_port, free_ports, write_script};

struct CliEnv {
    dir: TempDir,
}

impl CliEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn workspace(&self) -> PathBuf {
        self.dir.path().join(".toolhub")
    }

    fn secrets(&self) -> PathBuf {
        self.dir.path().join("secrets.json")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("toolhub").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("TOOLHUB_WORKSPACE")
            .env("TOOLHUB_SECRETS_FILE", self.secrets())
            .env("RUST_LOG", "warn")
            .arg("--workspace")
            .arg(self.workspace());
        cmd
    }

    fn init(&self) {
        self.cmd().arg("init").assert().success();
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn init_creates_workspace_once() {
    let env = CliEnv::new();
    env.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(env.workspace().join("hub.yaml").is_file());
    assert!(env.workspace().join(".env").is_file());
    assert!(env.workspace().join("logs").is_dir());

    env.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_merge_defaults_restores_removed_servers() {
    let env = CliEnv::new();
    env.init();
    env.cmd().args(["server", "remove", "memory"]).assert().success();
    assert!(!read(&env.workspace().join("hub.yaml")).contains("memory:"));

    env.cmd()
        .args(["init", "--merge-defaults"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 service(s) added"));
    assert!(read(&env.workspace().join("hub.yaml")).contains("memory:"));
}

#[test]
fn validate_accepts_default_manifest() {
    let env = CliEnv::new();
    env.init();
    env.cmd()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn validate_reports_duplicate_ports() {
    let env = CliEnv::new();
    std::fs::create_dir_all(env.workspace()).unwrap();
    std::fs::write(
        env.workspace().join("hub.yaml"),
        "mcp_servers:\n  a:\n    port: 9100\n  b:\n    port: 9100\n",
    )
    .unwrap();

    env.cmd()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("9100"));
}

#[test]
fn validate_without_workspace_fails() {
    let env = CliEnv::new();
    env.cmd()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("toolhub init"));
}

#[test]
fn server_lifecycle() {
    let env = CliEnv::new();
    env.init();

    env.cmd()
        .args([
            "server",
            "add",
            "github",
            "--command",
            "npx -y @acme/github",
            "--env-var",
            "GITHUB_TOKEN",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added github"));

    env.cmd()
        .args(["server", "add", "github"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    env.cmd()
        .args(["server", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/mcp/github/mcp"));

    // Placeholder for the required variable, commented out.
    assert!(read(&env.workspace().join(".env")).contains("# GITHUB_TOKEN=  # required by github"));

    env.cmd()
        .args(["server", "toggle", "github", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));

    env.cmd()
        .args(["server", "remove", "githib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did you mean `github`"));

    env.cmd().args(["server", "remove", "github"]).assert().success();
    env.cmd()
        .args(["server", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("github").not());
}

#[test]
fn server_update_keeps_port_and_clears_description() {
    let env = CliEnv::new();
    env.init();
    env.cmd()
        .args(["server", "add", "notes", "--port", "9650", "--description", "scratch notes"])
        .assert()
        .success();

    env.cmd()
        .args(["server", "update", "notes", "--label", "docs"])
        .assert()
        .success();
    let manifest = read(&env.workspace().join("hub.yaml"));
    assert!(manifest.contains("9650"));
    assert!(manifest.contains("docs"));
    assert!(!manifest.contains("scratch notes"));
}

#[test]
fn env_and_secret_commands() {
    let env = CliEnv::new();
    env.init();
    env.cmd()
        .args(["server", "add", "github", "--env-var", "GITHUB_TOKEN"])
        .assert()
        .success();

    env.cmd()
        .args(["env", "required"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GITHUB_TOKEN"))
        .stdout(predicate::str::contains("still need a value"));

    env.cmd()
        .args(["env", "secret", "GITHUB_TOKEN", "gh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("secret `gh` not found"));

    env.cmd().args(["secret", "set", "gh", "tok-123"]).assert().success();
    env.cmd()
        .args(["secret", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gh"));

    env.cmd()
        .args(["env", "secret", "GITHUB_TOKEN", "gh"])
        .assert()
        .success();
    assert!(read(&env.workspace().join(".env")).contains("GITHUB_TOKEN=@secret:gh"));

    env.cmd()
        .args(["env", "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"secret_exists\": true"))
        .stdout(predicate::str::contains("tok-123").not());

    env.cmd()
        .args(["env", "set", "lower_case", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid environment variable name"));

    env.cmd().args(["secret", "delete", "gh"]).assert().success();
    env.cmd()
        .args(["secret", "delete", "gh"])
        .assert()
        .failure();
}

#[test]
fn secret_set_reads_stdin() {
    let env = CliEnv::new();
    env.cmd()
        .args(["secret", "set", "piped"])
        .write_stdin("from-stdin\n")
        .assert()
        .success();
    let stored = read(&env.secrets());
    assert!(stored.contains("\"piped\": \"from-stdin\""));
}

#[test]
fn status_json_when_stopped() {
    let env = CliEnv::new();
    env.init();
    env.cmd()
        .args(["status", "--json", "--control-plane-port"])
        .arg(free_port().to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"stopped\""))
        .stdout(predicate::str::contains("\"running\": false"));
}

#[test]
fn stop_without_hub_is_a_no_op() {
    let env = CliEnv::new();
    env.cmd()
        .args(["stop", "--control-plane-port"])
        .arg(free_port().to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("No hub is listening"));
}

#[test]
fn start_without_orchestrator_fails_fast() {
    let env = CliEnv::new();
    env.cmd()
        .args(["start", "--orchestrator", "toolhub-missing-orchestrator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("toolhub-missing-orchestrator"));
}

#[test]
fn start_stops_cleanly_on_interrupt() {
    use std::io::{BufRead, BufReader};
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let env = CliEnv::new();
    let bin = env.dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let orchestrator = write_script(
        &bin,
        "fake-orch-sigint",
        "#!/bin/sh\ncase \"$1\" in\n  up) exec sleep 60 ;;\n  down) exit 0 ;;\nesac\n",
    );
    let proxy = write_script(&bin, "fake-proxy-sigint", "#!/bin/sh\nexit 0\n");
    let ports = free_ports(2);

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("toolhub"))
        .current_dir(env.dir.path())
        .env_remove("TOOLHUB_WORKSPACE")
        .env("TOOLHUB_SECRETS_FILE", env.secrets())
        .env("RUST_LOG", "warn")
        .arg("--workspace")
        .arg(env.workspace())
        .arg("--orchestrator")
        .arg(&orchestrator)
        .arg("--proxy")
        .arg(&proxy)
        .args(["--control-plane-port", &ports[0].to_string()])
        .args(["--proxy-port", &ports[1].to_string()])
        .args(["start", "--quiet"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    let stdout = child.stdout.take().unwrap();
    std::thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            let _ = tx.send(line);
        }
    });

    let starting = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(starting.contains("hub starting"), "unexpected output: {starting}");
    std::thread::sleep(Duration::from_millis(300));

    let pid = nix::unistd::Pid::from_raw(child.id() as i32);
    nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGINT).unwrap();

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(Instant::now() < deadline, "toolhub start ignored SIGINT");
        std::thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());

    // The reader thread ends at EOF once the process is gone.
    let rest: Vec<String> = rx.iter().collect();
    assert!(rest.iter().any(|l| l.contains("hub stopped")), "output: {rest:?}");
}

#[test]
fn completions_bash_generates_output() {
    let env = CliEnv::new();
    env.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("toolhub"));
}
