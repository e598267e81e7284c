//! End-to-end tests for the `vaultsh` binary.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `vaultsh` command isolated from the caller's environment and home.
fn vaultsh(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vaultsh"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("VAULT_ADDR")
        .env_remove("VAULT_TOKEN")
        .env_remove("VAULTSH_CONFIG")
        .env_remove("VAULTSH_ENV")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("vaultsh.toml");
    std::fs::write(&path, content).unwrap();
    path
}

/// Serve canned JSON bodies keyed by request target, one request per connection.
fn serve(routes: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            respond(stream, &routes);
        }
    });
    address
}

fn respond(mut stream: TcpStream, routes: &[(&str, String)]) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let (status, body) = routes
        .iter()
        .find(|(path, _)| *path == target)
        .map_or(("404 Not Found", "{\"errors\":[]}".to_string()), |(_, body)| {
            ("200 OK", body.clone())
        });

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).unwrap();
}

fn config_for(address: &str) -> String {
    format!(
        "[default]\naddress = \"{address}\"\ntoken = \"s.test\"\ntimeout = 5\n\
         [default.retry]\nmax_attempts = 1\ninitial_interval = 1\nmax_interval = 1\n"
    )
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("connect"))
        .stdout(predicate::str::contains("direct"));
}

#[test]
fn no_arguments_prints_usage() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn missing_config_file_is_reported() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .args(["--config", "/no/such/vaultsh.toml", "list", "servers"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error reading config file /no/such/vaultsh.toml"));
}

#[test]
fn invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), "[default]\naddress = \"https://vault:8200\"\n");

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .args(["show", "servers/prod/web01"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "default configuration validation failed: token is required",
        ));
}

#[test]
fn token_may_come_from_the_environment() {
    let home = TempDir::new().unwrap();
    let address = serve(vec![(
        "/v1/secret/metadata/servers?list=true",
        r#"{"data":{"keys":["prod/"]}}"#.to_string(),
    )]);
    let config = write_config(
        home.path(),
        &format!("[default]\naddress = \"{address}\"\n[default.retry]\nmax_attempts = 1\n"),
    );

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .env("VAULT_TOKEN", "s.from-env")
        .args(["list", "servers"])
        .assert()
        .success()
        .stdout("prod/\n");
}

#[test]
fn unknown_environment_is_reported() {
    let home = TempDir::new().unwrap();
    let config = write_config(home.path(), &config_for("http://127.0.0.1:1"));

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .args(["--env", "prod", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown environment 'prod'"));
}

#[test]
fn list_prints_one_key_per_line() {
    let home = TempDir::new().unwrap();
    let address = serve(vec![(
        "/v1/secret/metadata/servers/prod?list=true",
        r#"{"data":{"keys":["web01","db/"]}}"#.to_string(),
    )]);
    let config = write_config(home.path(), &config_for(&address));

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .args(["list", "servers/prod"])
        .assert()
        .success()
        .stdout("web01\ndb/\n");
}

#[test]
fn show_redacts_secrets() {
    let home = TempDir::new().unwrap();
    let address = serve(vec![(
        "/v1/secret/data/servers/prod/web01",
        r#"{"data":{"data":{"hostname":"web01.example.com","port":"2222","username":"ops","password":"hunter2"}}}"#
            .to_string(),
    )]);
    let config = write_config(home.path(), &config_for(&address));

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .args(["show", "servers/prod/web01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hostname: web01.example.com"))
        .stdout(predicate::str::contains("port: 2222"))
        .stdout(predicate::str::contains("password: <redacted>"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn show_missing_record_names_the_path() {
    let home = TempDir::new().unwrap();
    let address = serve(Vec::new());
    let config = write_config(home.path(), &config_for(&address));

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .args(["show", "servers/prod/gone"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("secret/data/servers/prod/gone"));
}

#[test]
fn connect_reports_unreachable_host() {
    let home = TempDir::new().unwrap();
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let address = serve(vec![(
        "/v1/secret/data/servers/lab/box",
        format!(
            r#"{{"data":{{"data":{{"hostname":"box","ip":"127.0.0.1","port":"{closed_port}","username":"ops","password":"pw"}}}}}}"#
        ),
    )]);
    let config = write_config(home.path(), &config_for(&address));

    vaultsh(home.path())
        .arg("--config")
        .arg(&config)
        .arg("--known-hosts")
        .arg(home.path().join("known_hosts"))
        .args(["connect", "servers/lab/box"])
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to dial SSH server"));
}

#[test]
fn direct_missing_key_file() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .args(["direct", "--address", "127.0.0.1", "--user", "root"])
        .args(["--key-file", "/no/such/id_ed25519"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read key file /no/such/id_ed25519"));
}

#[test]
fn direct_missing_password_variable() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .args(["direct", "--address", "127.0.0.1", "--user", "root"])
        .args(["--password-env", "VAULTSH_TEST_PASSWORD"])
        .env_remove("VAULTSH_TEST_PASSWORD")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("environment variable VAULTSH_TEST_PASSWORD is not set"));
}

#[test]
fn direct_without_any_credential() {
    let home = TempDir::new().unwrap();
    vaultsh(home.path())
        .args(["direct", "--address", "127.0.0.1:2222", "--user", "root"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing credential"));
}

#[test]
fn direct_rejects_garbage_key() {
    let home = TempDir::new().unwrap();
    let key = home.path().join("key");
    std::fs::write(&key, "not a key").unwrap();

    vaultsh(home.path())
        .args(["direct", "--address", "127.0.0.1", "--user", "root", "--key-file"])
        .arg(&key)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse private key"));
}
