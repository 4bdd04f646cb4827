use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

/// The binary with an isolated, empty configuration and no user or server
/// taken from the environment. Nothing listens on the base URL.
pub fn client(config: &NamedTempFile) -> Command {
    let mut cmd = Command::cargo_bin("emulator-client").expect("binary is built");
    cmd.env_remove("EMULATOR_USER")
        .env_remove("EMULATOR_BASE_URL")
        .env_remove("EMULATOR_CONFIG")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config.path())
        .arg("--base-url")
        .arg("http://127.0.0.1:9");
    cmd
}

pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", contents).expect("write config");
    file
}
