//! This build script copies the `memory.x` file from the crate root into
//! a directory where the linker can always find it at build time, and
//! generates the compile time configuration of the firmware from the JSON
//! files in `config/`. Missing config files are created with dummy values
//! so a fresh checkout builds.
//!
//! The linker arguments are only emitted for the RP2040 target, the host
//! build of the library and its tests does not need them.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::print_stdout)]

use std::{
    env, fs,
    fs::File,
    io,
    io::Write,
    path::{Path, PathBuf},
};

fn main() {
    let target = env::var("TARGET").expect("TARGET environment variable not set");
    if target.starts_with("thumb") {
        memory_x();
    }
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR environment variable not set");
    let config_dir = Path::new(&manifest_dir).join("config");
    fs::create_dir_all(&config_dir).expect("Could not create config directory");
    wifi_secrets(&config_dir).unwrap();
    time_api_config(&config_dir).unwrap();
    telemetry_config(&config_dir).unwrap();
}

/// Read a JSON config file, or create it with `dummy` if it doesn't exist
fn read_config(config_dir: &Path, name: &str, dummy: &str) -> serde_json::Value {
    let config_path = config_dir.join(name);
    println!("cargo:rerun-if-changed={}", config_path.display());
    let config_contents = if config_path.exists() {
        fs::read_to_string(&config_path).unwrap_or_else(|_| panic!("Could not read {name} file"))
    } else {
        println!("{name} not found, creating with dummy values");
        fs::write(&config_path, dummy)
            .unwrap_or_else(|_| panic!("Could not write dummy {name} file"));
        dummy.to_string()
    };
    serde_json::from_str(&config_contents).unwrap_or_else(|_| panic!("Could not parse {name} file"))
}

/// Create a generated source file in the output directory
fn out_file(name: &str) -> File {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR environment variable not set");
    File::create(Path::new(&out_dir).join(name))
        .unwrap_or_else(|_| panic!("Could not create {name} file"))
}

/// Generate `wifi_secrets.rs` from `wifi_config.json`
fn wifi_secrets(config_dir: &Path) -> io::Result<()> {
    let config = read_config(
        config_dir,
        "wifi_config.json",
        r#"{"ssid":"dummy","password":"dummy"}"#,
    );
    let ssid = config["ssid"]
        .as_str()
        .expect("ssid not found in wifi_config.json file");
    let password = config["password"]
        .as_str()
        .expect("password not found in wifi_config.json file");

    let mut f = out_file("wifi_secrets.rs");
    writeln!(f, "/// SSID of the WiFi network")?;
    writeln!(f, "const SSID: &str = {ssid:?};")?;
    writeln!(f, "/// Password of the WiFi network")?;
    writeln!(f, "const PASSWORD: &str = {password:?};")?;
    Ok(())
}

/// Generate `time_api_config.rs` from `time_api.json`
fn time_api_config(config_dir: &Path) -> io::Result<()> {
    let config = read_config(
        config_dir,
        "time_api.json",
        r#"{"time api by zone":{"baseurl":"http://worldtimeapi.org/api","timezone":"/timezone/Etc/UTC"}}"#,
    );
    let baseurl = config["time api by zone"]["baseurl"]
        .as_str()
        .expect("baseurl not found in time_api.json file");
    let timezone = config["time api by zone"]["timezone"]
        .as_str()
        .expect("timezone not found in time_api.json file");

    // Combine baseurl and timezone into a single string for TIME_SERVER_URL
    let combined_url = format!("{baseurl}{timezone}");

    let mut f = out_file("time_api_config.rs");
    writeln!(f, "/// Time API endpoint answering with the current unix time")?;
    writeln!(f, "const TIME_SERVER_URL: &str = {combined_url:?};")?;
    Ok(())
}

/// Generate `telemetry_config.rs` from `telemetry.json`
fn telemetry_config(config_dir: &Path) -> io::Result<()> {
    let config = read_config(
        config_dir,
        "telemetry.json",
        r#"{"url":"http://localhost/telemetry","device_id":"dummy"}"#,
    );
    let url = config["url"]
        .as_str()
        .expect("url not found in telemetry.json file");
    let device_id = config["device_id"]
        .as_str()
        .expect("device_id not found in telemetry.json file");

    let mut f = out_file("telemetry_config.rs");
    writeln!(f, "/// Endpoint telemetry is posted to")?;
    writeln!(f, "const TELEMETRY_URL: &str = {url:?};")?;
    writeln!(f, "/// Identifies this clock to the telemetry endpoint")?;
    writeln!(f, "const DEVICE_ID: &str = {device_id:?};")?;
    Ok(())
}

/// Handle the `memory.x` linker script
fn memory_x() {
    // Put `memory.x` in our output directory and ensure it's
    // on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    // By default, Cargo will re-run a build script whenever
    // any file in the project changes. By specifying `memory.x`
    // here, we ensure the build script is only re-run when
    // `memory.x` is changed.
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
