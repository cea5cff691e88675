use std::{env, fs, path::PathBuf};

fn main() {
    // 1) Pick the linker memory layout for the target board
    let target = env::var("TARGET").expect("cargo sets TARGET");
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));

    let layout = if target.starts_with("thumbv8m") {
        Some("memory-pico2.x")
    } else if target.starts_with("thumbv6m") {
        Some("memory-pico1w.x")
    } else {
        // Host builds (tests, docs) link with the platform defaults.
        None
    };
    if let Some(layout) = layout {
        let memory_x =
            fs::read_to_string(layout).unwrap_or_else(|err| panic!("Failed to read {layout}: {err}"));
        fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rerun-if-changed={layout}");
    }

    // 2) Demo credentials come from the environment or an optional .env file
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = env::var_os("USERPROFILE").or_else(|| env::var_os("HOME")) {
        let _ = dotenvy::from_path(PathBuf::from(home).join(".pico.env"));
    }

    let wifi_ssid = env::var("WIFI_SSID").unwrap_or_default();
    let wifi_pass = env::var("WIFI_PASS").unwrap_or_default();
    if env::var_os("CARGO_FEATURE_WIFI").is_some() && wifi_ssid.is_empty() {
        println!("cargo:warning=WIFI feature enabled but WIFI_SSID is not set; the demo will use its default");
    }

    println!("cargo:rustc-env=WIFI_SSID={wifi_ssid}");
    println!("cargo:rustc-env=WIFI_PASS={wifi_pass}");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");
    println!("cargo:rerun-if-changed=.env");
}
