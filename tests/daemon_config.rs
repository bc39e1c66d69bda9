use std::sync::Mutex;

use tempfile::NamedTempFile;

use sightline::SightlineConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SIGHTLINE_CONFIG",
        "SIGHTLINE_LISTEN_ADDR",
        "SIGHTLINE_MODEL_DIR",
        "SIGHTLINE_DEFAULT_MODEL",
        "SIGHTLINE_FRAME_INTERVAL_MS",
        "SIGHTLINE_JPEG_QUALITY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_configuration() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SightlineConfig::load().expect("load config");
    assert_eq!(cfg.listen_addr, "127.0.0.1:8000");
    assert_eq!(cfg.model_dir, "models");
    assert_eq!(cfg.default_model, "default.onnx");
    assert_eq!(cfg.frame_interval.as_millis(), 33);
    assert_eq!(cfg.jpeg_quality, 80);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "listen_addr": "0.0.0.0:9000",
        "model_dir": "/var/lib/sightline/models",
        "default_model": "gauge_v2.onnx",
        "frame_interval_ms": 50,
        "jpeg_quality": 65
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SIGHTLINE_CONFIG", file.path());
    std::env::set_var("SIGHTLINE_DEFAULT_MODEL", "gauge_v3.onnx");
    std::env::set_var("SIGHTLINE_FRAME_INTERVAL_MS", "40");

    let cfg = SightlineConfig::load().expect("load config");
    assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.model_dir, "/var/lib/sightline/models");
    // env wins over the file
    assert_eq!(cfg.default_model, "gauge_v3.onnx");
    assert_eq!(cfg.frame_interval.as_millis(), 40);
    assert_eq!(cfg.jpeg_quality, 65);

    clear_env();
}

#[test]
fn rejects_out_of_range_jpeg_quality() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGHTLINE_JPEG_QUALITY", "0");
    assert!(SightlineConfig::load().is_err());

    std::env::set_var("SIGHTLINE_JPEG_QUALITY", "150");
    assert!(SightlineConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_non_numeric_frame_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SIGHTLINE_FRAME_INTERVAL_MS", "fast");
    assert!(SightlineConfig::load().is_err());

    clear_env();
}
