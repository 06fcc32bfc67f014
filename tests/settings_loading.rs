//! Settings loading tests
//!
//! Exercises the `.env`-file path end-to-end: variables imported from a file
//! become visible to `Settings::from_env` together with the CLI-provided QoS
//! and persistence values.
//!
//! This is the only test that touches process environment, and it does so
//! exactly once; every other validation path is covered through
//! `Settings::from_lookup` in the crate's unit tests.

use std::io::Write;
use tempfile::NamedTempFile;
use tts_subscriber::config::{QosLevel, Settings};

#[test]
fn test_settings_load_after_env_file_import() {
    let mut env_file = NamedTempFile::new().unwrap();
    writeln!(
        env_file,
        r#"TTS_HOST=eu1.cloud.thethings.network
TTS_PORT=8883
TTS_USERNAME=my-app@ttn
TTS_PASSWORD=NNSXS.XXXXXXXX
TTS_APPLICATION_ID=my-app
TTS_TENANT_ID=ttn
TTS_DEVICE_ID=sensor-01"#
    )
    .unwrap();

    dotenvy::from_path(env_file.path()).unwrap();

    let settings = Settings::from_env(2, true).unwrap();

    assert_eq!(settings.host, "eu1.cloud.thethings.network");
    assert_eq!(settings.port, 8883);
    assert_eq!(settings.username, "my-app@ttn");
    assert_eq!(settings.password, "NNSXS.XXXXXXXX");
    assert_eq!(settings.application_id, "my-app");
    assert_eq!(settings.tenant_id, "ttn");
    assert_eq!(settings.device_id, "sensor-01");
    assert_eq!(settings.qos, QosLevel::ExactlyOnce);
    assert!(settings.persistent);
}
