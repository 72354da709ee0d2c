#[cfg(test)]
mod tests {
    use idlewatch::libs::config::{Config, MonitorConfig, StateConfig};
    use idlewatch::libs::detection::EventKind;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    /// Points the home/appdata directory at a temporary directory.
    struct ConfigTestContext {
        _temp_dir: TempDir,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            ConfigTestContext { _temp_dir: temp_dir }
        }
    }

    // One test per binary: the data directory comes from process-wide env vars.
    #[test_context(ConfigTestContext)]
    #[test]
    fn test_read_defaults_then_save_and_read(_ctx: &mut ConfigTestContext) {
        let config = Config::read().unwrap();
        assert_eq!(config.monitor, None);

        let monitor = MonitorConfig {
            app_name: "kiosk".to_string(),
            active_events: vec![EventKind::KeyDown, EventKind::TouchStart],
            states: vec![StateConfig::new("here", Some(0)), StateConfig::new("gone", None)],
            ..Default::default()
        };
        Config {
            monitor: Some(monitor.clone()),
        }
        .save()
        .unwrap();

        let read_config = Config::read().unwrap();
        assert_eq!(read_config.monitor, Some(monitor));
    }
}
