//! Integration tests for environment-driven configuration.

use visionflow_app::Config;

// Environment mutation is process-global, so every override case runs in
// one test body.
#[test]
fn config_env_tests_overrides_and_fallbacks() {
    unsafe {
        std::env::set_var("VISIONFLOW_MAX_IMAGES", "25");
        std::env::set_var("VISIONFLOW_MAX_MEMORY_MB", "64");
        std::env::set_var("VISIONFLOW_THUMBNAIL_WIDTH", "160");
        std::env::set_var("VISIONFLOW_HISTORY_SIZE", "not-a-number");
        std::env::set_var("VISIONFLOW_TEMPLATE_DIR", "/tmp/visionflow-templates");
        std::env::set_var("VISIONFLOW_CORS_ORIGINS", "http://a.local, http://b.local");
        std::env::set_var("VISIONFLOW_DEBUG", "true");
    }

    let config = Config::from_env();

    assert_eq!(config.max_images, 25);
    assert_eq!(config.max_memory_mb, 64);
    assert_eq!(config.thumbnail_width, 160);
    // Unparseable override keeps the default.
    assert_eq!(config.history_size, 1_000);
    assert_eq!(
        config.template_dir,
        std::path::PathBuf::from("/tmp/visionflow-templates")
    );
    assert_eq!(
        config.cors_origins,
        vec!["http://a.local".to_string(), "http://b.local".to_string()]
    );
    assert!(config.debug);

    unsafe {
        for name in [
            "VISIONFLOW_MAX_IMAGES",
            "VISIONFLOW_MAX_MEMORY_MB",
            "VISIONFLOW_THUMBNAIL_WIDTH",
            "VISIONFLOW_HISTORY_SIZE",
            "VISIONFLOW_TEMPLATE_DIR",
            "VISIONFLOW_CORS_ORIGINS",
            "VISIONFLOW_DEBUG",
        ] {
            std::env::remove_var(name);
        }
    }
}
