// tests/config_tables.rs
use std::{env, fs};

use outbreak_tracker::config::{load_tables_default, resolve_tables_path, ClassifierTables};
use outbreak_tracker::HeadlineClassifier;

const CUSTOM: &str = r#"
version = "custom-1"

[[places]]
name = "Uganda"
kind = "country"
tier = "uganda"

[[diseases]]
name = "Ebola"
synonyms = ["ebola"]

[severity]
high = ["Ebola"]
"#;

#[test]
fn embedded_tables_validate() {
    let t = ClassifierTables::embedded().unwrap();
    assert!(t.validate().is_ok());
    assert!(!t.places.is_empty());
    let info = HeadlineClassifier::new(t).unwrap().info();
    assert_eq!(info.severity_entries, 10);
}

#[test]
fn disease_in_two_tiers_is_rejected() {
    let bad = r#"
[[diseases]]
name = "Ebola"

[severity]
high = ["Ebola"]
low = ["ebola"]
"#;
    assert!(HeadlineClassifier::from_toml_str(bad).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var("OUTBREAK_TABLES_PATH");

    // 1) Nothing on disk -> embedded copy
    assert_eq!(resolve_tables_path().unwrap(), None);
    let embedded = load_tables_default().unwrap();
    assert_eq!(embedded.version, ClassifierTables::embedded().unwrap().version);

    // 2) ./config/outbreak_tables.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("outbreak_tables.toml"), CUSTOM).unwrap();
    assert_eq!(load_tables_default().unwrap().version, "custom-1");

    // 3) Env var wins
    let p_env = tmp.path().join("env_tables.toml");
    fs::write(&p_env, CUSTOM.replace("custom-1", "from-env")).unwrap();
    env::set_var("OUTBREAK_TABLES_PATH", p_env.display().to_string());
    assert_eq!(load_tables_default().unwrap().version, "from-env");

    // 4) Env var pointing nowhere is an error, not a silent fallback
    env::set_var("OUTBREAK_TABLES_PATH", tmp.path().join("missing.toml"));
    assert!(load_tables_default().is_err());
    env::remove_var("OUTBREAK_TABLES_PATH");

    env::set_current_dir(&old).unwrap();
}
