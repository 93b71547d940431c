// tests/config_load.rs
use late_news::config::{AppConfig, ENV_CONFIG_PATH};
use std::{env, fs};

#[serial_test::serial]
#[test]
fn default_uses_flag_then_env_then_fallback_file() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var("OPENAI_BASE_URL");
    env::remove_var("LATE_NEWS_MODEL");

    // 1) Nothing → defaults
    let d = AppConfig::load(None).unwrap();
    assert_eq!(d.curation.target_count, 20);

    // 2) Fallback config/late_news.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/late_news.toml"),
        "[curation]\ntarget_count = 12\n",
    )
    .unwrap();
    assert_eq!(AppConfig::load(None).unwrap().curation.target_count, 12);

    // 3) Env wins over the fallback
    let p_env = tmp.path().join("env.toml");
    fs::write(&p_env, "[curation]\ntarget_count = 8\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(AppConfig::load(None).unwrap().curation.target_count, 8);

    // 4) Explicit path wins over env
    let p_flag = tmp.path().join("flag.toml");
    fs::write(&p_flag, "[curation]\ntarget_count = 6\n").unwrap();
    assert_eq!(
        AppConfig::load(Some(&p_flag)).unwrap().curation.target_count,
        6
    );

    // 5) Env pointing nowhere is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
    assert!(AppConfig::load(None).is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn shipped_config_parses() {
    env::remove_var("OPENAI_BASE_URL");
    env::remove_var("LATE_NEWS_MODEL");
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/late_news.toml");
    let cfg = AppConfig::load_from(&path).unwrap();
    assert_eq!(cfg.llm.model, "gpt-5");
    assert_eq!(cfg.curation.favourite_teams.len(), 2);
    assert!(cfg.topics.table.is_empty());
    assert!((cfg.topics.favourite_bonus - 0.5).abs() < 1e-6);
}
