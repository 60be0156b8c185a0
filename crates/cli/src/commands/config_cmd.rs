//! `npcmind config` — show the effective configuration.

use npcmind_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    if config.has_api_key() {
        println!("# api_key: set (redacted)");
    } else {
        println!("# api_key: not set (set NPCMIND_API_KEY or OPENAI_API_KEY)");
    }
    print!("{}", config.to_redacted_toml());
    Ok(())
}
