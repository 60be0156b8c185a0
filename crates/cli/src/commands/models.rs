//! `npcmind models` — list supported model identifiers.

use npcmind_config::{AppConfig, ModelsConfig};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    print!("{}", render(&config.models));
    Ok(())
}

fn render(models: &ModelsConfig) -> String {
    let mut out = String::from("Supported models:\n");
    for model in &models.supported {
        let marker = if *model == models.default { " (default)" } else { "" };
        out.push_str(&format!("  {model}{marker}\n"));
    }
    out.push_str("\nUnsupported identifiers fall back to the default.\n");
    out
}
