use futures::StreamExt;
use rimagine::imagine::BoxError;
use rimagine::{DefaultHeaderBuilder, EditClient, GenerationClient, ImagineConfig};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let level = env::var("IMAGINE_LOG_LEVEL")
        .ok()
        .and_then(|raw| rimagine::logger::LogLevel::parse(&raw))
        .unwrap_or(rimagine::logger::LogLevel::Info);
    rimagine::logger::init_with_config(rimagine::logger::LoggerConfig::new().with_level(level))?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let credential = match env::var("IMAGINE_SSO_TOKEN") {
        Ok(token) if !token.trim().is_empty() => token,
        _ => {
            log::error!("❌ IMAGINE_SSO_TOKEN is not set");
            return Err("IMAGINE_SSO_TOKEN is required".into());
        }
    };

    let prompt = env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    let prompt = if prompt.is_empty() {
        env::var("IMAGINE_PROMPT").unwrap_or_else(|_| "a lighthouse on a cliff at dusk".into())
    } else {
        prompt
    };
    let count = env::var("IMAGINE_COUNT")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(2);

    let config = Arc::new(ImagineConfig::from_env());
    rimagine::logger::log_config_info(&config);
    let headers = Arc::new(DefaultHeaderBuilder);

    let generation = GenerationClient::new(config.clone(), headers.clone());
    let progress = |index: usize, progress: f64| -> Result<(), BoxError> {
        log::info!("🖼️  image #{}: {:.0}%", index, progress);
        Ok(())
    };

    log::info!("🎨 Generating {} image(s) for: {}", count, prompt);
    match generation
        .generate(&credential, &prompt, count, Some(&progress), None)
        .await
    {
        Ok(urls) => {
            for url in &urls {
                log::info!("✅ {}", url);
            }
        }
        Err(e) => log::error!("❌ Generation failed: {}", e),
    }

    let references: Vec<String> = env::var("IMAGINE_EDIT_REFS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if references.is_empty() {
        return Ok(());
    }

    let edit_prompt = env::var("IMAGINE_EDIT_PROMPT").unwrap_or_else(|_| prompt.clone());
    log::info!(
        "✏️  Editing {} reference image(s), models: {:?}",
        references.len(),
        EditClient::candidate_models()
    );

    let editing = EditClient::new(config, headers);
    let mut lines = editing.edit(&credential, &edit_prompt, &references).await?;
    let mut line_count = 0usize;
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                line_count += 1;
                println!("{}", line);
            }
            Err(e) => {
                log::error!("❌ Edit stream error: {}", e);
                break;
            }
        }
    }
    log::info!("📊 Received {} line(s)", line_count);

    Ok(())
}
