use anyhow::Result;
use saga::{
    generate_and_parse_document_with_retry, generate_and_split_entities_with_retry, ArtifactKind,
    Config, DifyClient, EntityKind, RetryPolicy, SectionKey,
};
use serde_json::json;

/// Manual driver: runs one generation against the configured service and
/// prints the parsed result. Usage: `saga [artifact_kind] [theme]`.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid workflow settings.");
            return Err(e);
        }
    };
    config.validate()?;

    let mut args = std::env::args().skip(1);
    let kind = args
        .next()
        .and_then(|s| ArtifactKind::parse(&s))
        .unwrap_or(ArtifactKind::BasicSetting);
    let theme = args.next().unwrap_or_else(|| "切ない恋愛".to_string());

    let client = DifyClient::new(&config, kind)?;
    let retry = RetryPolicy::from(&config);
    let inputs = json!({ "theme": theme });

    match kind {
        ArtifactKind::Episode => {
            let entities =
                generate_and_split_entities_with_retry(&client, &inputs, 10, EntityKind::Episode, retry)
                    .await?;
            for entity in entities {
                println!("=== {} 「{}」 ===", entity.number, entity.title);
                println!("{}\n", entity.content);
            }
        }
        ArtifactKind::PlotDetail => {
            let entities =
                generate_and_split_entities_with_retry(&client, &inputs, 3, EntityKind::Act, retry)
                    .await?;
            for entity in entities {
                println!("=== {} 「{}」 ===", entity.number, entity.title);
                println!("{}\n", entity.content);
            }
        }
        _ => {
            let doc = generate_and_parse_document_with_retry(&client, &inputs, retry).await?;
            for key in SectionKey::CANONICAL {
                let body = doc.get(key);
                if !body.is_empty() {
                    println!("[{}]\n{}\n", key.as_str(), body);
                }
            }
            let unknown = doc.get(SectionKey::Unknown);
            if !unknown.is_empty() {
                println!("[unknown]\n{}\n", unknown);
            }
        }
    }

    Ok(())
}
