use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docsearch::config;
use docsearch::db;
use docsearch::SearchStore;

const USAGE: &str = "usage: docsearch <migrate | stats <org_id> | version>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docsearch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("migrate");

    if command == "version" {
        println!("docsearch {} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));
        return Ok(());
    }

    // Load configuration / 加载配置
    config::init_config(config::load_config().context("Failed to load configuration")?)?;
    let app_config = config::config();

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| app_config.get_database_url());
    let pool = db::connect(&database_url, &app_config.database).await?;
    db::run_migrations(&pool).await?;

    match command {
        "migrate" => {
            tracing::info!("Search schema is up to date");
        }
        "stats" => {
            let Some(org_id) = args.get(1) else {
                bail!(USAGE);
            };
            let stats = SearchStore::new(pool.clone()).stats(org_id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        other => {
            pool.close().await;
            bail!("unknown command `{}`\n{}", other, USAGE);
        }
    }

    pool.close().await;
    Ok(())
}
