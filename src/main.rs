mod app;
mod auth;
mod config;
mod db;
mod engagement;
mod error;
mod extract;
mod images;
mod ingredients;
mod pagination;
mod recipes;
mod seed;
mod state;
mod storage;

use anyhow::bail;

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "cookbook=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = std::env::args().nth(1);
    match command.as_deref() {
        Some("seed") => {
            let config = config::AppConfig::from_env()?;
            let db = db::connect(&config).await?;
            db::migrate(&db).await?;
            let report = seed::load(&db, &seed::bundled_catalog()?).await?;
            println!(
                "inserted {} categories and {} ingredients",
                report.categories, report.items
            );
            Ok(())
        }
        None | Some("serve") => {
            let app_state = state::AppState::init().await?;
            db::migrate(&app_state.db).await?;
            app::serve(app::build_app(app_state)).await
        }
        Some(other) => bail!("unknown command `{other}`; expected `serve` or `seed`"),
    }
}
