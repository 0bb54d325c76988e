use waverless_tui::App;
use waverless_tui::config::Config;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let config = Config::load()?;
    waverless_tui::logging::init(&config.log_file)?;
    tracing::info!("starting against {}", config.api_url);

    let terminal = ratatui::init();
    let app = App::new(config)?;
    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
