use waverless_tui::config::Config;
use waverless_tui::endpoints::EndpointsView;
use waverless_tui::{App, AppView};

// cargo test --package waverless-tui --test test_endpoints -- test_endpoints_screen --exact --nocapture --ignored
#[tokio::test]
#[ignore = "run manually"]
async fn test_endpoints_screen() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let config = Config::load()?;
    let terminal = ratatui::init();

    let app = App::new_with_view(config, AppView::Endpoints(EndpointsView::List))?;

    let result = app.run(terminal).await;
    ratatui::restore();
    result
}

// cargo test --package waverless-tui --test test_endpoints -- test_signed_out_screen --exact --nocapture --ignored
#[tokio::test]
#[ignore = "run manually"]
async fn test_signed_out_screen() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let config = Config {
        // nothing listens here, the screen keeps showing the sign-in URL
        api_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let terminal = ratatui::init();

    let app = App::new_with_view(config, AppView::SignedOut)?;

    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
