use waverless_tui::config::Config;
use waverless_tui::{App, AppView};

// cargo test --package waverless-tui --test test_billing -- test_billing_screen --exact --nocapture --ignored
#[tokio::test]
#[ignore = "run manually"]
async fn test_billing_screen() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let config = Config::load()?;
    let terminal = ratatui::init();

    let app = App::new_with_view(config, AppView::Billing)?;

    let result = app.run(terminal).await;
    ratatui::restore();
    result
}
