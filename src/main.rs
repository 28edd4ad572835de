use anyhow::Result;
use tidechat::app::App;
use tidechat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let mut app = App::new(config)?;
    app.run().await?;

    Ok(())
}
