use anyhow::Result;

mod ai;
mod app;
mod config;
mod handler;
mod prompt;
mod provider;
mod reveal;
mod session;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender()).await?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }

        // The tick stream keeps this loop turning, so a finished request is
        // picked up within one tick period.
        app.poll_request().await;
    }
    Ok(())
}
