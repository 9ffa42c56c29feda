mod audio;
mod config;
mod controller;
mod error;
mod logging;
mod model;
mod playback;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, Mutex};

use audio::ConnectDevice;
use config::Config;
use controller::AppController;
use model::{AppModel, PlaybackMode, PlaybackSettings, RecommenderClient};
use playback::{LocalPreviewBackend, PlaybackBackend, PlaybackSession, RemoteDeviceBackend};
use view::AppView;

#[derive(Parser, Debug)]
#[command(name = "bandit-player", version, about = "Terminal client for the bandit music recommender")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "BANDIT_PLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the recommender backend
    #[arg(long, env = "BANDIT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Backend session cookie, when logged in through a browser
    #[arg(long, env = "BANDIT_SESSION_ID")]
    session_id: Option<String>,

    /// Force a playback mode instead of deriving it from the account
    #[arg(long, value_enum)]
    mode: Option<PlaybackMode>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }
    if let Some(session_id) = cli.session_id {
        config.backend.session_id = Some(session_id);
    }

    if let Err(e) = logging::init_logging(&config.log) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!(backend = %config.backend.base_url, "=== Bandit Player Starting ===");

    let client = RecommenderClient::new(&config.backend)?;
    match client.client_config().await {
        Ok(overrides) => config.apply_overrides(&overrides),
        Err(e) => tracing::warn!(error = %e, "Could not load backend config, using local settings"),
    }

    let user_name = match client.user_profile().await {
        Ok(profile) => Some(profile.name().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not load user profile");
            None
        }
    };

    let token = match client.sdk_token().await {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!(error = %e, "Could not fetch playback token");
            None
        }
    };

    let mut mode = cli.mode.unwrap_or_else(|| {
        token
            .as_ref()
            .map(|t| PlaybackMode::from_product_type(&t.product_type))
            .unwrap_or(PlaybackMode::Preview)
    });
    tracing::info!(mode = ?mode, "Playback mode selected");

    let preview: Arc<dyn PlaybackBackend> = Arc::new(LocalPreviewBackend::new(
        config.playback.preview_clip_ms,
        config.playback.volume,
        Duration::from_secs(config.backend.timeout_secs),
    )?);

    let mut device = None;
    let mut remote: Option<Arc<dyn PlaybackBackend>> = None;
    if mode == PlaybackMode::Premium {
        match &token {
            Some(token) => match ConnectDevice::new(token, &config.playback.device_name).await {
                Ok(connect) => {
                    let backend = RemoteDeviceBackend::new(
                        Arc::new(client.clone()),
                        connect.device_name(),
                        Some(connect.device_id().to_string()),
                    );
                    playback::spawn_event_listener(connect.player_events(), &backend);
                    remote = Some(Arc::new(backend));
                    device = Some(connect);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Connect device failed, falling back to previews");
                    mode = PlaybackMode::Preview;
                }
            },
            None => mode = PlaybackMode::Preview,
        }
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = PlaybackSession::new(mode, remote, preview, config.session_config(), events_tx);

    let app_model = AppModel::new(PlaybackSettings {
        mode,
        shuffle: false,
        repeat: config.playback.repeat,
        volume: (config.playback.volume * 100.0).round() as u8,
    });
    if let Some(name) = user_name {
        app_model.set_user_name(name).await;
    }
    let model = Arc::new(Mutex::new(app_model));

    let controller = AppController::new(
        model.clone(),
        session.clone(),
        client,
        config.recommendations.clone(),
    );
    controller.start_session_listener(events_rx);

    // Bucket counts for the sidebar
    let controller_for_init = controller.clone();
    tokio::spawn(async move {
        controller_for_init.load_buckets().await;
    });

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, model, controller).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.close().await;
    if let Some(device) = device {
        device.shutdown();
    }

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("Bandit Player shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<AppModel>>,
    controller: AppController,
) -> io::Result<()> {
    loop {
        let (playback, ui_state, content_state, should_quit) = {
            let model_guard = model.lock().await;

            model_guard.auto_clear_old_errors().await;

            (
                model_guard.get_playback_info().await,
                model_guard.get_ui_state().await,
                model_guard.get_content_state().await,
                model_guard.should_quit().await,
            )
        };

        terminal.draw(|f| {
            AppView::render(f, &playback, &ui_state, &content_state);
        })?;

        if should_quit {
            break;
        }

        // Short poll keeps the progress bar smooth
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }
    }

    Ok(())
}
