use std::{
    fs::{self, File},
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use market_intel_tui::{
    api::{transport::ReqwestTransport, transport::Transport, ApiClient},
    app::{Action, App},
    config::{self, Config},
    demo::DemoTransport,
    input::{handle_input, handle_mouse},
    ui::ui,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "market-intel-tui", version, about = "Terminal dashboard for a market-intelligence backend")]
struct Args {
    /// Path to config file (default: ~/.config/market-intel-tui/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides config and MARKET_INTEL_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// Ticker to open with
    #[arg(short, long)]
    ticker: Option<String>,

    /// Serve generated data instead of calling a backend (also DEMO=1)
    #[arg(long)]
    demo: bool,
}

fn init_logging(level: &str) -> Result<()> {
    let path = config::log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = File::create(&path).with_context(|| format!("creating log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("loading config")?;
    config.apply_env();
    config.apply_overrides(args.api_url);
    config.validate().context("invalid config")?;

    init_logging(&config.log_level)?;

    let demo = args.demo || std::env::var("DEMO").is_ok_and(|v| v == "true" || v == "1");
    let today = Local::now().date_naive();
    let transport: Arc<dyn Transport> = if demo {
        info!("demo mode, no backend calls");
        Arc::new(DemoTransport::new(today))
    } else {
        Arc::new(ReqwestTransport::new(config.request_timeout).context("building HTTP client")?)
    };
    info!("starting against {}", config.api_url);
    let api = ApiClient::new(config.api_url.clone(), transport);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let mut app = App::new(config, api, runtime.handle().clone(), today);
    if let Some(ticker) = args.ticker {
        app.set_ticker(&ticker);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("{err:?}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Drain finished requests before drawing so the frame is current.
        app.process_messages();
        app.tick(Instant::now());

        terminal.draw(|f| ui(f, app))?;

        if event::poll(POLL_INTERVAL)? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_input(app, key.code),
                Event::Mouse(mouse) => handle_mouse(app, mouse.kind, mouse.column, mouse.row),
                _ => Action::None,
            };
            if !app.dispatch(action) {
                return Ok(());
            }
        }
    }
}
