// Main entry point for the mirror renderer

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use winit::event_loop::EventLoop;

use mirror_renderer::app::App;
use mirror_renderer::config::SceneConfig;
use mirror_renderer::error::AppError;

/// Real-time renderer for scenes with planar mirrors.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Scene file (TOML). The built-in scene is used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Window width in pixels, overriding the scene file.
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels, overriding the scene file.
    #[arg(long)]
    height: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let mut config = match &args.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    if let Some(width) = args.width {
        config.window.width = width;
    }
    if let Some(height) = args.height {
        config.window.height = height;
    }

    let event_loop = EventLoop::new()?;
    let app = App::new(&event_loop, config).await?;
    app.run(event_loop)
}
