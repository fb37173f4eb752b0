use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use gridscan::{
    DetectorConfig, FrameSequence, FrameSource, GridPipeline, OcrsRecognizer, StaticImageSource,
};

#[derive(Parser)]
#[command(name = "gridscan")]
#[command(about = "Find a 9x9 puzzle grid in a photo and read its digits")]
struct Cli {
    /// Input image; several images are tried in order as successive frames
    #[arg(value_name = "IMAGE", required = true)]
    image_paths: Vec<PathBuf>,

    /// JSON file with detector tuning parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Give up after this many failed attempts
    #[arg(long, value_name = "N")]
    max_attempts: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Also print the grid as a board
    #[arg(long)]
    board: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_json_file(path)?,
        None => DetectorConfig::default(),
    };
    if args.max_attempts.is_some() {
        config = config.with_max_attempts(args.max_attempts);
    }

    log::debug!("loading OCR models");
    let recognizer = OcrsRecognizer::from_default_cache(config.recognizer_mode)?;
    let pipeline = GridPipeline::new(config, Arc::new(recognizer))?;

    let mut source: Box<dyn FrameSource> = match args.image_paths.as_slice() {
        [single] => {
            let source = StaticImageSource::new(single);
            log::info!("scanning {}", source.path().display());
            Box::new(source)
        }
        paths => {
            log::info!("scanning {} images", paths.len());
            Box::new(FrameSequence::from_paths(paths)?)
        }
    };
    if let Some(max) = pipeline.config().max_attempts {
        log::debug!("giving up after {max} attempt(s)");
    }
    let grid = pipeline.scan(source.as_mut())?;

    println!("{}", grid.as_str());
    if args.board {
        println!();
        print!("{grid}");
        println!("\n{} of 81 cells filled", grid.givens());
    }

    Ok(())
}
