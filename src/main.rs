// rfoto - A desktop image viewer for Wayland
// Open, view and save a single raster image in a windowed interface

mod cli;
mod engine;
mod error;
mod layout;
mod session;
mod wayland;

use anyhow::Result;
use log::{info, warn};

use crate::engine::PhotoEngine;
use crate::session::Session;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args();

    let mut session = Session::new(PhotoEngine::new());

    // An image given on the command line is opened before the window appears;
    // a failure is not fatal, the viewer just starts empty.
    if let Some(ref path) = args.image_path {
        match session.open(path) {
            Ok(name) => info!("Opened {} at startup", name),
            Err(e) => warn!("Could not open {} at startup: {}", path.display(), e),
        }
    }

    info!(
        "Starting rfoto, window size {}x{}",
        args.width, args.height
    );

    wayland::run(session, args.width, args.height)
}
