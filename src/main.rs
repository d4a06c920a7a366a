#![windows_subsystem = "windows"]

use clap::Parser;
use color_eyre::eyre::Result;
use eframe::egui;

use snapredact::app::SnapRedactApp;
use snapredact::config::Config;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("{config:?}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("SnapRedact"),
        ..Default::default()
    };
    eframe::run_native(
        "SnapRedact",
        options,
        Box::new(move |cc| Ok(Box::new(SnapRedactApp::new(cc, &config)))),
    )
    .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    Ok(())
}
