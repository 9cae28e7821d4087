#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::path::PathBuf;

use anyhow::Context;
use eframe::egui;

mod app;
mod config;
mod constraint;
mod error;
mod filter;
mod gallery;
mod media;
mod overlay;
mod prefs;
mod wizard;

use app::KekstagramApp;
use config::Config;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;
    log::info!("pictures from {}", config.pictures.display());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(config.window_size)
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        "Kekstagram",
        options,
        Box::new(|cc| Ok(Box::new(KekstagramApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start the window: {e}"))
}
