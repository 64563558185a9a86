mod app;
mod config;
mod constants;
mod conversion;
mod events;
mod services;
mod state;
mod ui;

use app::AmvConverterApp;
use constants::{APP_NAME, WINDOW_SIZE, WINDOW_TITLE};

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting {}", APP_NAME);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(WINDOW_SIZE)
            .with_min_inner_size(WINDOW_SIZE)
            .with_title(WINDOW_TITLE)
            .with_resizable(false),
        ..Default::default()
    };

    let app_creator =
        move |_cc: &eframe::CreationContext| -> Box<dyn eframe::App> { Box::new(AmvConverterApp::new()) };

    let result = eframe::run_native(APP_NAME, options, Box::new(app_creator));

    tracing::info!("Application shutting down");
    result
}
