// GUI-subsystem binary on Windows: no console window is allocated.
// In CLI mode (--input/-i present) we attach to the launching terminal so
// println!/eprintln! reach it.
#![windows_subsystem = "windows"]

mod app;
mod cli;

use app::WarpFEApp;
use eframe::egui;
use warpfe::logger;
use warpfe::settings::AppSettings;

fn main() -> Result<(), eframe::Error> {
    if cli::CliArgs::is_cli_mode() {
        #[cfg(target_os = "windows")]
        attach_parent_console();

        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS { 0 } else { 1 });
    }

    // Session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();
    warpfe::log_info!("Settings: engine={} mode={}", settings.engine.as_str(), settings.selection_mode.as_str());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([640.0, 420.0])
            .with_title("WarpFE")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "WarpFE",
        options,
        Box::new(move |cc| Box::new(WarpFEApp::new(cc, settings))),
    )
}

#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
