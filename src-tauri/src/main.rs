// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
  // The converter is spawned and reaped inside the app lifecycle (see server.rs).
  markitdown_desktop_lib::run();
}
