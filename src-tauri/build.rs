fn main() {
  tauri_build::try_build(
      tauri_build::Attributes::new().app_manifest(tauri_build::AppManifest::new().commands(&[
          "get_view_state",
          "select_and_convert",
          "convert_file",
          "save_markdown",
          "copy_markdown",
          "clear_markdown",
          "check_server_health",
          "hide_status",
          "supported_formats",
      ])),
  )
  .unwrap();
}
