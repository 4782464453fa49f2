use rfd::FileDialog;
use std::path::PathBuf;

/// File dialog helper for route files
pub struct FileDialogs;

impl FileDialogs {
    /// Open a file dialog for selecting a route (JSON or CSV)
    pub fn open_route_file() -> Option<PathBuf> {
        FileDialog::new()
            .add_filter("Route Files", &["json", "csv"])
            .add_filter("All Files", &["*"])
            .set_title("Open Route")
            .pick_file()
    }
}
