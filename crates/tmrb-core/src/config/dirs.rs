use directories::ProjectDirs;
use std::path::PathBuf;

/// Application directories following the platform conventions
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/tm-remote-build on Linux)
    pub config: PathBuf,

    /// Config file path
    pub config_file: PathBuf,
}

impl Directories {
    /// Standard per-user paths, or `None` when no home directory is known.
    #[must_use]
    pub fn new() -> Option<Self> {
        let project = ProjectDirs::from("", "", "tm-remote-build")?;
        Some(Self::with_base(project.config_dir().to_path_buf()))
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.json"),
            config: base,
        }
    }
}
