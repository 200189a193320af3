mod dirs;
mod openplanet;
mod settings;

pub use dirs::Directories;
pub use openplanet::Openplanet;
pub use settings::Config;
