use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Openplanet builds, each listening for Remote Build on its own port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Openplanet {
    /// Trackmania (2020)
    OpenplanetNext,
    /// Maniaplanet 4
    Openplanet4,
    /// Trackmania Turbo
    OpenplanetTurbo,
}

impl Openplanet {
    pub const ALL: [Openplanet; 3] = [
        Openplanet::OpenplanetNext,
        Openplanet::Openplanet4,
        Openplanet::OpenplanetTurbo,
    ];

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Openplanet::OpenplanetNext => 30000,
            Openplanet::Openplanet4 => 30001,
            Openplanet::OpenplanetTurbo => 30002,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Openplanet::OpenplanetNext => "OpenplanetNext",
            Openplanet::Openplanet4 => "Openplanet4",
            Openplanet::OpenplanetTurbo => "OpenplanetTurbo",
        }
    }
}

impl fmt::Display for Openplanet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Openplanet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == s)
            .ok_or_else(|| {
                let names = Self::ALL.map(Openplanet::name).join(", ");
                Error::Config(format!(
                    "unknown Openplanet variant '{s}' (expected one of: {names})"
                ))
            })
    }
}
