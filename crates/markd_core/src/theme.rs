use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// UI theme of the preview page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    CatppuccinMocha,
    CatppuccinLatte,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown theme `{0}`, expected one of: light, dark, catppuccin-mocha, catppuccin-latte")]
pub struct UnknownTheme(pub String);

impl Theme {
    pub const ALL: &'static [Theme] = &[
        Self::Light,
        Self::Dark,
        Self::CatppuccinMocha,
        Self::CatppuccinLatte,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::CatppuccinMocha => "catppuccin-mocha",
            Self::CatppuccinLatte => "catppuccin-latte",
        }
    }

    /// Whether diagrams should use their dark palette.
    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark | Self::CatppuccinMocha)
    }
}

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .find(|theme| theme.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownTheme(s.to_string()))
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
