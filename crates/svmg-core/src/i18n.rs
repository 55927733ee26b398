use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Поддерживаемые языки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    /// English
    #[serde(rename = "en")]
    #[default]
    English,
    /// Português (Brasil)
    #[serde(rename = "pt-BR")]
    Portuguese,
}

impl Language {
    /// Получить язык из строки (используйте Language::from_str() вместо этого метода)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "pt" | "pt-br" | "pt_br" | "portuguese" | "português" => Some(Language::Portuguese),
            _ => None,
        }
    }

    /// Код языка (для сериализации)
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Portuguese => "pt-BR",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Portuguese => "Português",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::parse(s).ok_or_else(|| format!("Unknown language: {}", s))
    }
}
