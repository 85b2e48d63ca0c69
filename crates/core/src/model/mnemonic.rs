use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::MnemonicId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown mnemonic style: {0}")]
pub struct UnknownStyle(pub String);

//
// ─── STYLE ────────────────────────────────────────────────────────────────────
//

/// Musical presentation style a mnemonic is generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MnemonicStyle {
    #[serde(alias = "hip-hop")]
    Rap,
    Pop,
    Rock,
}

impl MnemonicStyle {
    pub const ALL: [MnemonicStyle; 3] = [Self::Rap, Self::Pop, Self::Rock];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rap => "rap",
            Self::Pop => "pop",
            Self::Rock => "rock",
        }
    }

    /// Style name the generation backend expects.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Rap => "hip-hop",
            other => other.as_str(),
        }
    }

    /// Production brief sent to the generator alongside the style.
    #[must_use]
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::Rap => "street-anthem, trap beats, confident flow",
            Self::Pop => "upbeat pop, catchy hooks, radio-friendly",
            Self::Rock => "indie rock, guitar-driven, energetic",
        }
    }
}

impl fmt::Display for MnemonicStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MnemonicStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rap" | "hip-hop" => Ok(Self::Rap),
            "pop" => Ok(Self::Pop),
            "rock" => Ok(Self::Rock),
            _ => Err(UnknownStyle(s.to_string())),
        }
    }
}

//
// ─── MNEMONIC ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MnemonicStatus {
    Generating,
    Ready,
    Failed,
}

/// A generated memory aid for a topic.
///
/// Values are never edited in place: each state change builds a new
/// `Mnemonic` that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mnemonic {
    id: Option<MnemonicId>,
    style: MnemonicStyle,
    style_reference: String,
    lyrics: String,
    audio_url: Option<Url>,
    duration_seconds: Option<f64>,
    status: MnemonicStatus,
}

impl Mnemonic {
    /// Placeholder shown the instant a style is chosen.
    #[must_use]
    pub fn generating(style: MnemonicStyle) -> Self {
        Self::generating_with_id(style, None)
    }

    #[must_use]
    pub fn generating_with_id(style: MnemonicStyle, id: Option<MnemonicId>) -> Self {
        Self {
            id,
            style,
            style_reference: style.descriptor().to_string(),
            lyrics: String::new(),
            audio_url: None,
            duration_seconds: None,
            status: MnemonicStatus::Generating,
        }
    }

    /// A failed generation. The style is kept so the same style can be retried.
    #[must_use]
    pub fn failed(style: MnemonicStyle, id: Option<MnemonicId>) -> Self {
        Self {
            status: MnemonicStatus::Failed,
            ..Self::generating_with_id(style, id)
        }
    }

    #[must_use]
    pub fn ready(
        id: Option<MnemonicId>,
        style: MnemonicStyle,
        style_reference: impl Into<String>,
        lyrics: impl Into<String>,
        audio_url: Option<Url>,
        duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            id,
            style,
            style_reference: style_reference.into(),
            lyrics: lyrics.into(),
            audio_url,
            duration_seconds,
            status: MnemonicStatus::Ready,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&MnemonicId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn style(&self) -> MnemonicStyle {
        self.style
    }

    #[must_use]
    pub fn style_reference(&self) -> &str {
        &self.style_reference
    }

    #[must_use]
    pub fn lyrics(&self) -> &str {
        &self.lyrics
    }

    #[must_use]
    pub fn audio_url(&self) -> Option<&Url> {
        self.audio_url.as_ref()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    #[must_use]
    pub fn status(&self) -> MnemonicStatus {
        self.status
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == MnemonicStatus::Failed
    }
}

//
// ─── SUITABILITY ──────────────────────────────────────────────────────────────
//

const MNEMONIC_SUITABLE_SUBJECTS: &[&str] = &[
    "chemistry",
    "physics",
    "biology",
    "maths",
    "mathematics",
    "history",
    "geography",
    "computer science",
    "computing",
];

const MNEMONIC_UNSUITABLE_SUBJECTS: &[&str] = &[
    "english literature",
    "english language",
    "religious studies",
    "art",
    "drama",
];

/// Whether mnemonics may be generated for a subject.
///
/// The deny-list wins over the allow-list, and unknown subjects are refused.
#[must_use]
pub fn is_subject_mnemonic_suitable(subject_name: &str) -> bool {
    let normalised = subject_name.trim().to_lowercase();

    if MNEMONIC_UNSUITABLE_SUBJECTS
        .iter()
        .any(|s| normalised.contains(s))
    {
        return false;
    }

    MNEMONIC_SUITABLE_SUBJECTS
        .iter()
        .any(|s| normalised.contains(s))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
