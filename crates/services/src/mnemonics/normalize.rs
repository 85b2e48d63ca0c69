use revise_core::model::{Mnemonic, MnemonicId, MnemonicStyle};
use url::Url;

use super::client::{GenerationResponse, GenerationStatus};

/// Convert a backend response into a `Mnemonic` for the requested style.
#[must_use]
pub fn normalize(response: &GenerationResponse, style: MnemonicStyle) -> Mnemonic {
    let generated = response.mnemonic.clone().unwrap_or_default();
    let nested = generated.id.as_deref();
    let top_level = response.mnemonic_id.as_deref();
    let parse = |raw: Option<&str>| raw.and_then(|raw| MnemonicId::new(raw).ok());

    // Unfinished answers carry the id at top level; finished ones nest it.
    if response.is_failure() {
        return Mnemonic::failed(style, parse(top_level.or(nested)));
    }
    if response.status == Some(GenerationStatus::Processing) {
        return Mnemonic::generating_with_id(style, parse(top_level.or(nested)));
    }
    let id = parse(nested.or(top_level));

    let style_reference = generated
        .style
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| style.descriptor().to_string());
    let audio_url = generated
        .audio_url
        .as_deref()
        .and_then(|raw| Url::parse(raw).ok());
    let duration = generated.duration_seconds.filter(|d| d.is_finite() && *d >= 0.0);

    Mnemonic::ready(
        id,
        style,
        style_reference,
        generated.lyrics.unwrap_or_default(),
        audio_url,
        duration,
    )
}
