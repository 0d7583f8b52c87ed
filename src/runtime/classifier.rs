//! Interprets opaque runtime fragments into the closed
//! `ResponseFragment` vocabulary without knowing the SDK type
//! hierarchy.

use super::{RawFragment, ResponseFragment};

const REASONING_MARKER: &str = "ReasoningChunk";
const TEXT_MARKER: &str = "Chunk";

/// Structural classification by runtime type name. The reasoning marker
/// is checked first since it also contains the text marker. A fragment
/// without a text payload degrades to `Other` instead of failing the
/// stream.
pub fn classify(raw: &RawFragment) -> ResponseFragment {
    if raw.type_name.contains(REASONING_MARKER) {
        match &raw.text {
            Some(text) => ResponseFragment::ReasoningChunk(text.clone()),
            None => ResponseFragment::Other,
        }
    } else if raw.type_name.contains(TEXT_MARKER) {
        match &raw.text {
            Some(text) => ResponseFragment::TextChunk(text.clone()),
            None => ResponseFragment::Other,
        }
    } else {
        ResponseFragment::Other
    }
}
