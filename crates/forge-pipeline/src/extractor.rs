//! Asset directive extraction.

use forge_schema::{Block, Document};
use serde::{Deserialize, Serialize};

/// The kind of media a directive asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// An SVG diagram for an explanation block.
    Diagram,
    /// A raster image for an image block.
    Image,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagram => write!(f, "diagram"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// One media-generation directive bound to the block it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPrompt {
    /// Full prompt sent to the asset generator.
    pub prompt_text: String,
    /// Position of the originating block in `Document::blocks`.
    pub block_index: usize,
    /// Requested media kind.
    pub media_kind: MediaKind,
}

/// Walks the document's blocks in order and returns one prompt per
/// non-blank generation directive.
///
/// `block_index` is the block's position in the document, so it is the join
/// key for merging results back regardless of completion order.
#[must_use]
pub fn extract_asset_prompts(document: &Document) -> Vec<AssetPrompt> {
    document
        .blocks
        .iter()
        .enumerate()
        .filter_map(|(block_index, block)| directive(block_index, block))
        .collect()
}

fn directive(block_index: usize, block: &Block) -> Option<AssetPrompt> {
    let (media_kind, prompt_text) = match block {
        Block::Explanation(explanation) => (
            MediaKind::Diagram,
            format!(
                "Generate a simple **svg** for the following: {}",
                non_blank(explanation.svg_generation_prompt.as_deref())?
            ),
        ),
        Block::Image(image) => (
            MediaKind::Image,
            format!(
                "Generate a png for the following image: {}",
                non_blank(image.image_generation_prompt.as_deref())?
            ),
        ),
        Block::Quiz(_) | Block::Code(_) => return None,
    };
    Some(AssetPrompt {
        prompt_text,
        block_index,
        media_kind,
    })
}

fn non_blank(directive: Option<&str>) -> Option<&str> {
    directive.map(str::trim).filter(|d| !d.is_empty())
}
