// Deck assembly rules. The slide container format lives behind the
// `SlideDeck` port so these rules can be checked without a real template.

use crate::core::news::SlideArticle;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Slide {0} does not exist in the template")]
    NoSuchSlide(usize),
}

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size_pt: u32,
    pub bold: bool,
    pub typeface: Option<&'static str>,
}

/// Position and size of a picture, in inches from the slide's top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureFrame {
    pub left_in: f64,
    pub top_in: f64,
    pub width_in: f64,
    pub height_in: f64,
}

pub const TITLE_STYLE: TextStyle = TextStyle {
    size_pt: 28,
    bold: true,
    typeface: None,
};

pub const BODY_STYLE: TextStyle = TextStyle {
    size_pt: 22,
    bold: false,
    typeface: Some("Arial"),
};

pub const PICTURE_FRAME: PictureFrame = PictureFrame {
    left_in: 1.09,
    top_in: 2.02,
    width_in: 7.0,
    height_in: 6.2,
};

// ============================================================================
// PORTS
// ============================================================================

/// An opened, mutable slide deck with a fixed number of pre-made slides.
pub trait SlideDeck: Send {
    fn slide_count(&self) -> usize;

    /// Writes the slide title. Returns `false` if the slide has no title
    /// placeholder.
    fn set_title(&mut self, slide: usize, text: &str, style: &TextStyle)
        -> Result<bool, DeckError>;

    /// Clears the body placeholder and writes one paragraph per entry.
    /// Returns `false` if the slide has no body text frame.
    fn set_body(
        &mut self,
        slide: usize,
        paragraphs: &[String],
        style: &TextStyle,
    ) -> Result<bool, DeckError>;

    fn add_picture(
        &mut self,
        slide: usize,
        image: &Path,
        frame: &PictureFrame,
    ) -> Result<(), DeckError>;

    fn save(&self, output: &Path) -> Result<(), DeckError>;
}

/// Source of fresh decks (one per pipeline run).
pub trait DeckTemplate: Send + Sync {
    fn open(&self) -> Result<Box<dyn SlideDeck>, DeckError>;
}

// ============================================================================
// RULES
// ============================================================================

/// Splits a summary into slide bullets at every literal period.
///
/// Fragments are trimmed, empty ones dropped, and each is re-suffixed with a
/// period.
pub fn split_into_sentences(summary: &str) -> Vec<String> {
    summary
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s))
        .collect()
}

/// Locates the downloaded image for slide `index`, preferring JPEG.
pub fn find_slide_image(image_dir: &Path, index: usize) -> Option<PathBuf> {
    ["jpg", "png"]
        .iter()
        .map(|ext| image_dir.join(format!("image_{}.{}", index, ext)))
        .find(|path| path.exists())
}

/// Writes article *i* into slide *i*. Articles beyond the template's slide
/// count are not rendered. Returns how many slides were populated.
pub fn populate_deck(
    deck: &mut dyn SlideDeck,
    articles: &[SlideArticle],
    image_dir: &Path,
) -> Result<usize, DeckError> {
    let slide_count = deck.slide_count();
    let mut populated = 0;

    for (i, article) in articles.iter().enumerate() {
        if i >= slide_count {
            tracing::warn!(
                articles = articles.len(),
                slides = slide_count,
                "More articles than template slides, stopping"
            );
            break;
        }

        if !deck.set_title(i, &article.title, &TITLE_STYLE)? {
            tracing::warn!(slide = i + 1, "Slide has no title placeholder");
        }

        let sentences = split_into_sentences(&article.summary);
        if !deck.set_body(i, &sentences, &BODY_STYLE)? {
            tracing::warn!(slide = i + 1, "Slide has no body placeholder");
        }

        match find_slide_image(image_dir, i) {
            Some(image) => {
                deck.add_picture(i, &image, &PICTURE_FRAME)?;
                tracing::debug!(slide = i + 1, image = %image.display(), "Inserted image");
            }
            None => tracing::warn!(slide = i + 1, "Image missing for slide"),
        }

        tracing::info!(slide = i + 1, title = %article.title, "Populated slide");
        populated += 1;
    }

    Ok(populated)
}

/// Opens the template, fills it, and saves it to `output`.
pub fn build_deck(
    template: &dyn DeckTemplate,
    articles: &[SlideArticle],
    image_dir: &Path,
    output: &Path,
) -> Result<usize, DeckError> {
    let mut deck = template.open()?;
    let populated = populate_deck(deck.as_mut(), articles, image_dir)?;
    deck.save(output)?;
    tracing::info!(output = %output.display(), slides = populated, "Saved presentation");
    Ok(populated)
}
