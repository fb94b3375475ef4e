pub mod pptx_deck;

pub use pptx_deck::PptxTemplate;
