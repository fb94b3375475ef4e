pub mod deck_service;

pub use deck_service::{
    build_deck, DeckError, DeckTemplate, PictureFrame, SlideDeck, TextStyle,
};
