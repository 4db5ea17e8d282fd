//! The fixed 78-card catalog and its image file mapping.
//!
//! 22 major arcana plus 56 minor arcana (4 suits x 14 ranks). The catalog is
//! static and fully enumerable; every card maps to exactly one image file.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Major arcana in deck order; file names carry the deck position.
const MAJOR_ARCANA: [(&str, &str); 22] = [
    ("The Fool", "00-TheFool.jpg"),
    ("The Magician", "01-TheMagician.jpg"),
    ("The High Priestess", "02-TheHighPriestess.jpg"),
    ("The Empress", "03-TheEmpress.jpg"),
    ("The Emperor", "04-TheEmperor.jpg"),
    ("The Hierophant", "05-TheHierophant.jpg"),
    ("The Lovers", "06-TheLovers.jpg"),
    ("The Chariot", "07-TheChariot.jpg"),
    ("Strength", "08-Strength.jpg"),
    ("The Hermit", "09-TheHermit.jpg"),
    ("Wheel of Fortune", "10-WheelOfFortune.jpg"),
    ("Justice", "11-Justice.jpg"),
    ("The Hanged Man", "12-TheHangedMan.jpg"),
    ("Death", "13-Death.jpg"),
    ("Temperance", "14-Temperance.jpg"),
    ("The Devil", "15-TheDevil.jpg"),
    ("The Tower", "16-TheTower.jpg"),
    ("The Star", "17-TheStar.jpg"),
    ("The Moon", "18-TheMoon.jpg"),
    ("The Sun", "19-TheSun.jpg"),
    ("Judgement", "20-Judgement.jpg"),
    ("The World", "21-TheWorld.jpg"),
];

const SUITS: [&str; 4] = ["Wands", "Cups", "Swords", "Pentacles"];

/// Ranks in file-number order: Ace=01 .. Ten=10, then the court cards.
const RANKS: [&str; 14] = [
    "Ace", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Page",
    "Knight", "Queen", "King",
];

/// Card name -> image file name, covering the full deck.
static CATALOG: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (name, file) in MAJOR_ARCANA {
        map.insert(name.to_string(), file.to_string());
    }
    for suit in SUITS {
        for (index, rank) in RANKS.iter().enumerate() {
            let name = format!("{rank} of {suit}");
            let file = format!("{suit}{:02}.jpg", index + 1);
            map.insert(name, file);
        }
    }
    map
});

/// All card names, majors first then minors, in a stable order.
static ALL_CARDS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cards: Vec<String> = MAJOR_ARCANA
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    for suit in SUITS {
        for rank in RANKS {
            cards.push(format!("{rank} of {suit}"));
        }
    }
    cards
});

/// Number of cards in the catalog.
pub fn size() -> usize {
    ALL_CARDS.len()
}

pub fn all() -> &'static [String] {
    &ALL_CARDS
}

pub fn contains(card_name: &str) -> bool {
    CATALOG.contains_key(card_name)
}

/// Image file name for a card, if the catalog knows it.
pub fn lookup(card_name: &str) -> Option<&'static str> {
    CATALOG.get(card_name).map(String::as_str)
}

/// Select one card uniformly at random from the full deck.
pub fn draw() -> &'static str {
    let mut rng = rand::thread_rng();
    ALL_CARDS
        .choose(&mut rng)
        .map(String::as_str)
        .unwrap_or(MAJOR_ARCANA[0].0)
}
