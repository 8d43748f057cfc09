use serde::Serialize;
use std::{collections::BTreeSet, fmt::Display};

/// Player colors, in assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    Red,
    Blue,
    Green,
    Orange,
    Purple,
    Teal,
    Pink,
    Yellow,
}

impl Color {
    pub const PALETTE: [Color; 8] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Orange,
        Color::Purple,
        Color::Teal,
        Color::Pink,
        Color::Yellow,
    ];

    /// Lowest ordered color missing from `taken`, if any remain.
    pub fn lowest_free(taken: &BTreeSet<Color>) -> Option<Color> {
        Self::PALETTE
            .iter()
            .find(|color| !taken.contains(color))
            .copied()
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Orange => "orange",
            Color::Purple => "purple",
            Color::Teal => "teal",
            Color::Pink => "pink",
            Color::Yellow => "yellow",
        };
        write!(f, "{}", name)
    }
}
