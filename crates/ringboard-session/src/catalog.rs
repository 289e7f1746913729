//! Card catalog abstraction and the in-memory implementation.
//!
//! Sessions draw cards through the [`CardCatalog`] trait so the card store
//! can live anywhere. [`MemoryCatalog`] loads the template file format:
//!
//! ```json
//! { "sin": [ { "id": "sin_001", "name": "...", "type": "...", ... } ],
//!   "virtue": [ ... ] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rand::RngCore;
use rand::seq::IndexedRandom;
use ringboard_types::{Card, CardId, CardTemplate, Deck};
use serde::Deserialize;
use tracing::info;

/// Errors that can occur when loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Failed to read the template file.
    #[error("failed to read card catalog: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The template file is not valid JSON for the template format.
    #[error("failed to parse card catalog: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Two templates share an id.
    #[error("duplicate card id {card_id}")]
    DuplicateCard {
        /// The repeated id.
        card_id: CardId,
    },
}

/// Narrowing criteria for a random draw. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    /// Exact card type.
    pub card_type: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// The current round: cards whose own `min_round` is later are skipped.
    pub min_round: Option<u32>,
}

impl CardFilter {
    /// Filter on category only.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    /// Builder: restrict to cards available by `round`.
    #[must_use]
    pub const fn in_round(mut self, round: u32) -> Self {
        self.min_round = Some(round);
        self
    }

    /// Whether `card` passes every set criterion.
    pub fn matches(&self, card: &Card) -> bool {
        if let Some(card_type) = &self.card_type
            && card.card_type != *card_type
        {
            return false;
        }
        if let Some(category) = &self.category
            && card.category != *category
        {
            return false;
        }
        match (self.min_round, card.min_round) {
            (Some(round), Some(earliest)) => earliest <= round,
            _ => true,
        }
    }
}

/// A source of cards.
pub trait CardCatalog: Send + Sync {
    /// A uniformly random card from `deck` passing `filter`, or `None` if
    /// nothing matches.
    fn random_card(&self, deck: Deck, filter: &CardFilter, rng: &mut dyn RngCore)
    -> Option<Card>;

    /// Every card in `category`, across both decks.
    fn cards_by_category(&self, category: &str) -> Vec<Card>;

    /// Look up a card by id.
    fn card(&self, id: &CardId) -> Option<Card>;
}

/// On-disk template file layout.
#[derive(Debug, Default, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    sin: Vec<CardTemplate>,
    #[serde(default)]
    virtue: Vec<CardTemplate>,
}

/// Catalog held entirely in memory, ordered by card id.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    cards: BTreeMap<CardId, Card>,
}

impl MemoryCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the template JSON format.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Json`] on malformed input or
    /// [`CatalogError::DuplicateCard`] if an id repeats.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: TemplateFile = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for template in file.sin {
            catalog.insert(template.into_card(Deck::Sin))?;
        }
        for template in file.virtue {
            catalog.insert(template.into_card(Deck::Virtue))?;
        }
        Ok(catalog)
    }

    /// Load the template JSON format from a file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] if the file cannot be read, otherwise as
    /// [`MemoryCatalog::from_json`].
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        info!(
            path = %path.display(),
            cards = catalog.len(),
            "Card catalog loaded"
        );
        Ok(catalog)
    }

    /// Add a card.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateCard`] if the id is taken.
    pub fn insert(&mut self, card: Card) -> Result<(), CatalogError> {
        if self.cards.contains_key(&card.id) {
            return Err(CatalogError::DuplicateCard { card_id: card.id });
        }
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the catalog holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl CardCatalog for MemoryCatalog {
    fn random_card(
        &self,
        deck: Deck,
        filter: &CardFilter,
        rng: &mut dyn RngCore,
    ) -> Option<Card> {
        let eligible: Vec<&Card> = self
            .cards
            .values()
            .filter(|card| card.deck == deck && filter.matches(card))
            .collect();
        eligible.choose(rng).map(|card| (*card).clone())
    }

    fn cards_by_category(&self, category: &str) -> Vec<Card> {
        self.cards
            .values()
            .filter(|card| card.category == category)
            .cloned()
            .collect()
    }

    fn card(&self, id: &CardId) -> Option<Card> {
        self.cards.get(id).cloned()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    const TEMPLATES: &str = r#"{
        "sin": [
            {"id": "sin_001", "name": "Office Gamble", "type": "temptation",
             "category": "career", "description": "A betting pool.",
             "choices": [{"text": "Bet", "effects": {"money": -500}}],
             "rarity": "common"},
            {"id": "sin_002", "name": "Late Night", "type": "temptation",
             "category": "health", "min_round": 3,
             "choices": [{"text": "Stay out", "effects": {"mental": -1}}]}
        ],
        "virtue": [
            {"id": "vir_001", "name": "Mentor", "type": "opportunity",
             "category": "career",
             "choices": [{"text": "Teach", "effects": {"virtue": 1}}]}
        ]
    }"#;

    #[test]
    fn loads_both_decks() {
        let catalog = MemoryCatalog::from_json(TEMPLATES).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.card(&CardId::from("vir_001")).unwrap().deck,
            Deck::Virtue
        );
        assert!(catalog.card(&CardId::from("nope")).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{"sin": [
            {"id": "x", "name": "a", "type": "t", "category": "career"},
            {"id": "x", "name": "b", "type": "t", "category": "career"}
        ]}"#;
        assert!(matches!(
            MemoryCatalog::from_json(json),
            Err(CatalogError::DuplicateCard { .. })
        ));
    }

    #[test]
    fn random_card_respects_deck_and_category() {
        let catalog = MemoryCatalog::from_json(TEMPLATES).unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..20 {
            let card = catalog
                .random_card(Deck::Sin, &CardFilter::category("career"), &mut rng)
                .unwrap();
            assert_eq!(card.id.as_str(), "sin_001");
        }
        assert!(
            catalog
                .random_card(Deck::Virtue, &CardFilter::category("health"), &mut rng)
                .is_none()
        );
    }

    #[test]
    fn min_round_hides_cards_until_their_round() {
        let catalog = MemoryCatalog::from_json(TEMPLATES).unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        let early = CardFilter::category("health").in_round(2);
        assert!(catalog.random_card(Deck::Sin, &early, &mut rng).is_none());
        let later = CardFilter::category("health").in_round(3);
        assert!(catalog.random_card(Deck::Sin, &later, &mut rng).is_some());
    }

    #[test]
    fn card_type_filter() {
        let catalog = MemoryCatalog::from_json(TEMPLATES).unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        let filter = CardFilter {
            card_type: Some("opportunity".to_owned()),
            ..CardFilter::default()
        };
        assert!(catalog.random_card(Deck::Sin, &filter, &mut rng).is_none());
        assert!(catalog.random_card(Deck::Virtue, &filter, &mut rng).is_some());
    }

    #[test]
    fn cards_by_category_spans_decks() {
        let catalog = MemoryCatalog::from_json(TEMPLATES).unwrap();
        let career = catalog.cards_by_category("career");
        assert_eq!(career.len(), 2);
        assert!(catalog.cards_by_category("babel").is_empty());
    }
}
