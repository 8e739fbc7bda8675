use super::backend::StorageBackend;
use super::trip_store::{media_referenced, Staged, TripStore};
use crate::error::{EntityKind, Result, TokiError};
use crate::model::{new_id, Card, NewCard};
use chrono::Utc;
use tracing::debug;

impl<B: StorageBackend> TripStore<B> {
    /// All cards in creation order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Cards of a trip ordered by `taken_at` (ties keep creation order).
    pub fn cards_for_trip(&self, trip_id: &str) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self.cards.iter().filter(|c| c.trip_id == trip_id).collect();
        cards.sort_by_key(|c| c.taken_at);
        cards
    }

    pub fn cards_for_place(&self, place_id: &str) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|c| c.place_id.as_deref() == Some(place_id))
            .collect()
    }

    /// Create a card. When a place is given, its current label and coordinates are
    /// copied into the card's snapshot fields.
    pub fn create_card(&mut self, new: NewCard) -> Result<Card> {
        if self.trip(&new.trip_id).is_none() {
            return Err(TokiError::not_found(EntityKind::Trip, new.trip_id));
        }

        let (place_label_at_save, coords_at_save) = match new.place_id.as_deref() {
            Some(place_id) => {
                let place = self
                    .place(place_id)
                    .ok_or_else(|| TokiError::not_found(EntityKind::Place, place_id))?;
                (place.label.clone(), Some(place.coordinates()))
            }
            None => (None, None),
        };

        let now = Utc::now();
        let card = Card {
            id: new_id(),
            trip_id: new.trip_id,
            place_id: new.place_id,
            kind: new.kind,
            taken_at: new.taken_at,
            tags: new.tags,
            text: new.text,
            media_id: new.media_id,
            place_label_at_save,
            coords_at_save,
            created_at: now,
            updated_at: now,
        };

        let mut next = self.cards.clone();
        next.push(card.clone());
        self.commit_cards(next)?;
        debug!(id = %card.id, trip = %card.trip_id, kind = ?card.kind, "Created card");
        Ok(card)
    }

    /// Replace a card by id.
    ///
    /// `created_at` and the place snapshot are kept from the stored record; they
    /// are fixed at creation.
    pub fn update_card(&mut self, card: Card) -> Result<Card> {
        let pos = self
            .cards
            .iter()
            .position(|c| c.id == card.id)
            .ok_or_else(|| TokiError::not_found(EntityKind::Card, card.id.clone()))?;
        if self.trip(&card.trip_id).is_none() {
            return Err(TokiError::not_found(EntityKind::Trip, card.trip_id));
        }

        let stored = &self.cards[pos];
        let mut updated = card;
        updated.created_at = stored.created_at;
        updated.place_label_at_save = stored.place_label_at_save.clone();
        updated.coords_at_save = stored.coords_at_save;
        updated.updated_at = Utc::now().max(stored.created_at);

        let mut next = self.cards.clone();
        next[pos] = updated.clone();
        self.commit_cards(next)?;
        Ok(updated)
    }

    /// Delete a card. Its media is deleted too when nothing else references it.
    pub fn delete_card(&mut self, id: &str) -> Result<()> {
        let card = self
            .card(id)
            .cloned()
            .ok_or_else(|| TokiError::not_found(EntityKind::Card, id))?;

        let next: Vec<Card> = self.cards.iter().filter(|c| c.id != id).cloned().collect();

        // Media goes with the card when nothing left points at it.
        let unreferenced: Vec<String> = card
            .media_id
            .into_iter()
            .filter(|m| !media_referenced(m, &next, &self.trips))
            .collect();
        let (next_media, payloads) = self.media_without(&unreferenced);

        self.commit(Staged {
            cards: Some(next),
            media: (!payloads.is_empty()).then_some(next_media),
            ..Staged::default()
        })?;
        self.remove_payloads(&payloads);

        debug!(id, "Deleted card");
        Ok(())
    }
}
