use super::backend::StorageBackend;
use super::trip_store::TripStore;
use crate::error::{EntityKind, Result, TokiError};
use crate::geohash::{self, PLACE_PRECISION};
use crate::model::{Coordinates, Place};
use tracing::debug;

impl<B: StorageBackend> TripStore<B> {
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn place(&self, id: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn place_by_geohash(&self, hash: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.geohash == hash)
    }

    /// Return the place occupying the geohash cell of `(lat, lon)`, creating it on a miss.
    ///
    /// An existing place is returned untouched: `label` and `categories` only apply
    /// to a newly created place.
    pub fn find_or_create_place(
        &mut self,
        lat: f64,
        lon: f64,
        label: Option<&str>,
        categories: Vec<String>,
    ) -> Result<Place> {
        if !Coordinates::new(lat, lon).is_valid() {
            return Err(TokiError::InvalidCoordinates { lat, lon });
        }

        let hash = geohash::encode(lat, lon, PLACE_PRECISION);
        if let Some(existing) = self.place_by_geohash(&hash) {
            return Ok(existing.clone());
        }

        let place = Place::new(lat, lon, label.map(str::to_string), categories);
        let mut next = self.places.clone();
        next.push(place.clone());
        self.commit_places(next)?;
        debug!(id = %place.id, geohash = %place.geohash, "Created place");
        Ok(place)
    }

    /// Refine a place (label, provider key, categories, metadata).
    ///
    /// Coordinates and geohash are kept from the stored record so an edit can never
    /// move a place into a cell another place already occupies.
    pub fn update_place(&mut self, place: Place) -> Result<Place> {
        let pos = self
            .places
            .iter()
            .position(|p| p.id == place.id)
            .ok_or_else(|| TokiError::not_found(EntityKind::Place, place.id.clone()))?;

        let stored = &self.places[pos];
        let mut updated = place;
        updated.lat = stored.lat;
        updated.lon = stored.lon;
        updated.geohash = stored.geohash.clone();
        updated.created_at = stored.created_at;
        updated.updated_at = chrono::Utc::now().max(stored.created_at);

        let mut next = self.places.clone();
        next[pos] = updated.clone();
        self.commit_places(next)?;
        Ok(updated)
    }

    /// Remove a place. Cards referencing it keep their id and snapshot.
    pub fn delete_place(&mut self, id: &str) -> Result<()> {
        if self.place(id).is_none() {
            return Err(TokiError::not_found(EntityKind::Place, id));
        }
        let next = self.places.iter().filter(|p| p.id != id).cloned().collect();
        self.commit_places(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TokiError;
    use crate::model::PlaceMetadata;
    use crate::store::mem_backend::MemBackend;
    use crate::store::TripStore;

    fn make_store() -> TripStore<MemBackend> {
        TripStore::open(MemBackend::new())
    }

    #[test]
    fn test_same_cell_returns_same_place() {
        let mut store = make_store();
        let first = store
            .find_or_create_place(35.6586, 139.7454, Some("Tokyo Tower"), vec![])
            .unwrap();
        let second = store
            .find_or_create_place(35.65861, 139.74541, None, vec![])
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.places().len(), 1);
    }

    #[test]
    fn test_repeated_calls_add_at_most_one() {
        let mut store = make_store();
        for i in 0..20 {
            let jitter = i as f64 * 0.00001;
            store
                .find_or_create_place(35.6586 + jitter, 139.7454 - jitter, None, vec![])
                .unwrap();
        }
        assert_eq!(store.places().len(), 1);
    }

    #[test]
    fn test_existing_place_not_overwritten() {
        let mut store = make_store();
        store
            .find_or_create_place(35.6586, 139.7454, Some("Tokyo Tower"), vec!["landmark".into()])
            .unwrap();
        let again = store
            .find_or_create_place(35.6586, 139.7454, Some("Other"), vec!["food".into()])
            .unwrap();

        assert_eq!(again.label.as_deref(), Some("Tokyo Tower"));
        assert_eq!(again.categories, vec!["landmark".to_string()]);
    }

    #[test]
    fn test_different_cells_create_distinct_places() {
        let mut store = make_store();
        let tower = store
            .find_or_create_place(35.6586, 139.7454, None, vec![])
            .unwrap();
        let shibuya = store
            .find_or_create_place(35.6595, 139.7005, None, vec![])
            .unwrap();
        assert_ne!(tower.id, shibuya.id);
        assert_eq!(store.places().len(), 2);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let mut store = make_store();
        let err = store
            .find_or_create_place(91.0, 0.0, None, vec![])
            .unwrap_err();
        assert!(matches!(err, TokiError::InvalidCoordinates { .. }));
        assert!(store.places().is_empty());
    }

    #[test]
    fn test_update_place_refines_but_keeps_location() {
        let mut store = make_store();
        let place = store
            .find_or_create_place(35.6586, 139.7454, None, vec![])
            .unwrap();

        let mut edit = place.clone();
        edit.label = Some("Tokyo Tower".into());
        edit.metadata = Some(PlaceMetadata {
            address: Some("4 Chome-2-8 Shibakoen".into()),
            ..Default::default()
        });
        edit.lat = 0.0;
        edit.geohash = "s0000".into();
        let updated = store.update_place(edit).unwrap();

        assert_eq!(updated.label.as_deref(), Some("Tokyo Tower"));
        assert_eq!(updated.lat, place.lat);
        assert_eq!(updated.geohash, "xn76g");
        assert!(store.place_by_geohash("xn76g").is_some());
    }

    #[test]
    fn test_update_unknown_place_is_not_found() {
        let mut store = make_store();
        let ghost = crate::model::Place::new(1.0, 1.0, None, vec![]);
        assert!(matches!(
            store.update_place(ghost),
            Err(TokiError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_place_frees_cell() {
        let mut store = make_store();
        let place = store
            .find_or_create_place(35.6586, 139.7454, None, vec![])
            .unwrap();
        store.delete_place(&place.id).unwrap();
        assert!(store.places().is_empty());

        let fresh = store
            .find_or_create_place(35.6586, 139.7454, None, vec![])
            .unwrap();
        assert_ne!(fresh.id, place.id);
    }
}
