use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::store::{AddressRecord, AddressStore, SearchField};

// The permit collection is a few thousand rows; this caps the pool the
// random sample is drawn from.
const SAMPLE_POOL_LIMIT: usize = 5_000;

/// Read side of the lookup tool: prefix search over one dimension plus
/// the default random sample view. Store failures degrade to empty
/// results so the caller can retry later.
#[derive(Clone)]
pub struct SearchService {
    store: AddressStore,
}

impl SearchService {
    pub fn new(store: AddressStore) -> Self {
        Self { store }
    }

    /// Exact prefix match against the chosen dimension. The stored text
    /// is uppercase, so the query is uppercased first. Results without
    /// coordinates are dropped; a hit must be displayable on the map.
    pub fn search(&self, query: &str, field: SearchField) -> Vec<AddressRecord> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let normalized = trimmed.to_uppercase();

        match self.store.range_query(field, &normalized, None) {
            Ok(records) => records
                .into_iter()
                .filter(|record| record.coordinates.is_some())
                .collect(),
            Err(err) => {
                warn!(?err, query = %normalized, "search query failed; returning no results");
                Vec::new()
            }
        }
    }

    /// Random subset of displayable records for the initial map view.
    pub fn sample_view(&self, limit: usize) -> Vec<AddressRecord> {
        self.sample_view_with_rng(limit, &mut rand::thread_rng())
    }

    pub fn sample_view_with_rng<R: Rng + ?Sized>(
        &self,
        limit: usize,
        rng: &mut R,
    ) -> Vec<AddressRecord> {
        let candidates = match self.store.with_coordinates_only(SAMPLE_POOL_LIMIT) {
            Ok(records) => records,
            Err(err) => {
                warn!(?err, "sample view query failed; returning no results");
                return Vec::new();
            }
        };
        candidates
            .choose_multiple(rng, limit)
            .cloned()
            .collect()
    }
}

/// Client-facing flow: initial load, then search round-trips; `Error` is
/// terminal until an external retry trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Searching,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    LoadStarted,
    LoadSucceeded,
    SearchStarted,
    SearchSucceeded,
    Failed,
    RetryRequested,
}

impl ViewState {
    /// Invalid events leave the state unchanged.
    pub fn advance(self, event: ViewEvent) -> ViewState {
        match (self, event) {
            (ViewState::Idle, ViewEvent::LoadStarted) => ViewState::Loading,
            (ViewState::Loading, ViewEvent::LoadSucceeded) => ViewState::Ready,
            (ViewState::Ready, ViewEvent::SearchStarted) => ViewState::Searching,
            (ViewState::Searching, ViewEvent::SearchSucceeded) => ViewState::Ready,
            (ViewState::Loading | ViewState::Searching, ViewEvent::Failed) => ViewState::Error,
            (ViewState::Error, ViewEvent::RetryRequested) => ViewState::Idle,
            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::db::open_in_memory;
    use crate::store::{Coordinates, NewAddressRecord};

    use super::*;

    fn seeded_service(geocode_all: bool) -> SearchService {
        let store = AddressStore::new(Arc::new(Mutex::new(open_in_memory().unwrap())));
        let records = vec![
            NewAddressRecord {
                address: "250 ACADEMY ST".into(),
                street_name: "ACADEMY ST".into(),
                street_no: "250".into(),
                date: "1993-07-12".into(),
            },
            NewAddressRecord {
                address: "312 ACADEMY ST".into(),
                street_name: "ACADEMY ST".into(),
                street_no: "312".into(),
                date: "2013-04-04".into(),
            },
            NewAddressRecord {
                address: "11 APOLLO ST".into(),
                street_name: "APOLLO ST".into(),
                street_no: "11".into(),
                date: "2021-08-27".into(),
            },
        ];
        store.bulk_insert(&records).unwrap();

        for (index, record) in store.find_missing_coordinates().unwrap().iter().enumerate() {
            if geocode_all || record.address != "312 ACADEMY ST" {
                store
                    .set_coordinates(
                        record.id,
                        Coordinates::new(-74.07 - index as f64 * 0.001, 40.72),
                    )
                    .unwrap();
            }
        }
        SearchService::new(store)
    }

    #[test]
    fn empty_query_returns_nothing() {
        let service = seeded_service(true);
        assert!(service.search("", SearchField::Address).is_empty());
        assert!(service.search("   ", SearchField::StreetName).is_empty());
    }

    #[test]
    fn unknown_prefix_returns_nothing() {
        let service = seeded_service(true);
        assert!(service
            .search("NONEXISTENTSTREET", SearchField::StreetName)
            .is_empty());
    }

    #[test]
    fn query_is_uppercased_before_matching() {
        let service = seeded_service(true);
        let results = service.search("academy", SearchField::StreetName);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.street_name == "ACADEMY ST"));
    }

    #[test]
    fn results_without_coordinates_are_dropped() {
        let service = seeded_service(false);
        let results = service.search("ACADEMY", SearchField::StreetName);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, "250 ACADEMY ST");
    }

    #[test]
    fn searches_by_full_address_dimension() {
        let service = seeded_service(true);
        let results = service.search("250 ac", SearchField::Address);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].address, "250 ACADEMY ST");
    }

    #[test]
    fn sample_view_draws_displayable_records() {
        let service = seeded_service(false);
        let mut rng = StdRng::seed_from_u64(42);

        let sample = service.sample_view_with_rng(2, &mut rng);
        assert_eq!(sample.len(), 2);
        assert!(sample.iter().all(|r| r.coordinates.is_some()));

        // asking for more than exist yields everything displayable
        let all = service.sample_view_with_rng(10, &mut rng);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn view_state_happy_path() {
        let state = ViewState::Idle
            .advance(ViewEvent::LoadStarted)
            .advance(ViewEvent::LoadSucceeded)
            .advance(ViewEvent::SearchStarted)
            .advance(ViewEvent::SearchSucceeded);
        assert_eq!(state, ViewState::Ready);
    }

    #[test]
    fn view_state_error_is_terminal_until_retry() {
        let state = ViewState::Idle
            .advance(ViewEvent::LoadStarted)
            .advance(ViewEvent::Failed);
        assert_eq!(state, ViewState::Error);
        assert_eq!(state.advance(ViewEvent::SearchStarted), ViewState::Error);
        assert_eq!(state.advance(ViewEvent::LoadSucceeded), ViewState::Error);
        assert_eq!(state.advance(ViewEvent::RetryRequested), ViewState::Idle);
    }

    #[test]
    fn view_state_ignores_invalid_events() {
        assert_eq!(
            ViewState::Idle.advance(ViewEvent::SearchSucceeded),
            ViewState::Idle
        );
        assert_eq!(
            ViewState::Ready.advance(ViewEvent::LoadStarted),
            ViewState::Ready
        );
    }
}
