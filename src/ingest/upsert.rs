//! Reconciliation of normalized listings against the store

use crate::listing::CanonicalListing;
use crate::storage::{ListingStore, StorageError, StorageResult, StoredListing};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// What a write did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// First row for a new id
    Inserted,

    /// Additional history row for a known id (update-mode off)
    Appended,

    /// Known id with changed content, row rewritten in place
    Updated,

    /// Known id with unchanged content, only `last_seen_at` moved
    Refreshed,
}

/// Chooses the action for an incoming listing
///
/// | stored | content hash | update-mode | action |
/// |--------|--------------|-------------|--------|
/// | none | any | any | `Inserted` |
/// | present | unchanged | on | `Refreshed` |
/// | present | changed | on | `Updated` |
/// | present | any | off | `Appended` |
pub fn decide(
    stored: Option<&StoredListing>,
    incoming: &CanonicalListing,
    update_mode: bool,
) -> UpsertAction {
    match stored {
        None => UpsertAction::Inserted,
        Some(_) if !update_mode => UpsertAction::Appended,
        Some(stored) if stored.listing.content_hash == incoming.content_hash => {
            UpsertAction::Refreshed
        }
        Some(_) => UpsertAction::Updated,
    }
}

/// Applies [`decide`] to a shared store
///
/// The lookup, decision and write for one id happen under a single lock,
/// so two workers can never interleave writes for the same id.
pub struct Upserter<S> {
    store: Arc<Mutex<S>>,
    update_mode: bool,
    run_id: Option<i64>,
}

impl<S> Clone for Upserter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            update_mode: self.update_mode,
            run_id: self.run_id,
        }
    }
}

impl<S: ListingStore> Upserter<S> {
    pub fn new(store: Arc<Mutex<S>>, update_mode: bool, run_id: Option<i64>) -> Self {
        Self {
            store,
            update_mode,
            run_id,
        }
    }

    /// Reconciles one listing with the store
    ///
    /// `first_seen_at` always comes from the oldest stored row for the id,
    /// and `last_seen_at` never moves backwards. Translations already stored
    /// for an unchanged title or description are kept when this run did not
    /// produce new ones.
    ///
    /// Under update-mode, a listing whose detail fetch failed does not wipe
    /// the detail fields of a stored row that has them: see
    /// [`backfill_detail`].
    pub fn upsert(&self, mut listing: CanonicalListing) -> StorageResult<UpsertAction> {
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;

        let stored = store.latest_listing(&listing.id)?;
        if self.update_mode {
            if let Some(stored) = &stored {
                backfill_detail(&stored.listing, &mut listing);
            }
        }
        let action = decide(stored.as_ref(), &listing, self.update_mode);
        trace!(id = %listing.id, ?action, "upsert decision");

        let Some(stored) = stored else {
            store.insert_listing(&listing, self.run_id)?;
            return Ok(action);
        };

        let last_seen_at = stored.listing.last_seen_at.max(listing.last_seen_at);
        listing.first_seen_at = stored.listing.first_seen_at;
        listing.last_seen_at = last_seen_at;
        carry_translations(&stored.listing, &mut listing);

        match action {
            UpsertAction::Refreshed => store.touch_listing(stored.row_id, last_seen_at)?,
            UpsertAction::Updated => store.replace_listing(stored.row_id, &listing, self.run_id)?,
            UpsertAction::Appended | UpsertAction::Inserted => {
                store.insert_listing(&listing, self.run_id)?;
            }
        }

        Ok(action)
    }
}

/// Fills detail-derived fields of a degraded listing from a complete stored row
///
/// Only applies when `incoming` lost its detail page and `stored` did not.
/// Description, images and features come from the stored row; other fields
/// are filled only where the listing page left them empty. The result is
/// resealed as complete, so an otherwise unchanged listing is `Refreshed`.
fn backfill_detail(stored: &CanonicalListing, incoming: &mut CanonicalListing) {
    if !incoming.detail_incomplete || stored.detail_incomplete {
        return;
    }

    incoming.description = incoming.description.take().or_else(|| stored.description.clone());
    if stored.images.len() > incoming.images.len() {
        incoming.images = stored.images.clone();
    }
    incoming.features.extend(stored.features.iter().cloned());

    fill(&mut incoming.location, &stored.location);
    fill(&mut incoming.price, &stored.price);
    fill(&mut incoming.size, &stored.size);
    fill(&mut incoming.layout, &stored.layout);
    fill(&mut incoming.year_built, &stored.year_built);
    fill(&mut incoming.building_type, &stored.building_type);

    incoming.detail_incomplete = false;
    incoming.seal();
}

fn fill<T: Clone>(field: &mut Option<T>, stored: &Option<T>) {
    if field.is_none() {
        *field = stored.clone();
    }
}

fn carry_translations(stored: &CanonicalListing, incoming: &mut CanonicalListing) {
    if incoming.title_translated.is_none() && incoming.title == stored.title {
        incoming.title_translated = stored.title_translated.clone();
    }
    if incoming.description_translated.is_none() && incoming.description == stored.description {
        incoming.description_translated = stored.description_translated.clone();
    }
}
