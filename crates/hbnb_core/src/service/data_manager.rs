//! Data manager: the single entry point for reads and writes.
//!
//! # Responsibility
//! - Enforce cross-entity invariants (uniqueness, ownership, reference
//!   resolution, delete policy) before anything reaches the store.
//! - Serialize writers and let readers run concurrently.
//!
//! # Invariants
//! - Every check that guards a write runs under the same exclusive lock as
//!   the write itself; there is no check-then-act window.
//! - Reads take the shared lock and never see a half-applied batch.
//! - Multi-record changes (association updates, cascades) go to the store
//!   as one batch.
//! - Emails and credentials are never logged.

use std::sync::{
    LockResult, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
    TryLockResult,
};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::config::ManagerOptions;
use crate::error::{ConflictError, DataError, DataResult};
use crate::model::amenity::{Amenity, AmenityUpdate};
use crate::model::city::{City, CityUpdate};
use crate::model::country::{normalize_country_code, Country};
use crate::model::place::{NewPlace, Place, PlaceUpdate};
use crate::model::review::{Review, ReviewUpdate};
use crate::model::user::{NewUser, User, UserUpdate};
use crate::model::validation::ValidationError;
use crate::model::{Entity, EntityId, EntityKind};
use crate::service::integrity::{plan_delete, DeleteMode};
use crate::store::{Store, WriteOp};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Coordinator over one shared store.
///
/// Share it across request handlers with `Arc<DataManager<_>>`.
pub struct DataManager<S: Store> {
    store: RwLock<S>,
    options: ManagerOptions,
}

impl<S: Store> DataManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ManagerOptions::default())
    }

    pub fn with_options(store: S, options: ManagerOptions) -> Self {
        Self {
            store: RwLock::new(store),
            options,
        }
    }

    /// Consumes the manager and returns the underlying store.
    pub fn into_inner(self) -> S {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads one entity; a missing id is `Ok(None)`.
    pub fn get<E: Entity>(&self, id: EntityId) -> DataResult<Option<E>> {
        Ok(self.read()?.load::<E>(id)?)
    }

    /// Loads every entity of type `E`.
    pub fn list<E: Entity>(&self) -> DataResult<Vec<E>> {
        Ok(self.read()?.load_all::<E>()?)
    }

    pub fn count(&self, kind: EntityKind) -> DataResult<usize> {
        Ok(self.read()?.count(kind)?)
    }

    /// Deletes `kind`/`id` under `mode`.
    ///
    /// Returns `Ok(false)` when the target is already absent, so repeated
    /// deletes are harmless.
    ///
    /// # Errors
    /// - `DataError::ReferentialIntegrity` in `DeleteMode::Block` while
    ///   other records still reference the target.
    pub fn delete(&self, kind: EntityKind, id: EntityId, mode: DeleteMode) -> DataResult<bool> {
        self.mutate("entity_delete", kind, |store| {
            let Some(ops) = plan_delete(&*store, kind, id, mode)? else {
                return Ok(false);
            };
            let op_count = ops.len();
            store.apply(ops)?;
            info!(
                "event=entity_delete module=data_manager status=ok kind={} id={} mode={:?} ops={}",
                kind, id, mode, op_count
            );
            Ok(true)
        })
    }

    /// Creates a country with a unique ISO alpha-2 code.
    pub fn create_country(&self, name: impl Into<String>, code: &str) -> DataResult<Country> {
        let name = name.into();
        self.mutate("entity_create", EntityKind::Country, |store| {
            let country = Country::new(name, code)?;
            ensure_unique_country_code(store, country.code())?;
            store.save(&country)?;
            Ok(logged("entity_create", country))
        })
    }

    pub fn rename_country(&self, id: EntityId, name: impl Into<String>) -> DataResult<Country> {
        let name = name.into();
        self.mutate("entity_update", EntityKind::Country, |store| {
            let mut country: Country = fetch(store, id)?;
            country.rename(name)?;
            store.save(&country)?;
            Ok(logged("entity_update", country))
        })
    }

    pub fn find_country_by_code(&self, code: &str) -> DataResult<Option<Country>> {
        let code = normalize_country_code(code)?;
        Ok(self
            .read()?
            .load_all::<Country>()?
            .into_iter()
            .find(|country| country.code() == code))
    }

    /// Creates a city inside an existing country.
    pub fn create_city(&self, name: impl Into<String>, country_id: EntityId) -> DataResult<City> {
        let name = name.into();
        self.mutate("entity_create", EntityKind::City, |store| {
            let city = City::new(name, country_id)?;
            ensure_exists(store, "country_id", EntityKind::Country, country_id)?;
            store.save(&city)?;
            Ok(logged("entity_create", city))
        })
    }

    pub fn update_city(&self, id: EntityId, update: CityUpdate) -> DataResult<City> {
        self.mutate("entity_update", EntityKind::City, |store| {
            let mut city: City = fetch(store, id)?;
            if let Some(country_id) = update.country_id {
                ensure_exists(store, "country_id", EntityKind::Country, country_id)?;
            }
            city.update_details(update)?;
            store.save(&city)?;
            Ok(logged("entity_update", city))
        })
    }

    pub fn list_cities_in_country(&self, country_id: EntityId) -> DataResult<Vec<City>> {
        self.list_where(|city: &City| city.country_id() == country_id)
    }

    /// Registers a user with a globally unique email.
    pub fn create_user(&self, input: NewUser) -> DataResult<User> {
        self.mutate("entity_create", EntityKind::User, |store| {
            let user = User::new(input)?;
            ensure_user_refs(store, &user)?;
            ensure_unique_email(store, user.email(), None)?;
            store.save(&user)?;
            Ok(logged("entity_create", user))
        })
    }

    /// Updates a user; a changed email is re-checked for uniqueness.
    pub fn update_user(&self, id: EntityId, update: UserUpdate) -> DataResult<User> {
        self.mutate("entity_update", EntityKind::User, |store| {
            let mut user: User = fetch(store, id)?;
            user.update_details(update)?;
            ensure_user_refs(store, &user)?;
            ensure_unique_email(store, user.email(), Some(id))?;
            store.save(&user)?;
            Ok(logged("entity_update", user))
        })
    }

    /// Removes the user's city and/or country reference.
    pub fn clear_user_location(
        &self,
        id: EntityId,
        clear_city: bool,
        clear_country: bool,
    ) -> DataResult<User> {
        self.mutate("entity_update", EntityKind::User, |store| {
            let mut user: User = fetch(store, id)?;
            if clear_city && user.city_id().is_some() {
                user.clear_city();
            }
            if clear_country && user.country_id().is_some() {
                user.clear_country();
            }
            store.save(&user)?;
            Ok(logged("entity_update", user))
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> DataResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .read()?
            .load_all::<User>()?
            .into_iter()
            .find(|user| user.email() == email))
    }

    /// Creates an amenity with a unique name.
    pub fn create_amenity(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> DataResult<Amenity> {
        let name = name.into();
        let description = description.into();
        self.mutate("entity_create", EntityKind::Amenity, |store| {
            let amenity = Amenity::new(name, description)?;
            ensure_unique_amenity_name(store, amenity.name(), None)?;
            store.save(&amenity)?;
            Ok(logged("entity_create", amenity))
        })
    }

    pub fn update_amenity(&self, id: EntityId, update: AmenityUpdate) -> DataResult<Amenity> {
        self.mutate("entity_update", EntityKind::Amenity, |store| {
            let mut amenity: Amenity = fetch(store, id)?;
            amenity.update_details(update)?;
            ensure_unique_amenity_name(store, amenity.name(), Some(id))?;
            store.save(&amenity)?;
            Ok(logged("entity_update", amenity))
        })
    }

    /// Links an amenity and a place on both sides in one write.
    pub fn attach_amenity(&self, amenity_id: EntityId, place_id: EntityId) -> DataResult<Amenity> {
        self.mutate("amenity_attach", EntityKind::Amenity, |store| {
            let mut amenity: Amenity = fetch(store, amenity_id)?;
            let mut place: Place = fetch(store, place_id)?;
            let amenity_changed = amenity.attach_to(place_id);
            let place_changed = place.attach_amenity(amenity_id);
            if amenity_changed || place_changed {
                store.apply(vec![WriteOp::put(&amenity)?, WriteOp::put(&place)?])?;
            }
            Ok(amenity)
        })
    }

    /// Unlinks an amenity and a place on both sides in one write.
    pub fn detach_amenity(&self, amenity_id: EntityId, place_id: EntityId) -> DataResult<Amenity> {
        self.mutate("amenity_detach", EntityKind::Amenity, |store| {
            let mut amenity: Amenity = fetch(store, amenity_id)?;
            let mut place: Place = fetch(store, place_id)?;
            let amenity_changed = amenity.detach_from(place_id);
            let place_changed = place.detach_amenity(amenity_id);
            if amenity_changed || place_changed {
                store.apply(vec![WriteOp::put(&amenity)?, WriteOp::put(&place)?])?;
            }
            Ok(amenity)
        })
    }

    /// Lists a place; city, host and amenity references must resolve.
    ///
    /// Listed amenities get the place recorded on their side in the same write.
    pub fn create_place(&self, input: NewPlace) -> DataResult<Place> {
        self.mutate("entity_create", EntityKind::Place, |store| {
            let place = Place::new(input)?;
            ensure_exists(store, "city_id", EntityKind::City, place.city_id())?;
            if let Some(host_id) = place.host_id() {
                ensure_exists(store, "host_id", EntityKind::User, host_id)?;
            }

            let mut ops = vec![WriteOp::put(&place)?];
            for amenity_id in place.amenity_ids() {
                let mut amenity: Amenity = resolve(store, "amenity_ids", *amenity_id)?;
                amenity.attach_to(place.id());
                ops.push(WriteOp::put(&amenity)?);
            }
            store.apply(ops)?;
            Ok(logged("entity_create", place))
        })
    }

    pub fn update_place(&self, id: EntityId, update: PlaceUpdate) -> DataResult<Place> {
        self.mutate("entity_update", EntityKind::Place, |store| {
            let mut place: Place = fetch(store, id)?;
            if let Some(city_id) = update.city_id {
                ensure_exists(store, "city_id", EntityKind::City, city_id)?;
            }
            place.update_details(update)?;
            store.save(&place)?;
            Ok(logged("entity_update", place))
        })
    }

    /// Fixes the host of a place. Re-assigning the current host is a no-op.
    ///
    /// # Errors
    /// - `ConflictError::HostAlreadyAssigned` when another user hosts the place.
    /// - `ConflictError::ReviewerCannotHost` when the user has reviewed the place.
    pub fn assign_host(&self, place_id: EntityId, user_id: EntityId) -> DataResult<Place> {
        self.mutate("host_assign", EntityKind::Place, |store| {
            let mut place: Place = fetch(store, place_id)?;
            ensure_exists(store, "user_id", EntityKind::User, user_id)?;
            if place.host_id().is_none() && has_reviewed(store, place_id, user_id)? {
                return Err(ConflictError::ReviewerCannotHost { place_id, user_id }.into());
            }
            if place.assign_host(user_id)? {
                store.save(&place)?;
                info!(
                    "event=host_assign module=data_manager status=ok place_id={} user_id={}",
                    place_id, user_id
                );
            }
            Ok(place)
        })
    }

    pub fn list_places_in_city(&self, city_id: EntityId) -> DataResult<Vec<Place>> {
        self.list_where(|place: &Place| place.city_id() == city_id)
    }

    pub fn list_places_by_host(&self, host_id: EntityId) -> DataResult<Vec<Place>> {
        self.list_where(|place: &Place| place.host_id() == Some(host_id))
    }

    /// Records a review of an existing place by an existing non-host user.
    pub fn create_review(
        &self,
        place_id: EntityId,
        user_id: EntityId,
        rating: u8,
        comment: impl Into<String>,
    ) -> DataResult<Review> {
        let comment = comment.into();
        self.mutate("entity_create", EntityKind::Review, |store| {
            let review = Review::new(place_id, user_id, rating, comment)?;
            let place: Place = resolve(store, "place_id", place_id)?;
            ensure_exists(store, "user_id", EntityKind::User, user_id)?;
            if place.host_id() == Some(user_id) {
                return Err(ConflictError::HostCannotReview { place_id, user_id }.into());
            }
            store.save(&review)?;
            Ok(logged("entity_create", review))
        })
    }

    pub fn update_review(&self, id: EntityId, update: ReviewUpdate) -> DataResult<Review> {
        self.mutate("entity_update", EntityKind::Review, |store| {
            let mut review: Review = fetch(store, id)?;
            review.update_details(update)?;
            store.save(&review)?;
            Ok(logged("entity_update", review))
        })
    }

    pub fn list_reviews_for_place(&self, place_id: EntityId) -> DataResult<Vec<Review>> {
        self.list_where(|review: &Review| review.place_id() == place_id)
    }

    pub fn list_reviews_by_user(&self, user_id: EntityId) -> DataResult<Vec<Review>> {
        self.list_where(|review: &Review| review.user_id() == user_id)
    }

    fn list_where<E: Entity>(&self, keep: impl Fn(&E) -> bool) -> DataResult<Vec<E>> {
        let mut entities = self.read()?.load_all::<E>()?;
        entities.retain(|entity| keep(entity));
        Ok(entities)
    }

    /// Runs `op` under the exclusive lock and logs failures.
    fn mutate<T>(
        &self,
        event: &'static str,
        kind: EntityKind,
        op: impl FnOnce(&mut S) -> DataResult<T>,
    ) -> DataResult<T> {
        let started_at = Instant::now();
        let result = self.write().and_then(|mut store| op(&mut *store));
        if let Err(err) = &result {
            warn!(
                "event={} module=data_manager status=error kind={} duration_ms={} error_code={} error={}",
                event,
                kind,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
        }
        result
    }

    fn read(&self) -> DataResult<RwLockReadGuard<'_, S>> {
        acquire(
            self.options.lock_timeout,
            || self.store.try_read(),
            || self.store.read(),
        )
    }

    fn write(&self) -> DataResult<RwLockWriteGuard<'_, S>> {
        acquire(
            self.options.lock_timeout,
            || self.store.try_write(),
            || self.store.write(),
        )
    }
}

/// Acquires a lock guard, optionally within a bounded wait.
///
/// A poisoned lock is recovered: store state only changes after a
/// successful write, so a panicking holder cannot leave it half-updated.
fn acquire<G>(
    timeout: Option<Duration>,
    try_lock: impl Fn() -> TryLockResult<G>,
    lock: impl FnOnce() -> LockResult<G>,
) -> DataResult<G> {
    let Some(timeout) = timeout else {
        return Ok(lock().unwrap_or_else(recover_poisoned));
    };

    let started_at = Instant::now();
    loop {
        match try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(recover_poisoned(poisoned)),
            Err(TryLockError::WouldBlock) => {
                let waited = started_at.elapsed();
                if waited >= timeout {
                    return Err(DataError::Busy { waited });
                }
                thread::sleep(LOCK_POLL_INTERVAL.min(timeout - waited));
            }
        }
    }
}

fn recover_poisoned<G>(poisoned: PoisonError<G>) -> G {
    warn!("event=lock_poisoned module=data_manager status=recovered");
    poisoned.into_inner()
}

fn logged<E: Entity>(event: &'static str, entity: E) -> E {
    info!(
        "event={} module=data_manager status=ok kind={} id={}",
        event,
        E::KIND,
        entity.id()
    );
    entity
}

/// Loads the target of a mutation or reports it missing.
fn fetch<S: Store, E: Entity>(store: &S, id: EntityId) -> DataResult<E> {
    store
        .load::<E>(id)?
        .ok_or(DataError::NotFound { kind: E::KIND, id })
}

/// Loads a referenced entity; a dangling reference is a validation error.
fn resolve<S: Store, E: Entity>(store: &S, field: &'static str, id: EntityId) -> DataResult<E> {
    store.load::<E>(id)?.ok_or_else(|| {
        ValidationError::UnresolvedReference {
            field,
            kind: E::KIND,
            id,
        }
        .into()
    })
}

fn ensure_exists<S: Store>(
    store: &S,
    field: &'static str,
    kind: EntityKind,
    id: EntityId,
) -> DataResult<()> {
    if store.load_record(kind, id)?.is_none() {
        return Err(ValidationError::UnresolvedReference { field, kind, id }.into());
    }
    Ok(())
}

fn ensure_user_refs<S: Store>(store: &S, user: &User) -> DataResult<()> {
    if let Some(city_id) = user.city_id() {
        ensure_exists(store, "city_id", EntityKind::City, city_id)?;
    }
    if let Some(country_id) = user.country_id() {
        ensure_exists(store, "country_id", EntityKind::Country, country_id)?;
    }
    Ok(())
}

fn ensure_unique_email<S: Store>(
    store: &S,
    email: &str,
    except: Option<EntityId>,
) -> DataResult<()> {
    let taken = store
        .load_all::<User>()?
        .iter()
        .any(|user| Some(user.id()) != except && user.email() == email);
    if taken {
        return Err(ConflictError::DuplicateEmail.into());
    }
    Ok(())
}

fn ensure_unique_country_code<S: Store>(store: &S, code: &str) -> DataResult<()> {
    let taken = store
        .load_all::<Country>()?
        .iter()
        .any(|country| country.code() == code);
    if taken {
        return Err(ConflictError::DuplicateCountryCode(code.to_string()).into());
    }
    Ok(())
}

fn ensure_unique_amenity_name<S: Store>(
    store: &S,
    name: &str,
    except: Option<EntityId>,
) -> DataResult<()> {
    let taken = store
        .load_all::<Amenity>()?
        .iter()
        .any(|amenity| Some(amenity.id()) != except && amenity.name() == name);
    if taken {
        return Err(ConflictError::DuplicateAmenityName(name.to_string()).into());
    }
    Ok(())
}

fn has_reviewed<S: Store>(store: &S, place_id: EntityId, user_id: EntityId) -> DataResult<bool> {
    Ok(store
        .load_all::<Review>()?
        .iter()
        .any(|review| review.place_id() == place_id && review.user_id() == user_id))
}
