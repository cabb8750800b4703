//! Referential integrity rules for deletes.
//!
//! # Responsibility
//! - Find the records that still reference a delete target.
//! - Turn a delete into one atomic write batch under the chosen mode.
//!
//! # Invariants
//! - `Block` never produces a batch while dependents exist.
//! - `Cascade` removes owned dependents recursively, clears optional user
//!   references and unlinks amenity associations; nothing dangles.
//! - Deleting a place always unlinks it from its amenities.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{DataError, DataResult, Dependent};
use crate::model::amenity::Amenity;
use crate::model::city::City;
use crate::model::place::Place;
use crate::model::review::Review;
use crate::model::user::User;
use crate::model::{Entity, EntityId, EntityKind};
use crate::store::{Store, WriteOp};

/// Delete policy for records that are still referenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMode {
    /// Refuse the delete with `ReferentialIntegrity` while dependents exist.
    #[default]
    Block,
    /// Delete or detach dependents in the same write.
    Cascade,
}

/// Lists records that reference `kind`/`id`, sorted by kind then id.
pub fn direct_dependents<S: Store>(
    store: &S,
    kind: EntityKind,
    id: EntityId,
) -> DataResult<Vec<Dependent>> {
    let mut dependents = BTreeSet::new();
    let mut push = |kind: EntityKind, id: EntityId| {
        dependents.insert(Dependent { kind, id });
    };

    match kind {
        EntityKind::Country => {
            for city in store.load_all::<City>()? {
                if city.country_id() == id {
                    push(EntityKind::City, city.id());
                }
            }
            for user in store.load_all::<User>()? {
                if user.country_id() == Some(id) {
                    push(EntityKind::User, user.id());
                }
            }
        }
        EntityKind::City => {
            for place in store.load_all::<Place>()? {
                if place.city_id() == id {
                    push(EntityKind::Place, place.id());
                }
            }
            for user in store.load_all::<User>()? {
                if user.city_id() == Some(id) {
                    push(EntityKind::User, user.id());
                }
            }
        }
        EntityKind::User => {
            for place in store.load_all::<Place>()? {
                if place.host_id() == Some(id) {
                    push(EntityKind::Place, place.id());
                }
            }
            for review in store.load_all::<Review>()? {
                if review.user_id() == id {
                    push(EntityKind::Review, review.id());
                }
            }
        }
        EntityKind::Place => {
            for review in store.load_all::<Review>()? {
                if review.place_id() == id {
                    push(EntityKind::Review, review.id());
                }
            }
        }
        EntityKind::Amenity => {
            for place in store.load_all::<Place>()? {
                if place.amenity_ids().contains(&id) {
                    push(EntityKind::Place, place.id());
                }
            }
        }
        EntityKind::Review => {}
    }

    Ok(dependents.into_iter().collect())
}

/// Builds the write batch for deleting `kind`/`id`.
///
/// Returns `Ok(None)` when the target does not exist.
pub fn plan_delete<S: Store>(
    store: &S,
    kind: EntityKind,
    id: EntityId,
    mode: DeleteMode,
) -> DataResult<Option<Vec<WriteOp>>> {
    if store.load_record(kind, id)?.is_none() {
        return Ok(None);
    }

    if mode == DeleteMode::Block {
        let dependents = direct_dependents(store, kind, id)?;
        if !dependents.is_empty() {
            return Err(DataError::ReferentialIntegrity {
                kind,
                id,
                dependents,
            });
        }
    }

    let mut plan = CascadePlan::new(store);
    plan.remove(kind, id)?;
    let ops = plan.into_ops()?;
    debug!(
        "event=delete_plan module=integrity status=ok kind={} mode={:?} ops={}",
        kind,
        mode,
        ops.len()
    );
    Ok(Some(ops))
}

/// Accumulates removals and staged rewrites for one cascade.
struct CascadePlan<'s, S: Store> {
    store: &'s S,
    removed: BTreeSet<(EntityKind, EntityId)>,
    users: BTreeMap<EntityId, User>,
    places: BTreeMap<EntityId, Place>,
    amenities: BTreeMap<EntityId, Amenity>,
}

impl<'s, S: Store> CascadePlan<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            removed: BTreeSet::new(),
            users: BTreeMap::new(),
            places: BTreeMap::new(),
            amenities: BTreeMap::new(),
        }
    }

    fn remove(&mut self, kind: EntityKind, id: EntityId) -> DataResult<()> {
        if !self.removed.insert((kind, id)) {
            return Ok(());
        }

        if kind == EntityKind::Place {
            let amenity_ids: Vec<EntityId> = match self.stage_place(id)? {
                Some(place) => place.amenity_ids().iter().copied().collect(),
                None => Vec::new(),
            };
            for amenity_id in amenity_ids {
                if let Some(amenity) = self.stage_amenity(amenity_id)? {
                    amenity.detach_from(id);
                }
            }
        }

        for dependent in direct_dependents(self.store, kind, id)? {
            match (kind, dependent.kind) {
                (EntityKind::Country, EntityKind::User) => {
                    if let Some(user) = self.stage_user(dependent.id)? {
                        user.clear_country();
                    }
                }
                (EntityKind::City, EntityKind::User) => {
                    if let Some(user) = self.stage_user(dependent.id)? {
                        user.clear_city();
                    }
                }
                (EntityKind::Amenity, EntityKind::Place) => {
                    if let Some(place) = self.stage_place(dependent.id)? {
                        place.detach_amenity(id);
                    }
                }
                (_, dependent_kind) => self.remove(dependent_kind, dependent.id)?,
            }
        }
        Ok(())
    }

    fn stage_user(&mut self, id: EntityId) -> DataResult<Option<&mut User>> {
        stage(self.store, &mut self.users, id)
    }

    fn stage_place(&mut self, id: EntityId) -> DataResult<Option<&mut Place>> {
        stage(self.store, &mut self.places, id)
    }

    fn stage_amenity(&mut self, id: EntityId) -> DataResult<Option<&mut Amenity>> {
        stage(self.store, &mut self.amenities, id)
    }

    fn into_ops(self) -> DataResult<Vec<WriteOp>> {
        let mut ops: Vec<WriteOp> = self
            .removed
            .iter()
            .map(|(kind, id)| WriteOp::remove(*kind, *id))
            .collect();

        let removed = &self.removed;
        let kept = |kind: EntityKind, id: &EntityId| !removed.contains(&(kind, *id));
        for user in self.users.values().filter(|user| kept(User::KIND, &user.id())) {
            ops.push(WriteOp::put(user)?);
        }
        for place in self.places.values().filter(|place| kept(Place::KIND, &place.id())) {
            ops.push(WriteOp::put(place)?);
        }
        for amenity in self
            .amenities
            .values()
            .filter(|amenity| kept(Amenity::KIND, &amenity.id()))
        {
            ops.push(WriteOp::put(amenity)?);
        }
        Ok(ops)
    }
}

/// Loads `id` into `staged` on first use and hands out the staged copy.
fn stage<'m, S: Store, E: Entity>(
    store: &S,
    staged: &'m mut BTreeMap<EntityId, E>,
    id: EntityId,
) -> DataResult<Option<&'m mut E>> {
    if !staged.contains_key(&id) {
        match store.load::<E>(id)? {
            Some(entity) => {
                staged.insert(id, entity);
            }
            None => return Ok(None),
        }
    }
    Ok(staged.get_mut(&id))
}
