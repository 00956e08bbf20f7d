//! Owns every [`Entity`], and enforces their creation, lookup, and
//! (immediate or deferred) destruction.

use indexmap::IndexMap;

use crate::entity::{ComponentSet, Entity, EntityDestroyed};
use crate::error::EcsError;
use crate::event::EventManager;
use crate::handle::EntityHandle;
use crate::id::{Id, IdAllocator};

/// Owns all entities, keyed by [`Id`]. Also owns the id allocator for that
/// key space (independent of the one embedded in [`EventManager`]) and the
/// deferred-deletion queue drained by [`EntityManager::apply_safe_delete`].
///
/// Holds a clone of the [`EventManager`] the application constructed the
/// manager with — every entity it creates gets a clone of the same clone,
/// so creation/destruction events and any handle a client mints all share
/// one bus.
pub struct EntityManager {
  ids: IdAllocator,
  entities: IndexMap<Id, Entity>,
  deferred: Vec<Id>,
  events: EventManager,
}

impl EntityManager {
  pub fn new(events: EventManager) -> Self {
    Self {
      ids: IdAllocator::new(),
      entities: IndexMap::new(),
      deferred: Vec::new(),
      events,
    }
  }

  /// The event bus every entity created by this manager shares.
  pub fn events(&self) -> &EventManager {
    &self.events
  }

  /// Allocates an id, constructs the entity (publishing `EntityCreated`),
  /// registers it, and returns a handle to it.
  pub fn create(&mut self, name: impl Into<String>) -> EntityHandle {
    let id = self.ids.alloc();
    let entity = Entity::new(id, name, self.events.clone());
    let handle = entity.handle();
    let collided = self.entities.insert(id, entity);
    debug_assert!(collided.is_none(), "freshly allocated id collided with a live entity");
    handle
  }

  /// Inserts an already-constructed entity, failing if its id is already
  /// registered. Internal-invariant path: the public API never constructs
  /// an `Entity` outside of [`create`](Self::create), so this should be
  /// unreachable unless a caller bypasses the manager.
  pub(crate) fn register(&mut self, entity: Entity) -> Result<(), EcsError> {
    let id = entity.id();
    if self.entities.contains_key(&id) {
      return Err(EcsError::EntityAlreadyRegistered(id));
    }
    self.entities.insert(id, entity);
    Ok(())
  }

  /// Immediately destroys the entity: its components first (each
  /// publishing its own typed destruction event), then the entity itself
  /// (publishing `EntityDestroyed`). Returns whether an entity with this id
  /// existed. The id is returned to the free list either way it existed.
  pub fn delete(&mut self, id: Id) -> bool {
    match self.entities.shift_remove(&id) {
      Some(mut entity) => {
        entity.destroy_components();
        self.events.emit(&EntityDestroyed { id });
        self.ids.release(id);
        tracing::debug!(id = id.value(), "entity deleted");
        true
      }
      None => false,
    }
  }

  /// Enqueues `id` for destruction at the next [`apply_safe_delete`](Self::apply_safe_delete).
  /// Enqueuing the same id more than once is allowed; draining is
  /// idempotent regardless.
  pub fn safe_delete(&mut self, id: Id) {
    self.deferred.push(id);
  }

  /// Drains the deferred-deletion queue, calling [`delete`](Self::delete)
  /// on each id in order. Unknown ids (already deleted, or never valid)
  /// are silently ignored, same as a direct `delete` would.
  pub fn apply_safe_delete(&mut self) {
    let queue = std::mem::take(&mut self.deferred);
    for id in queue {
      self.delete(id);
    }
  }

  /// Repeatedly deletes the first entity whose `kept` flag is false, until
  /// none remain. Entities with `kept == true` survive.
  pub fn delete_all(&mut self) {
    loop {
      let next = self
        .entities
        .iter()
        .find(|(_, e)| !e.kept())
        .map(|(id, _)| *id);
      match next {
        Some(id) => {
          self.delete(id);
        }
        None => break,
      }
    }
  }

  /// An invalid handle if `id` isn't currently registered.
  pub fn by_id(&self, id: Id) -> EntityHandle {
    self
      .entities
      .get(&id)
      .map(Entity::handle)
      .unwrap_or_else(EntityHandle::invalid)
  }

  /// The first entity (in registration order) named `name`, or an invalid
  /// handle if none match.
  pub fn by_name(&self, name: &str, only_enabled: bool) -> EntityHandle {
    self
      .entities
      .values()
      .find(|e| e.name() == name && (!only_enabled || e.enabled()))
      .map(Entity::handle)
      .unwrap_or_else(EntityHandle::invalid)
  }

  pub fn all_by_name(&self, name: &str, only_enabled: bool) -> Vec<EntityHandle> {
    self
      .entities
      .values()
      .filter(|e| e.name() == name && (!only_enabled || e.enabled()))
      .map(Entity::handle)
      .collect()
  }

  /// Every entity whose component set is a superset of `S`, e.g.
  /// `manager.with::<(Position, Velocity)>(true)`.
  pub fn with<S: ComponentSet>(&self, only_enabled: bool) -> Vec<EntityHandle> {
    self
      .entities
      .values()
      .filter(|e| (!only_enabled || e.enabled()) && S::all_present(e))
      .map(Entity::handle)
      .collect()
  }

  pub fn for_each(&self, only_enabled: bool, mut f: impl FnMut(EntityHandle)) {
    for e in self.entities.values() {
      if !only_enabled || e.enabled() {
        f(e.handle());
      }
    }
  }

  /// [`EntityManager::for_each`] additionally filtered to, and handed, a
  /// component set `S`.
  pub fn for_each_with<S: ComponentSet>(
    &self,
    only_enabled: bool,
    mut f: impl FnMut(EntityHandle, S::Handles),
  ) {
    for e in self.entities.values() {
      if (!only_enabled || e.enabled()) && S::all_present(e) {
        f(e.handle(), S::handles(e));
      }
    }
  }

  pub fn get(&self, id: Id) -> Option<&Entity> {
    self.entities.get(&id)
  }

  pub fn get_mut(&mut self, id: Id) -> Option<&mut Entity> {
    self.entities.get_mut(&id)
  }

  pub fn len(&self) -> usize {
    self.entities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entities.is_empty()
  }
}

impl Drop for EntityManager {
  /// Destroys every remaining entity through the normal `delete` path, so
  /// handles that outlive the manager see the same destruction events they
  /// would have from an explicit `delete_all`. (Once this returns, the
  /// manager's `EventManager` clone may still be kept alive by some other
  /// clone held elsewhere — only the entities stop existing, not the bus.)
  fn drop(&mut self) {
    let ids: Vec<Id> = self.entities.keys().copied().collect();
    for id in ids {
      self.delete(id);
    }
  }
}

impl std::fmt::Debug for EntityManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EntityManager")
      .field("count", &self.entities.len())
      .field("deferred", &self.deferred.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::handle::EntityHandle as Handle;

  #[test]
  fn create_registers_an_empty_entity() {
    let mut mgr = EntityManager::new(EventManager::new());
    let handle = mgr.create("a");
    assert!(handle.is_valid());
    assert_eq!(mgr.by_id(handle.id()).id(), handle.id());
    assert_eq!(mgr.get(handle.id()).unwrap().name(), "a");
  }

  #[test]
  fn delete_invalidates_handles_and_frees_the_id() {
    let mut mgr = EntityManager::new(EventManager::new());
    let handle = mgr.create("a");
    let id = handle.id();

    assert!(mgr.delete(id));
    assert!(!handle.is_valid());
    assert!(!mgr.by_id(id).is_valid());
  }

  #[test]
  fn delete_on_unknown_id_returns_false() {
    let mut mgr = EntityManager::new(EventManager::new());
    assert!(!mgr.delete(Id::INVALID));
  }

  #[test]
  fn safe_delete_is_deferred() {
    let mut mgr = EntityManager::new(EventManager::new());
    let a = mgr.create("a");
    let b = mgr.create("b");

    mgr.safe_delete(a.id());
    assert!(mgr.by_id(a.id()).is_valid());

    mgr.apply_safe_delete();
    assert!(!mgr.by_id(a.id()).is_valid());
    assert!(mgr.by_id(b.id()).is_valid());
  }

  #[test]
  fn apply_safe_delete_twice_is_idempotent() {
    let mut mgr = EntityManager::new(EventManager::new());
    let a = mgr.create("a");
    mgr.safe_delete(a.id());
    mgr.apply_safe_delete();
    mgr.apply_safe_delete();
    assert!(!mgr.by_id(a.id()).is_valid());
  }

  #[test]
  fn round_trip_reuses_ids_in_fifo_order() {
    let mut mgr = EntityManager::new(EventManager::new());
    let a = mgr.create("a").id();
    let b = mgr.create("b").id();
    mgr.delete(a);
    mgr.delete(b);
    assert!(mgr.is_empty());

    let c = mgr.create("c").id();
    let d = mgr.create("d").id();
    assert_eq!(c, a);
    assert_eq!(d, b);
  }

  #[test]
  fn by_name_respects_only_enabled() {
    let mut mgr = EntityManager::new(EventManager::new());
    let h = mgr.create("dup");
    mgr.create("dup");
    mgr.get_mut(h.id()).unwrap().set_enabled(false);

    assert!(mgr.by_name("dup", true).is_valid());
    assert_ne!(mgr.by_name("dup", true).id(), h.id());
    assert!(mgr.by_name("dup", false).is_valid());
    assert_eq!(mgr.all_by_name("dup", false).len(), 2);
  }

  #[test]
  fn delete_all_skips_kept_entities() {
    let mut mgr = EntityManager::new(EventManager::new());
    let kept = mgr.create("kept");
    mgr.create("gone");
    mgr.get_mut(kept.id()).unwrap().set_kept(true);

    mgr.delete_all();
    assert_eq!(mgr.len(), 1);
    assert!(mgr.by_id(kept.id()).is_valid());
  }

  #[test]
  fn register_rejects_a_duplicate_id() {
    let events = EventManager::new();
    let mut mgr = EntityManager::new(events.clone());
    let handle = mgr.create("a");
    let dup = Entity::new(handle.id(), "a-again", events);

    let err = mgr.register(dup).unwrap_err();
    assert!(matches!(err, EcsError::EntityAlreadyRegistered(id) if id == handle.id()));
  }

  #[test]
  fn dropping_the_manager_destroys_outstanding_entities() {
    let events = EventManager::new();
    let handle: Handle;
    {
      let mut mgr = EntityManager::new(events.clone());
      handle = mgr.create("transient");
      assert!(handle.is_valid());
    }
    assert!(!handle.is_valid());
  }
}
