//! A named, identified holder of components.

use ahash::AHashMap;

use crate::component::{Component, ComponentDestroyed};
use crate::event::EventManager;
use crate::handle::{ComponentHandle, EntityHandle};
use crate::id::Id;
use crate::TypeKey;

/// Published when an [`Entity`] is constructed, i.e. by
/// [`crate::entity_manager::EntityManager::create`].
#[derive(Debug)]
pub struct EntityCreated {
  pub entity: EntityHandle,
}

/// Published the instant an entity is torn down, after all of its
/// components have already published their own [`ComponentDestroyed`]
/// events.
///
/// Carries the raw [`Id`], not a handle: constructing an [`EntityHandle`]
/// inside a listener reacting to this event would observe its own referent
/// as already destroyed the moment it's built.
#[derive(Debug)]
pub struct EntityDestroyed {
  pub id: Id,
}

/// A type-erased per-component-type entry. The `emit_destroyed` function
/// pointer is captured monomorphized over the concrete component type at
/// [`Entity::assign`] time — it's the only way to recover "what type is
/// this" once the component is behind `Box<dyn Component>`, needed so a
/// cascading entity destruction can still publish a correctly-typed
/// [`ComponentDestroyed<C>`] for every component it tears down.
struct Slot {
  component: Box<dyn Component>,
  emit_destroyed: fn(&EventManager, Id),
}

fn emit_destroyed<C: Component>(events: &EventManager, entity: Id) {
  events.emit(&ComponentDestroyed::<C>::new(entity));
}

/// A named, identified holder of components.
///
/// Created and destroyed only by [`crate::entity_manager::EntityManager`];
/// client code reaches an `Entity` only through a `&Entity`/`&mut Entity`
/// borrow handed out by the manager, never by constructing one directly.
pub struct Entity {
  id: Id,
  name: String,
  enabled: bool,
  kept: bool,
  components: AHashMap<TypeKey, Slot>,
  events: EventManager,
}

impl Entity {
  pub(crate) fn new(id: Id, name: impl Into<String>, events: EventManager) -> Self {
    let entity = Self {
      id,
      name: name.into(),
      enabled: true,
      kept: false,
      components: AHashMap::new(),
      events: events.clone(),
    };
    let handle = EntityHandle::new(id, &events);
    tracing::debug!(id = id.value(), name = entity.name.as_str(), "entity created");
    events.emit(&EntityCreated { entity: handle });
    entity
  }

  pub fn id(&self) -> Id {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  pub fn kept(&self) -> bool {
    self.kept
  }

  pub fn set_kept(&mut self, kept: bool) {
    self.kept = kept;
  }

  /// A handle to this entity. Cheap to call repeatedly; each call mints a
  /// fresh listener registration (see [`EntityHandle::duplicate`]).
  pub fn handle(&self) -> EntityHandle {
    EntityHandle::new(self.id, &self.events)
  }

  /// Returns a valid handle to this entity's `C` component if present,
  /// otherwise an invalid handle.
  pub fn get<C: Component>(&self) -> ComponentHandle<C> {
    if self.has::<C>() {
      ComponentHandle::new(self.id, &self.events)
    } else {
      ComponentHandle::invalid()
    }
  }

  /// Component-wise [`Entity::get`] over a tuple of component types, e.g.
  /// `entity.get_many::<(Position, Velocity)>()`.
  pub fn get_many<S: ComponentSet>(&self) -> S::Handles {
    S::handles(self)
  }

  pub fn has<C: Component>(&self) -> bool {
    self.components.contains_key(&TypeKey::of::<C>())
  }

  /// Conjunction of [`Entity::has`] over a tuple of component types, e.g.
  /// `entity.has_all::<(Position, Velocity)>()`.
  pub fn has_all<S: ComponentSet>(&self) -> bool {
    S::all_present(self)
  }

  /// Constructs a new `C` via `build`, which receives a handle to this
  /// entity so the component can reach back to its owner, and installs it.
  /// If a `C` is already attached, it is destroyed first (publishing its
  /// destruction event) before the new one is installed.
  pub fn assign<C: Component>(&mut self, build: impl FnOnce(EntityHandle) -> C) -> ComponentHandle<C> {
    self.remove::<C>();
    let owner = EntityHandle::new(self.id, &self.events);
    let component = build(owner);
    self.components.insert(
      TypeKey::of::<C>(),
      Slot {
        component: Box::new(component),
        emit_destroyed: emit_destroyed::<C>,
      },
    );
    tracing::debug!(
      id = self.id.value(),
      component = std::any::type_name::<C>(),
      "component assigned"
    );
    ComponentHandle::new(self.id, &self.events)
  }

  /// Destroys and erases the `C` component, publishing its destruction
  /// event. Returns whether one was present.
  pub fn remove<C: Component>(&mut self) -> bool {
    if self.components.remove(&TypeKey::of::<C>()).is_some() {
      self.events.emit(&ComponentDestroyed::<C>::new(self.id));
      true
    } else {
      false
    }
  }

  /// Tears down every attached component, each publishing its own typed
  /// [`ComponentDestroyed`] event, in no particular order. Called by
  /// [`crate::entity_manager::EntityManager::delete`] immediately before it
  /// publishes [`EntityDestroyed`] for this entity.
  pub(crate) fn destroy_components(&mut self) {
    for (_key, slot) in self.components.drain() {
      (slot.emit_destroyed)(&self.events, self.id);
      drop(slot.component);
    }
  }
}

impl std::fmt::Debug for Entity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Entity")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("enabled", &self.enabled)
      .field("kept", &self.kept)
      .field("component_count", &self.components.len())
      .finish()
  }
}

/// A tuple of [`Component`] types usable as a generic argument for
/// multi-component queries (`entity.get_many::<(A, B)>()`, etc.), standing
/// in for the variadic generics Rust doesn't have. Implemented for a bare
/// `C: Component` (the single-component case) and for tuples up to arity 8
/// via [`impl_component_set`].
pub trait ComponentSet {
  type Handles;

  #[doc(hidden)]
  fn all_present(entity: &Entity) -> bool;
  #[doc(hidden)]
  fn handles(entity: &Entity) -> Self::Handles;
}

impl<C: Component> ComponentSet for C {
  type Handles = ComponentHandle<C>;

  fn all_present(entity: &Entity) -> bool {
    entity.has::<C>()
  }

  fn handles(entity: &Entity) -> Self::Handles {
    entity.get::<C>()
  }
}

macro_rules! impl_component_set {
  ($($t:ident),+) => {
    impl<$($t: Component),+> ComponentSet for ($($t,)+) {
      type Handles = ($(ComponentHandle<$t>,)+);

      fn all_present(entity: &Entity) -> bool {
        $(entity.has::<$t>())&&+
      }

      fn handles(entity: &Entity) -> Self::Handles {
        ($(entity.get::<$t>(),)+)
      }
    }
  };
}

impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
  use super::*;

  /// A real, allocated id, since handle validity is keyed on the entity
  /// id — `Id::INVALID` would make every handle built against it read as
  /// invalid regardless of whether its referent is actually alive.
  fn test_id() -> Id {
    crate::id::IdAllocator::new().alloc()
  }

  struct Health {
    owner: EntityHandle,
    hp: u32,
  }

  impl Component for Health {
    fn entity(&self) -> EntityHandle {
      self.owner.duplicate()
    }
  }

  struct Name(String);

  impl Component for Name {
    fn entity(&self) -> EntityHandle {
      EntityHandle::invalid()
    }
  }

  #[test]
  fn fresh_entity_has_no_components() {
    let events = EventManager::new();
    let entity = Entity::new(test_id(), "nobody", events);
    assert!(!entity.has::<Health>());
  }

  #[test]
  fn assign_then_get_round_trips() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    entity.assign::<Health>(|owner| Health { owner, hp: 10 });

    assert!(entity.has::<Health>());
    let handle = entity.get::<Health>();
    assert!(handle.is_valid());
  }

  #[test]
  fn remove_invalidates_outstanding_handle() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    entity.assign::<Health>(|owner| Health { owner, hp: 10 });
    let handle = entity.get::<Health>();

    assert!(entity.remove::<Health>());
    assert!(!entity.has::<Health>());
    assert!(!handle.is_valid());
  }

  #[test]
  fn remove_on_absent_component_returns_false() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    assert!(!entity.remove::<Health>());
  }

  #[test]
  fn reassign_destroys_the_old_instance_first() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    entity.assign::<Health>(|owner| Health { owner, hp: 10 });
    let first = entity.get::<Health>();

    entity.assign::<Health>(|owner| Health { owner, hp: 99 });
    assert!(!first.is_valid());
    assert!(entity.has::<Health>());
  }

  #[test]
  fn has_all_and_get_many_over_tuples() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    entity.assign::<Health>(|owner| Health { owner, hp: 10 });
    entity.assign::<Name>(|_| Name("player".into()));

    assert!(entity.has_all::<(Health, Name)>());
    let (health, name) = entity.get_many::<(Health, Name)>();
    assert!(health.is_valid());
    assert!(name.is_valid());
  }

  #[test]
  fn destroy_components_publishes_a_typed_event_per_component() {
    let events = EventManager::new();
    let mut entity = Entity::new(test_id(), "player", events);
    entity.assign::<Health>(|owner| Health { owner, hp: 10 });
    let handle = entity.get::<Health>();

    entity.destroy_components();
    assert!(!handle.is_valid());
  }
}
