//! Typed data attached to an [`Entity`](crate::entity::Entity), one instance
//! per concrete type per entity.

use downcast::{downcast, Any};

use crate::handle::EntityHandle;
use crate::id::Id;

/// A datum attached to exactly one entity.
///
/// Concrete component types are defined by client code. By convention a
/// component's constructor takes the owning entity's handle as its first
/// argument (see [`crate::entity::Entity::assign`]) and the component
/// publishes its own typed creation/destruction events; the crate itself
/// only guarantees the back-reference in [`Component::entity`] and the
/// [`ComponentDestroyed`] event emitted when [`Entity::remove`](crate::entity::Entity::remove)
/// or the owning entity's destruction tears it down.
pub trait Component: Any {
  /// A handle back to the entity this component is attached to.
  fn entity(&self) -> EntityHandle;
}
downcast!(dyn Component);

/// Published the instant a component of type `C` is torn down, whether by
/// an explicit [`Entity::remove`](crate::entity::Entity::remove), by
/// [`Entity::assign`](crate::entity::Entity::assign) replacing an existing
/// instance, or as part of destroying the owning entity.
///
/// Carries the owning entity's raw [`Id`], not a handle: constructing a
/// handle inside the listener that reacts to this event would immediately
/// observe its own referent as destroyed.
#[derive(Debug)]
pub struct ComponentDestroyed<C> {
  pub entity: Id,
  pub _marker: std::marker::PhantomData<fn() -> C>,
}

impl<C> ComponentDestroyed<C> {
  pub(crate) fn new(entity: Id) -> Self {
    Self {
      entity,
      _marker: std::marker::PhantomData,
    }
  }
}
