//! Self-invalidating references to entities and components.
//!
//! A handle does not borrow from the manager that owns its referent. Instead
//! it subscribes, at construction, to the destruction event of whatever it
//! points at; the listener clears the handle's referent when that event
//! fires, and `Drop` deregisters the listener. This is why a handle can
//! outlive the thing it once pointed to without becoming a dangling
//! reference: it just becomes invalid.
//!
//! The referent lives behind an `Rc<Cell<Id>>` rather than inline in the
//! handle struct. The listener closure registered with the [`EventManager`]
//! needs somewhere stable to write to, and a handle is an ordinary movable
//! Rust value (pushed into a `Vec`, returned by value, reallocated...); the
//! `Rc` gives the closure a heap address that stays put no matter where the
//! handle struct itself is relocated to. The handle also keeps a clone of
//! the [`EventManager`] it registered with, so it can deregister its
//! listener from `Drop` without needing an external reference threaded back
//! in — `Drop::drop` takes no extra arguments, so that reference has to
//! already be owned by the value being dropped.
//!
//! Rust has no operator overloading for plain assignment, so the distinction
//! between "copy construction" (register a fresh listener) and "copy
//! assignment" (copy the referent only, keep the existing listener) is
//! expressed here as two explicit methods, [`EntityHandle::duplicate`] and
//! [`EntityHandle::copy_referent_from`], rather than overloaded operators or
//! a single blanket `Clone` impl.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::component::ComponentDestroyed;
use crate::entity::EntityDestroyed;
use crate::error::EcsError;
use crate::event::EventManager;
use crate::id::Id;

/// A non-owning, self-invalidating reference to an entity.
///
/// Deliberately not `Clone`: a plain `.clone()` would be ambiguous between
/// the two copy semantics described above. Call
/// [`duplicate`](Self::duplicate) or [`copy_referent_from`](Self::copy_referent_from)
/// explicitly instead.
#[derive(Debug)]
pub struct EntityHandle {
  referent: Rc<Cell<Id>>,
  events: EventManager,
  listener: Id,
}

impl EntityHandle {
  /// An always-invalid handle, registered to nothing.
  pub fn invalid() -> Self {
    Self {
      referent: Rc::new(Cell::new(Id::INVALID)),
      events: EventManager::new(),
      listener: Id::INVALID,
    }
  }

  /// Builds a handle to `entity`, registering a listener on `events` that
  /// clears this handle when `entity` is destroyed.
  pub(crate) fn new(entity: Id, events: &EventManager) -> Self {
    let referent = Rc::new(Cell::new(entity));
    let target = referent.clone();
    let listener = events.add_listener::<EntityDestroyed>(move |ev| {
      if ev.id == entity {
        target.set(Id::INVALID);
      }
    });
    Self {
      referent,
      events: events.clone(),
      listener,
    }
  }

  /// Whether this handle currently refers to a live entity.
  pub fn is_valid(&self) -> bool {
    self.referent.get().is_valid()
  }

  /// The id this handle refers to, or [`Id::INVALID`] if it's been
  /// invalidated.
  pub fn id(&self) -> Id {
    self.referent.get()
  }

  /// Returns the referenced id, or [`EcsError::InvalidHandle`].
  pub fn get(&self) -> Result<Id, EcsError> {
    let id = self.referent.get();
    if id.is_valid() {
      Ok(id)
    } else {
      Err(EcsError::InvalidHandle)
    }
  }

  /// Builds a new handle to the same referent, registering a fresh
  /// listener.
  pub fn duplicate(&self) -> Self {
    Self::new(self.referent.get(), &self.events)
  }

  /// Copies `other`'s referent into `self`, without touching either
  /// handle's listener registration.
  pub fn copy_referent_from(&self, other: &Self) {
    self.referent.set(other.referent.get());
  }
}

impl Drop for EntityHandle {
  fn drop(&mut self) {
    self.events.remove_listener(self.listener);
  }
}

impl PartialEq for EntityHandle {
  fn eq(&self, other: &Self) -> bool {
    match (self.is_valid(), other.is_valid()) {
      (false, false) => true,
      (true, true) => self.referent.get() == other.referent.get(),
      _ => false,
    }
  }
}

impl Eq for EntityHandle {}

/// A non-owning, self-invalidating reference to a component of concrete
/// type `C` attached to some entity.
#[derive(Debug)]
pub struct ComponentHandle<C> {
  entity: Rc<Cell<Id>>,
  events: EventManager,
  listener: Id,
  _marker: PhantomData<fn() -> C>,
}

impl<C: 'static> ComponentHandle<C> {
  pub fn invalid() -> Self {
    Self {
      entity: Rc::new(Cell::new(Id::INVALID)),
      events: EventManager::new(),
      listener: Id::INVALID,
      _marker: PhantomData,
    }
  }

  pub(crate) fn new(entity: Id, events: &EventManager) -> Self {
    let cell = Rc::new(Cell::new(entity));
    let target = cell.clone();
    let listener = events.add_listener::<ComponentDestroyed<C>>(move |ev| {
      if ev.entity == entity {
        target.set(Id::INVALID);
      }
    });
    Self {
      entity: cell,
      events: events.clone(),
      listener,
      _marker: PhantomData,
    }
  }

  pub fn is_valid(&self) -> bool {
    self.entity.get().is_valid()
  }

  /// The owning entity's id, or [`Id::INVALID`] if this handle has been
  /// invalidated.
  pub fn entity_id(&self) -> Id {
    self.entity.get()
  }

  pub fn get(&self) -> Result<Id, EcsError> {
    let id = self.entity.get();
    if id.is_valid() {
      Ok(id)
    } else {
      Err(EcsError::InvalidHandle)
    }
  }

  pub fn duplicate(&self) -> Self {
    Self::new(self.entity.get(), &self.events)
  }

  pub fn copy_referent_from(&self, other: &Self) {
    self.entity.set(other.entity.get());
  }
}

impl<C: 'static> Drop for ComponentHandle<C> {
  fn drop(&mut self) {
    self.events.remove_listener(self.listener);
  }
}

impl<C> PartialEq for ComponentHandle<C> {
  fn eq(&self, other: &Self) -> bool {
    match (self.is_valid(), other.is_valid()) {
      (false, false) => true,
      (true, true) => self.entity.get() == other.entity.get(),
      _ => false,
    }
  }
}

impl<C> Eq for ComponentHandle<C> {}
