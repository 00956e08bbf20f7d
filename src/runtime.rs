//! The facade aggregator bundling the three managers, plus the process-wide
//! lazily-initialized accessor built on top of it.

use std::cell::RefCell;

use crate::entity_manager::EntityManager;
use crate::event::EventManager;
use crate::system_manager::SystemManager;

/// Bundles the event, entity, and system managers that make up one ECS
/// world. An application is free to construct as many of these as it
/// likes — [`global`] is a convenience for the common case of exactly one,
/// not the only way to get at a `Runtime`.
pub struct Runtime {
  pub events: EventManager,
  pub entities: EntityManager,
  pub systems: SystemManager,
}

impl Runtime {
  pub fn new() -> Self {
    let events = EventManager::new();
    let entities = EntityManager::new(events.clone());
    let systems = SystemManager::new();
    Self {
      events,
      entities,
      systems,
    }
  }

  /// Advances the system lifecycle engine by one tick. Entity/component
  /// destruction and handle invalidation already happen synchronously as
  /// part of [`EntityManager`] calls, so this is the only per-frame driver
  /// call an application needs.
  pub fn tick(&mut self) {
    self.systems.tick();
  }
}

impl Default for Runtime {
  fn default() -> Self {
    Self::new()
  }
}

// `EventManager` is `Rc`-backed, so `Runtime` is not `Send`/`Sync` — exactly
// matching §5's "single-threaded cooperative" scheduling model, where
// callers must not invoke manager operations from multiple threads
// concurrently. A `thread_local!` singleton expresses that constraint
// directly, rather than reaching for a `Mutex` that would only paper over
// it (the design notes call out that a coarse lock is optional, not a
// substitute for single-threaded discipline).
thread_local! {
  static GLOBAL: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Runs `f` against the process-wide (really: this-thread-wide) [`Runtime`],
/// lazily constructing it on first access. Collapsed into one call, rather
/// than three separate per-manager singleton getters, because
/// [`EntityManager`] operations need simultaneous access to the shared
/// [`EventManager`] anyway (see `DESIGN.md`).
pub fn global<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
  GLOBAL.with(|cell| {
    let mut slot = cell.borrow_mut();
    let runtime = slot.get_or_insert_with(Runtime::new);
    f(runtime)
  })
}

/// Tears down the thread's global [`Runtime`] (if one was ever created),
/// running the same destructor sequence dropping it normally would. Exposed
/// mainly for tests that want a clean slate between cases without
/// depending on thread-local destructor ordering.
pub fn reset_global() {
  GLOBAL.with(|cell| {
    cell.borrow_mut().take();
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn global_is_lazily_initialized_and_reused() {
    reset_global();
    let first_id = global(|rt| rt.entities.create("a").id());
    let second_id = global(|rt| rt.by_id_is_same(first_id));
    assert!(second_id);
    reset_global();
  }

  trait TestExt {
    fn by_id_is_same(&self, id: crate::id::Id) -> bool;
  }

  impl TestExt for Runtime {
    fn by_id_is_same(&self, id: crate::id::Id) -> bool {
      self.entities.by_id(id).id() == id
    }
  }
}
