use tether_ecs::prelude::*;

#[test]
fn safe_delete_waits_for_apply_safe_delete() {
  let mut entities = EntityManager::new(EventManager::new());

  let a = entities.create("a");
  let b = entities.create("b");

  entities.safe_delete(a.id());
  assert!(a.is_valid(), "safe_delete must not take effect immediately");
  assert!(b.is_valid());

  entities.apply_safe_delete();
  assert!(!a.is_valid());
  assert!(b.is_valid(), "only the enqueued entity should be affected");
}

#[test]
fn apply_safe_delete_with_an_empty_queue_is_a_noop() {
  let mut entities = EntityManager::new(EventManager::new());
  let a = entities.create("a");

  entities.apply_safe_delete();
  assert!(a.is_valid());
}
