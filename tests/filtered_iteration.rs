use tether_ecs::prelude::*;

struct A(EntityHandle);
impl Component for A {
  fn entity(&self) -> EntityHandle {
    self.0.duplicate()
  }
}

struct B(EntityHandle);
impl Component for B {
  fn entity(&self) -> EntityHandle {
    self.0.duplicate()
  }
}

struct C(EntityHandle);
impl Component for C {
  fn entity(&self) -> EntityHandle {
    self.0.duplicate()
  }
}

#[test]
fn with_respects_only_enabled() {
  let mut entities = EntityManager::new(EventManager::new());

  let e1 = entities.create("e1");
  entities.get_mut(e1.id()).unwrap().assign::<A>(A);
  entities.get_mut(e1.id()).unwrap().assign::<B>(B);

  let e2 = entities.create("e2");
  entities.get_mut(e2.id()).unwrap().assign::<A>(A);

  let e3 = entities.create("e3");
  entities.get_mut(e3.id()).unwrap().assign::<A>(A);
  entities.get_mut(e3.id()).unwrap().assign::<B>(B);
  entities.get_mut(e3.id()).unwrap().assign::<C>(C);

  let e4 = entities.create("e4");
  entities.get_mut(e4.id()).unwrap().assign::<A>(A);
  entities.get_mut(e4.id()).unwrap().assign::<B>(B);
  entities.get_mut(e4.id()).unwrap().set_enabled(false);

  let enabled_only: Vec<_> = entities
    .with::<(A, B)>(true)
    .into_iter()
    .map(|h| h.id())
    .collect();
  assert_eq!(enabled_only.len(), 2);
  assert!(enabled_only.contains(&e1.id()));
  assert!(enabled_only.contains(&e3.id()));

  let everyone: Vec<_> = entities
    .with::<(A, B)>(false)
    .into_iter()
    .map(|h| h.id())
    .collect();
  assert_eq!(everyone.len(), 3);
  assert!(everyone.contains(&e1.id()));
  assert!(everyone.contains(&e3.id()));
  assert!(everyone.contains(&e4.id()));
}
