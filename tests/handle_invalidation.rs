use tether_ecs::prelude::*;

struct Health {
  owner: EntityHandle,
  hp: u32,
}

impl Component for Health {
  fn entity(&self) -> EntityHandle {
    self.owner.duplicate()
  }
}

#[test]
fn deleting_an_entity_invalidates_its_component_and_entity_handles() {
  let events = EventManager::new();
  let mut entities = EntityManager::new(events);

  let player = entities.create("player");
  let health = entities
    .get_mut(player.id())
    .unwrap()
    .assign::<Health>(|owner| Health { owner, hp: 10 });

  assert!(player.is_valid());
  assert!(health.is_valid());

  assert!(entities.delete(player.id()));

  assert!(!player.is_valid());
  assert!(!health.is_valid());
  assert!(matches!(health.get(), Err(EcsError::InvalidHandle)));
  assert!(matches!(player.get(), Err(EcsError::InvalidHandle)));
}
