use std::any::{Any, TypeId};
use std::collections::HashMap;

pub mod entity;
pub mod scheduler;

pub use entity::{Entity, EntityManager};
pub use scheduler::{Scheduler, System};

// Component trait definition
pub trait Component: 'static + Send + Sync {}

/// Macro to mark a struct as a component.
#[macro_export]
macro_rules! impl_component {
    ($component:ty) => {
        impl $crate::Component for $component {}
    };
}

// Generic component storage using Vec<Option<T>>, indexed by entity ID
#[derive(Debug)]
pub struct ComponentVec<T: Component> {
    data: Vec<Option<T>>,
}

impl<T: Component> Default for ComponentVec<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: Component> ComponentVec<T> {
    pub fn insert(&mut self, entity: Entity, component: T) {
        let entity_idx = entity.index();

        // Ensure the vector is large enough
        if entity_idx >= self.data.len() {
            self.data.resize_with(entity_idx + 1, || None);
        }

        self.data[entity_idx] = Some(component);
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.data.get(entity.index()).and_then(|opt| opt.as_ref())
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.data.get_mut(entity.index()).and_then(|opt| opt.as_mut())
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let entity_idx = entity.index();
        if entity_idx < self.data.len() {
            std::mem::take(&mut self.data[entity_idx])
        } else {
            None
        }
    }

    /// Access by raw storage slot, as yielded by `iter`. Callers that
    /// snapshot slot indices must not despawn entities mid-frame.
    pub fn get_index(&self, index: u32) -> Option<&T> {
        self.data.get(index as usize).and_then(|opt| opt.as_ref())
    }

    pub fn get_index_mut(&mut self, index: u32) -> Option<&mut T> {
        self.data.get_mut(index as usize).and_then(|opt| opt.as_mut())
    }

    /// Iterates over all entity indices that have this component.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_ref().map(|component| (idx as u32, component)))
    }

    /// Mutable iterator over all entity indices with this component.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_mut().map(|component| (idx as u32, component)))
    }

    pub fn len(&self) -> usize {
        self.data.iter().filter(|opt| opt.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|opt| opt.is_none())
    }
}

// Type-erased component storage container
#[derive(Default)]
pub struct ComponentStore {
    storages: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ComponentStore {
    pub fn storage<T: Component>(&self) -> Option<&ComponentVec<T>> {
        self.storages
            .get(&TypeId::of::<ComponentVec<T>>())
            .and_then(|boxed| boxed.downcast_ref::<ComponentVec<T>>())
    }

    pub fn storage_mut<T: Component>(&mut self) -> &mut ComponentVec<T> {
        let type_id = TypeId::of::<ComponentVec<T>>();
        self.storages
            .entry(type_id)
            .or_insert_with(|| Box::new(ComponentVec::<T>::default()))
            .downcast_mut::<ComponentVec<T>>()
            .expect("component storage type mismatch")
    }

    pub fn add<T: Component>(&mut self, entity: Entity, component: T) {
        self.storage_mut::<T>().insert(entity, component);
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>().and_then(|storage| storage.get(entity))
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>().get_mut(entity)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>().remove(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }
}

/// World stores entities, their components, and global resources.
#[derive(Default)]
pub struct World {
    pub components: ComponentStore,
    entity_manager: EntityManager,
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a new entity and return its identifier.
    pub fn spawn(&mut self) -> Entity {
        self.entity_manager.create()
    }

    /// Despawn an entity. Its components stay in place but the ID is
    /// invalidated; storages overwrite the slot when the ID is recycled.
    pub fn despawn(&mut self, entity: Entity) {
        self.entity_manager.delete(entity);
    }

    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entity_manager.is_valid(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entity_manager.entity_count()
    }

    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.components.add(entity, component);
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(entity)
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.components.remove(entity)
    }

    /// Read-only storage for a component type, if any component of that
    /// type was ever added.
    pub fn storage<T: Component>(&self) -> Option<&ComponentVec<T>> {
        self.components.storage::<T>()
    }

    pub fn storage_mut<T: Component>(&mut self) -> &mut ComponentVec<T> {
        self.components.storage_mut::<T>()
    }

    // --- Resources ---

    pub fn add_resource<T: 'static + Send + Sync>(&mut self, resource: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(resource));
    }

    pub fn get_resource<T: 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|res| res.downcast_ref::<T>())
    }

    pub fn get_resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|res| res.downcast_mut::<T>())
    }

    pub fn remove_resource<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|res| res.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl_component!(Position);

    #[derive(Debug, PartialEq)]
    struct Health {
        value: i32,
    }
    impl_component!(Health);

    struct NudgeSystem;

    impl System for NudgeSystem {
        fn run(&mut self, world: &mut World) {
            for (_, pos) in world.storage_mut::<Position>().iter_mut() {
                pos.x += 1.0;
            }
        }
    }

    #[test]
    fn world_and_scheduler() {
        let mut world = World::new();
        let e1 = world.spawn();
        world.add_component(e1, Position { x: 0.0, y: 0.0 });
        let e2 = world.spawn();
        world.add_component(e2, Position { x: 10.0, y: 5.0 });

        assert_eq!(world.get_component::<Position>(e1).unwrap().x, 0.0);
        assert_eq!(world.get_component::<Position>(e2).unwrap().x, 10.0);

        let mut scheduler = Scheduler::new();
        scheduler.add_system(NudgeSystem);
        scheduler.execute_once(&mut world);

        assert_eq!(world.get_component::<Position>(e1).unwrap().x, 1.0);
        assert_eq!(world.get_component::<Position>(e2).unwrap().x, 11.0);
    }

    #[test]
    fn multiple_component_types() {
        let mut world = World::new();
        let entity = world.spawn();

        world.add_component(entity, Health { value: 100 });
        world.add_component(entity, Position { x: 5.0, y: 10.0 });

        assert_eq!(world.get_component::<Health>(entity).unwrap().value, 100);
        assert_eq!(world.get_component::<Position>(entity).unwrap().x, 5.0);

        if let Some(health) = world.get_component_mut::<Health>(entity) {
            health.value -= 30;
        }

        assert_eq!(world.get_component::<Health>(entity).unwrap().value, 70);
    }

    #[test]
    fn resources_round_trip() {
        #[derive(Debug, PartialEq)]
        struct Gravity(f32);

        let mut world = World::new();
        world.add_resource(Gravity(-9.81));
        assert_eq!(world.get_resource::<Gravity>().unwrap().0, -9.81);

        world.get_resource_mut::<Gravity>().unwrap().0 = -1.62;
        assert_eq!(world.remove_resource::<Gravity>(), Some(Gravity(-1.62)));
        assert!(world.get_resource::<Gravity>().is_none());
    }
}
