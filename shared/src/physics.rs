use serde::{Deserialize, Serialize};

use crate::world::{Entity, EntityKind, EntityStore, Rect};

/// Subdivision of one tick's displacement into bounded increments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPlan {
    pub steps: u32,
    pub increment_x: f64,
    pub increment_y: f64,
}

/// Engine-wide tunables plus the collision and gravity helpers rules use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsEngine {
    pub gravity: f64,
    pub pixels_per_meter: f64,
    pub max_step_pixels: f64,
}

impl PhysicsEngine {
    pub fn new(gravity: f64, pixels_per_meter: f64, max_step_pixels: f64) -> Self {
        Self {
            gravity,
            pixels_per_meter,
            max_step_pixels,
        }
    }

    pub fn check_collision(a: &Rect, b: &Rect) -> bool {
        a.intersects(b)
    }

    /// Whether `rect`, placed for the entity called `name`, overlaps any other entity.
    pub fn check_collisions_at(&self, name: &str, rect: &Rect, store: &EntityStore) -> bool {
        store
            .iter()
            .any(|other| other.name() != name && Self::check_collision(rect, &other.rect))
    }

    pub fn check_collisions(&self, entity: &Entity, store: &EntityStore) -> bool {
        self.check_collisions_at(entity.name(), &entity.rect, store)
    }

    pub fn check_collisions_with_kind(
        &self,
        kind: EntityKind,
        entity: &Entity,
        store: &EntityStore,
    ) -> bool {
        store.iter().any(|other| {
            other.kind() == kind
                && other.name() != entity.name()
                && Self::check_collision(&entity.rect, &other.rect)
        })
    }

    pub fn out_of_bounds(&self, rect: &Rect, store: &EntityStore) -> bool {
        !store.bounds().contains(rect)
    }

    /// A candidate position is blocked if it leaves the world or overlaps another entity.
    pub fn is_blocked(&self, name: &str, rect: &Rect, store: &EntityStore) -> bool {
        self.out_of_bounds(rect, store) || self.check_collisions_at(name, rect, store)
    }

    /// Moves the entity by its vertical velocity, then accelerates it downwards.
    pub fn apply_gravity(&self, entity: &mut Entity, dt: f64) {
        entity.rect.y -= entity.motion.dy * self.pixels_per_meter * dt;
        self.apply_gravity_velocity(entity, dt);
    }

    pub fn apply_gravity_velocity(&self, entity: &mut Entity, dt: f64) {
        entity.motion.dy -= self.gravity * dt;
    }

    pub fn plan(&self, move_x: f64, move_y: f64) -> StepPlan {
        let distance = move_x.abs().max(move_y.abs());
        if distance == 0.0 {
            return StepPlan {
                steps: 0,
                increment_x: 0.0,
                increment_y: 0.0,
            };
        }

        let steps = if self.max_step_pixels > 0.0 {
            (distance / self.max_step_pixels).ceil().max(1.0) as u32
        } else {
            1
        };

        StepPlan {
            steps,
            increment_x: move_x / steps as f64,
            increment_y: move_y / steps as f64,
        }
    }
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(15.0, 64.0, 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockId;
    use assert_approx_eq::assert_approx_eq;

    fn entity(name: &str, kind: EntityKind, x: f64, y: f64) -> Entity {
        Entity::new(name, kind, Rect::new(x, y, 50.0, 50.0), ClockId::ROOT)
    }

    #[test]
    fn test_collision_is_symmetric() {
        let boxes = [
            Rect::new(0.0, 0.0, 50.0, 50.0),
            Rect::new(25.0, 25.0, 50.0, 50.0),
            Rect::new(50.0, 0.0, 50.0, 50.0),
            Rect::new(-10.0, 40.0, 20.0, 5.0),
            Rect::new(100.0, 100.0, 1.0, 1.0),
            Rect::new(0.0, 0.0, 800.0, 10.0),
        ];

        for a in &boxes {
            for b in &boxes {
                assert_eq!(
                    PhysicsEngine::check_collision(a, b),
                    PhysicsEngine::check_collision(b, a)
                );
            }
        }
    }

    #[test]
    fn test_check_collisions_ignores_self() {
        let physics = PhysicsEngine::default();
        let mut store = EntityStore::default();
        store.add(entity("a", EntityKind::Player, 0.0, 0.0));
        store.add(entity("b", EntityKind::Fixed, 200.0, 0.0));

        let a = store.get("a").unwrap();
        assert!(!physics.check_collisions(a, &store));

        store.add(entity("c", EntityKind::Fixed, 25.0, 25.0));
        let a = store.get("a").unwrap();
        assert!(physics.check_collisions(a, &store));
    }

    #[test]
    fn test_check_collisions_with_kind() {
        let physics = PhysicsEngine::default();
        let mut store = EntityStore::default();
        store.add(entity("a", EntityKind::Player, 0.0, 0.0));
        store.add(entity("wall", EntityKind::Fixed, 25.0, 0.0));

        let a = store.get("a").unwrap();
        assert!(physics.check_collisions_with_kind(EntityKind::Fixed, a, &store));
        assert!(!physics.check_collisions_with_kind(EntityKind::Platform, a, &store));
    }

    #[test]
    fn test_out_of_bounds() {
        let physics = PhysicsEngine::default();
        let store = EntityStore::default();
        assert!(!physics.out_of_bounds(&Rect::new(750.0, 0.0, 50.0, 50.0), &store));
        assert!(physics.out_of_bounds(&Rect::new(751.0, 0.0, 50.0, 50.0), &store));
        assert!(physics.is_blocked("x", &Rect::new(0.0, 560.0, 50.0, 50.0), &store));
    }

    #[test]
    fn test_apply_gravity() {
        let physics = PhysicsEngine::new(0.05, 16.0, 20.0);
        let mut body = entity("p", EntityKind::Player, 0.0, 100.0);
        body.motion.dy = 1.0;

        physics.apply_gravity(&mut body, 2.0);
        assert_approx_eq!(body.rect.y, 68.0);
        assert_approx_eq!(body.motion.dy, 0.9);

        physics.apply_gravity_velocity(&mut body, 10.0);
        assert_approx_eq!(body.motion.dy, 0.4);
        assert_approx_eq!(body.rect.y, 68.0);
    }

    #[test]
    fn test_plan_bounds_each_step() {
        let physics = PhysicsEngine::new(0.05, 16.0, 20.0);

        for (mx, my) in [(0.5, 0.0), (20.0, 0.0), (21.0, -3.0), (-95.0, 40.0), (0.0, 400.0)] {
            let plan = physics.plan(mx, my);
            assert!(plan.steps >= 1);
            assert!(plan.increment_x.abs() <= physics.max_step_pixels + 1e-9);
            assert!(plan.increment_y.abs() <= physics.max_step_pixels + 1e-9);
            assert_approx_eq!(plan.increment_x * plan.steps as f64, mx);
            assert_approx_eq!(plan.increment_y * plan.steps as f64, my);
        }

        assert_eq!(physics.plan(21.0, 0.0).steps, 2);
        assert_eq!(physics.plan(0.0, 0.0).steps, 0);
    }

    #[test]
    fn test_plan_without_step_limit() {
        let physics = PhysicsEngine::new(0.05, 16.0, 0.0);
        let plan = physics.plan(500.0, 0.0);
        assert_eq!(plan.steps, 1);
        assert_eq!(plan.increment_x, 500.0);
    }
}
