//! Rigidbody Integration
//!
//! Semi-implicit Euler over every entity with a Rigidbody and a Transform:
//! velocity first (acceleration plus gravity), then position from the new
//! velocity, then friction as a multiplicative decay.
//!
//! No collision response happens here. `bounce` and `mass` are carried for
//! authoring tools only.

use super::world::World;

/// Advance every rigidbody by `dt` seconds.
pub fn integrate(world: &mut World, dt: f32) {
    if dt <= 0.0 {
        return;
    }
    let World { rigidbodies, transforms, .. } = world;
    for (entity, body) in rigidbodies.iter_mut() {
        let Some(transform) = transforms.get_mut(entity) else {
            continue;
        };

        body.vx += body.ax * dt;
        body.vy += (body.ay + body.gravity) * dt;

        transform.x += body.vx * dt;
        transform.y += body.vy * dt;

        if body.friction != 0.0 {
            let decay = (1.0 - body.friction * dt).max(0.0);
            body.vx *= decay;
            body.vy *= decay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Rigidbody, Scene, SceneEntity, Transform};

    fn world_with(body: Rigidbody, transform: Transform) -> World {
        let mut scene = Scene::new("s", 100, 100);
        let mut e = SceneEntity::new("p", "Player");
        e.components.rigidbody = Some(body);
        e.components.transform = Some(transform);
        scene.entities.push(e);
        World::from_scene(&scene)
    }

    #[test]
    fn test_single_step_gravity() {
        let body = Rigidbody { vy: 20.0, gravity: 500.0, ..Rigidbody::default() };
        let mut world = world_with(body, Transform { x: 0.0, y: 100.0, ..Transform::default() });
        let dt = 0.1;
        integrate(&mut world, dt);

        let p = world.find("p").unwrap();
        let vy = world.rigidbodies.get(p).unwrap().vy;
        let y = world.transforms.get(p).unwrap().y;
        let expected_vy = 20.0 + 500.0 * dt;
        assert!((vy - expected_vy).abs() < 1e-4);
        assert!((y - (100.0 + expected_vy * dt)).abs() < 1e-4);
    }

    #[test]
    fn test_friction_decays_velocity() {
        let body = Rigidbody { vx: 100.0, friction: 2.0, ..Rigidbody::default() };
        let mut world = world_with(body, Transform::default());
        integrate(&mut world, 0.1);
        let p = world.find("p").unwrap();
        assert!((world.rigidbodies.get(p).unwrap().vx - 80.0).abs() < 1e-3);
        assert!((world.transforms.get(p).unwrap().x - 10.0).abs() < 1e-4);

        // Friction never reverses direction
        let body = Rigidbody { vx: 100.0, friction: 50.0, ..Rigidbody::default() };
        let mut world = world_with(body, Transform::default());
        integrate(&mut world, 0.1);
        assert_eq!(world.rigidbodies.get(p).unwrap().vx, 0.0);
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let body = Rigidbody { vx: 5.0, gravity: 500.0, ..Rigidbody::default() };
        let mut world = world_with(body, Transform::default());
        integrate(&mut world, 0.0);
        let p = world.find("p").unwrap();
        assert_eq!(world.transforms.get(p).unwrap().x, 0.0);
        assert_eq!(world.rigidbodies.get(p).unwrap().vy, 0.0);
    }
}
