//! Collision System
//!
//! Overlap tests between entity colliders. Each collider is first resolved
//! into a scene-space `Shape` (collider dimensions falling back to the
//! transform, scaled, polygons rotated), then tested pairwise.
//!
//! Pairs are found with an O(n²) scan in update order. There is no
//! response: overlaps only produce events.

use macroquad::math::Vec2;

use super::event::CollisionEvent;
use super::transform::Transform2d;
use super::world::World;
use crate::project::{Collider, ColliderShape, Transform};

/// A collider placed in the scene
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box; rotation is ignored
    Aabb { center: Vec2, size: Vec2 },
    Circle { center: Vec2, r: f32 },
    /// Scene-space vertices in order
    Polygon(Vec<Vec2>),
}

/// Place a collider in the scene using its entity's transform.
pub fn resolve_shape(transform: &Transform, collider: &Collider) -> Shape {
    let center = transform.center();
    let w = collider.w.unwrap_or(transform.w) * transform.scale;
    let h = collider.h.unwrap_or(transform.h) * transform.scale;
    match collider.shape {
        ColliderShape::Aabb => Shape::Aabb { center, size: Vec2::new(w.abs(), h.abs()) },
        ColliderShape::Circle => {
            let r = match collider.r {
                Some(r) => r * transform.scale,
                None => w.min(h) / 2.0,
            };
            Shape::Circle { center, r: r.abs() }
        }
        ColliderShape::Polygon => Shape::Polygon(
            collider
                .points
                .iter()
                .map(|p| transform.to_world(Vec2::new(p.x, p.y)))
                .collect(),
        ),
    }
}

/// Whether two resolved shapes overlap. Symmetric in its arguments.
pub fn overlaps(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Aabb { center: ca, size: sa }, Shape::Aabb { center: cb, size: sb }) => {
            aabb_overlap(*ca, *sa, *cb, *sb)
        }
        (Shape::Circle { center: ca, r: ra }, Shape::Circle { center: cb, r: rb }) => {
            ca.distance_squared(*cb) < (ra + rb) * (ra + rb)
        }
        (Shape::Aabb { center, size }, Shape::Circle { center: cc, r })
        | (Shape::Circle { center: cc, r }, Shape::Aabb { center, size }) => {
            aabb_circle(*center, *size, *cc, *r)
        }
        (Shape::Circle { center, r }, Shape::Polygon(points))
        | (Shape::Polygon(points), Shape::Circle { center, r }) => circle_polygon(*center, *r, points),
        (Shape::Polygon(pa), Shape::Polygon(pb)) => polygon_polygon(pa, pb),
        (Shape::Aabb { center, size }, Shape::Polygon(points))
        | (Shape::Polygon(points), Shape::Aabb { center, size }) => {
            polygon_polygon(&aabb_corners(*center, *size), points)
        }
    }
}

/// `|dx|*2 < wA+wB` and `|dy|*2 < hA+hB`
pub fn aabb_overlap(ca: Vec2, sa: Vec2, cb: Vec2, sb: Vec2) -> bool {
    (ca.x - cb.x).abs() * 2.0 < sa.x + sb.x && (ca.y - cb.y).abs() * 2.0 < sa.y + sb.y
}

fn aabb_circle(center: Vec2, size: Vec2, cc: Vec2, r: f32) -> bool {
    let half = size * 0.5;
    let closest = cc.clamp(center - half, center + half);
    closest.distance_squared(cc) < r * r
}

fn aabb_corners(center: Vec2, size: Vec2) -> Vec<Vec2> {
    let h = size * 0.5;
    vec![
        Vec2::new(center.x - h.x, center.y - h.y),
        Vec2::new(center.x + h.x, center.y - h.y),
        Vec2::new(center.x + h.x, center.y + h.y),
        Vec2::new(center.x - h.x, center.y + h.y),
    ]
}

fn edges(points: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    points
        .iter()
        .enumerate()
        .map(move |(i, &p)| (p, points[(i + 1) % points.len()]))
}

/// Even-odd rule; works for concave simple polygons
pub fn point_in_polygon(p: Vec2, points: &[Vec2]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    for (a, b) in edges(points) {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn segment_distance_squared(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = cross(q2 - q1, p1 - q1);
    let d2 = cross(q2 - q1, p2 - q1);
    let d3 = cross(p2 - p1, q1 - p1);
    let d4 = cross(p2 - p1, q2 - p1);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn circle_polygon(center: Vec2, r: f32, points: &[Vec2]) -> bool {
    if points.len() < 3 {
        return false;
    }
    point_in_polygon(center, points) || edges(points).any(|(a, b)| segment_distance_squared(center, a, b) < r * r)
}

fn polygon_polygon(a: &[Vec2], b: &[Vec2]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    for (a1, a2) in edges(a) {
        for (b1, b2) in edges(b) {
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    a.iter().any(|p| point_in_polygon(*p, b)) || b.iter().any(|p| point_in_polygon(*p, a))
}

/// Every overlapping collider pair, in ascending update-order pair order.
pub fn detect_overlaps(world: &World) -> Vec<CollisionEvent> {
    let shapes: Vec<_> = world
        .ordered()
        .iter()
        .filter_map(|&e| {
            let collider = world.colliders.get(e)?;
            let transform = world.transforms.get(e)?;
            Some((e, resolve_shape(transform, collider)))
        })
        .collect();

    let mut events = Vec::new();
    for i in 0..shapes.len() {
        for j in (i + 1)..shapes.len() {
            if overlaps(&shapes[i].1, &shapes[j].1) {
                events.push(CollisionEvent { entity_a: shapes[i].0, entity_b: shapes[j].0 });
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Point, Scene, SceneEntity};

    fn aabb(x: f32, y: f32, w: f32, h: f32) -> Shape {
        Shape::Aabb { center: Vec2::new(x, y), size: Vec2::new(w, h) }
    }

    fn circle(x: f32, y: f32, r: f32) -> Shape {
        Shape::Circle { center: Vec2::new(x, y), r }
    }

    #[test]
    fn test_aabb_overlap_is_symmetric() {
        let cases = [
            (aabb(0.0, 0.0, 10.0, 10.0), aabb(9.0, 0.0, 10.0, 10.0), true),
            (aabb(0.0, 0.0, 10.0, 10.0), aabb(10.0, 0.0, 10.0, 10.0), false),
            (aabb(0.0, 0.0, 4.0, 40.0), aabb(0.0, 21.0, 4.0, 4.0), true),
            (aabb(0.0, 0.0, 4.0, 4.0), aabb(-3.0, -3.0, 1.0, 1.0), false),
        ];
        for (a, b, expected) in cases {
            assert_eq!(overlaps(&a, &b), expected);
            assert_eq!(overlaps(&b, &a), expected);
        }
    }

    #[test]
    fn test_circles() {
        assert!(overlaps(&circle(0.0, 0.0, 5.0), &circle(9.0, 0.0, 5.0)));
        assert!(!overlaps(&circle(0.0, 0.0, 5.0), &circle(10.0, 0.0, 5.0)));
    }

    #[test]
    fn test_aabb_circle_corner() {
        let b = aabb(0.0, 0.0, 10.0, 10.0);
        // Near the corner but outside the rounded region
        assert!(!overlaps(&b, &circle(8.0, 8.0, 4.0)));
        assert!(overlaps(&circle(8.0, 5.0, 4.0), &b));
    }

    #[test]
    fn test_resolve_defaults_to_transform() {
        let t = Transform { x: 5.0, y: 5.0, w: 10.0, h: 20.0, rotation: 45.0, scale: 2.0 };
        let c = Collider { shape: ColliderShape::Aabb, ..Collider::default() };
        assert_eq!(resolve_shape(&t, &c), aabb(5.0, 5.0, 20.0, 40.0));

        let c = Collider { shape: ColliderShape::Circle, ..Collider::default() };
        assert_eq!(resolve_shape(&t, &c), circle(5.0, 5.0, 10.0));

        let c = Collider { shape: ColliderShape::Circle, r: Some(3.0), ..Collider::default() };
        assert_eq!(resolve_shape(&t, &c), circle(5.0, 5.0, 6.0));
    }

    #[test]
    fn test_polygon_rotation_applies() {
        // Thin horizontal bar from -10..10 along x
        let points = vec![
            Point { x: -10.0, y: -1.0 },
            Point { x: 10.0, y: -1.0 },
            Point { x: 10.0, y: 1.0 },
            Point { x: -10.0, y: 1.0 },
        ];
        let c = Collider { shape: ColliderShape::Polygon, points, ..Collider::default() };
        let flat = Transform::default();
        let upright = Transform { rotation: 90.0, ..Transform::default() };

        let probe = circle(8.0, 0.0, 1.5);
        assert!(overlaps(&resolve_shape(&flat, &c), &probe));
        assert!(!overlaps(&resolve_shape(&upright, &c), &probe));

        let probe = aabb(0.0, 8.0, 1.0, 1.0);
        assert!(!overlaps(&resolve_shape(&flat, &c), &probe));
        assert!(overlaps(&probe, &resolve_shape(&upright, &c)));
    }

    #[test]
    fn test_polygon_containment() {
        let big = Shape::Polygon(vec![
            Vec2::new(-10.0, -10.0),
            Vec2::new(10.0, -10.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(-10.0, 10.0),
        ]);
        // Entirely inside, no edges cross
        assert!(overlaps(&big, &aabb(0.0, 0.0, 2.0, 2.0)));
        assert!(overlaps(&circle(0.0, 0.0, 1.0), &big));
    }

    #[test]
    fn test_detect_overlaps_in_order() {
        let mut scene = Scene::new("s", 100, 100);
        for (id, x) in [("a", 0.0), ("b", 5.0), ("c", 50.0), ("d", 8.0)] {
            let mut e = SceneEntity::new(id, id);
            e.components.transform = Some(Transform { x, y: 0.0, w: 10.0, h: 10.0, ..Transform::default() });
            e.components.collider = Some(Collider::default());
            scene.entities.push(e);
        }
        scene.entities.push(SceneEntity::new("no-collider", "n"));
        let world = World::from_scene(&scene);
        let pairs: Vec<_> = detect_overlaps(&world)
            .iter()
            .map(|ev| (world.id(ev.entity_a).to_string(), world.id(ev.entity_b).to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![("a".into(), "b".into()), ("a".into(), "d".into()), ("b".into(), "d".into())]
        );
    }
}
