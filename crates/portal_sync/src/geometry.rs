//! Portal containment tests.
//!
//! Pure functions over immutable inputs: safe to call from any thread
//! without synchronization, and cheap enough for the per-tick movement path.

use crate::portal::{Portal, PortalShape, VERTICAL_TOLERANCE};
use crate::types::Position;

/// Returns true when `point` in `world` lies inside `portal`'s volume.
///
/// A point in a different world is never inside.
pub fn contains(portal: &Portal, point: Position, world: &str) -> bool {
    if world != portal.world {
        return false;
    }

    match portal.shape {
        PortalShape::Flat => within_disc(portal, point),
        PortalShape::Sphere => within_ball(portal, point),
        PortalShape::Rectangle => within_box(portal, point),
    }
}

fn vertical_offset(portal: &Portal, point: Position) -> f64 {
    (point.y - portal.y as f64).abs()
}

fn within_disc(portal: &Portal, point: Position) -> bool {
    let dx = point.x - portal.x as f64;
    let dz = point.z - portal.z as f64;
    (dx * dx + dz * dz).sqrt() <= portal.radius()
        && vertical_offset(portal, point) <= VERTICAL_TOLERANCE
}

fn within_ball(portal: &Portal, point: Position) -> bool {
    let dx = point.x - portal.x as f64;
    let dy = point.y - portal.y as f64;
    let dz = point.z - portal.z as f64;
    (dx * dx + dy * dy + dz * dz).sqrt() <= portal.radius()
}

fn within_box(portal: &Portal, point: Position) -> bool {
    let (min_x, max_x) = (portal.x.min(portal.x2) as f64, portal.x.max(portal.x2) as f64);
    let (min_z, max_z) = (portal.z.min(portal.z2) as f64, portal.z.max(portal.z2) as f64);

    point.x >= min_x
        && point.x <= max_x
        && point.z >= min_z
        && point.z <= max_z
        && vertical_offset(portal, point) <= VERTICAL_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn portal(shape: PortalShape, anchor: (i32, i32, i32), corner: (i32, i32)) -> Portal {
        Portal {
            id: "p1".to_string(),
            name: "test".to_string(),
            target_server_id: "srv".to_string(),
            target_server_name: "lobby".to_string(),
            owner_server_id: None,
            world: "world".to_string(),
            x: anchor.0,
            y: anchor.1,
            z: anchor.2,
            x2: corner.0,
            z2: corner.1,
            shape,
        }
    }

    #[test]
    fn test_sphere_scenario() {
        let p = portal(PortalShape::Sphere, (0, 64, 0), (0, 0));
        assert!(contains(&p, Position::new(0.0, 64.0, 2.0), "world"));
        assert!(!contains(&p, Position::new(0.0, 64.0, 4.0), "world"));
    }

    #[test]
    fn test_sphere_boundary_is_inclusive() {
        let p = portal(PortalShape::Sphere, (0, 64, 0), (0, 0));
        assert!(contains(&p, Position::new(3.0, 64.0, 0.0), "world"));
        assert!(contains(&p, Position::new(0.0, 61.0, 0.0), "world"));
        assert!(!contains(&p, Position::new(3.0 + EPS * 10.0, 64.0, 0.0), "world"));
    }

    #[test]
    fn test_flat_vertical_tolerance() {
        let p = portal(PortalShape::Flat, (10, 64, 10), (0, 0));
        assert!(contains(&p, Position::new(10.0, 66.0, 10.0), "world"));
        assert!(contains(&p, Position::new(10.0, 62.0, 10.0), "world"));
        assert!(!contains(&p, Position::new(10.0, 66.0 + EPS * 10.0, 10.0), "world"));
        assert!(!contains(&p, Position::new(10.0, 62.0 - EPS * 10.0, 10.0), "world"));
    }

    #[test]
    fn test_flat_ignores_height_for_radius() {
        let p = portal(PortalShape::Flat, (0, 64, 0), (0, 0));
        // 3 blocks out and 2 up: outside a sphere, inside the disc.
        assert!(contains(&p, Position::new(3.0, 66.0, 0.0), "world"));
        assert!(!contains(&p, Position::new(2.2, 64.0, 2.2), "world"));
    }

    #[test]
    fn test_rectangle_is_symmetric_under_corner_swap() {
        let a = portal(PortalShape::Rectangle, (0, 64, 0), (5, 8));
        let b = portal(PortalShape::Rectangle, (5, 64, 8), (0, 0));
        let c = portal(PortalShape::Rectangle, (0, 64, 8), (5, 0));

        for x in -2..=7 {
            for z in -2..=10 {
                let point = Position::new(x as f64 + 0.5, 64.0, z as f64 - 0.25);
                let expected = contains(&a, point, "world");
                assert_eq!(expected, contains(&b, point, "world"), "at {x},{z}");
                assert_eq!(expected, contains(&c, point, "world"), "at {x},{z}");
            }
        }
    }

    #[test]
    fn test_rectangle_edges_are_inclusive() {
        let p = portal(PortalShape::Rectangle, (5, 64, 8), (0, 0));
        assert!(contains(&p, Position::new(0.0, 64.0, 0.0), "world"));
        assert!(contains(&p, Position::new(5.0, 65.0, 8.0), "world"));
        assert!(!contains(&p, Position::new(5.1, 64.0, 8.0), "world"));
        assert!(!contains(&p, Position::new(2.0, 67.0, 2.0), "world"));
    }

    #[test]
    fn test_other_world_never_matches() {
        for shape in [PortalShape::Flat, PortalShape::Sphere, PortalShape::Rectangle] {
            let p = portal(shape, (0, 64, 0), (2, 2));
            assert!(!contains(&p, Position::new(0.0, 64.0, 0.0), "world_nether"));
        }
    }
}
