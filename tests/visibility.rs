use weird_vis::{
    vec3f, BoundBox, Camera, Mat4f, OrientedBox, RoomFlags, RoomId, Vec3f, VisibilityConfig,
    VisibleSet, World, WorldBuilder,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Square in plane y = `y`, centered on Y axis
fn square(y: f32, half: f32) -> Vec<Vec3f> {
    vec![
        vec3f!(-half, y, -half),
        vec3f!( half, y, -half),
        vec3f!( half, y,  half),
        vec3f!(-half, y,  half),
    ]
}

/// Slab of space between two Y values
fn slab(y0: f32, y1: f32) -> BoundBox {
    BoundBox::new(vec3f!(-5000.0, y0, -5000.0), vec3f!(5000.0, y1, 5000.0))
}

/// Two rooms, separated by 1024x1024 portal in y = 0 plane
fn two_rooms() -> (World, RoomId, RoomId) {
    let mut builder = WorldBuilder::new();

    let r0 = builder.add_room(slab(-10000.0, 0.0)).unwrap();
    let r1 = builder.add_room(slab(0.0, 9500.0)).unwrap();

    builder.add_portal_pair(r0, r1, square(0.0, 512.0), vec3f!(0.0, -1.0, 0.0)).unwrap();

    (builder.build(), r0, r1)
}

fn box_at(center: Vec3f) -> OrientedBox {
    OrientedBox::new(
        BoundBox::new(vec3f!(-100.0, -100.0, -100.0), vec3f!(100.0, 100.0, 100.0)),
        Mat4f::translate(center),
    )
}

#[test]
fn two_room_scene() {
    init_logger();

    let (world, r0, r1) = two_rooms();
    let camera = Camera::new(vec3f!(0.0, -1024.0, 0.0), vec3f!(0.0, 1.0, 0.0))
        .with_projection(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 10000.0);

    let set = VisibleSet::build(&world, &camera, Some(r0), &VisibilityConfig::default());

    assert_eq!(set.get_visible_rooms(), &[r0, r1]);
    assert_eq!(set.get_room_frustums(r1).len(), 1);
    assert_eq!(set.get_max_path(r1), Some(1));

    let frustum = set.get_frustum(set.get_room_frustums(r1)[0]).unwrap();
    assert_eq!(frustum.room(), Some(r1));
    assert_eq!(frustum.parents_count(), 1);

    let inside = box_at(vec3f!(0.0, 8000.0, 0.0));
    assert!(frustum.is_obb_visible(&inside));
    assert!(set.is_obb_visible_in_room(r1, &inside));

    let beyond_far = box_at(vec3f!(0.0, 10000.0, 0.0));
    assert!(!frustum.is_obb_visible(&beyond_far));
    assert!(!set.is_obb_visible_in_room(r1, &beyond_far));

    // aside of portal view
    assert!(!set.is_obb_visible_in_room(r1, &box_at(vec3f!(4000.0, 2000.0, 0.0))));
}

#[test]
fn portal_loop_terminates() {
    init_logger();

    let mut builder = WorldBuilder::new();
    let a = builder.add_room(slab(0.0, 100.0)).unwrap();
    let b = builder.add_room(slab(100.0, 200.0)).unwrap();
    let c = builder.add_room(slab(200.0, 300.0)).unwrap();

    builder.add_portal(a, Some(b), square(100.0, 50.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
    builder.add_portal(b, Some(c), square(200.0, 50.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
    builder.add_portal(c, Some(a), square(300.0, 50.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
    let world = builder.build();

    let camera = Camera::new(vec3f!(0.0, 10.0, 0.0), vec3f!(0.0, 1.0, 0.0));
    let set = VisibleSet::build(&world, &camera, Some(a), &VisibilityConfig::default());

    assert_eq!(set.get_visible_rooms(), &[a, b, c]);
    assert_eq!(set.get_stats().rejected_cycle, 1);
    for room in [a, b, c] {
        assert_eq!(set.get_room_frustums(room).len(), 1);
    }
}

#[test]
fn dense_graph_terminates() {
    init_logger();

    // every room sees every other one through the same opening
    let mut builder = WorldBuilder::new();
    let rooms = (0..6)
        .map(|_| builder.add_room(slab(0.0, 1000.0)).unwrap())
        .collect::<Vec<_>>();

    for (index, src) in rooms.iter().enumerate() {
        for dst in &rooms {
            if src != dst {
                let y = 100.0 + index as f32 * 10.0;
                builder.add_portal(*src, Some(*dst), square(y, 50.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
            }
        }
    }
    let world = builder.build();

    let camera = Camera::new(vec3f!(0.0, 10.0, 0.0), vec3f!(0.0, 1.0, 0.0));
    let set = VisibleSet::build(&world, &camera, Some(rooms[0]), &VisibilityConfig::default());

    assert_eq!(set.get_visible_rooms().len(), rooms.len());
    assert!(set.get_stats().rejected_cycle > 0);

    // no room repeats on a single frustum path
    for room in &rooms {
        for id in set.get_room_frustums(*room) {
            let mut seen = Vec::new();
            let mut current = Some(*id);

            while let Some(frustum_id) = current {
                let frustum = set.get_frustum(frustum_id).unwrap();
                let frustum_room = frustum.room().unwrap();

                assert!(!seen.contains(&frustum_room));
                seen.push(frustum_room);
                current = frustum.parent();
            }
        }
    }
}

#[test]
fn edge_on_portal_is_rejected() {
    init_logger();

    let mut builder = WorldBuilder::new();
    let r0 = builder.add_room(BoundBox::new(vec3f!(-1000.0, -1000.0, -1000.0), vec3f!(0.0, 1000.0, 1000.0))).unwrap();
    let r1 = builder.add_room(BoundBox::new(vec3f!(1.0, -1000.0, -1000.0), vec3f!(1000.0, 1000.0, 1000.0))).unwrap();

    // portal plane x = 0 contains camera location
    builder.add_portal(r0, Some(r1), vec![
        vec3f!(0.0, -200.0, -50.0),
        vec3f!(0.0,  -50.0, -50.0),
        vec3f!(0.0,  -50.0,  50.0),
        vec3f!(0.0, -200.0,  50.0),
    ], vec3f!(-1.0, 0.0, 0.0)).unwrap();
    let world = builder.build();

    let camera = Camera::new(vec3f!(0.0, -100.0, 0.0), vec3f!(0.0, 1.0, 0.0));
    let set = VisibleSet::build(&world, &camera, Some(r0), &VisibilityConfig::default());

    assert_eq!(set.get_visible_rooms(), &[r0]);
    assert!(set.get_room_frustums(r1).is_empty());
    assert_eq!(set.get_stats().rejected_back_facing, 1);
}

#[test]
fn camera_inside_destination_passes_through() {
    init_logger();

    let mut builder = WorldBuilder::new();
    let r0 = builder.add_room(BoundBox::new(vec3f!(-1000.0, -1000.0, -1000.0), vec3f!(10.0, 1000.0, 1000.0))).unwrap();
    let r1 = builder.add_room(BoundBox::new(vec3f!(-10.0, -1000.0, -1000.0), vec3f!(1000.0, 1000.0, 1000.0))).unwrap();

    builder.add_portal(r0, Some(r1), vec![
        vec3f!(0.0, -200.0, -50.0),
        vec3f!(0.0,  -50.0, -50.0),
        vec3f!(0.0,  -50.0,  50.0),
        vec3f!(0.0, -200.0,  50.0),
    ], vec3f!(-1.0, 0.0, 0.0)).unwrap();
    let world = builder.build();

    let camera = Camera::new(vec3f!(0.0, -100.0, 0.0), vec3f!(0.0, 1.0, 0.0));
    let set = VisibleSet::build(&world, &camera, Some(r0), &VisibilityConfig::default());

    assert_eq!(set.get_visible_rooms(), &[r0, r1]);
    let frustum = set.get_frustum(set.get_room_frustums(r1)[0]).unwrap();
    assert_eq!(frustum.parents_count(), 1);
    assert_eq!(frustum.planes().len(), set.get_camera_frustum().unwrap().planes().len());
}

#[test]
fn camera_outside_of_rooms() {
    init_logger();

    let mut builder = WorldBuilder::new();
    let front = builder.add_room(slab(0.0, 100.0)).unwrap();
    let far_front = builder.add_room(slab(100.0, 200.0)).unwrap();
    let behind = builder.add_room(slab(-3000.0, -2500.0)).unwrap();
    let inactive = builder.add_room_with_flags(slab(200.0, 300.0), RoomFlags::empty()).unwrap();
    builder.add_portal_pair(front, far_front, square(100.0, 50.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
    let world = builder.build();

    let camera = Camera::new(vec3f!(0.0, -2000.0, 0.0), vec3f!(0.0, 1.0, 0.0));
    let config = VisibilityConfig::default();

    for camera_room in [None, Some(RoomId::from_index(99)), Some(inactive)] {
        let set = VisibleSet::build(&world, &camera, camera_room, &config);

        assert_eq!(set.get_camera_room(), None);
        assert_eq!(set.get_visible_rooms(), &[front, far_front]);
        assert!(!set.is_room_visible(behind));
        assert!(!set.is_room_visible(inactive));

        // no frustums are attached, camera frustum is used instead
        assert!(set.get_room_frustums(front).is_empty());
        assert!(set.is_aabb_visible_in_room(front, vec3f!(-10.0, 40.0, -10.0), vec3f!(10.0, 60.0, 10.0)));
        assert!(!set.is_aabb_visible_in_room(behind, vec3f!(-10.0, -2800.0, -10.0), vec3f!(10.0, -2700.0, 10.0)));
    }
}
