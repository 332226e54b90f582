//! Per-frame translucent polygon BSP
//!
//! Tree is rebuilt from scratch every frame. Nodes and face references are
//! allocated from fixed size arena, so tree building never allocates and
//! degrades by dropping polygons when arena is full.

use log::{debug, warn};

use crate::{
    arena::{Arena, ArenaRef},
    config::VisibilityConfig,
    geom::{Plane, Polygon, PolygonRelation},
    math::{Mat4f, Vec3f},
};

/// Invalid record offset
const NIL: u32 = u32::MAX;

/// Singly-linked face record list
#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct FaceList {
    /// First face offset
    head: u32,

    /// Last face offset
    tail: u32,
}

impl FaceList {
    const EMPTY: FaceList = FaceList { head: NIL, tail: NIL };
}

/// BSP node record
#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct NodeRecord {
    /// Splitter plane
    plane: Plane,

    /// Front subtree offset
    front: u32,

    /// Back subtree offset
    back: u32,

    /// Faces on plane with the same orientation
    front_faces: FaceList,

    /// Faces on plane with opposite orientation
    back_faces: FaceList,
}

unsafe impl bytemuck::Zeroable for NodeRecord {}
unsafe impl bytemuck::Pod for NodeRecord {}

/// Face reference record
#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct FaceRecord {
    /// Polygon transform
    transform: Mat4f,

    /// Polygon descriptor
    descriptor: u32,

    /// Next face offset
    next: u32,
}

unsafe impl bytemuck::Zeroable for FaceRecord {}
unsafe impl bytemuck::Pod for FaceRecord {}

/// Bytes one polygon insertion can take at most (node, face and alignment)
const INSERTION_SIZE: usize = std::mem::size_of::<NodeRecord>() + std::mem::size_of::<FaceRecord>() + 8;

/// Reference to translucent polygon, emitted during traversal
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FaceRef {
    /// Polygon instance transform
    pub transform: Mat4f,

    /// Polygon descriptor (identifier of polygon in polygon source)
    pub descriptor: u32,
}

/// Translucent polygon in it's local space
#[derive(Clone, Debug)]
pub struct TranslucentPolygon {
    /// Polygon descriptor
    pub descriptor: u32,

    /// Polygon geometry
    pub polygon: Polygon,
}

/// Tree building statistics
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BspStats {
    /// Count of allocated nodes
    pub nodes: usize,

    /// Count of inserted faces
    pub faces: usize,

    /// Polygons rejected by visibility filter
    pub culled_polygons: usize,

    /// Polygons dropped because arena is full
    pub dropped_polygons: usize,

    /// Polygon lists skipped because arena is (almost) full
    pub skipped_lists: usize,
}

/// Traversal stack element
#[derive(Copy, Clone)]
enum Step {
    /// Visit node subtree
    Node(u32),

    /// Emit face list
    Faces(u32),
}

/// Dynamic BSP
pub struct DynamicBsp {
    /// Node and face storage
    arena: Arena,

    /// Root node
    root: Option<ArenaRef<NodeRecord>>,

    /// Polygon lists are skipped if less than this count of bytes left
    reserve: usize,

    /// Minimal normal cosine for front-facing coplanar faces
    coplanar_threshold: f32,

    /// Statistics
    stats: BspStats,
}

impl DynamicBsp {
    /// Create BSP with configured arena size.
    /// Configuration is expected to be checked by [`VisibilityConfig::validate`].
    pub fn new(config: &VisibilityConfig) -> Self {
        debug_assert_eq!(config.validate(), Ok(()));

        Self {
            arena: Arena::new(config.bsp_arena_size),
            root: None,
            reserve: config.bsp_arena_reserve,
            coplanar_threshold: config.coplanar_threshold,
            stats: BspStats::default(),
        }
    }

    /// Remove everything from tree
    pub fn reset(&mut self) {
        self.arena.reset();
        self.root = None;
        self.stats = BspStats::default();
    }

    pub fn get_stats(&self) -> &BspStats {
        &self.stats
    }

    /// Check if something was lost because of arena size
    pub fn is_truncated(&self) -> bool {
        self.stats.dropped_polygons != 0 || self.stats.skipped_lists != 0
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get count of free arena bytes
    pub fn get_remaining_bytes(&self) -> usize {
        self.arena.remaining()
    }

    /// Insert polygon list of single object.
    /// * `transform` - object transform
    /// * `polygons` - object translucent polygons, in object space
    /// * `is_visible` - world space polygon visibility filter
    /// # Returns
    /// Count of inserted polygons
    pub fn add_polygon_list(
        &mut self,
        transform: &Mat4f,
        polygons: &[TranslucentPolygon],
        mut is_visible: impl FnMut(&Polygon) -> bool
    ) -> usize {
        if self.arena.remaining() < self.reserve {
            if self.stats.skipped_lists == 0 {
                warn!(
                    "translucent BSP arena is almost full ({} of {} bytes left), skipping polygons",
                    self.arena.remaining(),
                    self.arena.capacity()
                );
            }
            self.stats.skipped_lists += 1;
            return 0;
        }

        let mut inserted = 0;

        for translucent in polygons {
            let polygon = translucent.polygon.transformed(transform);

            if !is_visible(&polygon) {
                self.stats.culled_polygons += 1;
                continue;
            }

            let face = FaceRef {
                transform: *transform,
                descriptor: translucent.descriptor,
            };

            if self.insert(face, &polygon) {
                inserted += 1;
            }
        }

        inserted
    }

    /// Allocate node with single face
    fn alloc_node(&mut self, plane: Plane, face: u32) -> Option<u32> {
        let node = self.arena.alloc(NodeRecord {
            plane,
            front: NIL,
            back: NIL,
            front_faces: FaceList { head: face, tail: face },
            back_faces: FaceList::EMPTY,
        })?;

        self.stats.nodes += 1;
        Some(node.offset())
    }

    /// Append face to face list
    fn append_face(&mut self, list: FaceList, face: u32) -> FaceList {
        if list.tail == NIL {
            return FaceList { head: face, tail: face };
        }

        if let Some(tail) = self.arena.get_mut(ArenaRef::<FaceRecord>::from_offset(list.tail)) {
            tail.next = face;
        }

        FaceList { head: list.head, tail: face }
    }

    /// Insert world-space polygon
    /// # Returns
    /// true if polygon is inserted, false if it's dropped
    pub fn insert(&mut self, face: FaceRef, polygon: &Polygon) -> bool {
        if polygon.is_empty() {
            return false;
        }

        // whole insertion must fit, no half-linked records
        if self.arena.remaining() < INSERTION_SIZE {
            self.stats.dropped_polygons += 1;
            return false;
        }

        let Some(face_ref) = self.arena.alloc(FaceRecord {
            transform: face.transform,
            descriptor: face.descriptor,
            next: NIL,
        }) else {
            self.stats.dropped_polygons += 1;
            return false;
        };
        let face_offset = face_ref.offset();

        let Some(mut node_ref) = self.root else {
            let Some(root) = self.alloc_node(polygon.plane, face_offset) else {
                self.stats.dropped_polygons += 1;
                return false;
            };

            self.root = Some(ArenaRef::from_offset(root));
            self.stats.faces += 1;
            return true;
        };

        loop {
            let Some(node) = self.arena.get(node_ref).copied() else {
                self.stats.dropped_polygons += 1;
                return false;
            };

            let relation = node.plane.get_polygon_relation(polygon);

            let child = match relation {
                PolygonRelation::Front => node.front,
                PolygonRelation::Back => node.back,

                // straddling polygons are not split, but filed by orientation
                PolygonRelation::OnPlane | PolygonRelation::Intersects => {
                    let is_front_facing = (polygon.plane.normal ^ node.plane.normal) > self.coplanar_threshold;

                    let updated = if is_front_facing {
                        NodeRecord { front_faces: self.append_face(node.front_faces, face_offset), ..node }
                    } else {
                        NodeRecord { back_faces: self.append_face(node.back_faces, face_offset), ..node }
                    };

                    if let Some(node) = self.arena.get_mut(node_ref) {
                        *node = updated;
                    }
                    self.stats.faces += 1;
                    return true;
                }
            };

            if child != NIL {
                node_ref = ArenaRef::from_offset(child);
                continue;
            }

            let Some(child) = self.alloc_node(polygon.plane, face_offset) else {
                self.stats.dropped_polygons += 1;
                return false;
            };

            if let Some(node) = self.arena.get_mut(node_ref) {
                if relation == PolygonRelation::Front {
                    node.front = child;
                } else {
                    node.back = child;
                }
            }

            self.stats.faces += 1;
            return true;
        }
    }

    /// Emit faces farthest from viewer first
    pub fn render_back_to_front(&self, viewer: Vec3f, mut emit: impl FnMut(FaceRef)) {
        let Some(root) = self.root else {
            return;
        };

        // Visit stack (no recursion there, tree can be quite deep)
        let mut visit_stack = vec![Step::Node(root.offset())];

        while let Some(step) = visit_stack.pop() {
            match step {
                Step::Node(offset) => {
                    let Some(node) = self.arena.get(ArenaRef::<NodeRecord>::from_offset(offset)) else {
                        continue;
                    };

                    // far subtree, faces turned away from viewer, faces turned to viewer, near subtree
                    let order = if node.plane.get_signed_distance(viewer) >= 0.0 {
                        [
                            Step::Node(node.back),
                            Step::Faces(node.back_faces.head),
                            Step::Faces(node.front_faces.head),
                            Step::Node(node.front),
                        ]
                    } else {
                        [
                            Step::Node(node.front),
                            Step::Faces(node.front_faces.head),
                            Step::Faces(node.back_faces.head),
                            Step::Node(node.back),
                        ]
                    };

                    visit_stack.extend(order
                        .into_iter()
                        .rev()
                        .filter(|step| !matches!(step, Step::Node(NIL) | Step::Faces(NIL)))
                    );
                }
                Step::Faces(head) => {
                    let mut current = head;

                    while current != NIL {
                        let Some(face) = self.arena.get(ArenaRef::<FaceRecord>::from_offset(current)) else {
                            break;
                        };

                        emit(FaceRef {
                            transform: face.transform,
                            descriptor: face.descriptor,
                        });
                        current = face.next;
                    }
                }
            }
        }
    }

    /// Emit faces nearest to viewer first, exactly reverse to [`DynamicBsp::render_back_to_front`]
    pub fn render_front_to_back(&self, viewer: Vec3f, emit: impl FnMut(FaceRef)) {
        let mut faces = Vec::with_capacity(self.stats.faces);

        self.render_back_to_front(viewer, |face| faces.push(face));
        faces.into_iter().rev().for_each(emit);
    }

    /// Write tree summary to log
    pub fn log_summary(&self) {
        debug!(
            "translucent BSP: {} nodes, {} faces, {} culled, {} dropped, {} of {} bytes used",
            self.stats.nodes,
            self.stats.faces,
            self.stats.culled_polygons,
            self.stats.dropped_polygons,
            self.arena.used(),
            self.arena.capacity()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3f;

    /// Quad in plane y = `y`, centered at (`x`, `y`, 0), facing `normal_y` direction
    fn quad(x: f32, y: f32, normal_y: f32) -> Polygon {
        Polygon::from_points_normal(vec![
            vec3f!(x - 1.0, y, -1.0),
            vec3f!(x + 1.0, y, -1.0),
            vec3f!(x + 1.0, y,  1.0),
            vec3f!(x - 1.0, y,  1.0),
        ], vec3f!(0.0, normal_y, 0.0)).unwrap()
    }

    fn face(descriptor: u32) -> FaceRef {
        FaceRef { transform: Mat4f::identity(), descriptor }
    }

    fn back_to_front(bsp: &DynamicBsp, viewer: Vec3f) -> Vec<u32> {
        let mut order = Vec::new();
        bsp.render_back_to_front(viewer, |face| order.push(face.descriptor));
        order
    }

    fn front_to_back(bsp: &DynamicBsp, viewer: Vec3f) -> Vec<u32> {
        let mut order = Vec::new();
        bsp.render_front_to_back(viewer, |face| order.push(face.descriptor));
        order
    }

    #[test]
    fn parallel_quads_are_ordered_by_distance() {
        let mut bsp = DynamicBsp::new(&VisibilityConfig::default());

        assert!(bsp.insert(face(20), &quad(0.0, 20.0, -1.0)));
        assert!(bsp.insert(face(10), &quad(0.0, 10.0, -1.0)));
        assert!(bsp.insert(face(30), &quad(0.0, 30.0, -1.0)));

        let viewer = Vec3f::zero();
        assert_eq!(back_to_front(&bsp, viewer), vec![30, 20, 10]);
        assert_eq!(front_to_back(&bsp, viewer), vec![10, 20, 30]);

        // from the other side
        let viewer = vec3f!(0.0, 50.0, 0.0);
        assert_eq!(back_to_front(&bsp, viewer), vec![10, 20, 30]);

        assert_eq!(bsp.get_stats().nodes, 3);
        assert_eq!(bsp.get_stats().faces, 3);
    }

    #[test]
    fn coplanar_faces_are_filed_by_orientation() {
        let mut bsp = DynamicBsp::new(&VisibilityConfig::default());

        bsp.insert(face(1), &quad(0.0, 20.0, -1.0));
        bsp.insert(face(2), &quad(5.0, 20.0, 1.0));
        bsp.insert(face(3), &quad(-5.0, 20.0, -1.0));

        assert_eq!(bsp.get_stats().nodes, 1);

        // viewer in front of root plane: faces turned away go first
        assert_eq!(back_to_front(&bsp, Vec3f::zero()), vec![2, 1, 3]);
        assert_eq!(back_to_front(&bsp, vec3f!(0.0, 40.0, 0.0)), vec![1, 3, 2]);
    }

    #[test]
    fn straddling_polygon_is_not_split() {
        let mut bsp = DynamicBsp::new(&VisibilityConfig::default());

        bsp.insert(face(1), &quad(0.0, 20.0, -1.0));

        let crossing = Polygon::from_points_normal(vec![
            vec3f!(0.0, 10.0, -1.0),
            vec3f!(0.0, 30.0, -1.0),
            vec3f!(0.0, 30.0,  1.0),
            vec3f!(0.0, 10.0,  1.0),
        ], vec3f!(1.0, 0.0, 0.0)).unwrap();

        assert!(bsp.insert(face(2), &crossing));
        assert_eq!(bsp.get_stats().nodes, 1);
        assert_eq!(bsp.get_stats().faces, 2);
        assert_eq!(back_to_front(&bsp, Vec3f::zero()), vec![2, 1]);
    }

    #[test]
    fn arena_exhaustion_keeps_tree_consistent() {
        let config = VisibilityConfig::default()
            .with_bsp_arena_size(1024)
            .with_bsp_arena_reserve(0);
        let mut bsp = DynamicBsp::new(&config);

        for index in 1..=20 {
            bsp.insert(face(index), &quad(0.0, index as f32, -1.0));
        }

        let stats = *bsp.get_stats();
        assert!(bsp.is_truncated());
        assert!(stats.faces > 0 && stats.faces < 20);
        assert_eq!(stats.faces + stats.dropped_polygons, 20);

        let order = back_to_front(&bsp, Vec3f::zero());
        assert_eq!(order.len(), stats.faces);
        assert_eq!(order, (1..=stats.faces as u32).rev().collect::<Vec<_>>());

        bsp.reset();
        assert!(bsp.is_empty());
        assert!(!bsp.is_truncated());
        assert!(bsp.insert(face(1), &quad(0.0, 1.0, -1.0)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn reserve_exceeding_arena_is_rejected() {
        let config = VisibilityConfig::default()
            .with_bsp_arena_size(1024)
            .with_bsp_arena_reserve(1024);

        DynamicBsp::new(&config);
    }

    #[test]
    fn lists_are_skipped_below_reserve() {
        let config = VisibilityConfig::default()
            .with_bsp_arena_size(2048)
            .with_bsp_arena_reserve(1024);
        let mut bsp = DynamicBsp::new(&config);

        let polygons = (0..4)
            .map(|index| TranslucentPolygon {
                descriptor: index,
                polygon: quad(0.0, 10.0 + index as f32, -1.0),
            })
            .collect::<Vec<_>>();

        let mut skipped = false;
        for step in 0..10 {
            let transform = Mat4f::translate(vec3f!(0.0, step as f32 * 10.0, 0.0));

            if bsp.add_polygon_list(&transform, &polygons, |_| true) == 0 {
                skipped = true;
                break;
            }
        }

        assert!(skipped);
        assert!(bsp.is_truncated());
        assert_eq!(bsp.get_stats().skipped_lists, 1);
        assert!(bsp.get_remaining_bytes() < 1024);
    }

    #[test]
    fn invisible_polygons_are_not_inserted() {
        let mut bsp = DynamicBsp::new(&VisibilityConfig::default());

        let polygons = vec![
            TranslucentPolygon { descriptor: 1, polygon: quad(0.0, 10.0, -1.0) },
            TranslucentPolygon { descriptor: 2, polygon: quad(100.0, 10.0, -1.0) },
        ];

        let inserted = bsp.add_polygon_list(&Mat4f::identity(), &polygons, |polygon| polygon.centroid().x < 50.0);

        assert_eq!(inserted, 1);
        assert_eq!(bsp.get_stats().culled_polygons, 1);
        assert_eq!(back_to_front(&bsp, Vec3f::zero()), vec![1]);
    }
}
