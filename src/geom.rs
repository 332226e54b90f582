//! Basic geometry

use itertools::Itertools;

use crate::math::{Mat4f, Vec3f};

/// Clipping epsilon. Big enough to survive a chain of several clips of
/// world-sized polygons, small enough to keep portal edges in place.
pub const SPLIT_EPSILON: f32 = 0.02;

/// Plane represetnation structure
///
/// ## Equation
/// Standard plane equation is Ax + By + Cz + D = 0. In this case,
/// * A = normal.x
/// * B = normal.y
/// * C = normal.z
/// * D = -distance
///
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    /// plane normal
    pub normal: Vec3f,

    /// number to multiply normal to to get basic point
    pub distance: f32,
}

// Planes are stored in BSP node records
unsafe impl bytemuck::Zeroable for Plane {}
unsafe impl bytemuck::Pod for Plane {}

/// Relation of plane and point
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointRelation {
    /// Point it located behind plane
    Back,

    /// Point is located on plane
    OnPlane,

    /// Point is located in front of plane
    Front,
}

/// Relation of plane and polygon
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PolygonRelation {
    /// Polygon located in front of plane
    Front,

    /// Polygon located back of plane
    Back,

    /// Polygon located completely on plane
    OnPlane,

    /// Polygon has points on both sides of plane
    Intersects,
}

impl Plane {
    /// Build plane from it's normal and some point on it
    pub fn from_point_normal(point: Vec3f, normal: Vec3f) -> Self {
        Self {
            normal,
            distance: point ^ normal,
        }
    }

    /// Make plane that contains equal point set, but has counter-directional normal
    pub fn negate_direction(self) -> Self {
        Self { normal: -self.normal, distance: -self.distance }
    }

    /// Signed distance from plane to point. Positive if point is located in front of plane.
    pub fn get_signed_distance(&self, point: Vec3f) -> f32 {
        (point ^ self.normal) - self.distance
    }

    /// Get relation of point and plane
    pub fn get_point_relation(&self, point: Vec3f) -> PointRelation {
        let metrics = self.get_signed_distance(point);

        if metrics > SPLIT_EPSILON {
            PointRelation::Front
        } else if metrics < -SPLIT_EPSILON {
            PointRelation::Back
        } else {
            PointRelation::OnPlane
        }
    }

    /// Get relation of plane and point set
    pub fn get_points_relation(&self, points: &[Vec3f]) -> PolygonRelation {
        let mut front_occured = false;
        let mut back_occured = false;

        for point in points {
            match self.get_point_relation(*point) {
                PointRelation::Front   => front_occured    = true,
                PointRelation::Back    => back_occured     = true,
                _ => {}
            }
        }

        match (front_occured, back_occured) {
            (false, false) => PolygonRelation::OnPlane,
            (false, true ) => PolygonRelation::Back,
            (true , false) => PolygonRelation::Front,
            (true , true ) => PolygonRelation::Intersects,
        }
    }

    /// Get relation of plane and polygon
    pub fn get_polygon_relation(&self, polygon: &Polygon) -> PolygonRelation {
        self.get_points_relation(&polygon.points)
    }

    /// Intersect plane with ray `origin + direction * t`
    /// # Returns
    /// Ray parameter `t` of intersection point, None if ray is parallel to plane
    pub fn ray_intersect(&self, origin: Vec3f, direction: Vec3f) -> Option<f32> {
        let denom = direction ^ self.normal;

        if denom.abs() <= f32::EPSILON {
            return None;
        }

        Some((self.distance - (origin ^ self.normal)) / denom)
    }

    /// Intersection of segment with known signed distances of it's ends
    fn segment_point(begin: Vec3f, end: Vec3f, begin_distance: f32, end_distance: f32) -> Vec3f {
        let t = begin_distance / (begin_distance - end_distance);

        begin + (end - begin) * t
    }
}

/// Clip convex point loop by plane, keeping it's front part.
///
/// Points located within [`SPLIT_EPSILON`] of the plane are kept as is,
/// new points are inserted only on edges that actually cross the plane.
/// Result is written to `dst` (that is cleared before) and can contain
/// duplicate points, so [`remove_duplicate_points`] should be called after.
pub fn clip_points_by_plane(points: &[Vec3f], plane: &Plane, dst: &mut Vec<Vec3f>) {
    dst.clear();

    if points.is_empty() {
        return;
    }

    for (curr, next) in points.iter().copied().circular_tuple_windows::<(_, _)>() {
        let curr_distance = plane.get_signed_distance(curr);
        let next_distance = plane.get_signed_distance(next);

        if curr_distance >= -SPLIT_EPSILON {
            dst.push(curr);
        }

        let crosses = false
            || curr_distance > SPLIT_EPSILON && next_distance < -SPLIT_EPSILON
            || curr_distance < -SPLIT_EPSILON && next_distance > SPLIT_EPSILON;

        if crosses {
            dst.push(Plane::segment_point(curr, next, curr_distance, next_distance));
        }
    }
}

/// Collapse consecutive points (including last-first pair) that are closer than [`SPLIT_EPSILON`]
pub fn remove_duplicate_points(points: &mut Vec<Vec3f>) {
    const EPSILON2: f32 = SPLIT_EPSILON * SPLIT_EPSILON;

    points.dedup_by(|next, prev| (*next - *prev).length2() < EPSILON2);

    while points.len() > 1 {
        let first = points[0];
        let last = points[points.len() - 1];

        if (first - last).length2() < EPSILON2 {
            points.pop();
        } else {
            break;
        }
    }
}

/// Calculate point set center of mass
pub fn points_centroid(points: &[Vec3f]) -> Vec3f {
    if points.is_empty() {
        return Vec3f::zero();
    }

    points
        .iter()
        .copied()
        .fold(Vec3f::zero(), std::ops::Add::add)
        / points.len() as f32
}

/// Calculate point loop normal by Newell's method.
/// Normal direction corresponds to counter-clockwise point order.
fn newell_normal(points: &[Vec3f]) -> Option<Vec3f> {
    let mut normal = Vec3f::zero();

    for (curr, next) in points.iter().copied().circular_tuple_windows::<(_, _)>() {
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }

    normal.checked_normalized()
}

/// Convex polygon
#[derive(Debug, Clone)]
pub struct Polygon {
    /// Polygon points
    pub points: Vec<Vec3f>,

    /// Plane
    pub plane: Plane,
}

impl Polygon {
    /// Build polygon from counter-clockwise going points
    /// # Returns
    /// None if there is less than three points or they do not define a plane
    pub fn from_ccw(points: Vec<Vec3f>) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let normal = newell_normal(&points)?;

        Some(Self {
            plane: Plane::from_point_normal(points_centroid(&points), normal),
            points,
        })
    }

    /// Build polygon from points and known normal (it's normalized there)
    pub fn from_points_normal(points: Vec<Vec3f>, normal: Vec3f) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }

        let normal = normal.checked_normalized()?;

        Some(Self {
            plane: Plane::from_point_normal(points_centroid(&points), normal),
            points,
        })
    }

    /// Polygon center of mass
    pub fn centroid(&self) -> Vec3f {
        points_centroid(&self.points)
    }

    /// Check if polygon has less than 3 points
    pub fn is_empty(&self) -> bool {
        self.points.len() < 3
    }

    /// Clip polygon by plane
    /// # Returns
    /// Front part of polygon, None if there's nothing left in front of plane
    pub fn clip(&self, plane: &Plane) -> Option<Polygon> {
        let mut points = Vec::with_capacity(self.points.len() + 2);

        clip_points_by_plane(&self.points, plane, &mut points);
        remove_duplicate_points(&mut points);

        if points.len() < 3 {
            return None;
        }

        Some(Polygon { points, plane: self.plane })
    }

    /// Apply affine transform to polygon
    pub fn transformed(&self, transform: &Mat4f) -> Polygon {
        let points = self.points
            .iter()
            .map(|p| transform.transform_point(*p))
            .collect::<Vec<_>>();

        // orientation of transformed loop is kept unless transform mirrors it,
        // so compare with transformed normal to keep the facing side
        let transformed_normal = transform
            .transform_vector(self.plane.normal)
            .checked_normalized()
            .unwrap_or(self.plane.normal);

        let normal = match newell_normal(&points) {
            Some(n) if (n ^ transformed_normal) < 0.0 => -n,
            Some(n) => n,
            None => transformed_normal,
        };

        Polygon {
            plane: Plane::from_point_normal(points_centroid(&points), normal),
            points,
        }
    }

    /// Check if point (assumed to lie on polygon plane) is inside of polygon
    pub fn contains_coplanar_point(&self, point: Vec3f) -> bool {
        self.points
            .iter()
            .copied()
            .circular_tuple_windows::<(_, _)>()
            .all(|(curr, next)| (((next - curr) % (point - curr)) ^ self.plane.normal) >= -SPLIT_EPSILON)
    }

    /// Intersect polygon with ray `origin + direction * t`
    /// # Returns
    /// Ray parameter of intersection point if it's located inside of polygon
    pub fn ray_intersect(&self, origin: Vec3f, direction: Vec3f) -> Option<f32> {
        let t = self.plane.ray_intersect(origin, direction)?;

        if self.contains_coplanar_point(origin + direction * t) {
            Some(t)
        } else {
            None
        }
    }
}

/// Bounding box
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundBox {
    /// minimal vector
    min: Vec3f,

    /// maximal vector
    max: Vec3f,
}

impl BoundBox {
    /// Build minimal boundbox that contains this pair of points
    pub fn new(p1: Vec3f, p2: Vec3f) -> Self {
        Self {
            min: p1.min(p2),
            max: p1.max(p2),
        }
    }

    /// Get boundbox maximal fitting coordinates
    pub fn max(self) -> Vec3f {
        self.max
    }

    /// Get boundbox minimal fitting coordinates
    pub fn min(self) -> Vec3f {
        self.min
    }

    /// Get boundbox dimensions
    pub fn size(self) -> Vec3f {
        self.max - self.min
    }

    /// Get boundbox center
    pub fn center(self) -> Vec3f {
        (self.min + self.max) * 0.5
    }

    /// Get boundbox volume
    pub fn volume(self) -> f32 {
        let size = self.size();

        size.x * size.y * size.z
    }

    /// Check if boundbox has non-negative size by every axis
    pub fn is_valid(self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Check if point is located inside of boundbox (borders included)
    pub fn contains_point(&self, point: Vec3f) -> bool {
        true
            && point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Boundbox face polygons, normals point outside of the box.
    /// Order: -X, +X, -Y, +Y, -Z, +Z.
    pub fn faces(&self) -> [[Vec3f; 4]; 6] {
        let (a, b) = (self.min, self.max);

        [
            [Vec3f::new(a.x, a.y, a.z), Vec3f::new(a.x, a.y, b.z), Vec3f::new(a.x, b.y, b.z), Vec3f::new(a.x, b.y, a.z)],
            [Vec3f::new(b.x, a.y, a.z), Vec3f::new(b.x, b.y, a.z), Vec3f::new(b.x, b.y, b.z), Vec3f::new(b.x, a.y, b.z)],
            [Vec3f::new(a.x, a.y, a.z), Vec3f::new(b.x, a.y, a.z), Vec3f::new(b.x, a.y, b.z), Vec3f::new(a.x, a.y, b.z)],
            [Vec3f::new(a.x, b.y, a.z), Vec3f::new(a.x, b.y, b.z), Vec3f::new(b.x, b.y, b.z), Vec3f::new(b.x, b.y, a.z)],
            [Vec3f::new(a.x, a.y, a.z), Vec3f::new(a.x, b.y, a.z), Vec3f::new(b.x, b.y, a.z), Vec3f::new(b.x, a.y, a.z)],
            [Vec3f::new(a.x, a.y, b.z), Vec3f::new(b.x, a.y, b.z), Vec3f::new(b.x, b.y, b.z), Vec3f::new(a.x, b.y, b.z)],
        ]
    }
}

/// Oriented bounding box: local-space box placed into world by affine transform
#[derive(Copy, Clone, Debug)]
pub struct OrientedBox {
    /// Box in local coordinates
    pub base: BoundBox,

    /// Local to world transform
    pub transform: Mat4f,
}

impl OrientedBox {
    pub fn new(base: BoundBox, transform: Mat4f) -> Self {
        Self { base, transform }
    }

    /// World-space center
    pub fn center(&self) -> Vec3f {
        self.transform.transform_point(self.base.center())
    }

    /// World-space face polygons with outward normals
    pub fn faces(&self) -> Vec<Polygon> {
        let local_center = self.base.center();

        self.base
            .faces()
            .iter()
            .filter_map(|face| {
                let local_normal = points_centroid(face) - local_center;
                let points = face
                    .iter()
                    .map(|p| self.transform.transform_point(*p))
                    .collect::<Vec<_>>();
                let normal = self.transform.transform_vector(local_normal);

                Polygon::from_points_normal(points, normal)
            })
            .collect()
    }
}
