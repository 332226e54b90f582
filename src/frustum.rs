//! Convex view region, built by clipping portal polygons

use itertools::Itertools;

use crate::{
    geom::{self, BoundBox, OrientedBox, Plane, Polygon, SPLIT_EPSILON},
    math::Vec3f,
    world::{Portal, RoomId},
};

impl_id!(FrustumId);

/// Polygon by plane split result
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SplitResult {
    /// Something is left in front of plane
    Success,

    /// Polygon is clipped away completely
    Empty,
}

/// Frustum lifecycle state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrustumState {
    /// Polygon is being clipped
    Working,

    /// Clip planes are generated, frustum can be used in queries
    Finalized,

    /// Nothing left after clipping (or region is degenerate)
    Discarded,
}

/// Convex region with apex, bounded by side planes (one per polygon edge),
/// face plane and (optionally) far plane.
#[derive(Clone, Debug)]
pub struct Frustum {
    /// Cross-section polygon points
    points: Vec<Vec3f>,

    /// Side planes, inside is positive
    planes: Vec<Plane>,

    /// Face ('near') plane, inside is positive
    norm: Plane,

    /// Far plane, inside is positive
    far: Option<Plane>,

    /// Position frustum planes are built from
    apex: Vec3f,

    /// Cross-section center
    centroid: Vec3f,

    /// Frustum this one was generated from
    parent: Option<FrustumId>,

    /// Path length from camera frustum
    parents_count: u16,

    /// Room frustum is generated for
    room: Option<RoomId>,

    /// Current state
    state: FrustumState,
}

impl Frustum {
    /// Build working frustum from portal
    pub fn prepared(portal: &Portal) -> Self {
        let mut frustum = Self {
            points: Vec::new(),
            planes: Vec::new(),
            norm: portal.get_plane(),
            far: None,
            apex: Vec3f::zero(),
            centroid: Vec3f::zero(),
            parent: None,
            parents_count: 0,
            room: None,
            state: FrustumState::Working,
        };

        frustum.split_prepare(portal);
        frustum
    }

    /// Build frustum from cross-section points and apex.
    /// Used for root (camera) frustums, that are not generated from portals.
    pub fn from_cross_section(points: Vec<Vec3f>, norm: Plane, far: Option<Plane>, apex: Vec3f) -> Self {
        let mut frustum = Self {
            centroid: geom::points_centroid(&points),
            points,
            planes: Vec::new(),
            norm,
            far,
            apex,
            parent: None,
            parents_count: 0,
            room: None,
            state: FrustumState::Working,
        };

        if frustum.points.len() < 3 {
            frustum.state = FrustumState::Discarded;
        } else {
            frustum.gen_clip_planes(apex);
        }

        frustum
    }

    /// Reset frustum to portal polygon. Face plane is portal plane mirrored,
    /// so it's positive side is located behind the portal.
    pub fn split_prepare(&mut self, portal: &Portal) {
        self.points.clear();
        self.points.extend_from_slice(portal.get_points());
        self.planes.clear();
        self.norm = portal.get_plane().negate_direction();
        self.centroid = portal.get_centroid();
        self.parent = None;
        self.parents_count = 0;
        self.room = None;
        self.state = FrustumState::Working;
    }

    /// Clip working polygon by plane
    pub fn split_by_plane(&mut self, plane: &Plane) -> SplitResult {
        if self.state != FrustumState::Working {
            return SplitResult::Empty;
        }

        let mut clipped = Vec::with_capacity(self.points.len() + 2);

        geom::clip_points_by_plane(&self.points, plane, &mut clipped);
        geom::remove_duplicate_points(&mut clipped);

        if clipped.len() < 3 {
            self.points.clear();
            self.state = FrustumState::Discarded;
            return SplitResult::Empty;
        }

        self.points = clipped;
        SplitResult::Success
    }

    /// Generate side planes for final polygon shape
    pub fn gen_clip_planes(&mut self, apex: Vec3f) -> FrustumState {
        if self.state != FrustumState::Working {
            return self.state;
        }

        self.apex = apex;
        self.centroid = geom::points_centroid(&self.points);
        self.planes.clear();

        // apex in polygon plane makes zero-volume region
        let apex_in_plane = Polygon::from_ccw(self.points.clone())
            .map(|polygon| polygon.plane.get_signed_distance(apex).abs() <= SPLIT_EPSILON)
            .unwrap_or(true);

        if apex_in_plane {
            self.state = FrustumState::Discarded;
            return self.state;
        }

        for (curr, next) in self.points.iter().copied().circular_tuple_windows::<(_, _)>() {
            let Some(normal) = ((curr - apex) % (next - curr)).checked_normalized() else {
                continue;
            };

            let mut plane = Plane::from_point_normal(apex, normal);

            if plane.get_signed_distance(self.centroid) < 0.0 {
                plane = plane.negate_direction();
            }

            self.planes.push(plane);
        }

        self.state = if self.planes.len() >= 3 {
            FrustumState::Finalized
        } else {
            FrustumState::Discarded
        };

        self.state
    }

    /// Set frustum graph position
    pub(crate) fn link(&mut self, room: RoomId, parent: Option<FrustumId>, parents_count: u16) {
        self.room = Some(room);
        self.parent = parent;
        self.parents_count = parents_count;
    }

    /// Replace far plane
    pub(crate) fn set_far(&mut self, far: Option<Plane>) {
        self.far = far;
    }

    pub fn points(&self) -> &[Vec3f] {
        &self.points
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn norm(&self) -> Plane {
        self.norm
    }

    pub fn far(&self) -> Option<Plane> {
        self.far
    }

    pub fn apex(&self) -> Vec3f {
        self.apex
    }

    pub fn parent(&self) -> Option<FrustumId> {
        self.parent
    }

    pub fn parents_count(&self) -> u16 {
        self.parents_count
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
    }

    pub fn state(&self) -> FrustumState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == FrustumState::Finalized
    }

    /// Check if point is inside of face and far planes
    fn is_inside_caps(&self, point: Vec3f) -> bool {
        self.norm.get_signed_distance(point) >= -SPLIT_EPSILON
            && self.far.is_none_or(|far| far.get_signed_distance(point) >= -SPLIT_EPSILON)
    }

    /// Get corner ray `apex + direction * t` parameter range bounded by face and far planes
    fn corner_range(&self, direction: Vec3f) -> Option<(f32, f32)> {
        let mut range = (0.0f32, f32::INFINITY);

        for cap in std::iter::once(&self.norm).chain(self.far.as_ref()) {
            let distance = cap.get_signed_distance(self.apex);
            let rate = direction ^ cap.normal;

            if rate.abs() <= f32::EPSILON {
                if distance < -SPLIT_EPSILON {
                    return None;
                }
                continue;
            }

            let t = -distance / rate;

            if rate > 0.0 {
                range.0 = range.0.max(t);
            } else {
                range.1 = range.1.min(t);
            }
        }

        (range.0 <= range.1).then_some(range)
    }

    /// Check if point is located inside of frustum
    pub fn is_point_visible(&self, point: Vec3f) -> bool {
        self.is_finalized()
            && self.is_inside_caps(point)
            && self.planes.iter().all(|plane| plane.get_signed_distance(point) >= -SPLIT_EPSILON)
    }

    /// Check if polygon intersects frustum
    pub fn is_poly_visible(&self, polygon: &Polygon) -> bool {
        if !self.is_finalized() || polygon.is_empty() {
            return false;
        }

        // Polygon is turned back to viewer
        if polygon.plane.get_signed_distance(self.apex) < 0.0 {
            return false;
        }

        // Some frustum plane separates polygon from frustum
        let is_separating = |plane: &Plane| polygon.points
            .iter()
            .all(|point| plane.get_signed_distance(*point) < -SPLIT_EPSILON);

        let separated = false
            || self.planes.iter().any(is_separating)
            || is_separating(&self.norm)
            || self.far.as_ref().is_some_and(is_separating);

        if separated {
            return false;
        }

        // Frustum center ray hits polygon
        let direction = self.centroid - self.apex;
        if let Some(t) = polygon.ray_intersect(self.apex, direction) {
            if t > 0.0 && self.is_inside_caps(self.apex + direction * t) {
                return true;
            }
        }

        // Some point is inside
        if polygon.points.iter().any(|point| self.is_point_visible(*point)) {
            return true;
        }

        // Search for polygon edge crossing frustum side
        let plane_count = self.planes.len();

        for index in 0..plane_count {
            let prev = &self.planes[(index + plane_count - 1) % plane_count];
            let curr = &self.planes[index];
            let next = &self.planes[(index + 1) % plane_count];

            let is_inside_neighbours = |point: Vec3f| true
                && prev.get_signed_distance(point) >= -SPLIT_EPSILON
                && next.get_signed_distance(point) >= -SPLIT_EPSILON
                && self.is_inside_caps(point);

            for (begin, end) in polygon.points.iter().copied().circular_tuple_windows::<(_, _)>() {
                let begin_distance = curr.get_signed_distance(begin);
                let end_distance = curr.get_signed_distance(end);

                if begin_distance.abs() <= SPLIT_EPSILON && is_inside_neighbours(begin) {
                    return true;
                }

                let crosses = false
                    || begin_distance > SPLIT_EPSILON && end_distance < -SPLIT_EPSILON
                    || begin_distance < -SPLIT_EPSILON && end_distance > SPLIT_EPSILON;

                if crosses {
                    let t = begin_distance / (begin_distance - end_distance);

                    if is_inside_neighbours(begin + (end - begin) * t) {
                        return true;
                    }
                }
            }
        }

        // Search for polygon edge crossing face or far plane
        for cap in std::iter::once(&self.norm).chain(self.far.as_ref()) {
            for (begin, end) in polygon.points.iter().copied().circular_tuple_windows::<(_, _)>() {
                let begin_distance = cap.get_signed_distance(begin);
                let end_distance = cap.get_signed_distance(end);

                if (begin_distance < 0.0) != (end_distance < 0.0) {
                    let t = begin_distance / (begin_distance - end_distance);

                    if self.is_point_visible(begin + (end - begin) * t) {
                        return true;
                    }
                }
            }
        }

        // Search for frustum edge crossing polygon: corner rays first
        let mut near_outline = Vec::with_capacity(self.points.len());
        let mut far_outline = Vec::with_capacity(self.points.len());

        for point in &self.points {
            let direction = *point - self.apex;

            if let Some(t) = polygon.ray_intersect(self.apex, direction) {
                if t > 0.0 && self.is_inside_caps(self.apex + direction * t) {
                    return true;
                }
            }

            if let Some((t_min, t_max)) = self.corner_range(direction) {
                near_outline.push(self.apex + direction * t_min);
                if t_max.is_finite() {
                    far_outline.push(self.apex + direction * t_max);
                }
            }
        }

        // then face and far plane outlines
        for outline in [&near_outline, &far_outline] {
            if outline.len() != self.points.len() {
                continue;
            }

            for (begin, end) in outline.iter().copied().circular_tuple_windows::<(_, _)>() {
                let begin_distance = polygon.plane.get_signed_distance(begin);
                let end_distance = polygon.plane.get_signed_distance(end);

                let point = if begin_distance.abs() <= SPLIT_EPSILON {
                    begin
                } else if (begin_distance < 0.0) != (end_distance < 0.0) {
                    begin + (end - begin) * (begin_distance / (begin_distance - end_distance))
                } else {
                    continue;
                };

                if polygon.contains_coplanar_point(point) {
                    return true;
                }
            }
        }

        false
    }

    /// Check if axis-aligned box intersects frustum
    pub fn is_aabb_visible(&self, bmin: Vec3f, bmax: Vec3f) -> bool {
        if !self.is_finalized() {
            return false;
        }

        let bound_box = BoundBox::new(bmin, bmax);

        if bound_box.contains_point(self.apex) {
            return true;
        }

        const AXES: [Vec3f; 6] = [
            Vec3f::new(-1.0, 0.0, 0.0),
            Vec3f::new( 1.0, 0.0, 0.0),
            Vec3f::new(0.0, -1.0, 0.0),
            Vec3f::new(0.0,  1.0, 0.0),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(0.0, 0.0,  1.0),
        ];

        // only faces turned to apex (3 at most) are checked
        bound_box
            .faces()
            .iter()
            .zip(AXES)
            .filter_map(|(face, normal)| Polygon::from_points_normal(face.to_vec(), normal))
            .filter(|face| face.plane.get_signed_distance(self.apex) > 0.0)
            .any(|face| self.is_poly_visible(&face))
    }

    /// Check if oriented box intersects frustum
    pub fn is_obb_visible(&self, oriented_box: &OrientedBox) -> bool {
        if !self.is_finalized() {
            return false;
        }

        let mut apex_inside = true;

        for face in oriented_box.faces() {
            let distance = face.plane.get_signed_distance(self.apex);

            if distance > 0.0 {
                if self.is_poly_visible(&face) {
                    return true;
                }
                apex_inside = false;
            }
        }

        apex_inside
    }
}
