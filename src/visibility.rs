//! Per-frame portal walker

use log::{debug, trace, warn};

use crate::{
    camera::Camera,
    config::VisibilityConfig,
    frustum::{Frustum, FrustumId, FrustumState, SplitResult},
    geom::{OrientedBox, Plane, Polygon, SPLIT_EPSILON},
    math::Vec3f,
    world::{Portal, RoomId, World},
};

/// Frame visibility statistics
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Count of rooms in visible set
    pub visible_rooms: usize,

    /// Count of room visits (one per generated frustum)
    pub visited_rooms: usize,

    /// Count of finalized frustums, camera one included
    pub generated_frustums: usize,

    /// Portals without destination (or with inactive one)
    pub rejected_no_destination: usize,

    /// Portals turned back to camera (or edge-on)
    pub rejected_back_facing: usize,

    /// Portals leading to room that is already on frustum path
    pub rejected_cycle: usize,

    /// Portals rejected by distance/face plane test
    pub rejected_out_of_range: usize,

    /// Portals clipped away by emitter frustum
    pub rejected_clipped: usize,

    /// Frustums that weren't walked through because of depth limit
    pub depth_limit_hits: usize,
}

/// Portal rejection reason
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Rejection {
    NoDestination,
    BackFacing,
    Cycle,
    OutOfRange,
    Clipped,
}

/// Camera-dependent values walker needs for every portal
struct WalkContext<'t> {
    /// Room graph
    world: &'t World,

    /// Camera location
    camera_location: Vec3f,

    /// Plane through camera location, directed by view direction
    camera_plane: Plane,

    /// Maximal distance from camera plane
    far: f32,

    /// Maximal frustum path length walker goes through
    max_depth: usize,
}

/// Frame visible set. Owns all frustums generated during the frame.
#[derive(Clone, Debug, Default)]
pub struct VisibleSet {
    /// Frustum pool
    frustums: Vec<Frustum>,

    /// Frustums attached to rooms, indexed by room index
    room_frustums: Vec<Vec<FrustumId>>,

    /// Visible rooms in discovery order
    visible: Vec<RoomId>,

    /// Visibility flags, indexed by room index
    is_visible: Vec<bool>,

    /// Maximal frustum path length room is reached by
    max_path: Vec<u16>,

    /// Root frustum
    camera_frustum: Option<FrustumId>,

    /// Room camera is located in
    camera_room: Option<RoomId>,

    /// Camera location
    camera_location: Vec3f,

    /// Statistics
    stats: FrameStats,
}

impl VisibleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build visible set from scratch
    pub fn build(
        world: &World,
        camera: &Camera,
        camera_room: Option<RoomId>,
        config: &VisibilityConfig
    ) -> Self {
        let mut set = Self::new();
        set.rebuild(world, camera, camera_room, config);
        set
    }

    /// Reset frame state
    fn reset(&mut self, room_count: usize) {
        self.frustums.clear();

        self.room_frustums.iter_mut().for_each(Vec::clear);
        self.room_frustums.resize_with(room_count, Vec::new);

        self.is_visible.clear();
        self.is_visible.resize(room_count, false);

        self.max_path.clear();
        self.max_path.resize(room_count, 0);

        self.visible.clear();
        self.camera_frustum = None;
        self.camera_room = None;
        self.stats = FrameStats::default();
    }

    /// Rebuild visible set for new frame, reusing allocated memory.
    /// Configuration is expected to be checked by [`VisibilityConfig::validate`].
    pub fn rebuild(
        &mut self,
        world: &World,
        camera: &Camera,
        camera_room: Option<RoomId>,
        config: &VisibilityConfig
    ) {
        debug_assert_eq!(config.validate(), Ok(()));

        self.reset(world.get_room_count());
        self.camera_location = camera.location;

        let camera_frustum = camera.build_frustum();
        let camera_plane = camera_frustum.norm();
        let camera_frustum_finalized = camera_frustum.is_finalized();

        let camera_frustum_id = self.push_frustum(camera_frustum);
        self.camera_frustum = Some(camera_frustum_id);

        if !camera_frustum_finalized {
            warn!("invalid camera {:?}, visibility is limited to camera room", camera);
        }

        // camera room is used only if it's real and active
        let camera_room = camera_room.filter(|id| world
            .get_room(*id)
            .is_some_and(|room| room.is_active())
        );

        let Some(camera_room) = camera_room else {
            debug!("camera is outside of active rooms, testing every room bound box");

            for room_id in world.all_room_ids() {
                let Some(room) = world.get_room(room_id) else {
                    continue;
                };
                let bound_box = room.get_bound_box();

                if room.is_active() && self.frustums[camera_frustum_id.into_index()].is_aabb_visible(bound_box.min(), bound_box.max()) {
                    self.mark_visible(room_id, 0);
                }
            }

            self.finish_frame();
            return;
        };

        self.camera_room = Some(camera_room);
        self.frustums[camera_frustum_id.into_index()].link(camera_room, None, 0);
        self.attach(camera_room, camera_frustum_id);

        if camera_frustum_finalized {
            let context = WalkContext {
                world,
                camera_location: camera.location,
                camera_plane,
                far: camera.far,
                max_depth: config.max_portal_depth,
            };

            self.walk(&context, camera_room, camera_frustum_id);
        }

        self.finish_frame();
    }

    /// Write frame summary
    fn finish_frame(&mut self) {
        self.stats.visible_rooms = self.visible.len();
        self.stats.generated_frustums = self
            .frustums
            .iter()
            .filter(|frustum| frustum.is_finalized())
            .count();

        if self.stats.depth_limit_hits > 0 {
            warn!(
                "portal depth limit reached {} times, deeper rooms are not walked",
                self.stats.depth_limit_hits
            );
        }

        debug!(
            "visible set: {} rooms, {} frustums, {} room visits",
            self.stats.visible_rooms,
            self.stats.generated_frustums,
            self.stats.visited_rooms
        );
    }

    /// Add frustum to pool
    fn push_frustum(&mut self, frustum: Frustum) -> FrustumId {
        self.frustums.push(frustum);
        FrustumId::from_index(self.frustums.len() - 1)
    }

    /// Add room to visible set
    fn mark_visible(&mut self, room_id: RoomId, path: u16) {
        let index = room_id.into_index();

        if !self.is_visible[index] {
            self.is_visible[index] = true;
            self.visible.push(room_id);
        }

        self.max_path[index] = self.max_path[index].max(path);
    }

    /// Attach frustum to room
    fn attach(&mut self, room_id: RoomId, frustum_id: FrustumId) {
        let path = self.frustums[frustum_id.into_index()].parents_count();

        self.room_frustums[room_id.into_index()].push(frustum_id);
        self.mark_visible(room_id, path);
        self.stats.visited_rooms += 1;
    }

    /// Walk room graph starting from room
    fn walk(&mut self, context: &WalkContext, start_room: RoomId, start_frustum: FrustumId) {
        // (room, frustum room is seen through, room frustum came from)
        let mut visit_stack = Vec::<(RoomId, FrustumId, Option<RoomId>)>::new();

        visit_stack.push((start_room, start_frustum, None));

        while let Some((room_id, emitter_id, came_from)) = visit_stack.pop() {
            let Some(room) = context.world.get_room(room_id) else {
                continue;
            };

            'portal_walk: for portal in room.get_portals().iter().rev() {
                if came_from.is_some() && portal.get_dst() == came_from {
                    continue 'portal_walk;
                }

                let frustum = match self.process_portal(context, portal, emitter_id) {
                    Ok(frustum) => frustum,
                    Err(rejection) => {
                        trace!("portal {:?} -> {:?} rejected: {:?}", room_id, portal.get_dst(), rejection);
                        self.count_rejection(rejection);
                        continue 'portal_walk;
                    }
                };

                let Some(dst) = frustum.room() else {
                    continue 'portal_walk;
                };
                let depth = frustum.parents_count() as usize;
                let frustum_id = self.push_frustum(frustum);

                self.attach(dst, frustum_id);

                if depth >= context.max_depth {
                    self.stats.depth_limit_hits += 1;
                    continue 'portal_walk;
                }

                visit_stack.push((dst, frustum_id, Some(room_id)));
            }
        }
    }

    fn count_rejection(&mut self, rejection: Rejection) {
        let counter = match rejection {
            Rejection::NoDestination => &mut self.stats.rejected_no_destination,
            Rejection::BackFacing    => &mut self.stats.rejected_back_facing,
            Rejection::Cycle         => &mut self.stats.rejected_cycle,
            Rejection::OutOfRange    => &mut self.stats.rejected_out_of_range,
            Rejection::Clipped       => &mut self.stats.rejected_clipped,
        };

        *counter += 1;
    }

    /// Check if room is already on frustum path
    fn is_on_path(&self, frustum_id: FrustumId, room_id: RoomId) -> bool {
        let mut current = Some(frustum_id);

        while let Some(id) = current {
            let frustum = &self.frustums[id.into_index()];

            if frustum.room() == Some(room_id) {
                return true;
            }

            current = frustum.parent();
        }

        false
    }

    /// Build frustum of portal destination room as it's seen through emitter
    fn process_portal(
        &self,
        context: &WalkContext,
        portal: &Portal,
        emitter_id: FrustumId
    ) -> Result<Frustum, Rejection> {
        let dst = portal.get_dst().ok_or(Rejection::NoDestination)?;
        let dst_room = context.world.get_room(dst).ok_or(Rejection::NoDestination)?;

        if !dst_room.is_active() {
            return Err(Rejection::NoDestination);
        }

        let emitter = &self.frustums[emitter_id.into_index()];
        let parents_count = emitter.parents_count().saturating_add(1);

        // camera behind portal or in it's plane
        let pass_through = if portal.get_plane().get_signed_distance(context.camera_location) <= SPLIT_EPSILON {
            // rooms may overlap, so camera can be inside destination while still being 'behind' portal
            if !dst_room.get_bound_box().contains_point(context.camera_location) {
                return Err(Rejection::BackFacing);
            }
            true
        } else {
            false
        };

        if self.is_on_path(emitter_id, dst) {
            return Err(Rejection::Cycle);
        }

        if pass_through {
            let mut frustum = emitter.clone();
            frustum.link(dst, Some(emitter_id), parents_count);
            return Ok(frustum);
        }

        let points = portal.get_points();

        let in_range = points
            .iter()
            .any(|point| context.camera_plane.get_signed_distance(*point) <= context.far);
        let in_front = points
            .iter()
            .any(|point| emitter.norm().get_signed_distance(*point) > 0.0);

        if !in_range || !in_front {
            return Err(Rejection::OutOfRange);
        }

        let mut frustum = Frustum::prepared(portal);

        if frustum.split_by_plane(&emitter.norm()) == SplitResult::Empty {
            return Err(Rejection::Clipped);
        }

        for plane in emitter.planes() {
            if frustum.split_by_plane(plane) == SplitResult::Empty {
                return Err(Rejection::Clipped);
            }
        }

        if frustum.gen_clip_planes(context.camera_location) != FrustumState::Finalized {
            return Err(Rejection::Clipped);
        }

        frustum.set_far(emitter.far());
        frustum.link(dst, Some(emitter_id), parents_count);

        Ok(frustum)
    }

    /// Check if room is in visible set
    pub fn is_room_visible(&self, room_id: RoomId) -> bool {
        self.is_visible
            .get(room_id.into_index())
            .copied()
            .unwrap_or(false)
    }

    /// Get visible rooms in discovery order
    pub fn get_visible_rooms(&self) -> &[RoomId] {
        &self.visible
    }

    /// Get frustums attached to room
    pub fn get_room_frustums(&self, room_id: RoomId) -> &[FrustumId] {
        self.room_frustums
            .get(room_id.into_index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get frustum by id
    pub fn get_frustum(&self, id: FrustumId) -> Option<&Frustum> {
        self.frustums.get(id.into_index())
    }

    /// Get maximal frustum path length room is reached by, None if room isn't visible
    pub fn get_max_path(&self, room_id: RoomId) -> Option<u16> {
        if self.is_room_visible(room_id) {
            self.max_path.get(room_id.into_index()).copied()
        } else {
            None
        }
    }

    pub fn get_camera_frustum(&self) -> Option<&Frustum> {
        self.camera_frustum.and_then(|id| self.get_frustum(id))
    }

    pub fn get_camera_room(&self) -> Option<RoomId> {
        self.camera_room
    }

    pub fn get_camera_location(&self) -> Vec3f {
        self.camera_location
    }

    pub fn get_stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Frustums visibility queries in room run against.
    /// Visible rooms without attached frustums (camera outside of world) use camera frustum.
    fn query_frustums(&self, room_id: RoomId) -> impl Iterator<Item = &Frustum> {
        let attached = self.get_room_frustums(room_id);

        let fallback = if attached.is_empty() && self.is_room_visible(room_id) {
            self.get_camera_frustum()
        } else {
            None
        };

        attached
            .iter()
            .filter_map(|id| self.get_frustum(*id))
            .chain(fallback)
    }

    /// Check if polygon located in room is visible by any of room frustums
    pub fn is_poly_visible_in_room(&self, room_id: RoomId, polygon: &Polygon) -> bool {
        self.query_frustums(room_id).any(|frustum| frustum.is_poly_visible(polygon))
    }

    /// Check if axis-aligned box located in room is visible
    pub fn is_aabb_visible_in_room(&self, room_id: RoomId, bmin: Vec3f, bmax: Vec3f) -> bool {
        self.query_frustums(room_id).any(|frustum| frustum.is_aabb_visible(bmin, bmax))
    }

    /// Check if oriented box located in room is visible
    pub fn is_obb_visible_in_room(&self, room_id: RoomId, oriented_box: &OrientedBox) -> bool {
        self.query_frustums(room_id).any(|frustum| frustum.is_obb_visible(oriented_box))
    }
}
