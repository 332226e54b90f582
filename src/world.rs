//! Static room graph

use crate::{
    geom::{BoundBox, Plane, Polygon},
    math::Vec3f,
};

impl_id!(RoomId);

bitflags::bitflags! {
    /// Room state flags
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct RoomFlags: u32 {
        /// Room takes part in visibility (alternate room states are inactive)
        const ACTIVE = 1;

        /// Skybox is seen through this room
        const SKYBOX = 2;
    }
}

/// Portal (room-room connection)
#[derive(Clone, Debug)]
pub struct Portal {
    /// Portal polygon. Normal points into owner room.
    polygon: Polygon,

    /// Portal polygon center
    centroid: Vec3f,

    /// Room portal belongs to
    owner: RoomId,

    /// Room portal leads to
    dst: Option<RoomId>,
}

impl Portal {
    /// Get portal polygon
    pub fn get_polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Get portal polygon points
    pub fn get_points(&self) -> &[Vec3f] {
        &self.polygon.points
    }

    /// Get portal plane. Owner room is located in front of it.
    pub fn get_plane(&self) -> Plane {
        self.polygon.plane
    }

    pub fn get_centroid(&self) -> Vec3f {
        self.centroid
    }

    pub fn get_owner(&self) -> RoomId {
        self.owner
    }

    /// Get destination room, None if portal leads nowhere
    pub fn get_dst(&self) -> Option<RoomId> {
        self.dst
    }
}

/// Room, convex (in visibility sense) part of world connected with another ones by portals
#[derive(Clone, Debug)]
pub struct Room {
    /// Set of connections to another rooms
    portals: Vec<Portal>,

    /// Room bounding box
    bound_box: BoundBox,

    /// Room flags
    flags: RoomFlags,
}

impl Room {
    /// Get portal set
    pub fn get_portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn get_bound_box(&self) -> BoundBox {
        self.bound_box
    }

    pub fn get_flags(&self) -> RoomFlags {
        self.flags
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(RoomFlags::ACTIVE)
    }
}

/// World building error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// Room referenced by portal doesn't exist
    #[error("invalid room index {room_index} (room count: {room_count})")]
    InvalidRoomIndex {
        /// Room set length
        room_count: u32,

        /// Room index
        room_index: u32,
    },

    /// Portal polygon must have at least 3 points
    #[error("portal has {0} points, at least 3 are required")]
    TooFewPortalPoints(usize),

    /// Portal normal can't be normalized
    #[error("portal normal is degenerate")]
    DegeneratePortalNormal,

    /// Room bounding box contains non-finite values or is inverted
    #[error("invalid room bounds: {min:?} - {max:?}")]
    InvalidRoomBounds {
        /// Minimal corner
        min: Vec3f,

        /// Maximal corner
        max: Vec3f,
    },
}

/// Set of rooms
#[derive(Clone, Debug, Default)]
pub struct World {
    /// Rooms, indexed by RoomId
    rooms: Vec<Room>,
}

impl World {
    /// Get room by id
    pub fn get_room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.into_index())
    }

    /// Get iterator on ids of all rooms
    pub fn all_room_ids(&self) -> impl Iterator<Item = RoomId> {
        (0..self.rooms.len()).map(RoomId::from_index)
    }

    pub fn get_room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Find active room that contains point.
    /// If several rooms contain it, the smallest one is chosen.
    pub fn find_room(&self, point: Vec3f) -> Option<RoomId> {
        self.rooms
            .iter()
            .enumerate()
            .filter(|(_, room)| room.is_active() && room.bound_box.contains_point(point))
            .min_by(|(_, l), (_, r)| l.bound_box.volume().total_cmp(&r.bound_box.volume()))
            .map(|(index, _)| RoomId::from_index(index))
    }
}

/// World builder, validates everything that goes to world
#[derive(Default)]
pub struct WorldBuilder {
    /// Rooms built so far
    rooms: Vec<Room>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add active room
    pub fn add_room(&mut self, bound_box: BoundBox) -> Result<RoomId, WorldError> {
        self.add_room_with_flags(bound_box, RoomFlags::ACTIVE)
    }

    /// Add room with explicit flags
    pub fn add_room_with_flags(&mut self, bound_box: BoundBox, flags: RoomFlags) -> Result<RoomId, WorldError> {
        let (min, max) = (bound_box.min(), bound_box.max());
        let is_finite = [min.x, min.y, min.z, max.x, max.y, max.z]
            .iter()
            .all(|v| v.is_finite());

        if !is_finite || !bound_box.is_valid() {
            return Err(WorldError::InvalidRoomBounds { min, max });
        }

        self.rooms.push(Room {
            portals: Vec::new(),
            bound_box,
            flags,
        });

        Ok(RoomId::from_index(self.rooms.len() - 1))
    }

    /// Check room id
    fn check_room(&self, id: RoomId) -> Result<(), WorldError> {
        if id.into_index() < self.rooms.len() {
            Ok(())
        } else {
            Err(WorldError::InvalidRoomIndex {
                room_count: self.rooms.len() as u32,
                room_index: id.into_index() as u32,
            })
        }
    }

    /// Add portal from `owner` to `dst`.
    /// * `points` - convex planar point loop
    /// * `normal` - portal normal, points into `owner` room
    pub fn add_portal(
        &mut self,
        owner: RoomId,
        dst: Option<RoomId>,
        points: Vec<Vec3f>,
        normal: Vec3f
    ) -> Result<(), WorldError> {
        self.check_room(owner)?;
        if let Some(dst) = dst {
            self.check_room(dst)?;
        }

        if points.len() < 3 {
            return Err(WorldError::TooFewPortalPoints(points.len()));
        }

        let polygon = Polygon::from_points_normal(points, normal)
            .ok_or(WorldError::DegeneratePortalNormal)?;

        self.rooms[owner.into_index()].portals.push(Portal {
            centroid: polygon.centroid(),
            polygon,
            owner,
            dst,
        });

        Ok(())
    }

    /// Add pair of portals: `first` -> `second` with `normal` and `second` -> `first` with negated one.
    pub fn add_portal_pair(
        &mut self,
        first: RoomId,
        second: RoomId,
        points: Vec<Vec3f>,
        normal: Vec3f
    ) -> Result<(), WorldError> {
        let reversed = points.iter().rev().copied().collect::<Vec<_>>();

        self.add_portal(first, Some(second), points, normal)?;
        self.add_portal(second, Some(first), reversed, -normal)
    }

    /// Finish building
    pub fn build(self) -> World {
        World { rooms: self.rooms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3f;

    fn quad(y: f32) -> Vec<Vec3f> {
        vec![
            vec3f!(-1.0, y, -1.0),
            vec3f!( 1.0, y, -1.0),
            vec3f!( 1.0, y,  1.0),
            vec3f!(-1.0, y,  1.0),
        ]
    }

    #[test]
    fn builder_validates_input() {
        let mut builder = WorldBuilder::new();
        let room = builder.add_room(BoundBox::new(vec3f!(0.0, 0.0, 0.0), vec3f!(1.0, 1.0, 1.0))).unwrap();

        assert_eq!(
            builder.add_portal(room, Some(RoomId::from_index(5)), quad(0.0), vec3f!(0.0, 1.0, 0.0)),
            Err(WorldError::InvalidRoomIndex { room_count: 1, room_index: 5 })
        );
        assert_eq!(
            builder.add_portal(room, None, quad(0.0)[..2].to_vec(), vec3f!(0.0, 1.0, 0.0)),
            Err(WorldError::TooFewPortalPoints(2))
        );
        assert_eq!(
            builder.add_portal(room, None, quad(0.0), Vec3f::zero()),
            Err(WorldError::DegeneratePortalNormal)
        );
        assert!(matches!(
            builder.add_room(BoundBox::new(vec3f!(0.0, 0.0, 0.0), vec3f!(f32::INFINITY, 1.0, 1.0))),
            Err(WorldError::InvalidRoomBounds { .. })
        ));
        assert!(builder.add_portal(room, None, quad(0.0), vec3f!(0.0, 1.0, 0.0)).is_ok());

        let world = builder.build();
        assert_eq!(world.get_room_count(), 1);
        assert_eq!(world.get_room(room).unwrap().get_portals().len(), 1);
        assert!(world.get_room(RoomId::from_index(1)).is_none());
    }

    #[test]
    fn portal_pair_is_mirrored() {
        let mut builder = WorldBuilder::new();
        let a = builder.add_room(BoundBox::new(vec3f!(-1.0, -1.0, -1.0), vec3f!(1.0, 0.0, 1.0))).unwrap();
        let b = builder.add_room(BoundBox::new(vec3f!(-1.0, 0.0, -1.0), vec3f!(1.0, 1.0, 1.0))).unwrap();

        builder.add_portal_pair(a, b, quad(0.0), vec3f!(0.0, -1.0, 0.0)).unwrap();
        let world = builder.build();

        let ab = &world.get_room(a).unwrap().get_portals()[0];
        let ba = &world.get_room(b).unwrap().get_portals()[0];

        assert_eq!(ab.get_dst(), Some(b));
        assert_eq!(ba.get_dst(), Some(a));
        assert_eq!(ab.get_owner(), a);
        assert!(ab.get_plane().get_signed_distance(vec3f!(0.0, -0.5, 0.0)) > 0.0);
        assert!(ba.get_plane().get_signed_distance(vec3f!(0.0, 0.5, 0.0)) > 0.0);
    }

    #[test]
    fn find_room_prefers_smallest_active() {
        let mut builder = WorldBuilder::new();
        let outer = builder.add_room(BoundBox::new(vec3f!(-10.0, -10.0, -10.0), vec3f!(10.0, 10.0, 10.0))).unwrap();
        let inner = builder.add_room(BoundBox::new(vec3f!(-1.0, -1.0, -1.0), vec3f!(1.0, 1.0, 1.0))).unwrap();
        let _hidden = builder.add_room_with_flags(
            BoundBox::new(vec3f!(-0.5, -0.5, -0.5), vec3f!(0.5, 0.5, 0.5)),
            RoomFlags::empty(),
        ).unwrap();
        let world = builder.build();

        assert_eq!(world.find_room(Vec3f::zero()), Some(inner));
        assert_eq!(world.find_room(vec3f!(5.0, 0.0, 0.0)), Some(outer));
        assert_eq!(world.find_room(vec3f!(50.0, 0.0, 0.0)), None);
    }
}
