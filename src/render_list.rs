//! Renderer-facing frame output

use std::collections::HashMap;

use log::debug;

use crate::{
    bsp::{DynamicBsp, FaceRef, TranslucentPolygon},
    geom::OrientedBox,
    math::{Mat4f, Vec3f},
    visibility::VisibleSet,
    world::{RoomFlags, RoomId, World},
};

/// Translucent polygon provider (meshes, sprites, entities)
pub trait TranslucentSource {
    /// Call `f` for every translucent polygon list located in room.
    /// Lists are given as (object transform, object-space polygons) pairs.
    fn for_each_translucent_list(&self, room: RoomId, f: &mut dyn FnMut(&Mat4f, &[TranslucentPolygon]));
}

/// Simple translucent polygon storage
#[derive(Clone, Debug, Default)]
pub struct TranslucentScene {
    /// Polygon lists by room
    lists: HashMap<RoomId, Vec<(Mat4f, Vec<TranslucentPolygon>)>>,
}

impl TranslucentScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add object polygon list to room
    pub fn add_list(&mut self, room: RoomId, transform: Mat4f, polygons: Vec<TranslucentPolygon>) {
        self.lists
            .entry(room)
            .or_default()
            .push((transform, polygons));
    }

    /// Remove all lists
    pub fn clear(&mut self) {
        self.lists.clear();
    }
}

impl TranslucentSource for TranslucentScene {
    fn for_each_translucent_list(&self, room: RoomId, f: &mut dyn FnMut(&Mat4f, &[TranslucentPolygon])) {
        let Some(lists) = self.lists.get(&room) else {
            return;
        };

        for (transform, polygons) in lists {
            f(transform, polygons);
        }
    }
}

/// Visible room entry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderRoom {
    /// Room identifier
    pub room: RoomId,

    /// Longest portal path room is seen through
    pub max_path: u16,
}

/// Frame render list
pub struct RenderList<'t> {
    /// Rooms, farthest (by portal path) first
    rooms: Vec<RenderRoom>,

    /// Skybox is seen from some visible room
    draw_skybox: bool,

    /// Visible set list is built from
    visible: &'t VisibleSet,

    /// Translucent polygon tree
    bsp: &'t DynamicBsp,
}

impl<'t> RenderList<'t> {
    /// Build render list and fill translucent polygon BSP
    pub fn build(
        world: &World,
        visible: &'t VisibleSet,
        source: &dyn TranslucentSource,
        bsp: &'t mut DynamicBsp
    ) -> Self {
        let mut rooms = visible
            .get_visible_rooms()
            .iter()
            .map(|room| RenderRoom {
                room: *room,
                max_path: visible.get_max_path(*room).unwrap_or(0),
            })
            .collect::<Vec<_>>();

        // stable, so rooms with equal path stay in discovery order
        rooms.sort_by_key(|room| std::cmp::Reverse(room.max_path));

        let draw_skybox = rooms
            .iter()
            .filter_map(|room| world.get_room(room.room))
            .any(|room| room.get_flags().contains(RoomFlags::SKYBOX));

        bsp.reset();

        for render_room in &rooms {
            let room = render_room.room;

            source.for_each_translucent_list(room, &mut |transform: &Mat4f, polygons: &[TranslucentPolygon]| {
                bsp.add_polygon_list(transform, polygons, |polygon| visible.is_poly_visible_in_room(room, polygon));
            });
        }

        bsp.log_summary();
        debug!("render list: {} rooms, skybox: {}", rooms.len(), draw_skybox);

        Self {
            rooms,
            draw_skybox,
            visible,
            bsp,
        }
    }

    /// Get visible rooms in drawing order
    pub fn rooms(&self) -> &[RenderRoom] {
        &self.rooms
    }

    pub fn draw_skybox(&self) -> bool {
        self.draw_skybox
    }

    /// Get visible set list is built from
    pub fn get_visible_set(&self) -> &'t VisibleSet {
        self.visible
    }

    /// Check if object in room is visible
    pub fn is_obb_visible(&self, room: RoomId, oriented_box: &OrientedBox) -> bool {
        self.visible.is_obb_visible_in_room(room, oriented_box)
    }

    fn viewer(&self) -> Vec3f {
        self.visible.get_camera_location()
    }

    /// Get translucent faces, farthest first
    pub fn translucent_back_to_front(&self) -> Vec<FaceRef> {
        let mut faces = Vec::with_capacity(self.bsp.get_stats().faces);
        self.bsp.render_back_to_front(self.viewer(), |face| faces.push(face));
        faces
    }

    /// Get translucent faces, nearest first
    pub fn translucent_front_to_back(&self) -> Vec<FaceRef> {
        let mut faces = Vec::with_capacity(self.bsp.get_stats().faces);
        self.bsp.render_front_to_back(self.viewer(), |face| faces.push(face));
        faces
    }
}
