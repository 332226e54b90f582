//! Portal-based visibility and translucent surface ordering.
//!
//! Every frame [`visibility::VisibleSet`] walks the room graph of a [`world::World`]
//! starting from the camera room, clipping frustums by portal polygons, and
//! [`bsp::DynamicBsp`] orders translucent polygons of the rooms it accepted.
//! [`render_list::RenderList`] glues both together for the renderer.

/// Generic id implementation
macro_rules! impl_id {
    ($name: ident) => {
        /// Unique identifier
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
        pub struct $name(std::num::NonZeroU32);

        impl $name {
            /// Build id from index
            pub fn from_index(index: usize) -> Self {
                $name(std::num::NonZeroU32::try_from(index as u32 + 1).unwrap())
            }

            /// Get index by id
            pub fn into_index(self) -> usize {
                self.0.get() as usize - 1
            }
        }
    };
}

/// Basic math utility
pub mod math;

/// Basic geometry
pub mod geom;

/// Tunable parameters
pub mod config;

/// Clippable convex view regions
pub mod frustum;

/// Viewer description
pub mod camera;

/// Static room graph
pub mod world;

/// Per-frame portal walker
pub mod visibility;

/// Fixed budget bump allocator
pub mod arena;

/// Per-frame translucent polygon BSP
pub mod bsp;

/// Renderer-facing frame output
pub mod render_list;

pub use bsp::{BspStats, DynamicBsp, FaceRef, TranslucentPolygon};
pub use camera::Camera;
pub use config::{ConfigError, VisibilityConfig};
pub use frustum::{Frustum, FrustumId, FrustumState, SplitResult};
pub use geom::{BoundBox, OrientedBox, Plane, Polygon};
pub use math::{Mat4f, Vec3f};
pub use render_list::{RenderList, RenderRoom, TranslucentScene, TranslucentSource};
pub use visibility::{FrameStats, VisibleSet};
pub use world::{Portal, Room, RoomFlags, RoomId, World, WorldBuilder, WorldError};
