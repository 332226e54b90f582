use crate::{frustum::Frustum, geom::Plane, math::Vec3f, vec3f};

/// Viewer description. World up axis is Z.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    /// Viewer position
    pub location: Vec3f,

    /// View direction (not necessarily normalized)
    pub direction: Vec3f,

    /// Vertical field of view, in radians
    pub fov_y: f32,

    /// Viewport width to height ratio
    pub aspect: f32,

    /// Near clip distance
    pub near: f32,

    /// Far clip distance
    pub far: f32,
}

impl Camera {
    /// Camera with 90 degree square projection
    pub fn new(location: Vec3f, direction: Vec3f) -> Self {
        Self {
            location,
            direction,
            fov_y: std::f32::consts::FRAC_PI_2,
            aspect: 1.0,
            near: 1.0,
            far: 10000.0,
        }
    }

    pub fn with_projection(mut self, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self
    }

    /// Get normalized view direction
    pub fn get_direction(&self) -> Option<Vec3f> {
        self.direction.checked_normalized()
    }

    /// Get camera (right, up) axes
    pub fn get_axes(&self) -> Option<(Vec3f, Vec3f)> {
        let dir = self.get_direction()?;

        let right = (dir % vec3f!(0.0, 0.0, 1.0))
            .checked_normalized()
            .unwrap_or(vec3f!(1.0, 0.0, 0.0));
        let up = (right % dir).normalized();

        Some((right, up))
    }

    /// Check if projection parameters make sense
    pub fn is_valid(&self) -> bool {
        true
            && self.get_direction().is_some()
            && self.fov_y > 0.0 && self.fov_y < std::f32::consts::PI
            && self.aspect > 0.0
            && self.near > 0.0
            && self.far > self.near
    }

    /// Build root frustum. Face plane passes through camera location,
    /// cross-section is the far plane rectangle.
    pub fn build_frustum(&self) -> Frustum {
        let (Some(dir), Some((right, up)), true) = (self.get_direction(), self.get_axes(), self.is_valid()) else {
            return Frustum::from_cross_section(Vec::new(), Plane::from_point_normal(self.location, vec3f!(0.0, 0.0, 1.0)), None, self.location);
        };

        let center = self.location + dir * self.far;
        let half_height = self.far * (self.fov_y * 0.5).tan();
        let half_width = half_height * self.aspect;

        let right = right * half_width;
        let up = up * half_height;

        let points = vec![
            center - right - up,
            center + right - up,
            center + right + up,
            center - right + up,
        ];

        Frustum::from_cross_section(
            points,
            Plane::from_point_normal(self.location, dir),
            Some(Plane::from_point_normal(center, -dir)),
            self.location,
        )
    }
}
