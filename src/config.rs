//! Visibility and transparency ordering parameters

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Walker must be allowed to pass at least one portal
    #[error("maximal portal depth must be positive")]
    ZeroPortalDepth,

    /// BSP arena can't be empty
    #[error("BSP arena size must be positive")]
    ZeroArenaSize,

    /// Reserve eats whole arena
    #[error("BSP arena reserve ({reserve} bytes) must be less than arena size ({size} bytes)")]
    ReserveTooLarge {
        /// Arena size
        size: usize,

        /// Reserve size
        reserve: usize,
    },

    /// Coplanar face orientation threshold is a cosine
    #[error("coplanar threshold {0} is outside of (0, 1] range")]
    InvalidCoplanarThreshold(f32),
}

/// Visibility core configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityConfig {
    /// Maximal count of portals passed from camera room.
    /// Rooms deeper than this are still marked visible, but not walked through.
    pub max_portal_depth: usize,

    /// Translucent polygon BSP arena size (in bytes)
    pub bsp_arena_size: usize,

    /// Polygon lists are skipped if less than this count of bytes is left in BSP arena
    pub bsp_arena_reserve: usize,

    /// Minimal cosine between polygon and BSP node normals to file polygon as front-facing
    pub coplanar_threshold: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            max_portal_depth: 64,
            bsp_arena_size: 512 * 1024,
            bsp_arena_reserve: 1024,
            coplanar_threshold: 0.9,
        }
    }
}

impl VisibilityConfig {
    pub const fn with_max_portal_depth(mut self, depth: usize) -> Self {
        self.max_portal_depth = depth;
        self
    }

    pub const fn with_bsp_arena_size(mut self, size: usize) -> Self {
        self.bsp_arena_size = size;
        self
    }

    pub const fn with_bsp_arena_reserve(mut self, reserve: usize) -> Self {
        self.bsp_arena_reserve = reserve;
        self
    }

    pub const fn with_coplanar_threshold(mut self, threshold: f32) -> Self {
        self.coplanar_threshold = threshold;
        self
    }

    /// Check configuration consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_portal_depth == 0 {
            return Err(ConfigError::ZeroPortalDepth);
        }

        if self.bsp_arena_size == 0 {
            return Err(ConfigError::ZeroArenaSize);
        }

        if self.bsp_arena_reserve >= self.bsp_arena_size {
            return Err(ConfigError::ReserveTooLarge {
                size: self.bsp_arena_size,
                reserve: self.bsp_arena_reserve,
            });
        }

        if !(self.coplanar_threshold > 0.0 && self.coplanar_threshold <= 1.0) {
            return Err(ConfigError::InvalidCoplanarThreshold(self.coplanar_threshold));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(VisibilityConfig::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = VisibilityConfig::default();

        assert_eq!(
            config.with_max_portal_depth(0).validate(),
            Err(ConfigError::ZeroPortalDepth)
        );
        assert_eq!(
            config.with_bsp_arena_size(0).validate(),
            Err(ConfigError::ZeroArenaSize)
        );
        assert_eq!(
            config.with_bsp_arena_size(1024).validate(),
            Err(ConfigError::ReserveTooLarge { size: 1024, reserve: 1024 })
        );
        assert!(matches!(
            config.with_coplanar_threshold(f32::NAN).validate(),
            Err(ConfigError::InvalidCoplanarThreshold(_))
        ));
    }
}
