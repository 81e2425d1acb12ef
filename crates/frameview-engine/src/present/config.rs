use crate::backend::FilterMode;

/// Presentation parameters fixed at construction.
///
/// Only `stretch` can change afterwards, through
/// [`Presenter::set_stretch`](super::Presenter::set_stretch).
#[derive(Debug, Clone, PartialEq)]
pub struct PresenterConfig {
    /// Fill the whole output instead of preserving the frame's aspect ratio.
    pub stretch: bool,

    /// Sampling filter for the frame texture.
    ///
    /// Nearest keeps pixel art sharp at integer and non-integer scales alike.
    pub filter: FilterMode,

    /// Create the crosshair overlay resources.
    ///
    /// With `false`, `init` skips them and overlay draws are no-ops.
    pub overlay: bool,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            stretch: false,
            filter: FilterMode::Nearest,
            overlay: true,
        }
    }
}
