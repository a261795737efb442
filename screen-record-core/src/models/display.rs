use std::fmt;

use serde::{Deserialize, Serialize};

/// Display or projection rotation in 90 degree steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROTATION_{}", self.degrees())
    }
}

/// Axis-aligned rectangle, `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rect anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Snapshot of the physical display being mirrored.
///
/// `width`/`height` describe the layer-stack space as currently oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
    pub orientation: Rotation,
    pub layer_stack: u32,
}

impl DisplayGeometry {
    pub fn layer_stack_rect(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }
}

/// Mapping from the display's layer stack onto the encoder surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRect {
    /// Region of the layer stack to capture (the whole of it).
    pub source: Rect,
    /// Where that region lands on the encoder surface, pre-rotation.
    pub destination: Rect,
    pub rotation: Rotation,
}
