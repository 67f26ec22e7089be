pub mod config;
pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod id;
pub mod model;
pub mod paint;
pub mod parser;
pub mod path;
pub mod shaper;
pub mod syntax;
pub mod transform;
pub mod units;

pub use config::EditorConfig;
pub use diagnostics::{SourceRange, Warning};
pub use emitter::{EmitOptions, emit_document};
pub use error::*;
pub use id::ElementId;
pub use model::*;
pub use paint::{Paint, PaintFormat};
pub use parser::{Parsed, parse_document};
pub use path::{PathCommand, PathData};
pub use shaper::{Frame, MultiShaper, Shape, Shaper, selection_frame, selection_shaper};
pub use transform::{Transform, TransformDescriptor, ViewBox};
pub use units::{Length, LengthUnit, from_pixels, to_pixels};

// Re-export geometry and graph types so downstream crates share versions
pub use kurbo::{Affine, Point, Rect, Vec2};
pub use petgraph::graph::NodeIndex;
