pub mod error;
pub mod input;
pub mod operators;
pub mod session;
pub mod tools;

pub use error::EditorError;
pub use input::{InputEvent, PointerButton};
pub use operators::duplicate;
pub use session::EditorSession;
pub use tools::{DrawSettings, Edit, Hit, Tool, ToolKind, handle_positions};
