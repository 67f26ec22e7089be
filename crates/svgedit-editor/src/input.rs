//! Input abstraction layer.
//!
//! Normalizes the host's pointer events into a unified `InputEvent` enum
//! consumed by tools. Coordinates are screen space, which the document
//! treats as the root viewport's parent space.

use kurbo::Point;

/// Which pointer button changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
}

impl PointerButton {
    /// Map a DOM `MouseEvent.button` code.
    pub fn from_dom(code: i16) -> Self {
        match code {
            1 => Self::Auxiliary,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// A normalized input event from any pointing device.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed.
    PointerDown { x: f64, y: f64, button: PointerButton },

    /// Pointer moved, pressed or not.
    PointerMove { x: f64, y: f64 },

    /// Pointer released.
    PointerUp { x: f64, y: f64 },

    /// Pointer left the canvas; ends any interaction in progress.
    PointerLeave,
}

impl InputEvent {
    pub fn from_pointer_down(x: f64, y: f64, button: i16) -> Self {
        Self::PointerDown {
            x,
            y,
            button: PointerButton::from_dom(button),
        }
    }

    pub fn from_pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove { x, y }
    }

    pub fn from_pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp { x, y }
    }

    /// Extract position if the event carries one.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y } | Self::PointerUp { x, y } => {
                Some(Point::new(*x, *y))
            }
            Self::PointerLeave => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_button_codes() {
        assert_eq!(PointerButton::from_dom(0), PointerButton::Primary);
        assert_eq!(PointerButton::from_dom(1), PointerButton::Auxiliary);
        assert_eq!(PointerButton::from_dom(2), PointerButton::Secondary);
    }

    #[test]
    fn position_of_events() {
        assert_eq!(
            InputEvent::from_pointer_down(1.0, 2.0, 0).position(),
            Some(Point::new(1.0, 2.0))
        );
        assert_eq!(InputEvent::PointerLeave.position(), None);
    }
}
