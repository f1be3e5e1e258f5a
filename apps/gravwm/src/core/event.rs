use gravwm_proto::{Message, DATA_WORDS};
use x11rb::protocol::xproto::Window;

use crate::ewmh::atoms::Prop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Return,
    Other,
}

/// Fields of a ConfigureRequest that were actually requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureRequest {
    pub window: Window,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub border_width: Option<u16>,
}

/// Protocol events the window manager reacts to. Everything else is
/// dropped during translation.
#[derive(Debug, Clone, PartialEq)]
pub enum WmEvent {
    MapRequest { window: Window },
    ConfigureRequest(ConfigureRequest),
    UnmapNotify { window: Window },
    DestroyNotify { window: Window },
    PropertyNotify { window: Window, prop: Prop },
    EnterNotify { window: Window },
    ButtonPress { window: Window, root_x: i32, root_y: i32, button: u8, with_modifier: bool },
    ButtonRelease { button: u8 },
    MotionNotify { root_x: i32, root_y: i32 },
    KeyPress { key: Key },
    ClientMessage { window: Window, message: Message, data: [u32; DATA_WORDS] },
    ScreenChange,
    Error { major_opcode: u8, kind: String, bad_value: u32 },
}

impl WmEvent {
    /// Events serviced while a drag owns the pointer
    pub fn is_drag_input(&self) -> bool {
        matches!(
            self,
            WmEvent::MotionNotify { .. }
                | WmEvent::ButtonRelease { .. }
                | WmEvent::KeyPress { .. }
                | WmEvent::EnterNotify { .. }
        )
    }
}
