use anyhow::Result;
use x11rb::protocol::xproto::{Atom, Window};

use crate::core::geometry::Rect;
use crate::ewmh::atoms::Prop;
use crate::window::hints::WindowHints;

/// ICCCM protocol messages sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    TakeFocus,
    DeleteWindow,
}

/// ICCCM `WM_STATE` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

/// Windowing primitives every state change of the window manager is
/// mirrored onto.
pub trait Backend {
    fn root(&self) -> Window;
    /// Geometry of the whole display
    fn display_rect(&self) -> Rect;
    /// Physical outputs; empty when the server reports none
    fn outputs(&self) -> Result<Vec<Rect>>;

    fn atom(&self, prop: Prop) -> Atom;
    fn prop_of(&self, atom: Atom) -> Option<Prop>;

    /// Read everything needed to manage a window
    fn fetch_hints(&self, window: Window) -> Result<WindowHints>;
    /// Select input, add to the save-set, set the border and grab buttons
    fn manage(&self, window: Window, border: u16, pixel: u32) -> Result<()>;

    fn move_resize(&self, window: Window, rect: Rect, border: u16) -> Result<()>;
    fn set_border_color(&self, window: Window, pixel: u32) -> Result<()>;
    fn map(&self, window: Window) -> Result<()>;
    fn map_raised(&self, window: Window) -> Result<()>;
    fn unmap(&self, window: Window) -> Result<()>;
    fn raise(&self, window: Window) -> Result<()>;
    fn lower(&self, window: Window) -> Result<()>;
    /// Set the input focus; focusing the root reverts to pointer root
    fn focus(&self, window: Window) -> Result<()>;
    /// Let a synchronously grabbed click through to the client
    fn replay_pointer(&self) -> Result<()>;
    /// Forward a ConfigureRequest of a window that isn't managed
    fn configure_unmanaged(&self, request: &crate::core::event::ConfigureRequest) -> Result<()>;

    fn send_configure_notify(&self, window: Window, rect: Rect, border: u16) -> Result<()>;
    fn send_protocol(&self, window: Window, protocol: Protocol) -> Result<()>;
    fn kill_client(&self, window: Window) -> Result<()>;

    fn set_cardinals(&self, window: Window, prop: Prop, values: &[u32]) -> Result<()>;
    fn set_windows(&self, window: Window, prop: Prop, values: &[Window]) -> Result<()>;
    fn set_atoms(&self, window: Window, prop: Prop, values: &[Prop]) -> Result<()>;
    fn set_strings(&self, window: Window, prop: Prop, values: &[String]) -> Result<()>;
    fn delete_property(&self, window: Window, prop: Prop) -> Result<()>;
    fn set_wm_state(&self, window: Window, state: WmState) -> Result<()>;

    /// Grab pointer, keyboard and server for a drag. Returns false when the
    /// pointer is grabbed by someone else.
    fn grab_input(&self, window: Window) -> Result<bool>;
    fn ungrab_input(&self) -> Result<()>;
    /// Draw an inverted outline; drawing the same rect again erases it
    fn draw_mask(&self, rect: Rect) -> Result<()>;

    fn create_panel(&self, rect: Rect, pixel: u32) -> Result<Window>;
    fn destroy_window(&self, window: Window) -> Result<()>;
}
