use std::fmt;

use bitflags::bitflags;
use gravwm_proto::WindowFlags;
use x11rb::protocol::xproto::Window;

use crate::core::geometry::Rect;
use crate::window::hints::{SizeHints, Strut, WindowType};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClientFlags: u32 {
        const DEAD = 1 << 0;    // Window is gone
        const FOCUS = 1 << 1;   // Send WM_TAKE_FOCUS
        const INPUT = 1 << 2;   // Accepts SetInputFocus
        const CLOSE = 1 << 3;   // Send WM_DELETE_WINDOW
        const UNMAP = 1 << 4;   // Hidden by us
        const ARRANGE = 1 << 5; // Gravity geometry must be recomputed

        const MODE_FULL = 1 << 6;
        const MODE_FLOAT = 1 << 7;
        const MODE_STICK = 1 << 8;
        const MODE_URGENT = 1 << 9;
        const MODE_FIXED = 1 << 10;
        const MODE_RESIZE = 1 << 11; // Tile weight was set by a drag

        const NO_FULL = 1 << 12;
        const NO_FLOAT = 1 << 13;
        const NO_STICK = 1 << 14;
        const NO_URGENT = 1 << 15;

        const TYPE_NORMAL = 1 << 16;
        const TYPE_DESKTOP = 1 << 17;
        const TYPE_DOCK = 1 << 18;
        const TYPE_TOOLBAR = 1 << 19;
        const TYPE_SPLASH = 1 << 20;
        const TYPE_DIALOG = 1 << 21;

        const MODES = Self::MODE_FULL.bits() | Self::MODE_FLOAT.bits()
            | Self::MODE_STICK.bits() | Self::MODE_URGENT.bits();
        const TYPES = Self::TYPE_NORMAL.bits() | Self::TYPE_DESKTOP.bits() | Self::TYPE_DOCK.bits()
            | Self::TYPE_TOOLBAR.bits() | Self::TYPE_SPLASH.bits() | Self::TYPE_DIALOG.bits();
    }
}

/// Internal flag to stable wire bit
const WIRE_MAP: [(ClientFlags, WindowFlags); 15] = [
    (ClientFlags::MODE_FULL, WindowFlags::FULL),
    (ClientFlags::MODE_FLOAT, WindowFlags::FLOAT),
    (ClientFlags::MODE_STICK, WindowFlags::STICK),
    (ClientFlags::MODE_URGENT, WindowFlags::URGENT),
    (ClientFlags::MODE_FIXED, WindowFlags::FIXED),
    (ClientFlags::NO_FULL, WindowFlags::NO_FULL),
    (ClientFlags::NO_FLOAT, WindowFlags::NO_FLOAT),
    (ClientFlags::NO_STICK, WindowFlags::NO_STICK),
    (ClientFlags::NO_URGENT, WindowFlags::NO_URGENT),
    (ClientFlags::TYPE_NORMAL, WindowFlags::TYPE_NORMAL),
    (ClientFlags::TYPE_DESKTOP, WindowFlags::TYPE_DESKTOP),
    (ClientFlags::TYPE_DOCK, WindowFlags::TYPE_DOCK),
    (ClientFlags::TYPE_TOOLBAR, WindowFlags::TYPE_TOOLBAR),
    (ClientFlags::TYPE_SPLASH, WindowFlags::TYPE_SPLASH),
    (ClientFlags::TYPE_DIALOG, WindowFlags::TYPE_DIALOG),
];

impl ClientFlags {
    pub fn to_wire(self) -> WindowFlags {
        WIRE_MAP
            .iter()
            .filter(|(internal, _)| self.contains(*internal))
            .fold(WindowFlags::empty(), |acc, (_, wire)| acc | *wire)
    }

    /// Policy bit that vetoes toggling `mode`
    pub fn veto_for(mode: ClientFlags) -> ClientFlags {
        match mode {
            m if m == ClientFlags::MODE_FULL => ClientFlags::NO_FULL,
            m if m == ClientFlags::MODE_FLOAT => ClientFlags::NO_FLOAT,
            m if m == ClientFlags::MODE_STICK => ClientFlags::NO_STICK,
            m if m == ClientFlags::MODE_URGENT => ClientFlags::NO_URGENT,
            _ => ClientFlags::empty(),
        }
    }

    pub fn from_type(window_type: WindowType) -> ClientFlags {
        match window_type {
            WindowType::Normal => ClientFlags::TYPE_NORMAL,
            WindowType::Desktop => ClientFlags::TYPE_DESKTOP,
            WindowType::Dock => ClientFlags::TYPE_DOCK,
            WindowType::Toolbar => ClientFlags::TYPE_TOOLBAR,
            WindowType::Splash => ClientFlags::TYPE_SPLASH,
            WindowType::Dialog => ClientFlags::TYPE_DIALOG,
        }
    }
}

/// Default tile weight in percent
pub const DEFAULT_WEIGHT: u8 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub window: Window,
    pub flags: ClientFlags,
    /// Tag bitmask, never zero
    pub tags: u32,
    /// Gravity id per view
    pub gravities: Vec<usize>,
    /// Gravity the client is currently placed with
    pub gravity: usize,
    pub screen: usize,
    /// Configured border width; the effective width is zero while FULL
    pub border: u16,
    /// Floating geometry or the last gravity-derived geometry
    pub rect: Rect,
    pub size: SizeHints,
    /// Tile weight in percent, set by dragging a tiled client
    pub weight: u8,
    pub transient_for: Option<Window>,
    /// UnmapNotify events still due for our own unmaps
    pub pending_unmaps: u32,
    /// Edge reservation of a dock
    pub strut: Option<Strut>,
    pub name: String,
    pub instance: String,
    pub class: String,
    pub role: Option<String>,
}

impl Client {
    pub fn new(window: Window, rect: Rect, views: usize, gravity: usize, border: u16) -> Self {
        Self {
            window,
            flags: ClientFlags::INPUT | ClientFlags::TYPE_NORMAL,
            tags: 0,
            gravities: vec![gravity; views.max(1)],
            gravity,
            screen: 0,
            border,
            rect,
            size: SizeHints::default(),
            weight: DEFAULT_WEIGHT,
            transient_for: None,
            pending_unmaps: 0,
            strut: None,
            name: String::from("gravwm"),
            instance: String::from("unknown"),
            class: String::from("unknown"),
            role: None,
        }
    }

    pub fn is_float(&self) -> bool {
        self.flags.contains(ClientFlags::MODE_FLOAT)
    }

    pub fn is_full(&self) -> bool {
        self.flags.contains(ClientFlags::MODE_FULL)
    }

    pub fn is_stick(&self) -> bool {
        self.flags.contains(ClientFlags::MODE_STICK)
    }

    pub fn is_urgent(&self) -> bool {
        self.flags.contains(ClientFlags::MODE_URGENT)
    }

    pub fn is_dead(&self) -> bool {
        self.flags.contains(ClientFlags::DEAD)
    }

    /// Docks and desktops are drawn without a border
    pub fn is_borderless(&self) -> bool {
        self.flags.intersects(ClientFlags::TYPE_DOCK | ClientFlags::TYPE_DESKTOP)
    }

    pub fn effective_border(&self) -> u16 {
        if self.is_full() || self.is_borderless() { 0 } else { self.border }
    }

    /// Geometry that is actually sent to the server
    pub fn effective_rect(&self, screen_base: &Rect) -> Rect {
        if self.is_full() { *screen_base } else { self.rect }
    }

    /// Gravity stored for `view`, falling back to the current one
    pub fn gravity_for(&self, view: usize) -> usize {
        self.gravities.get(view).copied().unwrap_or(self.gravity)
    }

    /// Fields a tag pattern can be matched against
    pub fn match_field(&self, field: gravwm_config::MatchField) -> Option<&str> {
        use gravwm_config::MatchField;
        match field {
            MatchField::Class => Some(&self.class),
            MatchField::Instance => Some(&self.instance),
            MatchField::Name => Some(&self.name),
            MatchField::Role => self.role.as_deref(),
        }
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x} ({}/{}) {}", self.window, self.instance, self.class, self.name)
    }
}
