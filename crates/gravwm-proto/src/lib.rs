use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for control protocol encoding
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtoError {
    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    #[error("Name too long for a client message: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Empty name")]
    EmptyName,

    #[error("Name is not valid UTF-8")]
    InvalidName,
}

/// Number of 32-bit data words carried by a client message
pub const DATA_WORDS: usize = 5;

/// Maximum byte length of a name packed into a client message
pub const NAME_CAPACITY: usize = DATA_WORDS * 4;

/// Names of the properties published by the window manager.
pub mod props {
    pub const NET_SUPPORTED: &str = "_NET_SUPPORTED";
    pub const NET_SUPPORTING_WM_CHECK: &str = "_NET_SUPPORTING_WM_CHECK";
    pub const NET_CLIENT_LIST: &str = "_NET_CLIENT_LIST";
    pub const NET_CLIENT_LIST_STACKING: &str = "_NET_CLIENT_LIST_STACKING";
    pub const NET_ACTIVE_WINDOW: &str = "_NET_ACTIVE_WINDOW";
    pub const NET_CURRENT_DESKTOP: &str = "_NET_CURRENT_DESKTOP";
    pub const NET_NUMBER_OF_DESKTOPS: &str = "_NET_NUMBER_OF_DESKTOPS";
    pub const NET_DESKTOP_NAMES: &str = "_NET_DESKTOP_NAMES";
    pub const NET_DESKTOP_GEOMETRY: &str = "_NET_DESKTOP_GEOMETRY";
    pub const NET_DESKTOP_VIEWPORT: &str = "_NET_DESKTOP_VIEWPORT";
    pub const NET_WORKAREA: &str = "_NET_WORKAREA";
    pub const NET_WM_NAME: &str = "_NET_WM_NAME";
    pub const NET_WM_DESKTOP: &str = "_NET_WM_DESKTOP";
    pub const NET_WM_STATE: &str = "_NET_WM_STATE";
    pub const NET_FRAME_EXTENTS: &str = "_NET_FRAME_EXTENTS";

    pub const WINDOW_FLAGS: &str = "GRAVWM_WINDOW_FLAGS";
    pub const WINDOW_TAGS: &str = "GRAVWM_WINDOW_TAGS";
    pub const WINDOW_GRAVITY: &str = "GRAVWM_WINDOW_GRAVITY";
    pub const WINDOW_SCREEN: &str = "GRAVWM_WINDOW_SCREEN";
    pub const VIEW_TAGS: &str = "GRAVWM_VIEW_TAGS";
    pub const TAG_LIST: &str = "GRAVWM_TAG_LIST";
    pub const GRAVITY_LIST: &str = "GRAVWM_GRAVITY_LIST";
    pub const SCREEN_VIEWS: &str = "GRAVWM_SCREEN_VIEWS";
}

/// Control messages understood by the window manager.
///
/// Every message is a format-32 client message with five data words. The
/// layout of the words is documented per variant; unused words are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    /// `[view]` on the root window
    CurrentDesktop,
    /// no data, sent with the target window
    ActiveWindow,
    /// `[action, atom, atom]` sent with the target window
    WmState,
    /// no data, sent with the target window
    CloseWindow,
    /// `[source, window, detail]` on the root window
    RestackWindow,
    /// `[flags, x, y, width, height]` sent with the target window
    MoveResizeWindow,
    /// `[x_root, y_root, direction]` sent with the target window
    WmMoveResize,
    /// `[window, tag]`
    WindowTag,
    /// `[window, tag]`
    WindowUntag,
    /// `[window, gravity]`
    WindowGravity,
    /// `[window, screen]`
    WindowScreen,
    /// `[view, tag]`
    ViewTag,
    /// `[view, tag]`
    ViewUntag,
    /// packed name
    TagNew,
    /// `[tag]`
    TagKill,
    /// packed name
    ViewNew,
    /// `[view]`
    ViewKill,
    Reload,
    Quit,
}

impl Message {
    pub const ALL: [Message; 19] = [
        Message::CurrentDesktop,
        Message::ActiveWindow,
        Message::WmState,
        Message::CloseWindow,
        Message::RestackWindow,
        Message::MoveResizeWindow,
        Message::WmMoveResize,
        Message::WindowTag,
        Message::WindowUntag,
        Message::WindowGravity,
        Message::WindowScreen,
        Message::ViewTag,
        Message::ViewUntag,
        Message::TagNew,
        Message::TagKill,
        Message::ViewNew,
        Message::ViewKill,
        Message::Reload,
        Message::Quit,
    ];

    /// Atom name used as the message type
    pub fn atom_name(self) -> &'static str {
        match self {
            Message::CurrentDesktop => "_NET_CURRENT_DESKTOP",
            Message::ActiveWindow => "_NET_ACTIVE_WINDOW",
            Message::WmState => "_NET_WM_STATE",
            Message::CloseWindow => "_NET_CLOSE_WINDOW",
            Message::RestackWindow => "_NET_RESTACK_WINDOW",
            Message::MoveResizeWindow => "_NET_MOVERESIZE_WINDOW",
            Message::WmMoveResize => "_NET_WM_MOVERESIZE",
            Message::WindowTag => "GRAVWM_WINDOW_TAG",
            Message::WindowUntag => "GRAVWM_WINDOW_UNTAG",
            Message::WindowGravity => "GRAVWM_WINDOW_GRAVITY",
            Message::WindowScreen => "GRAVWM_WINDOW_SCREEN",
            Message::ViewTag => "GRAVWM_VIEW_TAG",
            Message::ViewUntag => "GRAVWM_VIEW_UNTAG",
            Message::TagNew => "GRAVWM_TAG_NEW",
            Message::TagKill => "GRAVWM_TAG_KILL",
            Message::ViewNew => "GRAVWM_VIEW_NEW",
            Message::ViewKill => "GRAVWM_VIEW_KILL",
            Message::Reload => "GRAVWM_RELOAD",
            Message::Quit => "GRAVWM_QUIT",
        }
    }

    pub fn from_atom_name(name: &str) -> Result<Self, ProtoError> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.atom_name() == name)
            .ok_or_else(|| ProtoError::UnknownMessage(name.to_string()))
    }

    /// Whether the `window` field of the event names the target client
    /// instead of the root window
    pub fn targets_client(self) -> bool {
        matches!(
            self,
            Message::ActiveWindow
                | Message::WmState
                | Message::CloseWindow
                | Message::MoveResizeWindow
                | Message::WmMoveResize
        )
    }
}

/// `_NET_WM_STATE` action word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateAction {
    Remove = 0,
    Add = 1,
    Toggle = 2,
}

impl StateAction {
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            0 => Some(StateAction::Remove),
            1 => Some(StateAction::Add),
            2 => Some(StateAction::Toggle),
            _ => None,
        }
    }

    /// Whether a state that is currently `active` has to flip
    pub fn needs_flip(self, active: bool) -> bool {
        match self {
            StateAction::Remove => active,
            StateAction::Add => !active,
            StateAction::Toggle => true,
        }
    }
}

/// `_NET_RESTACK_WINDOW` detail word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restack {
    Above = 0,
    Below = 1,
}

impl Restack {
    pub fn from_word(word: u32) -> Option<Self> {
        match word {
            0 => Some(Restack::Above),
            1 => Some(Restack::Below),
            _ => None,
        }
    }
}

/// `_NET_WM_MOVERESIZE` directions
pub mod moveresize {
    pub const SIZE_TOPLEFT: u32 = 0;
    pub const SIZE_TOP: u32 = 1;
    pub const SIZE_TOPRIGHT: u32 = 2;
    pub const SIZE_RIGHT: u32 = 3;
    pub const SIZE_BOTTOMRIGHT: u32 = 4;
    pub const SIZE_BOTTOM: u32 = 5;
    pub const SIZE_BOTTOMLEFT: u32 = 6;
    pub const SIZE_LEFT: u32 = 7;
    pub const MOVE: u32 = 8;
    pub const CANCEL: u32 = 11;
}

bitflags! {
    /// Stable external encoding of `GRAVWM_WINDOW_FLAGS`.
    ///
    /// The window manager translates its internal flags into these bits;
    /// the values never change between releases.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        const FULL = 1 << 0;
        const FLOAT = 1 << 1;
        const STICK = 1 << 2;
        const URGENT = 1 << 3;
        const FIXED = 1 << 4;

        const NO_FULL = 1 << 8;
        const NO_FLOAT = 1 << 9;
        const NO_STICK = 1 << 10;
        const NO_URGENT = 1 << 11;

        const TYPE_NORMAL = 1 << 16;
        const TYPE_DESKTOP = 1 << 17;
        const TYPE_DOCK = 1 << 18;
        const TYPE_TOOLBAR = 1 << 19;
        const TYPE_SPLASH = 1 << 20;
        const TYPE_DIALOG = 1 << 21;
    }
}

impl WindowFlags {
    /// Short mode column used by list output, e.g. `FS--`
    pub fn mode_string(self) -> String {
        [
            (WindowFlags::FULL, 'F'),
            (WindowFlags::FLOAT, 'O'),
            (WindowFlags::STICK, 'S'),
            (WindowFlags::URGENT, 'U'),
        ]
        .iter()
        .map(|&(flag, c)| if self.contains(flag) { c } else { '-' })
        .collect()
    }
}

/// Pack a name into the five data words of a client message (little endian,
/// zero padded).
pub fn pack_name(name: &str) -> Result<[u32; DATA_WORDS], ProtoError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(ProtoError::EmptyName);
    }
    if bytes.len() > NAME_CAPACITY {
        return Err(ProtoError::NameTooLong { len: bytes.len(), max: NAME_CAPACITY });
    }

    let mut buf = [0u8; NAME_CAPACITY];
    buf[..bytes.len()].copy_from_slice(bytes);

    let mut data = [0u32; DATA_WORDS];
    for (word, chunk) in data.iter_mut().zip(buf.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(data)
}

/// Inverse of [`pack_name`]
pub fn unpack_name(data: &[u32; DATA_WORDS]) -> Result<String, ProtoError> {
    let bytes: Vec<u8> = data.iter().flat_map(|w| w.to_le_bytes()).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    if end == 0 {
        return Err(ProtoError::EmptyName);
    }
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| ProtoError::InvalidName)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_are_unique() {
        for (i, a) in Message::ALL.iter().enumerate() {
            for b in &Message::ALL[i + 1..] {
                assert_ne!(a.atom_name(), b.atom_name());
            }
        }
        assert_eq!(Message::from_atom_name("GRAVWM_WINDOW_GRAVITY").unwrap(), Message::WindowGravity);
        assert_eq!(
            Message::from_atom_name("GRAVWM_NOPE"),
            Err(ProtoError::UnknownMessage("GRAVWM_NOPE".to_string()))
        );
    }

    #[test]
    fn test_name_packing() {
        let data = pack_name("www").unwrap();
        assert_eq!(data[0], u32::from_le_bytes([b'w', b'w', b'w', 0]));
        assert_eq!(&data[1..], &[0, 0, 0, 0]);
        assert_eq!(unpack_name(&data).unwrap(), "www");

        let full = "abcdefghijklmnopqrst";
        assert_eq!(unpack_name(&pack_name(full).unwrap()).unwrap(), full);

        assert!(matches!(pack_name("abcdefghijklmnopqrstu"), Err(ProtoError::NameTooLong { len: 21, .. })));
        assert_eq!(pack_name(""), Err(ProtoError::EmptyName));
        assert_eq!(unpack_name(&[0; DATA_WORDS]), Err(ProtoError::EmptyName));
    }

    #[test]
    fn test_wire_flags_are_stable() {
        assert_eq!(WindowFlags::FULL.bits(), 1);
        assert_eq!(WindowFlags::FLOAT.bits(), 2);
        assert_eq!(WindowFlags::STICK.bits(), 4);
        assert_eq!(WindowFlags::URGENT.bits(), 8);
        assert_eq!(WindowFlags::NO_FLOAT.bits(), 1 << 9);
        assert_eq!(WindowFlags::TYPE_DIALOG.bits(), 1 << 21);
        assert_eq!((WindowFlags::FULL | WindowFlags::STICK).mode_string(), "F-S-");
    }

    #[test]
    fn test_state_action() {
        assert!(StateAction::Add.needs_flip(false));
        assert!(!StateAction::Add.needs_flip(true));
        assert!(StateAction::Remove.needs_flip(true));
        assert!(StateAction::Toggle.needs_flip(true));
        assert_eq!(StateAction::from_word(3), None);
    }

    #[test]
    fn test_message_serialization() {
        let serialized = serde_json::to_string(&Message::ViewNew).unwrap();
        assert_eq!(serialized, "\"ViewNew\"");
        let deserialized: Message = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, Message::ViewNew);
    }
}
