use gravwm_proto::Message;
use x11rb::protocol::xproto::{Atom, AtomEnum};

x11rb::atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        UTF8_STRING,
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        WM_STATE,
        WM_WINDOW_ROLE,

        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_CLIENT_LIST,
        _NET_CLIENT_LIST_STACKING,
        _NET_ACTIVE_WINDOW,
        _NET_CURRENT_DESKTOP,
        _NET_NUMBER_OF_DESKTOPS,
        _NET_DESKTOP_NAMES,
        _NET_DESKTOP_GEOMETRY,
        _NET_DESKTOP_VIEWPORT,
        _NET_WORKAREA,
        _NET_WM_NAME,
        _NET_WM_DESKTOP,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_STICKY,
        _NET_WM_STATE_DEMANDS_ATTENTION,
        _NET_FRAME_EXTENTS,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DESKTOP,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_WINDOW_TYPE_TOOLBAR,
        _NET_WM_WINDOW_TYPE_SPLASH,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_STRUT,
        _NET_WM_STRUT_PARTIAL,

        GRAVWM_WINDOW_FLAGS,
        GRAVWM_WINDOW_TAGS,
        GRAVWM_WINDOW_GRAVITY,
        GRAVWM_WINDOW_SCREEN,
        GRAVWM_VIEW_TAGS,
        GRAVWM_TAG_LIST,
        GRAVWM_GRAVITY_LIST,
        GRAVWM_SCREEN_VIEWS,
    }
}

/// Symbolic name of every property and message atom the window manager
/// reads or writes. Atoms are only ever looked up through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prop {
    WmName,
    WmNormalHints,
    WmHints,
    WmClass,
    WmTransientFor,
    NetSupported,
    NetSupportingWmCheck,
    NetClientList,
    NetClientListStacking,
    NetActiveWindow,
    NetCurrentDesktop,
    NetNumberOfDesktops,
    NetDesktopNames,
    NetDesktopGeometry,
    NetDesktopViewport,
    NetWorkarea,
    NetWmName,
    NetWmDesktop,
    NetWmState,
    NetWmStateFullscreen,
    NetWmStateAbove,
    NetWmStateSticky,
    NetWmStateDemandsAttention,
    NetFrameExtents,
    NetWmWindowType,
    NetWmStrut,
    NetWmStrutPartial,
    WindowFlags,
    WindowTags,
    WindowGravity,
    WindowScreen,
    ViewTags,
    TagList,
    GravityList,
    ScreenViews,
    /// Message type atom of a control message
    Message(Message),
}

impl Prop {
    /// Everything announced in `_NET_SUPPORTED`
    pub fn supported() -> Vec<Prop> {
        let mut props = vec![
            Prop::NetSupported,
            Prop::NetSupportingWmCheck,
            Prop::NetClientList,
            Prop::NetClientListStacking,
            Prop::NetActiveWindow,
            Prop::NetCurrentDesktop,
            Prop::NetNumberOfDesktops,
            Prop::NetDesktopNames,
            Prop::NetDesktopGeometry,
            Prop::NetDesktopViewport,
            Prop::NetWorkarea,
            Prop::NetWmName,
            Prop::NetWmDesktop,
            Prop::NetWmState,
            Prop::NetWmStateFullscreen,
            Prop::NetWmStateAbove,
            Prop::NetWmStateSticky,
            Prop::NetWmStateDemandsAttention,
            Prop::NetFrameExtents,
            Prop::NetWmWindowType,
            Prop::NetWmStrut,
            Prop::NetWmStrutPartial,
            Prop::WindowFlags,
            Prop::WindowTags,
            Prop::WindowGravity,
            Prop::WindowScreen,
            Prop::ViewTags,
            Prop::TagList,
            Prop::GravityList,
            Prop::ScreenViews,
        ];
        for message in Message::ALL {
            if !props.contains(&Prop::Message(message)) {
                props.push(Prop::Message(message));
            }
        }
        props
    }
}

impl AtomCollection {
    /// Resolve a property; message types are resolved by the caller
    pub fn atom(&self, prop: Prop) -> Option<Atom> {
        let atom = match prop {
            Prop::WmName => AtomEnum::WM_NAME.into(),
            Prop::WmNormalHints => AtomEnum::WM_NORMAL_HINTS.into(),
            Prop::WmHints => AtomEnum::WM_HINTS.into(),
            Prop::WmClass => AtomEnum::WM_CLASS.into(),
            Prop::WmTransientFor => AtomEnum::WM_TRANSIENT_FOR.into(),
            Prop::NetSupported => self._NET_SUPPORTED,
            Prop::NetSupportingWmCheck => self._NET_SUPPORTING_WM_CHECK,
            Prop::NetClientList => self._NET_CLIENT_LIST,
            Prop::NetClientListStacking => self._NET_CLIENT_LIST_STACKING,
            Prop::NetActiveWindow => self._NET_ACTIVE_WINDOW,
            Prop::NetCurrentDesktop => self._NET_CURRENT_DESKTOP,
            Prop::NetNumberOfDesktops => self._NET_NUMBER_OF_DESKTOPS,
            Prop::NetDesktopNames => self._NET_DESKTOP_NAMES,
            Prop::NetDesktopGeometry => self._NET_DESKTOP_GEOMETRY,
            Prop::NetDesktopViewport => self._NET_DESKTOP_VIEWPORT,
            Prop::NetWorkarea => self._NET_WORKAREA,
            Prop::NetWmName => self._NET_WM_NAME,
            Prop::NetWmDesktop => self._NET_WM_DESKTOP,
            Prop::NetWmState => self._NET_WM_STATE,
            Prop::NetWmStateFullscreen => self._NET_WM_STATE_FULLSCREEN,
            Prop::NetWmStateAbove => self._NET_WM_STATE_ABOVE,
            Prop::NetWmStateSticky => self._NET_WM_STATE_STICKY,
            Prop::NetWmStateDemandsAttention => self._NET_WM_STATE_DEMANDS_ATTENTION,
            Prop::NetFrameExtents => self._NET_FRAME_EXTENTS,
            Prop::NetWmWindowType => self._NET_WM_WINDOW_TYPE,
            Prop::NetWmStrut => self._NET_WM_STRUT,
            Prop::NetWmStrutPartial => self._NET_WM_STRUT_PARTIAL,
            Prop::WindowFlags => self.GRAVWM_WINDOW_FLAGS,
            Prop::WindowTags => self.GRAVWM_WINDOW_TAGS,
            Prop::WindowGravity => self.GRAVWM_WINDOW_GRAVITY,
            Prop::WindowScreen => self.GRAVWM_WINDOW_SCREEN,
            Prop::ViewTags => self.GRAVWM_VIEW_TAGS,
            Prop::TagList => self.GRAVWM_TAG_LIST,
            Prop::GravityList => self.GRAVWM_GRAVITY_LIST,
            Prop::ScreenViews => self.GRAVWM_SCREEN_VIEWS,
            Prop::Message(_) => return None,
        };
        Some(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_lists_every_message_once() {
        let supported = Prop::supported();
        for message in Message::ALL {
            assert_eq!(supported.iter().filter(|p| **p == Prop::Message(message)).count(), 1);
        }
        assert!(supported.contains(&Prop::NetWorkarea));
    }
}
