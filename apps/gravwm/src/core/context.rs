use std::collections::HashMap;

use anyhow::Result;
use gravwm_config::Modifier;
use gravwm_proto::{Message, DATA_WORDS};
use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    Allow, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ClientMessageData, ClientMessageEvent,
    ConfigWindow, ConfigureNotifyEvent, ConfigureWindowAux, ConnectionExt, CreateGCAux, CreateWindowAux, EventMask,
    GrabMode, GrabStatus, InputFocus, Keycode, ModMask, NotifyDetail, NotifyMode, PropMode, Rectangle, SetMode,
    MapState, StackMode, SubwindowMode, Window, WindowClass, GX,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::core::backend::{Backend, Protocol, WmState};
use crate::core::event::{ConfigureRequest, Key, WmEvent};
use crate::core::geometry::Rect;
use crate::ewmh::atoms::{AtomCollection, Prop};
use crate::window::hints::{parse_wm_class, NetState, SizeHints, Strut, WindowHints, WindowType};

const XK_ESCAPE: u32 = 0xff1b;
const XK_RETURN: u32 = 0xff0d;

// WM_HINTS flag bits
const INPUT_HINT: u32 = 1 << 0;
const URGENCY_HINT: u32 = 1 << 8;

/// Properties that can change on a managed window, looked up by atom
const CLIENT_PROPS: [Prop; 5] = [Prop::WmName, Prop::WmNormalHints, Prop::WmHints, Prop::WmClass, Prop::WmTransientFor];

fn mod_mask(modifier: Modifier) -> ModMask {
    match modifier {
        Modifier::Shift => ModMask::SHIFT,
        Modifier::Control => ModMask::CONTROL,
        Modifier::Mod1 => ModMask::M1,
        Modifier::Mod4 => ModMask::M4,
    }
}

/// X11 connection and everything resolved once at startup
pub struct Context {
    pub conn: RustConnection,
    pub screen_num: usize,
    pub root_window: Window,
    pub atoms: AtomCollection,
    message_atoms: HashMap<Message, u32>,
    messages: HashMap<u32, Message>,
    props: HashMap<u32, Prop>,
    modifier: ModMask,
    mask_gc: u32,
    escape: Option<Keycode>,
    enter: Option<Keycode>,
    randr: bool,
}

impl Context {
    pub fn new(display: Option<&str>, modifier: Modifier) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(display)?;
        let screen = &conn.setup().roots[screen_num];
        let root_window = screen.root;
        let white = screen.white_pixel;

        let atoms = AtomCollection::new(&conn)?.reply()?;

        let cookies = Message::ALL
            .iter()
            .map(|m| Ok((*m, conn.intern_atom(false, m.atom_name().as_bytes())?)))
            .collect::<Result<Vec<_>>>()?;
        let mut message_atoms = HashMap::new();
        let mut messages = HashMap::new();
        for (message, cookie) in cookies {
            let atom = cookie.reply()?.atom;
            message_atoms.insert(message, atom);
            messages.insert(atom, message);
        }

        let mut props = HashMap::new();
        for prop in CLIENT_PROPS.into_iter().chain(Prop::supported()) {
            let atom = match prop {
                Prop::Message(message) => message_atoms.get(&message).copied(),
                _ => atoms.atom(prop),
            };
            if let Some(atom) = atom {
                props.entry(atom).or_insert(prop);
            }
        }

        let mask_gc = conn.generate_id()?;
        conn.create_gc(
            mask_gc,
            root_window,
            &CreateGCAux::new()
                .function(GX::INVERT)
                .foreground(white)
                .line_width(2)
                .subwindow_mode(SubwindowMode::INCLUDE_INFERIORS),
        )?;

        let randr = conn.extension_information(randr::X11_EXTENSION_NAME)?.is_some();
        if !randr {
            warn!("RandR is not available, using a single screen");
        }

        let mut ctx = Self {
            conn,
            screen_num,
            root_window,
            atoms,
            message_atoms,
            messages,
            props,
            modifier: mod_mask(modifier),
            mask_gc,
            escape: None,
            enter: None,
            randr,
        };
        ctx.resolve_keys()?;
        Ok(ctx)
    }

    /// Take over the root window. Fails when another window manager
    /// already redirects substructure events.
    pub fn select_root_events(&self) -> Result<()> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE
            | EventMask::ENTER_WINDOW
            | EventMask::STRUCTURE_NOTIFY;
        self.conn
            .change_window_attributes(self.root_window, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check()?;

        if self.randr {
            self.conn.randr_select_input(self.root_window, randr::NotifyMask::SCREEN_CHANGE)?;
        }
        Ok(())
    }

    fn resolve_keys(&mut self) -> Result<()> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let mapping = self.conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;
        let per = mapping.keysyms_per_keycode.max(1) as usize;

        let find = |keysym: u32| {
            mapping
                .keysyms
                .chunks(per)
                .position(|syms| syms.contains(&keysym))
                .map(|i| min + i as Keycode)
        };
        self.escape = find(XK_ESCAPE);
        self.enter = find(XK_RETURN);
        debug!("Escape keycode {:?}, Return keycode {:?}", self.escape, self.enter);
        Ok(())
    }

    /// Managed and unmanaged children of the root that are mapped
    pub fn scan(&self) -> Result<Vec<Window>> {
        let tree = self.conn.query_tree(self.root_window)?.reply()?;
        info!("Scanning {} windows...", tree.children.len());

        let cookies = tree
            .children
            .iter()
            .map(|&win| Ok((win, self.conn.get_window_attributes(win)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut windows = Vec::new();
        for (win, cookie) in cookies {
            if let Ok(attrs) = cookie.reply() {
                if !attrs.override_redirect && attrs.map_state == MapState::VIEWABLE {
                    windows.push(win);
                }
            }
        }
        Ok(windows)
    }

    fn property32(&self, window: Window, property: u32, kind: impl Into<u32>, length: u32) -> Result<Vec<u32>> {
        let reply = self.conn.get_property(false, window, property, kind, 0, length)?.reply()?;
        Ok(reply.value32().map(|values| values.collect()).unwrap_or_default())
    }

    fn property_string(&self, window: Window, property: u32, kind: impl Into<u32>) -> Result<Option<String>> {
        let reply = self.conn.get_property(false, window, property, kind, 0, 1024)?.reply()?;
        if reply.value.is_empty() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&reply.value);
        Ok(Some(text.trim_end_matches('\0').to_string()))
    }

    fn read_strut(&self, window: Window) -> Result<Option<Strut>> {
        let partial = self.property32(window, self.atoms._NET_WM_STRUT_PARTIAL, AtomEnum::CARDINAL, 12)?;
        if let Some(strut) = Strut::from_words(&partial) {
            return Ok(Some(strut));
        }
        let plain = self.property32(window, self.atoms._NET_WM_STRUT, AtomEnum::CARDINAL, 4)?;
        Ok(Strut::from_words(&plain))
    }

    fn window_type(&self, window: Window) -> Result<WindowType> {
        let atoms = self.property32(window, self.atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM, 16)?;
        let a = &self.atoms;
        let found = atoms.iter().find_map(|&atom| match atom {
            t if t == a._NET_WM_WINDOW_TYPE_DESKTOP => Some(WindowType::Desktop),
            t if t == a._NET_WM_WINDOW_TYPE_DOCK => Some(WindowType::Dock),
            t if t == a._NET_WM_WINDOW_TYPE_TOOLBAR => Some(WindowType::Toolbar),
            t if t == a._NET_WM_WINDOW_TYPE_SPLASH => Some(WindowType::Splash),
            t if t == a._NET_WM_WINDOW_TYPE_DIALOG => Some(WindowType::Dialog),
            t if t == a._NET_WM_WINDOW_TYPE_NORMAL => Some(WindowType::Normal),
            _ => None,
        });
        Ok(found.unwrap_or_default())
    }

    fn net_state(&self, window: Window) -> Result<NetState> {
        let atoms = self.property32(window, self.atoms._NET_WM_STATE, AtomEnum::ATOM, 16)?;
        let a = &self.atoms;
        Ok(NetState {
            fullscreen: atoms.contains(&a._NET_WM_STATE_FULLSCREEN),
            sticky: atoms.contains(&a._NET_WM_STATE_STICKY),
            above: atoms.contains(&a._NET_WM_STATE_ABOVE),
            demands_attention: atoms.contains(&a._NET_WM_STATE_DEMANDS_ATTENTION),
        })
    }

    fn message_of(&self, atom: u32) -> Option<Message> {
        self.messages.get(&atom).copied()
    }

    /// Turn a raw event into something the manager handles
    pub fn translate(&self, event: &Event) -> Option<WmEvent> {
        let translated = match event {
            Event::MapRequest(e) => WmEvent::MapRequest { window: e.window },
            Event::ConfigureRequest(e) => {
                let mask = e.value_mask;
                WmEvent::ConfigureRequest(ConfigureRequest {
                    window: e.window,
                    x: mask.contains(ConfigWindow::X).then_some(e.x as i32),
                    y: mask.contains(ConfigWindow::Y).then_some(e.y as i32),
                    width: mask.contains(ConfigWindow::WIDTH).then_some(e.width as i32),
                    height: mask.contains(ConfigWindow::HEIGHT).then_some(e.height as i32),
                    border_width: mask.contains(ConfigWindow::BORDER_WIDTH).then_some(e.border_width),
                })
            }
            Event::UnmapNotify(e) => WmEvent::UnmapNotify { window: e.window },
            Event::DestroyNotify(e) => WmEvent::DestroyNotify { window: e.window },
            Event::PropertyNotify(e) => {
                let prop = self.props.get(&e.atom).copied()?;
                WmEvent::PropertyNotify { window: e.window, prop }
            }
            Event::EnterNotify(e) => {
                if e.mode != NotifyMode::NORMAL || e.detail == NotifyDetail::INFERIOR {
                    return None;
                }
                WmEvent::EnterNotify { window: e.event }
            }
            Event::ButtonPress(e) => WmEvent::ButtonPress {
                window: e.event,
                root_x: e.root_x as i32,
                root_y: e.root_y as i32,
                button: e.detail,
                with_modifier: u16::from(e.state) & u16::from(self.modifier) != 0,
            },
            Event::ButtonRelease(e) => WmEvent::ButtonRelease { button: e.detail },
            Event::MotionNotify(e) => WmEvent::MotionNotify { root_x: e.root_x as i32, root_y: e.root_y as i32 },
            Event::KeyPress(e) => {
                let key = match Some(e.detail) {
                    k if k == self.escape => Key::Escape,
                    k if k == self.enter => Key::Return,
                    _ => Key::Other,
                };
                WmEvent::KeyPress { key }
            }
            Event::ClientMessage(e) => {
                if e.format != 32 {
                    return None;
                }
                let Some(message) = self.message_of(e.type_) else {
                    debug!("Unknown client message type {} on {:#x}", e.type_, e.window);
                    return None;
                };
                let words = e.data.as_data32();
                let mut data = [0u32; DATA_WORDS];
                data.copy_from_slice(&words[..DATA_WORDS]);
                WmEvent::ClientMessage { window: e.window, message, data }
            }
            Event::RandrScreenChangeNotify(_) => WmEvent::ScreenChange,
            Event::Error(e) => WmEvent::Error {
                major_opcode: e.major_opcode,
                kind: format!("{:?}", e.error_kind),
                bad_value: e.bad_value,
            },
            _ => return None,
        };
        Some(translated)
    }
}

impl Backend for Context {
    fn root(&self) -> Window {
        self.root_window
    }

    fn display_rect(&self) -> Rect {
        let screen = &self.conn.setup().roots[self.screen_num];
        Rect::new(0, 0, screen.width_in_pixels as i32, screen.height_in_pixels as i32)
    }

    fn outputs(&self) -> Result<Vec<Rect>> {
        if !self.randr {
            return Ok(Vec::new());
        }
        let resources = self.conn.randr_get_screen_resources_current(self.root_window)?.reply()?;
        let cookies = resources
            .crtcs
            .iter()
            .map(|&crtc| Ok(self.conn.randr_get_crtc_info(crtc, resources.config_timestamp)?))
            .collect::<Result<Vec<_>>>()?;

        let mut outputs: Vec<Rect> = Vec::new();
        for cookie in cookies {
            let info = cookie.reply()?;
            if info.mode == x11rb::NONE || info.width == 0 || info.height == 0 {
                continue;
            }
            let rect = Rect::new(info.x as i32, info.y as i32, info.width as i32, info.height as i32);
            // Cloned outputs share a CRTC geometry
            if !outputs.contains(&rect) {
                outputs.push(rect);
            }
        }
        Ok(outputs)
    }

    fn atom(&self, prop: Prop) -> u32 {
        let atom = match prop {
            Prop::Message(message) => self.message_atoms.get(&message).copied(),
            _ => self.atoms.atom(prop),
        };
        atom.unwrap_or(x11rb::NONE)
    }

    fn prop_of(&self, atom: u32) -> Option<Prop> {
        self.props.get(&atom).copied()
    }

    fn fetch_hints(&self, window: Window) -> Result<WindowHints> {
        let geometry = self.conn.get_geometry(window)?.reply()?;
        let mut hints = WindowHints {
            geometry: Rect::new(geometry.x as i32, geometry.y as i32, geometry.width as i32, geometry.height as i32),
            ..WindowHints::default()
        };

        hints.name = match self.property_string(window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)? {
            Some(name) => Some(name),
            None => self.property_string(window, AtomEnum::WM_NAME.into(), AtomEnum::ANY)?,
        };

        let class = self.conn.get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 256)?.reply()?;
        (hints.instance, hints.class) = parse_wm_class(&class.value);
        hints.role = self.property_string(window, self.atoms.WM_WINDOW_ROLE, AtomEnum::STRING)?;

        let normal = self.property32(window, AtomEnum::WM_NORMAL_HINTS.into(), AtomEnum::WM_SIZE_HINTS, 18)?;
        hints.size = SizeHints::from_words(&normal);

        let wm_hints = self.property32(window, AtomEnum::WM_HINTS.into(), AtomEnum::WM_HINTS, 9)?;
        if let Some(&flags) = wm_hints.first() {
            if flags & INPUT_HINT != 0 {
                hints.input = wm_hints.get(1).map_or(true, |&input| input != 0);
            }
            hints.urgent = flags & URGENCY_HINT != 0;
        }

        let protocols = self.property32(window, self.atoms.WM_PROTOCOLS, AtomEnum::ATOM, 32)?;
        hints.take_focus = protocols.contains(&self.atoms.WM_TAKE_FOCUS);
        hints.delete_window = protocols.contains(&self.atoms.WM_DELETE_WINDOW);

        let transient = self.property32(window, AtomEnum::WM_TRANSIENT_FOR.into(), AtomEnum::WINDOW, 1)?;
        hints.transient_for = transient.first().copied().filter(|&w| w != x11rb::NONE && w != window);

        hints.window_type = self.window_type(window)?;
        hints.state = self.net_state(window)?;
        hints.strut = self.read_strut(window)?;
        Ok(hints)
    }

    fn manage(&self, window: Window, border: u16, pixel: u32) -> Result<()> {
        let values = ChangeWindowAttributesAux::new()
            .event_mask(EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE)
            .border_pixel(pixel);
        self.conn.change_window_attributes(window, &values)?;
        self.conn.configure_window(window, &ConfigureWindowAux::new().border_width(border as u32))?;
        self.conn.change_save_set(SetMode::INSERT, window)?;

        // Clicks focus and are replayed; with the modifier they start a drag
        self.conn.grab_button(
            false,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            x11rb::NONE,
            x11rb::NONE,
            ButtonIndex::ANY,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn move_resize(&self, window: Window, rect: Rect, border: u16) -> Result<()> {
        let values = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(rect.wire_width() as u32)
            .height(rect.wire_height() as u32)
            .border_width(border as u32);
        self.conn.configure_window(window, &values)?;
        Ok(())
    }

    fn set_border_color(&self, window: Window, pixel: u32) -> Result<()> {
        self.conn.change_window_attributes(window, &ChangeWindowAttributesAux::new().border_pixel(pixel))?;
        Ok(())
    }

    fn map(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn map_raised(&self, window: Window) -> Result<()> {
        self.raise(window)?;
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn raise(&self, window: Window) -> Result<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        Ok(())
    }

    fn lower(&self, window: Window) -> Result<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::BELOW))?;
        Ok(())
    }

    fn focus(&self, window: Window) -> Result<()> {
        let target = if window == self.root_window { u32::from(InputFocus::POINTER_ROOT) } else { window };
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, target, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn replay_pointer(&self) -> Result<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn configure_unmanaged(&self, request: &ConfigureRequest) -> Result<()> {
        let mut values = ConfigureWindowAux::new();
        values.x = request.x;
        values.y = request.y;
        values.width = request.width.map(|w| w.max(1) as u32);
        values.height = request.height.map(|h| h.max(1) as u32);
        values.border_width = request.border_width.map(u32::from);
        self.conn.configure_window(request.window, &values)?;
        Ok(())
    }

    fn send_configure_notify(&self, window: Window, rect: Rect, border: u16) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: x11rb::protocol::xproto::CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: rect.wire_x(),
            y: rect.wire_y(),
            width: rect.wire_width(),
            height: rect.wire_height(),
            border_width: border,
            override_redirect: false,
        };
        self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn send_protocol(&self, window: Window, protocol: Protocol) -> Result<()> {
        let atom = match protocol {
            Protocol::TakeFocus => self.atoms.WM_TAKE_FOCUS,
            Protocol::DeleteWindow => self.atoms.WM_DELETE_WINDOW,
        };
        let event = ClientMessageEvent {
            response_type: x11rb::protocol::xproto::CLIENT_MESSAGE_EVENT,
            format: 32,
            window,
            type_: self.atoms.WM_PROTOCOLS,
            data: ClientMessageData::from([atom, x11rb::CURRENT_TIME, 0, 0, 0]),
            sequence: 0,
        };
        self.conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn set_cardinals(&self, window: Window, prop: Prop, values: &[u32]) -> Result<()> {
        self.conn.change_property32(PropMode::REPLACE, window, self.atom(prop), AtomEnum::CARDINAL, values)?;
        Ok(())
    }

    fn set_windows(&self, window: Window, prop: Prop, values: &[Window]) -> Result<()> {
        self.conn.change_property32(PropMode::REPLACE, window, self.atom(prop), AtomEnum::WINDOW, values)?;
        Ok(())
    }

    fn set_atoms(&self, window: Window, prop: Prop, values: &[Prop]) -> Result<()> {
        let atoms: Vec<u32> = values.iter().map(|&p| self.atom(p)).collect();
        self.conn.change_property32(PropMode::REPLACE, window, self.atom(prop), AtomEnum::ATOM, &atoms)?;
        Ok(())
    }

    fn set_strings(&self, window: Window, prop: Prop, values: &[String]) -> Result<()> {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.conn.change_property8(PropMode::REPLACE, window, self.atom(prop), self.atoms.UTF8_STRING, &data)?;
        Ok(())
    }

    fn delete_property(&self, window: Window, prop: Prop) -> Result<()> {
        self.conn.delete_property(window, self.atom(prop))?;
        Ok(())
    }

    fn set_wm_state(&self, window: Window, state: WmState) -> Result<()> {
        let atom = self.atoms.WM_STATE;
        self.conn.change_property32(PropMode::REPLACE, window, atom, atom, &[state as u32, x11rb::NONE])?;
        Ok(())
    }

    fn grab_input(&self, _window: Window) -> Result<bool> {
        let mask = EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION;
        let pointer = self
            .conn
            .grab_pointer(
                false,
                self.root_window,
                mask,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )?
            .reply()?;
        if pointer.status != GrabStatus::SUCCESS {
            return Ok(false);
        }
        self.conn.allow_events(Allow::ASYNC_POINTER, x11rb::CURRENT_TIME)?;
        self.conn
            .grab_keyboard(false, self.root_window, x11rb::CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)?
            .reply()?;
        self.conn.grab_server()?;
        Ok(true)
    }

    fn ungrab_input(&self) -> Result<()> {
        self.conn.ungrab_server()?;
        self.conn.ungrab_keyboard(x11rb::CURRENT_TIME)?;
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn draw_mask(&self, rect: Rect) -> Result<()> {
        let outline = Rectangle {
            x: rect.wire_x(),
            y: rect.wire_y(),
            width: rect.wire_width().saturating_sub(1),
            height: rect.wire_height().saturating_sub(1),
        };
        self.conn.poly_rectangle(self.root_window, self.mask_gc, &[outline])?;
        Ok(())
    }

    fn create_panel(&self, rect: Rect, pixel: u32) -> Result<Window> {
        let window = self.conn.generate_id()?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            self.root_window,
            rect.wire_x(),
            rect.wire_y(),
            rect.wire_width(),
            rect.wire_height(),
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .override_redirect(1)
                .background_pixel(pixel)
                .event_mask(EventMask::EXPOSURE | EventMask::BUTTON_PRESS),
        )?;
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }
}
