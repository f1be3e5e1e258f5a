use anyhow::Result;
use gravwm_proto::{props, Message, DATA_WORDS};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ClientMessageData, ClientMessageEvent, ConnectionExt, EventMask, Window};
use x11rb::rust_connection::RustConnection;

use crate::model::{self, ClientInfo, GravityInfo, ScreenInfo, TagInfo, ViewInfo};

/// Connection to the display the window manager publishes on
pub struct Display {
    conn: RustConnection,
    root: Window,
}

impl Display {
    pub fn open(name: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(name)?;
        let root = conn.setup().roots[screen_num].root;
        Ok(Self { conn, root })
    }

    pub fn atom(&self, name: &str) -> Result<Atom> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn cardinals(&self, window: Window, name: &str) -> Result<Vec<u32>> {
        let atom = self.atom(name)?;
        let reply = self.conn.get_property(false, window, atom, AtomEnum::ANY, 0, 1024)?.reply()?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn strings(&self, window: Window, property: Atom) -> Result<Vec<String>> {
        let reply = self.conn.get_property(false, window, property, AtomEnum::ANY, 0, 4096)?.reply()?;
        Ok(model::split_strings(&reply.value))
    }

    fn named_strings(&self, window: Window, name: &str) -> Result<Vec<String>> {
        let atom = self.atom(name)?;
        self.strings(window, atom)
    }

    pub fn tag_names(&self) -> Result<Vec<String>> {
        self.named_strings(self.root, props::TAG_LIST)
    }

    pub fn view_names(&self) -> Result<Vec<String>> {
        self.named_strings(self.root, props::NET_DESKTOP_NAMES)
    }

    pub fn gravities(&self) -> Result<Vec<GravityInfo>> {
        self.named_strings(self.root, props::GRAVITY_LIST)?
            .iter()
            .enumerate()
            .map(|(i, entry)| model::parse_gravity(i, entry))
            .collect()
    }

    pub fn gravity_names(&self) -> Result<Vec<String>> {
        Ok(self.gravities()?.into_iter().map(|g| g.name).collect())
    }

    pub fn tags(&self) -> Result<Vec<TagInfo>> {
        Ok(self.tag_names()?.into_iter().enumerate().map(|(id, name)| TagInfo { id, name }).collect())
    }

    pub fn views(&self) -> Result<Vec<ViewInfo>> {
        let names = self.view_names()?;
        let masks = self.cardinals(self.root, props::VIEW_TAGS)?;
        let shown = self.cardinals(self.root, props::SCREEN_VIEWS)?;
        let tags = self.tag_names()?;

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(id, name)| ViewInfo {
                id,
                name,
                tags: model::tag_names(masks.get(id).copied().unwrap_or(0), &tags),
                screens: shown.iter().enumerate().filter(|&(_, &v)| v as usize == id).map(|(s, _)| s).collect(),
            })
            .collect())
    }

    pub fn screens(&self) -> Result<Vec<ScreenInfo>> {
        let views = self.cardinals(self.root, props::SCREEN_VIEWS)?;
        let workareas = self.cardinals(self.root, props::NET_WORKAREA)?;
        Ok(views
            .iter()
            .enumerate()
            .map(|(id, &view)| {
                let mut workarea = [0; 4];
                if let Some(chunk) = workareas.chunks_exact(4).nth(id) {
                    workarea.copy_from_slice(chunk);
                }
                ScreenInfo { id, view, workarea }
            })
            .collect())
    }

    pub fn clients(&self) -> Result<Vec<ClientInfo>> {
        let windows = self.cardinals(self.root, props::NET_CLIENT_LIST)?;
        let tags = self.tag_names()?;
        let gravities = self.gravity_names()?;
        let net_wm_name = self.atom(props::NET_WM_NAME)?;

        let mut clients = Vec::with_capacity(windows.len());
        for window in windows {
            match self.client(window, net_wm_name, &tags, &gravities) {
                Ok(client) => clients.push(client),
                // Gone between listing and reading
                Err(e) => debug!("Skipping {:#x}: {}", window, e),
            }
        }
        Ok(clients)
    }

    fn client(&self, window: Window, net_wm_name: Atom, tags: &[String], gravities: &[String]) -> Result<ClientInfo> {
        let first = |values: Vec<u32>| values.first().copied();

        let mut name = self.strings(window, net_wm_name)?;
        if name.is_empty() {
            name = self.strings(window, AtomEnum::WM_NAME.into())?;
        }
        let class = self.strings(window, AtomEnum::WM_CLASS.into())?;
        let flags = first(self.cardinals(window, props::WINDOW_FLAGS)?).unwrap_or(0);
        let mask = first(self.cardinals(window, props::WINDOW_TAGS)?).unwrap_or(0);
        let gravity = first(self.cardinals(window, props::WINDOW_GRAVITY)?);

        Ok(ClientInfo {
            id: window,
            name: name.into_iter().next().unwrap_or_default(),
            instance: class.first().cloned().unwrap_or_else(|| "unknown".to_string()),
            class: class.get(1).cloned().unwrap_or_else(|| "unknown".to_string()),
            mode: model::mode_string(flags),
            flags,
            tags: model::tag_names(mask, tags),
            gravity: gravity.and_then(|g| gravities.get(g as usize).cloned()),
            screen: first(self.cardinals(window, props::WINDOW_SCREEN)?).unwrap_or(0),
            view: first(self.cardinals(window, props::NET_WM_DESKTOP)?),
        })
    }

    /// Send a control message the way pagers do: to the root window with
    /// substructure redirect and notify selected
    pub fn send(&self, message: Message, window: Option<Window>, data: [u32; DATA_WORDS]) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: x11rb::protocol::xproto::CLIENT_MESSAGE_EVENT,
            format: 32,
            window: window.unwrap_or(self.root),
            type_: self.atom(message.atom_name())?,
            data: ClientMessageData::from(data),
            sequence: 0,
        };
        let mask = EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY;
        self.conn.send_event(false, self.root, mask, event)?;
        self.conn.flush()?;
        debug!("Sent {} with {:?}", message.atom_name(), data);
        Ok(())
    }
}
