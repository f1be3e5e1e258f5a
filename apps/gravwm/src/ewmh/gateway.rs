//! Publishing of window manager state as root and client properties.
//!
//! Remote tools only ever see what is written here; every mutation in the
//! manager ends with the matching publish call.

use anyhow::Result;
use x11rb::protocol::xproto::Window;

use crate::core::backend::Backend;
use crate::ewmh::atoms::Prop;
use crate::window::manager::WindowManager;

impl<B: Backend> WindowManager<B> {
    pub fn publish_all(&self) -> Result<()> {
        self.publish_views()?;
        self.publish_tags()?;
        self.publish_gravities()?;
        self.publish_workarea()?;
        self.publish_current_desktop()?;
        self.publish_client_list()?;
        self.publish_active()?;
        for window in self.registry.windows() {
            self.publish_client(window)?;
        }
        Ok(())
    }

    /// `_NET_CLIENT_LIST` and `_NET_CLIENT_LIST_STACKING` in registry order
    pub fn publish_client_list(&self) -> Result<()> {
        let root = self.backend.root();
        let windows = self.registry.windows();
        self.backend.set_windows(root, Prop::NetClientList, &windows)?;
        self.backend.set_windows(root, Prop::NetClientListStacking, &windows)?;
        Ok(())
    }

    pub fn publish_active(&self) -> Result<()> {
        let active = self.focus.unwrap_or(x11rb::NONE);
        self.backend.set_windows(self.backend.root(), Prop::NetActiveWindow, &[active])
    }

    pub fn publish_current_desktop(&self) -> Result<()> {
        let root = self.backend.root();
        let view = self.screens.get(self.current_screen).map(|s| s.view).unwrap_or(0);
        self.backend.set_cardinals(root, Prop::NetCurrentDesktop, &[view as u32])?;
        self.backend.set_cardinals(root, Prop::ScreenViews, &self.screens.views())?;
        Ok(())
    }

    pub fn publish_views(&self) -> Result<()> {
        let root = self.backend.root();
        let names: Vec<String> = self.views.iter().map(|v| v.name.clone()).collect();
        let tags: Vec<u32> = self.views.iter().map(|v| v.tags).collect();
        self.backend.set_cardinals(root, Prop::NetNumberOfDesktops, &[self.views.len() as u32])?;
        self.backend.set_strings(root, Prop::NetDesktopNames, &names)?;
        self.backend.set_cardinals(root, Prop::ViewTags, &tags)?;
        self.backend.set_cardinals(root, Prop::ScreenViews, &self.screens.views())?;
        Ok(())
    }

    pub fn publish_tags(&self) -> Result<()> {
        let names: Vec<String> = self.tags.iter().map(|t| t.name.clone()).collect();
        self.backend.set_strings(self.backend.root(), Prop::TagList, &names)
    }

    /// One `name x y width height` entry per gravity slot
    pub fn publish_gravities(&self) -> Result<()> {
        let entries: Vec<String> = self
            .gravities
            .iter()
            .map(|g| format!("{} {} {} {} {}", g.name, g.x, g.y, g.width, g.height))
            .collect();
        self.backend.set_strings(self.backend.root(), Prop::GravityList, &entries)
    }

    pub fn publish_workarea(&self) -> Result<()> {
        let root = self.backend.root();
        let extent = self.screens.extent();
        self.backend.set_cardinals(root, Prop::NetWorkarea, &self.screens.workareas())?;
        self.backend.set_cardinals(root, Prop::NetDesktopViewport, &self.screens.viewports())?;
        self.backend.set_cardinals(root, Prop::NetDesktopGeometry, &[extent.width as u32, extent.height as u32])?;
        Ok(())
    }

    /// Per-client cardinals and state atoms
    pub fn publish_client(&self, window: Window) -> Result<()> {
        let Some(client) = self.registry.get(window) else { return Ok(()); };

        self.backend.set_cardinals(window, Prop::WindowFlags, &[client.flags.to_wire().bits()])?;
        self.backend.set_cardinals(window, Prop::WindowTags, &[client.tags])?;
        self.backend.set_cardinals(window, Prop::WindowGravity, &[client.gravity as u32])?;
        self.backend.set_cardinals(window, Prop::WindowScreen, &[client.screen as u32])?;

        let mut states = Vec::new();
        if client.is_full() {
            states.push(Prop::NetWmStateFullscreen);
        }
        if client.is_float() {
            states.push(Prop::NetWmStateAbove);
        }
        if client.is_stick() {
            states.push(Prop::NetWmStateSticky);
        }
        if client.is_urgent() {
            states.push(Prop::NetWmStateDemandsAttention);
        }
        self.backend.set_atoms(window, Prop::NetWmState, &states)?;

        let border = client.effective_border() as u32;
        self.backend.set_cardinals(window, Prop::NetFrameExtents, &[border; 4])?;
        Ok(())
    }

    /// Remove our properties from a window that is no longer managed
    pub fn unpublish_client(&self, window: Window) -> Result<()> {
        for prop in [
            Prop::WindowFlags,
            Prop::WindowTags,
            Prop::WindowGravity,
            Prop::WindowScreen,
            Prop::NetWmDesktop,
            Prop::NetWmState,
            Prop::NetFrameExtents,
        ] {
            self.backend.delete_property(window, prop)?;
        }
        Ok(())
    }
}
