use std::collections::VecDeque;

use anyhow::Result;
use gravwm_config::{parse_color, Config, Options, TagSpec, ViewSpec, DEFAULT_TAG, MAX_TAGS};
use gravwm_proto::{moveresize, unpack_name, Message, Restack, StateAction, DATA_WORDS};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::Window;

use crate::core::backend::{Backend, Protocol, WmState};
use crate::core::context::Context;
use crate::core::event::{ConfigureRequest, WmEvent};
use crate::core::geometry::Rect;
use crate::ewmh::atoms::Prop;
use crate::window::client::{Client, ClientFlags};
use crate::window::drag::{Drag, DragMode, DragOutcome};
use crate::window::error::{log_and_ignore, ErrorCategory, ErrorTracker, WmError};
use crate::window::gravity::{build_table, place, Gravity};
use crate::window::hooks::{HookArgs, HookEvent, Hooks};
use crate::window::registry::Registry;
use crate::window::screen::ScreenManager;
use crate::window::tag::{remove_bit, tag_bit, Tag, DEFAULT_TAG_BIT};
use crate::window::view::View;

/// Why the event loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    Reload,
}

#[derive(Debug, Clone, Copy, Default)]
struct Pixels {
    focus: u32,
    normal: u32,
    panel: u32,
}

/// Result of matching all tag rules against a client
#[derive(Debug, Default)]
struct TagMatch {
    tags: u32,
    modes: ClientFlags,
    policies: ClientFlags,
    gravity: Option<usize>,
    screen: Option<usize>,
    geometry: Option<Rect>,
}

const MODE_FLAGS: [ClientFlags; 4] =
    [ClientFlags::MODE_FULL, ClientFlags::MODE_FLOAT, ClientFlags::MODE_STICK, ClientFlags::MODE_URGENT];

/// Clear every mode whose policy bit is set
fn strip_vetoed(flags: ClientFlags) -> ClientFlags {
    MODE_FLAGS
        .iter()
        .filter(|&&mode| flags.contains(ClientFlags::veto_for(mode)))
        .fold(flags, |acc, &mode| acc - mode)
}

/// Content rect of `width` x `height` whose footprint is centered in `bounds`
fn centered(width: i32, height: i32, border: i32, bounds: &Rect) -> Rect {
    let footprint = Rect::new(0, 0, width + 2 * border, height + 2 * border).centered_in(bounds);
    Rect::new(footprint.x, footprint.y, width, height)
}

fn build_tags(specs: &[TagSpec]) -> Vec<Tag> {
    let mut tags = vec![Tag::default_tag()];
    for spec in specs.iter().take(MAX_TAGS - 1) {
        match Tag::from_spec(spec) {
            Ok(tag) => tags.push(tag),
            Err(e) => {
                warn!("Tag {} has an invalid pattern, it only applies explicitly: {}", spec.name, e);
                tags.push(Tag::named(&spec.name));
            }
        }
    }
    tags
}

fn build_views(specs: &[ViewSpec], tags: &[Tag]) -> Vec<View> {
    let mut views: Vec<View> = specs
        .iter()
        .map(|spec| {
            let mask = spec
                .tags
                .iter()
                .filter_map(|name| tags.iter().position(|t| &t.name == name))
                .fold(0, |acc, id| acc | tag_bit(id));
            View::new(&spec.name, mask)
        })
        .collect();
    if views.is_empty() {
        views.push(View::new(DEFAULT_TAG, DEFAULT_TAG_BIT));
    }
    views
}

pub struct WindowManager<B: Backend> {
    pub backend: B,
    pub options: Options,
    pixels: Pixels,
    pub registry: Registry,
    pub screens: ScreenManager,
    pub views: Vec<View>,
    /// Index 0 is the default tag
    pub tags: Vec<Tag>,
    pub gravities: Vec<Gravity>,
    pub focus: Option<Window>,
    pub current_screen: usize,
    pub drag: Option<Drag>,
    /// Events that arrived while a drag owned the pointer
    deferred: VecDeque<WmEvent>,
    pub hooks: Hooks,
    pub error_tracker: ErrorTracker,
}

impl<B: Backend> WindowManager<B> {
    pub fn new(backend: B, config: &Config) -> Result<Self> {
        let mut wm = Self {
            backend,
            options: config.options.clone(),
            pixels: Pixels::default(),
            registry: Registry::new(),
            screens: ScreenManager::new(&config.options),
            views: Vec::new(),
            tags: Vec::new(),
            gravities: Vec::new(),
            focus: None,
            current_screen: 0,
            drag: None,
            deferred: VecDeque::new(),
            hooks: Hooks::new(),
            error_tracker: ErrorTracker::new(),
        };
        wm.apply_config(config)?;

        let outputs = wm.backend.outputs()?;
        wm.screens.discover(outputs, wm.backend.display_rect(), wm.views.len());
        Ok(wm)
    }

    fn apply_config(&mut self, config: &Config) -> Result<()> {
        self.pixels = Pixels {
            focus: parse_color(&config.colors.focus)?,
            normal: parse_color(&config.colors.normal)?,
            panel: parse_color(&config.colors.panel)?,
        };
        self.options = config.options.clone();
        self.gravities = build_table(&config.gravities);
        if self.options.default_gravity >= self.gravities.len() {
            warn!("Default gravity {} doesn't exist, using center", self.options.default_gravity);
            self.options.default_gravity = 5;
        }
        self.tags = build_tags(&config.tags);
        self.views = build_views(&config.views, &self.tags);
        self.screens.apply_options(&self.options);
        info!(
            "{} tags, {} views, {} gravities",
            self.tags.len(),
            self.views.len(),
            self.gravities.len()
        );
        Ok(())
    }

    /// Create panels and publish the initial state
    pub fn start(&mut self) -> Result<()> {
        self.update_panels()?;
        self.publish_all()
    }

    /// Manage windows that existed before we started
    pub fn adopt(&mut self, windows: &[Window]) -> Result<()> {
        for &window in windows {
            let result = self.register(window);
            self.error_tracker.warn_if_failed(result, "adopt", ErrorCategory::Window);
        }
        self.reconcile()
    }

    pub fn reload(&mut self, config: &Config) -> Result<()> {
        info!("Reloading configuration");
        self.apply_config(config)?;

        let outputs = self.backend.outputs()?;
        self.screens.discover(outputs, self.backend.display_rect(), self.views.len());

        let views = self.views.len();
        let default_gravity = self.options.default_gravity;
        let gravities = self.gravities.len();
        let screens = self.screens.len();
        for window in self.registry.windows() {
            let Some(client) = self.registry.get(window) else { continue; };
            let matched = self.match_tags(client);
            let Some(client) = self.registry.get_mut(window) else { continue; };

            client.tags = matched.tags;
            let current = client.gravity;
            client.gravities.resize(views, current);
            for gravity in client.gravities.iter_mut().chain(std::iter::once(&mut client.gravity)) {
                if *gravity >= gravities {
                    *gravity = default_gravity;
                }
            }
            if client.screen >= screens {
                client.screen = 0;
            }
            client.flags |= ClientFlags::ARRANGE;
        }

        self.rescan_struts();
        self.update_panels()?;
        self.publish_all()?;
        self.reconcile()
    }

    /// Map hidden clients back and hand focus to the root
    pub fn teardown(&mut self) -> Result<()> {
        for client in self.registry.iter() {
            if client.flags.contains(ClientFlags::UNMAP) {
                log_and_ignore(self.backend.map(client.window), "teardown map");
            }
        }
        for screen in &self.screens.screens {
            for panel in screen.panels.iter().flatten() {
                log_and_ignore(self.backend.destroy_window(*panel), "teardown panel");
            }
        }
        self.backend.focus(self.backend.root())
    }

    fn match_tags(&self, client: &Client) -> TagMatch {
        let mut matched = TagMatch::default();
        for (id, tag) in self.tags.iter().enumerate().skip(1) {
            if !tag.matches(client) {
                continue;
            }
            debug!("{} matches tag {}", client, tag.name);
            matched.tags |= tag_bit(id);
            matched.modes |= tag.modes;
            matched.policies |= tag.policies;
            if let Some(gravity) = tag.gravity.filter(|&g| g < self.gravities.len()) {
                matched.gravity = Some(gravity);
            }
            if let Some(screen) = tag.screen.filter(|&s| s < self.screens.len()) {
                matched.screen = Some(screen);
            }
            if tag.geometry.is_some() {
                matched.geometry = tag.geometry;
            }
        }
        if matched.tags == 0 {
            matched.tags = DEFAULT_TAG_BIT;
        }
        matched
    }

    fn client(&self, window: Window) -> Result<&Client> {
        Ok(self.registry.get(window).ok_or(WmError::UnknownClient(window))?)
    }

    fn client_mut(&mut self, window: Window) -> Result<&mut Client> {
        Ok(self.registry.get_mut(window).ok_or(WmError::UnknownClient(window))?)
    }

    /// Start managing a window. The caller reconciles afterwards.
    pub fn register(&mut self, window: Window) -> Result<()> {
        if window == self.backend.root() || self.registry.contains(window) {
            return Ok(());
        }

        let hints = self.backend.fetch_hints(window)?;
        let mut client =
            Client::new(window, hints.geometry, self.views.len(), self.options.default_gravity, self.options.border);
        if let Some(name) = hints.name.filter(|n| !n.is_empty()) {
            client.name = name;
        }
        if let Some(instance) = hints.instance {
            client.instance = instance;
        }
        if let Some(class) = hints.class {
            client.class = class;
        }
        client.role = hints.role;
        client.size = hints.size;
        client.transient_for = hints.transient_for;
        client.strut = hints.strut.filter(|s| !s.is_empty());

        let mut flags = ClientFlags::from_type(hints.window_type);
        flags.set(ClientFlags::INPUT, hints.input);
        flags.set(ClientFlags::FOCUS, hints.take_focus);
        flags.set(ClientFlags::CLOSE, hints.delete_window);
        flags.set(ClientFlags::MODE_URGENT, hints.urgent || hints.state.demands_attention);
        flags.set(ClientFlags::MODE_FULL, hints.state.fullscreen);
        flags.set(ClientFlags::MODE_STICK, hints.state.sticky);
        flags.set(ClientFlags::MODE_FLOAT, hints.state.above);
        client.flags = flags;
        client.screen = self.screens.find_rect(&client.rect);

        let matched = self.match_tags(&client);
        client.tags = matched.tags;
        client.flags |= matched.modes | matched.policies;
        if let Some(gravity) = matched.gravity {
            client.gravity = gravity;
            client.gravities.fill(gravity);
        }
        if let Some(screen) = matched.screen {
            client.screen = screen;
        }
        if let Some(geometry) = matched.geometry {
            client.rect = geometry;
            client.flags |= ClientFlags::MODE_FLOAT;
        }

        let mut center = false;
        if client.size.is_fixed() {
            client.flags.remove(ClientFlags::TYPES);
            client.flags |= ClientFlags::MODE_FLOAT | ClientFlags::MODE_FIXED | ClientFlags::TYPE_DIALOG;
            center = true;
        } else if client.transient_for.is_some()
            || client.flags.intersects(ClientFlags::TYPE_DIALOG | ClientFlags::TYPE_SPLASH)
        {
            client.flags |= ClientFlags::MODE_FLOAT;
            center = true;
        }
        if client.is_borderless() {
            client.flags |= ClientFlags::MODE_STICK | ClientFlags::MODE_FLOAT;
        }
        client.flags = strip_vetoed(client.flags);

        let display = self.backend.display_rect();
        let (base, geom) = self.screens.get(client.screen).map(|s| (s.base, s.geom)).unwrap_or((display, display));
        if client.flags.contains(ClientFlags::TYPE_DESKTOP) {
            client.rect = base;
        } else if client.is_float() && !client.flags.contains(ClientFlags::TYPE_DOCK) {
            let border = client.border as i32;
            let unplaced = matched.geometry.is_none()
                && client.size.position.is_none()
                && client.rect.x == 0
                && client.rect.y == 0;
            if center || unplaced {
                let (width, height) = client.size.apply_size(client.rect.width, client.rect.height, border, &geom);
                client.rect = centered(width, height, border, &geom);
            }
            client.rect = client.size.constrain(client.rect, border, &geom);
        }
        client.flags |= ClientFlags::ARRANGE;

        info!("Managing {} on screen {} with tags {:#b}", client, client.screen, client.tags);
        let strut = client.strut;
        self.backend.manage(window, client.effective_border(), self.pixels.normal)?;
        self.backend.set_wm_state(window, WmState::Normal)?;
        self.registry.insert(client);

        if let Some(strut) = strut {
            if self.screens.add_strut(&strut) {
                self.arrange_all();
                self.publish_workarea()?;
            }
        }

        self.publish_client(window)?;
        self.publish_client_list()?;
        self.hooks.fire(HookEvent::ClientCreate, HookArgs::Client(window));
        Ok(())
    }

    /// Send the effective geometry to the server and the client
    pub fn configure(&mut self, window: Window) -> Result<()> {
        let client = self.client(window)?;
        let base = self.screens.get(client.screen).map(|s| s.base).unwrap_or_else(|| self.backend.display_rect());
        let rect = client.effective_rect(&base);
        let border = client.effective_border();

        self.backend.move_resize(window, rect, border)?;
        self.backend.send_configure_notify(window, rect, border)?;
        self.hooks.fire(HookEvent::ClientConfigure, HookArgs::Client(window));
        Ok(())
    }

    /// Flip one mode bit. Returns false when the client's policy vetoes it.
    pub fn toggle_mode(&mut self, window: Window, mode: ClientFlags) -> Result<bool> {
        let client = self.client_mut(window)?;
        if client.flags.contains(ClientFlags::veto_for(mode)) {
            debug!("{:?} is vetoed for {}", mode, client);
            return Ok(false);
        }

        client.flags.toggle(mode);
        let on = client.flags.contains(mode);
        debug!("{:?} {} for {}", mode, if on { "on" } else { "off" }, client);

        if mode == ClientFlags::MODE_FLOAT {
            if on {
                self.resize(window)?;
            } else {
                self.client_mut(window)?.flags |= ClientFlags::ARRANGE;
            }
        } else if mode == ClientFlags::MODE_FULL && !on {
            self.client_mut(window)?.flags |= ClientFlags::ARRANGE;
        }

        self.publish_client(window)?;
        if mode == ClientFlags::MODE_URGENT {
            return Ok(true);
        }

        self.reconcile()?;
        if on && (mode == ClientFlags::MODE_FULL || mode == ClientFlags::MODE_FLOAT) {
            self.backend.raise(window)?;
        }
        Ok(true)
    }

    /// Place a client with a gravity on a screen. Nothing happens unless
    /// forced, the client is marked for arrangement or a value changes.
    pub fn set_gravity(&mut self, window: Window, gravity: usize, screen: usize, force: bool) -> Result<()> {
        let target = self.gravities.get(gravity).ok_or(WmError::UnknownGravity(gravity))?;
        let (new_base, new_geom) =
            self.screens.get(screen).map(|s| (s.base, s.geom)).ok_or(WmError::UnknownScreen(screen))?;
        let client = self.registry.get_mut(window).ok_or(WmError::UnknownClient(window))?;
        let old_geom = self.screens.get(client.screen).map(|s| s.geom).unwrap_or(new_geom);

        let dirty = client.flags.contains(ClientFlags::ARRANGE);
        if !force && !dirty && client.gravity == gravity && client.screen == screen {
            return Ok(());
        }

        if client.flags.contains(ClientFlags::TYPE_DESKTOP) {
            client.rect = new_base;
        } else if client.is_float() {
            if client.screen != screen {
                client.rect = client.rect.translate(new_geom.x - old_geom.x, new_geom.y - old_geom.y);
            }
        } else {
            let border = if client.is_borderless() { 0 } else { client.border };
            client.rect = place(&new_geom, target, border, self.options.gap);
        }

        client.gravity = gravity;
        client.screen = screen;
        client.flags.remove(ClientFlags::ARRANGE);
        self.resize(window)
    }

    /// Apply the size hints and fit the client into its screen
    pub fn resize(&mut self, window: Window) -> Result<()> {
        let client = self.registry.get_mut(window).ok_or(WmError::UnknownClient(window))?;
        if client.is_full() || client.is_borderless() {
            return Ok(());
        }
        let Some(geom) = self.screens.get(client.screen).map(|s| s.geom) else { return Ok(()); };
        client.rect = client.size.constrain(client.rect, client.border as i32, &geom);
        Ok(())
    }

    /// Stop managing a client. With `destroy` the client is asked to close,
    /// or killed when it doesn't speak the delete protocol.
    pub fn kill(&mut self, window: Window, destroy: bool) -> Result<()> {
        let client = self.registry.remove(window).ok_or(WmError::UnknownClient(window))?;
        info!("Unmanaging {}{}", client, if destroy { " (closing)" } else { "" });

        if destroy {
            if client.flags.contains(ClientFlags::CLOSE) {
                self.backend.send_protocol(window, Protocol::DeleteWindow)?;
            } else {
                self.backend.kill_client(window)?;
            }
        }
        if !client.is_dead() {
            log_and_ignore(self.backend.set_wm_state(window, WmState::Withdrawn), "withdraw");
            log_and_ignore(self.unpublish_client(window), "unpublish");
        }

        if self.focus == Some(window) {
            self.focus = None;
        }
        self.publish_client_list()?;
        self.hooks.fire(HookEvent::ClientKill, HookArgs::Client(window));

        if client.strut.is_some() {
            self.rescan_struts();
            self.publish_workarea()?;
            self.reconcile()?;
        }
        if self.focus.is_none() {
            self.focus_next()?;
        }
        Ok(())
    }

    pub fn focus(&mut self, window: Window) -> Result<()> {
        let client = self.client(window)?;
        if client.flags.intersects(ClientFlags::UNMAP | ClientFlags::DEAD) || client.is_borderless() {
            debug!("Not focusing {}", client);
            return Ok(());
        }
        let take_focus = client.flags.contains(ClientFlags::FOCUS);
        let input = client.flags.contains(ClientFlags::INPUT);
        let urgent = client.is_urgent();
        let screen = client.screen;

        if let Some(previous) = self.focus.filter(|&w| w != window && self.registry.contains(w)) {
            log_and_ignore(self.backend.set_border_color(previous, self.pixels.normal), "unfocus border");
        }
        self.backend.set_border_color(window, self.pixels.focus)?;
        if take_focus {
            self.backend.send_protocol(window, Protocol::TakeFocus)?;
        }
        if input {
            self.backend.focus(window)?;
        }

        self.focus = Some(window);
        if urgent {
            self.client_mut(window)?.flags.remove(ClientFlags::MODE_URGENT);
            self.publish_client(window)?;
        }
        if screen != self.current_screen {
            self.current_screen = screen;
            self.publish_current_desktop()?;
        }
        self.publish_active()?;
        self.hooks.fire(HookEvent::ClientFocus, HookArgs::Client(window));
        Ok(())
    }

    /// Focus the first visible client in registry order, else the root
    pub fn focus_next(&mut self) -> Result<()> {
        let next = self
            .registry
            .iter()
            .find(|c| !c.flags.intersects(ClientFlags::UNMAP | ClientFlags::DEAD) && !c.is_borderless())
            .map(|c| c.window);

        match next {
            Some(window) => self.focus(window),
            None => {
                self.focus = None;
                self.backend.focus(self.backend.root())?;
                self.publish_active()
            }
        }
    }

    /// Screen the client should be shown on: the one it is on if that shows
    /// it, else the first one that does.
    fn visible_screen(&self, client: &Client) -> Option<usize> {
        let shows = |view: usize| client.is_stick() || self.views.get(view).is_some_and(|v| v.shows(client.tags));
        if self.screens.get(client.screen).is_some_and(|s| shows(s.view)) {
            return Some(client.screen);
        }
        self.screens.screens.iter().position(|s| shows(s.view))
    }

    /// Place, map or hide every client according to the views shown
    pub fn reconcile(&mut self) -> Result<()> {
        for window in self.registry.windows() {
            let result = self.reconcile_client(window);
            self.error_tracker.warn_if_failed(result, "reconcile", ErrorCategory::Window);
        }

        for client in self.registry.iter() {
            if client.flags.contains(ClientFlags::TYPE_DESKTOP) && !client.flags.contains(ClientFlags::UNMAP) {
                log_and_ignore(self.backend.lower(client.window), "lower desktop");
            }
        }

        let focus_visible = self
            .focus
            .and_then(|w| self.registry.get(w))
            .is_some_and(|c| !c.flags.contains(ClientFlags::UNMAP));
        if !focus_visible {
            self.focus_next()?;
        }
        Ok(())
    }

    fn reconcile_client(&mut self, window: Window) -> Result<()> {
        let client = self.client(window)?;
        if client.is_dead() {
            return Ok(());
        }

        match self.visible_screen(client) {
            Some(screen) => {
                let view = self.screens.get(screen).map(|s| s.view).unwrap_or(0);
                let gravity = client.gravity_for(view);
                self.set_gravity(window, gravity, screen, false)?;
                self.configure(window)?;

                let client = self.client_mut(window)?;
                let was_hidden = client.flags.contains(ClientFlags::UNMAP);
                client.flags.remove(ClientFlags::UNMAP);
                let raised = client.is_float() || client.is_full();

                self.backend.set_cardinals(window, Prop::NetWmDesktop, &[view as u32])?;
                if raised {
                    self.backend.map_raised(window)?;
                } else {
                    self.backend.map(window)?;
                }
                if was_hidden {
                    self.backend.set_wm_state(window, WmState::Normal)?;
                }
            }
            None => {
                if !client.flags.contains(ClientFlags::UNMAP) {
                    debug!("Hiding {}", client);
                    let client = self.client_mut(window)?;
                    client.flags |= ClientFlags::UNMAP;
                    client.pending_unmaps += 1;
                    self.backend.unmap(window)?;
                    self.backend.set_wm_state(window, WmState::Iconic)?;
                }
            }
        }
        self.publish_client(window)
    }

    fn arrange_all(&mut self) {
        for client in self.registry.iter_mut() {
            client.flags |= ClientFlags::ARRANGE;
        }
    }

    /// Rebuild the strut reservation from the clients that still have one
    fn rescan_struts(&mut self) {
        self.screens.reset_struts();
        for client in self.registry.iter() {
            if let Some(strut) = &client.strut {
                self.screens.add_strut(strut);
            }
        }
        self.arrange_all();
    }

    fn update_panels(&mut self) -> Result<()> {
        for id in 0..self.screens.len() {
            let rects = self.screens.panel_rects(id);
            for (slot, rect) in rects.into_iter().enumerate() {
                let existing = self.screens.screens[id].panels[slot];
                let panel = match (existing, rect) {
                    (Some(window), Some(rect)) => {
                        self.backend.move_resize(window, rect, 0)?;
                        Some(window)
                    }
                    (None, Some(rect)) => {
                        let window = self.backend.create_panel(rect, self.pixels.panel)?;
                        self.backend.map_raised(window)?;
                        debug!("Panel {:#x} at {:?}", window, rect);
                        Some(window)
                    }
                    (Some(window), None) => {
                        log_and_ignore(self.backend.destroy_window(window), "destroy panel");
                        None
                    }
                    (None, None) => None,
                };
                self.screens.screens[id].panels[slot] = panel;
            }
        }
        Ok(())
    }

    /// Rediscover outputs after a topology change
    pub fn update_screens(&mut self) -> Result<()> {
        let outputs = self.backend.outputs()?;
        let count = outputs.len().max(1);
        for screen in self.screens.screens.iter().skip(count) {
            for panel in screen.panels.iter().flatten() {
                log_and_ignore(self.backend.destroy_window(*panel), "destroy panel");
            }
        }

        self.screens.discover(outputs, self.backend.display_rect(), self.views.len());
        let screens = self.screens.len();
        for client in self.registry.iter_mut() {
            if client.screen >= screens {
                client.screen = 0;
            }
        }
        if self.current_screen >= screens {
            self.current_screen = 0;
        }

        self.rescan_struts();
        self.update_panels()?;
        self.publish_workarea()?;
        self.publish_current_desktop()?;
        self.reconcile()
    }

    /// Show `view` on `screen`; a screen already showing it gets the
    /// previous view of `screen` instead.
    pub fn view_jump(&mut self, view: usize, screen: usize) -> Result<()> {
        if view >= self.views.len() {
            return Err(WmError::UnknownView(view).into());
        }
        let current = self.screens.get(screen).ok_or(WmError::UnknownScreen(screen))?.view;
        if current == view {
            return Ok(());
        }

        if let Some(other) = self.screens.showing(view) {
            self.screens.screens[other].view = current;
        }
        self.screens.screens[screen].view = view;
        self.current_screen = screen;
        info!("Screen {} shows view {} ({})", screen, view, self.views[view].name);

        self.publish_current_desktop()?;
        self.hooks.fire(HookEvent::ViewJump, HookArgs::View { view, screen });
        self.reconcile()
    }

    pub fn tag_client(&mut self, window: Window, tag: usize, add: bool) -> Result<()> {
        let spec = self.tags.get(tag).ok_or(WmError::UnknownTag(tag))?;
        let modes = spec.modes;
        let gravity = spec.gravity.filter(|&g| g < self.gravities.len());
        let client = self.client_mut(window)?;

        if add {
            client.tags |= tag_bit(tag);
            client.flags = strip_vetoed(client.flags | modes);
            if let Some(gravity) = gravity {
                client.gravities.fill(gravity);
                client.flags |= ClientFlags::ARRANGE;
            }
        } else {
            client.tags &= !tag_bit(tag);
            if client.tags == 0 {
                client.tags = DEFAULT_TAG_BIT;
            }
        }

        self.publish_client(window)?;
        self.reconcile()
    }

    pub fn tag_view(&mut self, view: usize, tag: usize, add: bool) -> Result<()> {
        if tag >= self.tags.len() {
            return Err(WmError::UnknownTag(tag).into());
        }
        let view = self.views.get_mut(view).ok_or(WmError::UnknownView(view))?;
        if add {
            view.tags |= tag_bit(tag);
        } else {
            view.tags &= !tag_bit(tag);
        }
        self.publish_views()?;
        self.reconcile()
    }

    /// Create a tag, or return the id of the existing one with that name
    pub fn tag_new(&mut self, name: &str) -> Result<usize> {
        if let Some(id) = self.tags.iter().position(|t| t.name == name) {
            return Ok(id);
        }
        if self.tags.len() >= MAX_TAGS {
            return Err(WmError::TooManyTags(MAX_TAGS).into());
        }
        self.tags.push(Tag::named(name));
        info!("Created tag {} ({})", self.tags.len() - 1, name);
        self.publish_tags()?;
        Ok(self.tags.len() - 1)
    }

    pub fn tag_kill(&mut self, id: usize) -> Result<()> {
        if id == 0 {
            return Err(WmError::Protected("the default tag").into());
        }
        if id >= self.tags.len() {
            return Err(WmError::UnknownTag(id).into());
        }

        let tag = self.tags.remove(id);
        for client in self.registry.iter_mut() {
            client.tags = remove_bit(client.tags, id);
            if client.tags == 0 {
                client.tags = DEFAULT_TAG_BIT;
            }
        }
        for view in self.views.iter_mut() {
            view.tags = remove_bit(view.tags, id);
        }
        info!("Removed tag {} ({})", id, tag.name);

        self.publish_tags()?;
        self.publish_views()?;
        self.reconcile()
    }

    pub fn view_new(&mut self, name: &str) -> Result<usize> {
        if let Some(id) = self.views.iter().position(|v| v.name == name) {
            return Ok(id);
        }
        self.views.push(View::new(name, 0));
        for client in self.registry.iter_mut() {
            let gravity = client.gravity;
            client.gravities.push(gravity);
        }
        info!("Created view {} ({})", self.views.len() - 1, name);
        self.publish_views()?;
        Ok(self.views.len() - 1)
    }

    pub fn view_kill(&mut self, id: usize) -> Result<()> {
        if id >= self.views.len() {
            return Err(WmError::UnknownView(id).into());
        }
        if self.views.len() == 1 {
            return Err(WmError::Protected("the last view").into());
        }

        let view = self.views.remove(id);
        for client in self.registry.iter_mut() {
            if id < client.gravities.len() {
                client.gravities.remove(id);
            }
        }

        let mut orphaned = Vec::new();
        for (i, screen) in self.screens.screens.iter_mut().enumerate() {
            if screen.view == id {
                screen.view = usize::MAX;
                orphaned.push(i);
            } else if screen.view > id {
                screen.view -= 1;
            }
        }
        for i in orphaned {
            let free = (0..self.views.len()).find(|v| !self.screens.screens.iter().any(|s| s.view == *v));
            self.screens.screens[i].view = free.unwrap_or(0);
        }
        info!("Removed view {} ({})", id, view.name);

        self.publish_views()?;
        self.publish_current_desktop()?;
        self.reconcile()
    }

    /// Focus and raise a client, switching to a view that shows it first
    pub fn activate(&mut self, window: Window) -> Result<()> {
        let client = self.client(window)?;
        let hidden = client.flags.contains(ClientFlags::UNMAP);
        let tags = client.tags;
        if hidden {
            if let Some(view) = self.views.iter().position(|v| v.shows(tags)) {
                self.view_jump(view, self.current_screen)?;
            }
        }
        self.backend.raise(window)?;
        self.focus(window)
    }

    fn change_state(&mut self, window: Window, data: &[u32; DATA_WORDS]) -> Result<()> {
        let action = StateAction::from_word(data[0])
            .ok_or(WmError::InvalidArgument { what: "state action", value: data[0] })?;
        self.client(window)?;

        for &atom in &data[1..3] {
            if atom == x11rb::NONE {
                continue;
            }
            let mode = match self.backend.prop_of(atom) {
                Some(Prop::NetWmStateFullscreen) => ClientFlags::MODE_FULL,
                Some(Prop::NetWmStateAbove) => ClientFlags::MODE_FLOAT,
                Some(Prop::NetWmStateSticky) => ClientFlags::MODE_STICK,
                Some(Prop::NetWmStateDemandsAttention) => ClientFlags::MODE_URGENT,
                _ => {
                    debug!("Unsupported state atom {} for {:#x}", atom, window);
                    continue;
                }
            };
            let active = self.client(window)?.flags.contains(mode);
            if action.needs_flip(active) {
                self.toggle_mode(window, mode)?;
            }
        }
        Ok(())
    }

    fn restack(&mut self, window: Window, detail: u32) -> Result<()> {
        let restack = Restack::from_word(detail).ok_or(WmError::InvalidArgument { what: "stack mode", value: detail })?;
        self.client(window)?;
        match restack {
            Restack::Above => self.backend.raise(window),
            Restack::Below => self.backend.lower(window),
        }
    }

    /// `_NET_MOVERESIZE_WINDOW`: bits 8-11 of the flags select x, y, width
    /// and height
    fn move_resize_request(&mut self, window: Window, data: &[u32; DATA_WORDS]) -> Result<()> {
        let client = self.registry.get_mut(window).ok_or(WmError::UnknownClient(window))?;
        if !client.is_float() {
            return Err(WmError::NotFloating(window).into());
        }

        let flags = data[0];
        let mut rect = client.rect;
        if flags & (1 << 8) != 0 {
            rect.x = data[1] as i32;
        }
        if flags & (1 << 9) != 0 {
            rect.y = data[2] as i32;
        }
        if flags & (1 << 10) != 0 {
            rect.width = data[3] as i32;
        }
        if flags & (1 << 11) != 0 {
            rect.height = data[4] as i32;
        }
        client.rect = rect;
        client.screen = self.screens.find_rect(&rect);

        self.resize(window)?;
        self.configure(window)?;
        self.publish_client(window)
    }

    fn moveresize_request(&mut self, window: Window, data: &[u32; DATA_WORDS]) -> Result<()> {
        self.client(window)?;
        let pointer = (data[0] as i32, data[1] as i32);
        match data[2] {
            moveresize::CANCEL => {
                if self.drag.as_ref().is_some_and(|d| d.window == window) {
                    self.end_drag(DragOutcome::Cancel)?;
                }
                Ok(())
            }
            moveresize::MOVE => self.begin_drag(window, DragMode::Move, pointer, None),
            direction if direction <= moveresize::SIZE_LEFT => {
                self.begin_drag(window, DragMode::Resize, pointer, Some(direction))
            }
            direction => Err(WmError::InvalidArgument { what: "move/resize direction", value: direction }.into()),
        }
    }

    fn set_client_gravity(&mut self, window: Window, gravity: usize) -> Result<()> {
        if gravity >= self.gravities.len() {
            return Err(WmError::UnknownGravity(gravity).into());
        }
        let client = self.registry.get_mut(window).ok_or(WmError::UnknownClient(window))?;
        let screen = client.screen;
        let view = self.screens.get(screen).map(|s| s.view).unwrap_or(0);
        if let Some(slot) = client.gravities.get_mut(view) {
            *slot = gravity;
        }

        self.set_gravity(window, gravity, screen, true)?;
        self.configure(window)?;
        self.publish_client(window)
    }

    fn set_client_screen(&mut self, window: Window, screen: usize) -> Result<()> {
        let view = self.screens.get(screen).ok_or(WmError::UnknownScreen(screen))?.view;
        let gravity = self.client(window)?.gravity_for(view);

        self.set_gravity(window, gravity, screen, true)?;
        self.configure(window)?;
        self.publish_client(window)?;
        self.reconcile()
    }

    /// Dispatch a control message. Lookup failures are logged and ignored.
    fn handle_message(
        &mut self,
        window: Window,
        message: Message,
        data: [u32; DATA_WORDS],
    ) -> Result<Option<LoopExit>> {
        debug!("{} on {:#x}: {:?}", message.atom_name(), window, data);
        let result = match message {
            Message::Reload => return Ok(Some(LoopExit::Reload)),
            Message::Quit => return Ok(Some(LoopExit::Quit)),
            Message::CurrentDesktop => self.view_jump(data[0] as usize, self.current_screen),
            Message::ActiveWindow => self.activate(window),
            Message::WmState => self.change_state(window, &data),
            Message::CloseWindow => self.kill(window, true),
            Message::RestackWindow => {
                let target = if data[1] != x11rb::NONE { data[1] } else { window };
                self.restack(target, data[2])
            }
            Message::MoveResizeWindow => self.move_resize_request(window, &data),
            Message::WmMoveResize => self.moveresize_request(window, &data),
            Message::WindowTag => self.tag_client(data[0], data[1] as usize, true),
            Message::WindowUntag => self.tag_client(data[0], data[1] as usize, false),
            Message::WindowGravity => self.set_client_gravity(data[0], data[1] as usize),
            Message::WindowScreen => self.set_client_screen(data[0], data[1] as usize),
            Message::ViewTag => self.tag_view(data[0] as usize, data[1] as usize, true),
            Message::ViewUntag => self.tag_view(data[0] as usize, data[1] as usize, false),
            Message::TagNew => unpack_name(&data)
                .map_err(WmError::from)
                .map_err(anyhow::Error::from)
                .and_then(|name| self.tag_new(&name).map(|_| ())),
            Message::TagKill => self.tag_kill(data[0] as usize),
            Message::ViewNew => unpack_name(&data)
                .map_err(WmError::from)
                .map_err(anyhow::Error::from)
                .and_then(|name| self.view_new(&name).map(|_| ())),
            Message::ViewKill => self.view_kill(data[0] as usize),
        };

        match result {
            Ok(()) => Ok(None),
            Err(e) => match e.downcast::<WmError>() {
                Ok(error) => {
                    self.error_tracker.record_control_error(message.atom_name(), &error);
                    Ok(None)
                }
                Err(e) => Err(e),
            },
        }
    }

    pub fn begin_drag(
        &mut self,
        window: Window,
        mode: DragMode,
        pointer: (i32, i32),
        direction: Option<u32>,
    ) -> Result<()> {
        if self.drag.is_some() {
            return Ok(());
        }
        let client = self.client(window)?;
        if client.is_full() || client.is_borderless() {
            debug!("Not dragging {}", client);
            return Ok(());
        }
        let bounds = self.screens.get(client.screen).map(|s| s.geom).unwrap_or_else(|| self.backend.display_rect());
        let mut drag = Drag::new(
            window,
            mode,
            client.rect,
            pointer,
            client.effective_border(),
            bounds,
            self.options.snap,
            client.size,
        );
        if let Some(direction) = direction {
            drag = drag.with_direction(direction);
        }

        if !self.backend.grab_input(window)? {
            warn!("Pointer is grabbed elsewhere, not dragging {:#x}", window);
            return Ok(());
        }
        debug!("{:?} drag of {:#x} from {:?}", mode, window, pointer);
        self.backend.draw_mask(drag.mask())?;
        self.drag = Some(drag);
        Ok(())
    }

    fn drag_input(&mut self, event: WmEvent) -> Result<()> {
        let Some(drag) = self.drag.as_mut() else { return Ok(()); };
        match event {
            WmEvent::MotionNotify { root_x, root_y } => {
                let old = drag.mask();
                drag.motion(root_x, root_y);
                let new = drag.mask();
                if old != new {
                    self.backend.draw_mask(old)?;
                    self.backend.draw_mask(new)?;
                }
                Ok(())
            }
            WmEvent::ButtonRelease { .. } => {
                let outcome = drag.release();
                self.end_drag(outcome)
            }
            WmEvent::KeyPress { key } => match drag.key(key) {
                DragOutcome::Continue => Ok(()),
                outcome => self.end_drag(outcome),
            },
            _ => Ok(()),
        }
    }

    /// Erase the mask, release the grabs and apply the outcome
    pub fn end_drag(&mut self, outcome: DragOutcome) -> Result<()> {
        let Some(drag) = self.drag.take() else { return Ok(()); };
        self.backend.draw_mask(drag.mask())?;
        self.backend.ungrab_input()?;

        let DragOutcome::Commit(rect) = outcome else {
            debug!("Drag of {:#x} cancelled", drag.window);
            return Ok(());
        };

        let client = self.registry.get_mut(drag.window).ok_or(WmError::UnknownClient(drag.window))?;
        if client.is_float() {
            client.rect = rect;
            client.screen = self.screens.find_rect(&rect);
            self.resize(drag.window)?;
            self.configure(drag.window)?;
            self.publish_client(drag.window)?;
        } else if drag.mode == DragMode::Resize {
            let weight = drag.weight();
            client.weight = weight;
            client.flags |= ClientFlags::MODE_RESIZE;
            debug!("Tile weight of {} is now {}%", client, weight);
            self.hooks.fire(HookEvent::TileWeight, HookArgs::Weight { window: drag.window, weight });
        }
        Ok(())
    }

    fn configure_request(&mut self, request: ConfigureRequest) -> Result<()> {
        let window = request.window;
        let Some(client) = self.registry.get_mut(window) else {
            return self.backend.configure_unmanaged(&request);
        };

        if client.is_float() && !client.is_full() {
            let rect = &mut client.rect;
            rect.x = request.x.unwrap_or(rect.x);
            rect.y = request.y.unwrap_or(rect.y);
            rect.width = request.width.unwrap_or(rect.width);
            rect.height = request.height.unwrap_or(rect.height);
            client.screen = self.screens.find_rect(&client.rect);
            self.resize(window)?;
        }
        // Everything else only learns its current geometry
        self.configure(window)
    }

    fn update_property(&mut self, window: Window, prop: Prop) -> Result<()> {
        if !self.registry.contains(window) {
            return Ok(());
        }
        match prop {
            Prop::WmName | Prop::NetWmName => {
                let hints = self.backend.fetch_hints(window)?;
                if let Some(name) = hints.name.filter(|n| !n.is_empty()) {
                    self.client_mut(window)?.name = name;
                }
            }
            Prop::WmNormalHints => {
                let hints = self.backend.fetch_hints(window)?;
                self.client_mut(window)?.size = hints.size;
                self.resize(window)?;
                self.configure(window)?;
            }
            Prop::WmHints => {
                let hints = self.backend.fetch_hints(window)?;
                let focused = self.focus == Some(window);
                let client = self.client_mut(window)?;
                client.flags.set(ClientFlags::INPUT, hints.input);
                if hints.urgent && !focused && !client.flags.contains(ClientFlags::NO_URGENT) {
                    client.flags |= ClientFlags::MODE_URGENT;
                }
                self.publish_client(window)?;
            }
            Prop::NetWmStrut | Prop::NetWmStrutPartial => {
                let hints = self.backend.fetch_hints(window)?;
                self.client_mut(window)?.strut = hints.strut.filter(|s| !s.is_empty());
                self.rescan_struts();
                self.publish_workarea()?;
                self.reconcile()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// React to one event. While a drag is active only its input is
    /// serviced, everything else waits.
    pub fn handle_event(&mut self, event: WmEvent) -> Result<Option<LoopExit>> {
        if self.drag.is_some() {
            if event.is_drag_input() {
                self.drag_input(event)?;
            } else {
                self.deferred.push_back(event);
            }
            return Ok(None);
        }

        match event {
            WmEvent::MapRequest { window } => {
                if self.registry.contains(window) {
                    return Ok(None);
                }
                let registered = self.register(window);
                if self.error_tracker.warn_if_failed(registered, "register", ErrorCategory::Window).is_some() {
                    self.reconcile()?;
                    if self.registry.get(window).is_some_and(|c| !c.flags.contains(ClientFlags::UNMAP)) {
                        self.focus(window)?;
                    }
                }
            }
            WmEvent::ConfigureRequest(request) => self.configure_request(request)?,
            WmEvent::UnmapNotify { window } => {
                if let Some(client) = self.registry.get_mut(window) {
                    if client.pending_unmaps > 0 {
                        client.pending_unmaps -= 1;
                        debug!("Ignoring our own unmap of {}", client);
                    } else {
                        self.kill(window, false)?;
                    }
                }
            }
            WmEvent::DestroyNotify { window } => {
                if let Some(client) = self.registry.get_mut(window) {
                    client.flags |= ClientFlags::DEAD;
                    self.kill(window, false)?;
                }
            }
            WmEvent::PropertyNotify { window, prop } => self.update_property(window, prop)?,
            WmEvent::EnterNotify { window } => {
                if self.options.focus_follows_mouse && self.focus != Some(window) && self.registry.contains(window) {
                    self.focus(window)?;
                }
            }
            WmEvent::ButtonPress { window, root_x, root_y, button, with_modifier } => {
                let Some(client) = self.registry.get(window) else { return Ok(None); };
                let raise = client.is_float() || client.is_full();
                if with_modifier {
                    self.focus(window)?;
                    let mode = match button {
                        1 => Some(DragMode::Move),
                        3 => Some(DragMode::Resize),
                        _ => None,
                    };
                    if let Some(mode) = mode {
                        self.begin_drag(window, mode, (root_x, root_y), None)?;
                    }
                    // A started drag took over the frozen pointer
                    if self.drag.is_none() {
                        self.backend.replay_pointer()?;
                    }
                } else {
                    self.focus(window)?;
                    if raise {
                        self.backend.raise(window)?;
                    }
                    self.backend.replay_pointer()?;
                }
            }
            WmEvent::ButtonRelease { .. } | WmEvent::MotionNotify { .. } | WmEvent::KeyPress { .. } => {}
            WmEvent::ClientMessage { window, message, data } => return self.handle_message(window, message, data),
            WmEvent::ScreenChange => self.update_screens()?,
            WmEvent::Error { major_opcode, kind, bad_value } => {
                self.error_tracker.record_protocol_error(major_opcode, kind, bad_value)
            }
        }
        Ok(None)
    }

    /// Handle an event and replay whatever a finished drag held back
    pub fn process(&mut self, event: WmEvent) -> Result<Option<LoopExit>> {
        let mut exit = self.handle_event(event)?;
        while exit.is_none() && self.drag.is_none() {
            let Some(event) = self.deferred.pop_front() else { break; };
            exit = self.handle_event(event)?;
        }
        Ok(exit)
    }
}

impl WindowManager<Context> {
    pub fn run(&mut self) -> Result<LoopExit> {
        loop {
            self.backend.conn.flush()?;
            let event = self.backend.conn.wait_for_event()?;
            let mut exit = self.dispatch(event)?;

            while exit.is_none() {
                match self.backend.conn.poll_for_event()? {
                    Some(event) => exit = self.dispatch(event)?,
                    None => break,
                }
            }
            if let Some(exit) = exit {
                self.backend.conn.flush()?;
                return Ok(exit);
            }

            let health = self.error_tracker.health_check();
            if !health.is_healthy {
                debug!(
                    "Error counts: {} x11, {} window, {} control",
                    health.x11_errors, health.window_errors, health.control_errors
                );
            }
        }
    }

    fn dispatch(&mut self, event: x11rb::protocol::Event) -> Result<Option<LoopExit>> {
        match self.backend.translate(&event) {
            Some(event) => self.process(event),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::mock::{Call, MockBackend, ROOT};
    use crate::core::event::Key;
    use crate::window::hints::{SizeHints, Strut, WindowHints, WindowType};
    use gravwm_config::Mode;
    use gravwm_proto::pack_name;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SINGLE: Rect = Rect::new(0, 0, 1920, 1080);

    fn config() -> Config {
        let mut config = Config::default();
        config.options.default_gravity = 0;
        let mut locked = TagSpec::new("locked", "locked");
        locked.policies.push(Mode::Float);
        config.tags.push(locked);
        config.views = vec![
            ViewSpec { name: "one".to_string(), tags: vec![DEFAULT_TAG.to_string(), "float".to_string()] },
            ViewSpec { name: "two".to_string(), tags: vec!["terms".to_string()] },
            ViewSpec { name: "three".to_string(), tags: vec!["browser".to_string()] },
        ];
        config
    }

    fn manager(outputs: Vec<Rect>) -> WindowManager<MockBackend> {
        let mut wm = WindowManager::new(MockBackend::new(outputs), &config()).unwrap();
        wm.start().unwrap();
        wm
    }

    fn hints(class: &str, rect: Rect) -> WindowHints {
        WindowHints {
            geometry: rect,
            instance: Some(class.to_string()),
            class: Some(class.to_string()),
            ..WindowHints::default()
        }
    }

    fn map(wm: &mut WindowManager<MockBackend>, window: Window, hints: WindowHints) {
        wm.backend.add_window(window, hints);
        wm.process(WmEvent::MapRequest { window }).unwrap();
    }

    fn message(wm: &mut WindowManager<MockBackend>, window: Window, message: Message, data: [u32; DATA_WORDS]) {
        let exit = wm.process(WmEvent::ClientMessage { window, message, data }).unwrap();
        assert_eq!(exit, None);
    }

    fn last_move(wm: &WindowManager<MockBackend>, window: Window) -> Option<(Rect, u16)> {
        wm.backend.calls.borrow().iter().rev().find_map(|call| match call {
            Call::MoveResize(w, rect, border) if *w == window => Some((*rect, *border)),
            _ => None,
        })
    }

    #[test]
    fn test_fixed_size_client_floats_centered() {
        let mut wm = manager(vec![SINGLE]);
        let mut h = hints("pinentry", Rect::new(0, 0, 200, 100));
        h.size = SizeHints {
            min_width: 200,
            min_height: 100,
            max_width: Some(200),
            max_height: Some(100),
            base_width: 200,
            base_height: 100,
            ..SizeHints::default()
        };
        map(&mut wm, 0x400001, h);

        let client = wm.registry.get(0x400001).unwrap();
        assert!(client.flags.contains(ClientFlags::MODE_FLOAT | ClientFlags::MODE_FIXED | ClientFlags::TYPE_DIALOG));
        assert!(!client.flags.contains(ClientFlags::TYPE_NORMAL));
        let expected = Rect::new((1920 - 204) / 2, (1080 - 104) / 2, 200, 100);
        assert_eq!(client.rect, expected);
        assert_eq!(last_move(&wm, 0x400001), Some((expected, 2)));

        let wire = wm.backend.cardinals(0x400001, Prop::WindowFlags).unwrap()[0];
        assert_eq!(wire & 0b10011, 0b10010);
        assert_eq!(wire & (1 << 21), 1 << 21);
    }

    #[test]
    fn test_gravity_message_places_client() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        let geom = wm.screens.get(0).unwrap().geom;
        assert_eq!(wm.registry.get(0x400001).unwrap().rect, place(&geom, &wm.gravities[0], 2, 0));

        message(&mut wm, ROOT, Message::WindowGravity, [0x400001, 5, 0, 0, 0]);

        let expected = place(&geom, &wm.gravities[5], 2, 0);
        assert_eq!(expected, Rect::new(0, 0, 1916, 1076));
        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.rect, expected);
        assert_eq!(client.gravities[0], 5);
        assert_eq!(wm.backend.cardinals(0x400001, Prop::WindowGravity), Some(vec![5]));
        assert_eq!(last_move(&wm, 0x400001), Some((expected, 2)));
    }

    #[test]
    fn test_view_switch_hides_without_destroying() {
        let mut wm = manager(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(100, 100, 400, 300)));

        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!((client.screen, client.tags), (0, DEFAULT_TAG_BIT));
        assert_eq!(wm.focus, Some(0x400001));
        wm.backend.take_calls();

        message(&mut wm, ROOT, Message::CurrentDesktop, [2, 0, 0, 0, 0]);
        assert_eq!(wm.screens.views(), vec![2, 1]);

        let calls = wm.backend.take_calls();
        assert!(calls.contains(&Call::Unmap(0x400001)));
        assert!(calls.contains(&Call::WmState(0x400001, WmState::Iconic)));
        assert!(!calls.iter().any(|c| matches!(c, Call::Kill(_) | Call::Protocol(_, Protocol::DeleteWindow))));
        assert!(wm.registry.get(0x400001).unwrap().flags.contains(ClientFlags::UNMAP));
        assert_eq!(wm.focus, None);

        // The server echoes our own unmap
        wm.process(WmEvent::UnmapNotify { window: 0x400001 }).unwrap();
        assert!(wm.registry.contains(0x400001));

        message(&mut wm, ROOT, Message::CurrentDesktop, [0, 0, 0, 0, 0]);
        let calls = wm.backend.take_calls();
        assert!(calls.contains(&Call::Map(0x400001)));
        assert!(!wm.registry.get(0x400001).unwrap().flags.contains(ClientFlags::UNMAP));
        assert_eq!(wm.backend.cardinals(0x400001, Prop::NetWmDesktop), Some(vec![0]));
    }

    #[test]
    fn test_late_unmap_echo_keeps_client() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(100, 100, 400, 300)));

        // Hidden and shown again before the server reports the unmap
        message(&mut wm, ROOT, Message::CurrentDesktop, [2, 0, 0, 0, 0]);
        message(&mut wm, ROOT, Message::CurrentDesktop, [0, 0, 0, 0, 0]);
        assert!(!wm.registry.get(0x400001).unwrap().flags.contains(ClientFlags::UNMAP));
        assert_eq!(wm.registry.get(0x400001).unwrap().pending_unmaps, 1);

        wm.process(WmEvent::UnmapNotify { window: 0x400001 }).unwrap();
        assert!(wm.registry.contains(0x400001));
        assert_eq!(wm.registry.get(0x400001).unwrap().pending_unmaps, 0);

        // An unmap the client did itself withdraws it
        wm.process(WmEvent::UnmapNotify { window: 0x400001 }).unwrap();
        assert!(!wm.registry.contains(0x400001));
    }

    #[test]
    fn test_view_jump_swaps_screens() {
        let mut wm = manager(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
        wm.view_jump(1, 0).unwrap();
        assert_eq!(wm.screens.views(), vec![1, 0]);
        assert_eq!(wm.backend.cardinals(wm.backend.root(), Prop::ScreenViews), Some(vec![1, 0]));
        assert_eq!(wm.backend.cardinals(wm.backend.root(), Prop::NetCurrentDesktop), Some(vec![1]));
    }

    #[test]
    fn test_fullscreen_round_trip_restores_geometry() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        let (tiled, border) = last_move(&wm, 0x400001).unwrap();
        assert_eq!(border, 2);

        let fullscreen = wm.backend.atom(Prop::NetWmStateFullscreen);
        message(&mut wm, 0x400001, Message::WmState, [1, fullscreen, 0, 0, 0]);
        assert_eq!(last_move(&wm, 0x400001), Some((SINGLE, 0)));
        assert_eq!(wm.registry.get(0x400001).unwrap().effective_border(), 0);
        assert_eq!(wm.backend.atoms(0x400001, Prop::NetWmState), Some(vec![Prop::NetWmStateFullscreen]));
        assert_eq!(wm.backend.cardinals(0x400001, Prop::NetFrameExtents), Some(vec![0; 4]));

        // Adding again is a no-op
        message(&mut wm, 0x400001, Message::WmState, [1, fullscreen, 0, 0, 0]);
        assert!(wm.registry.get(0x400001).unwrap().is_full());

        message(&mut wm, 0x400001, Message::WmState, [0, fullscreen, 0, 0, 0]);
        assert_eq!(last_move(&wm, 0x400001), Some((tiled, 2)));
        assert_eq!(wm.backend.atoms(0x400001, Prop::NetWmState), Some(vec![]));
    }

    #[test]
    fn test_fullscreen_ignores_struts() {
        let mut wm = manager(vec![SINGLE]);
        let mut dock = hints("panel", Rect::new(0, 0, 1920, 24));
        dock.window_type = WindowType::Dock;
        dock.strut = Some(Strut { top: 24, ..Strut::default() });
        map(&mut wm, 0x400001, dock);
        map(&mut wm, 0x400002, hints("foo", Rect::new(10, 10, 300, 200)));

        assert_eq!(wm.screens.get(0).unwrap().geom, Rect::new(0, 24, 1920, 1056));
        assert!(wm.registry.get(0x400002).unwrap().rect.y >= 24);

        wm.toggle_mode(0x400002, ClientFlags::MODE_FULL).unwrap();
        assert_eq!(last_move(&wm, 0x400002), Some((SINGLE, 0)));
    }

    #[test]
    fn test_dock_strut_released_on_kill() {
        let mut wm = manager(vec![SINGLE]);
        let mut dock = hints("panel", Rect::new(0, 1056, 1920, 24));
        dock.window_type = WindowType::Dock;
        dock.strut = Some(Strut { bottom: 24, ..Strut::default() });
        map(&mut wm, 0x400001, dock);

        let client = wm.registry.get(0x400001).unwrap();
        assert!(client.is_stick() && client.is_float());
        assert_eq!(client.effective_border(), 0);
        assert_eq!(wm.backend.cardinals(wm.backend.root(), Prop::NetWorkarea), Some(vec![0, 0, 1920, 1056]));

        wm.process(WmEvent::DestroyNotify { window: 0x400001 }).unwrap();
        assert_eq!(wm.backend.cardinals(wm.backend.root(), Prop::NetWorkarea), Some(vec![0, 0, 1920, 1080]));
    }

    #[test]
    fn test_vetoed_toggle_changes_nothing() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("locked", Rect::new(10, 10, 300, 200)));
        let before = wm.registry.get(0x400001).unwrap().clone();
        assert!(before.flags.contains(ClientFlags::NO_FLOAT));
        wm.backend.take_calls();

        assert!(!wm.toggle_mode(0x400001, ClientFlags::MODE_FLOAT).unwrap());
        let above = wm.backend.atom(Prop::NetWmStateAbove);
        message(&mut wm, 0x400001, Message::WmState, [2, above, 0, 0, 0]);

        assert_eq!(wm.registry.get(0x400001).unwrap(), &before);
        assert!(wm.backend.take_calls().is_empty());
    }

    #[test]
    fn test_tag_policy_clears_requested_mode() {
        let mut wm = manager(vec![SINGLE]);
        let mut h = hints("locked", Rect::new(10, 10, 300, 200));
        h.state.above = true;
        map(&mut wm, 0x400001, h);
        assert!(!wm.registry.get(0x400001).unwrap().is_float());
    }

    #[test]
    fn test_unmatched_client_gets_default_tag() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("nothing-matches-this", Rect::new(10, 10, 300, 200)));
        map(&mut wm, 0x400002, hints("xterm", Rect::new(10, 10, 300, 200)));

        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.tags, DEFAULT_TAG_BIT);
        assert!(!client.flags.contains(ClientFlags::UNMAP));
        assert!(wm.views.iter().any(|v| v.shows(client.tags)));

        // xterm is tagged terms, which only view two shows
        let terms = wm.registry.get(0x400002).unwrap();
        assert_eq!(terms.tags, tag_bit(1));
        assert!(terms.flags.contains(ClientFlags::UNMAP));
    }

    #[test]
    fn test_client_list_follows_registry() {
        let mut wm = manager(vec![SINGLE]);
        for window in [0x400001, 0x400002, 0x400003] {
            map(&mut wm, window, hints("foo", Rect::new(10, 10, 300, 200)));
        }
        let root = wm.backend.root();
        assert_eq!(wm.backend.windows(root, Prop::NetClientList), Some(vec![0x400001, 0x400002, 0x400003]));

        wm.process(WmEvent::UnmapNotify { window: 0x400002 }).unwrap();
        let list = wm.backend.windows(root, Prop::NetClientList).unwrap();
        assert_eq!(list.len(), wm.registry.len());
        assert_eq!(list, wm.registry.windows());
        assert_eq!(wm.backend.windows(root, Prop::NetClientListStacking), Some(list));
        assert_eq!(wm.backend.cardinals(0x400002, Prop::WindowTags), None);
    }

    #[test]
    fn test_focus_falls_back_in_registry_order() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        map(&mut wm, 0x400002, hints("bar", Rect::new(10, 10, 300, 200)));
        assert_eq!(wm.focus, Some(0x400002));

        wm.process(WmEvent::DestroyNotify { window: 0x400002 }).unwrap();
        assert_eq!(wm.focus, Some(0x400001));
        assert_eq!(wm.backend.windows(wm.backend.root(), Prop::NetActiveWindow), Some(vec![0x400001]));

        wm.process(WmEvent::DestroyNotify { window: 0x400001 }).unwrap();
        assert_eq!(wm.focus, None);
        assert_eq!(wm.backend.windows(wm.backend.root(), Prop::NetActiveWindow), Some(vec![0]));
        assert!(wm.backend.take_calls().contains(&Call::Focus(wm.backend.root())));
    }

    #[test]
    fn test_focus_clears_urgency() {
        let mut wm = manager(vec![SINGLE]);
        let mut h = hints("foo", Rect::new(10, 10, 300, 200));
        h.urgent = true;
        h.take_focus = true;
        map(&mut wm, 0x400001, h);

        let calls = wm.backend.take_calls();
        assert!(calls.contains(&Call::Protocol(0x400001, Protocol::TakeFocus)));
        assert!(calls.contains(&Call::Focus(0x400001)));
        assert!(!wm.registry.get(0x400001).unwrap().is_urgent());
    }

    #[test]
    fn test_close_uses_protocol_when_advertised() {
        let mut wm = manager(vec![SINGLE]);
        let mut polite = hints("foo", Rect::new(10, 10, 300, 200));
        polite.delete_window = true;
        map(&mut wm, 0x400001, polite);
        map(&mut wm, 0x400002, hints("bar", Rect::new(10, 10, 300, 200)));
        wm.backend.take_calls();

        message(&mut wm, 0x400001, Message::CloseWindow, [0; DATA_WORDS]);
        message(&mut wm, 0x400002, Message::CloseWindow, [0; DATA_WORDS]);

        let calls = wm.backend.take_calls();
        assert!(calls.contains(&Call::Protocol(0x400001, Protocol::DeleteWindow)));
        assert!(calls.contains(&Call::Kill(0x400002)));
        assert!(wm.registry.is_empty());
    }

    #[test]
    fn test_unknown_window_message_is_ignored() {
        let mut wm = manager(vec![SINGLE]);
        message(&mut wm, ROOT, Message::WindowTag, [0xdead, 1, 0, 0, 0]);
        message(&mut wm, ROOT, Message::WindowGravity, [0xdead, 99, 0, 0, 0]);
        message(&mut wm, 0xdead, Message::CloseWindow, [0; DATA_WORDS]);
        assert_eq!(wm.error_tracker.health_check().control_errors, 3);
    }

    #[test]
    fn test_quit_and_reload_leave_the_loop() {
        let mut wm = manager(vec![SINGLE]);
        let root = wm.backend.root();
        let exit = wm.process(WmEvent::ClientMessage { window: root, message: Message::Quit, data: [0; 5] });
        assert_eq!(exit.unwrap(), Some(LoopExit::Quit));
        let exit = wm.process(WmEvent::ClientMessage { window: root, message: Message::Reload, data: [0; 5] });
        assert_eq!(exit.unwrap(), Some(LoopExit::Reload));
    }

    #[test]
    fn test_tag_lifecycle() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("firefox", Rect::new(10, 10, 300, 200)));
        assert_eq!(wm.registry.get(0x400001).unwrap().tags, tag_bit(2));

        let root = wm.backend.root();
        message(&mut wm, root, Message::TagNew, pack_name("scratch").unwrap());
        let id = wm.tags.len() - 1;
        assert_eq!(wm.tags[id].name, "scratch");
        assert_eq!(wm.backend.strings(root, Prop::TagList).unwrap().last().map(String::as_str), Some("scratch"));

        message(&mut wm, root, Message::WindowTag, [0x400001, id as u32, 0, 0, 0]);
        assert_eq!(wm.registry.get(0x400001).unwrap().tags, tag_bit(2) | tag_bit(id));

        // Removing terms shifts browser and scratch down
        message(&mut wm, root, Message::TagKill, [1, 0, 0, 0, 0]);
        assert_eq!(wm.registry.get(0x400001).unwrap().tags, tag_bit(1) | tag_bit(id - 1));
        assert_eq!(wm.views[2].tags, tag_bit(1));

        message(&mut wm, root, Message::TagKill, [0, 0, 0, 0, 0]);
        assert_eq!(wm.tags[0].name, DEFAULT_TAG);
        assert_eq!(wm.error_tracker.health_check().control_errors, 1);

        message(&mut wm, root, Message::WindowUntag, [0x400001, 1, 0, 0, 0]);
        message(&mut wm, root, Message::WindowUntag, [0x400001, (id - 1) as u32, 0, 0, 0]);
        assert_eq!(wm.registry.get(0x400001).unwrap().tags, DEFAULT_TAG_BIT);
    }

    #[test]
    fn test_view_lifecycle() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        let root = wm.backend.root();

        message(&mut wm, root, Message::ViewNew, pack_name("mail").unwrap());
        assert_eq!(wm.views.len(), 4);
        assert_eq!(wm.registry.get(0x400001).unwrap().gravities.len(), 4);
        assert_eq!(wm.backend.cardinals(root, Prop::NetNumberOfDesktops), Some(vec![4]));

        message(&mut wm, root, Message::ViewTag, [3, 0, 0, 0, 0]);
        assert_eq!(wm.views[3].tags, DEFAULT_TAG_BIT);
        assert_eq!(wm.backend.cardinals(root, Prop::ViewTags).unwrap()[3], DEFAULT_TAG_BIT);

        wm.view_jump(3, 0).unwrap();
        message(&mut wm, root, Message::ViewKill, [3, 0, 0, 0, 0]);
        assert_eq!(wm.views.len(), 3);
        assert_eq!(wm.screens.views(), vec![0]);
        assert_eq!(wm.registry.get(0x400001).unwrap().gravities.len(), 3);

        for id in [2, 1] {
            message(&mut wm, root, Message::ViewKill, [id, 0, 0, 0, 0]);
        }
        message(&mut wm, root, Message::ViewKill, [0, 0, 0, 0, 0]);
        assert_eq!(wm.views.len(), 1);
        assert_eq!(wm.error_tracker.health_check().control_errors, 1);
    }

    #[test]
    fn test_move_resize_only_for_floating() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("gimp", Rect::new(100, 100, 400, 300)));
        map(&mut wm, 0x400002, hints("foo", Rect::new(10, 10, 300, 200)));

        let flags = (1 << 8) | (1 << 10);
        message(&mut wm, 0x400001, Message::MoveResizeWindow, [flags, 300, 999, 500, 999]);
        assert_eq!(wm.registry.get(0x400001).unwrap().rect, Rect::new(300, 100, 500, 300));

        let before = wm.registry.get(0x400002).unwrap().rect;
        message(&mut wm, 0x400002, Message::MoveResizeWindow, [flags, 300, 0, 500, 0]);
        assert_eq!(wm.registry.get(0x400002).unwrap().rect, before);
        assert_eq!(wm.error_tracker.health_check().control_errors, 1);
    }

    #[test]
    fn test_drag_moves_floating_client_and_defers_events() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("gimp", Rect::new(100, 100, 400, 300)));
        assert!(wm.registry.get(0x400001).unwrap().is_float());
        wm.backend.take_calls();

        let press = WmEvent::ButtonPress { window: 0x400001, root_x: 150, root_y: 150, button: 1, with_modifier: true };
        wm.process(press).unwrap();
        assert!(wm.drag.is_some());
        wm.process(WmEvent::MotionNotify { root_x: 250, root_y: 200 }).unwrap();

        // Held back until the drag ends
        wm.backend.add_window(0x400002, hints("foo", Rect::new(10, 10, 300, 200)));
        wm.process(WmEvent::MapRequest { window: 0x400002 }).unwrap();
        assert!(!wm.registry.contains(0x400002));

        wm.process(WmEvent::ButtonRelease { button: 1 }).unwrap();
        assert!(wm.drag.is_none());
        assert_eq!(wm.registry.get(0x400001).unwrap().rect, Rect::new(200, 150, 400, 300));
        assert!(wm.registry.contains(0x400002));

        let calls = wm.backend.take_calls();
        assert!(calls.contains(&Call::Grab(0x400001)));
        assert!(calls.contains(&Call::Ungrab));
        let masks: Vec<_> = calls.iter().filter(|c| matches!(c, Call::Mask(_))).collect();
        // Initial draw, erase + draw on motion, final erase
        assert_eq!(masks.len(), 4);
        assert_eq!(masks[0], masks[1]);
        assert_eq!(masks[2], masks[3]);
    }

    #[test]
    fn test_drag_cancel_keeps_geometry() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("gimp", Rect::new(100, 100, 400, 300)));
        let before = wm.registry.get(0x400001).unwrap().rect;

        wm.begin_drag(0x400001, DragMode::Resize, (450, 350), None).unwrap();
        wm.process(WmEvent::MotionNotify { root_x: 600, root_y: 500 }).unwrap();
        wm.backend.take_calls();
        wm.process(WmEvent::KeyPress { key: Key::Escape }).unwrap();

        assert!(wm.drag.is_none());
        assert_eq!(wm.registry.get(0x400001).unwrap().rect, before);
        let calls = wm.backend.take_calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::ConfigureNotify(..) | Call::MoveResize(..))));
    }

    #[test]
    fn test_tiled_resize_sets_weight() {
        let mut wm = manager(vec![SINGLE]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        wm.hooks.add(HookEvent::TileWeight, Box::new(move |args| sink.borrow_mut().push(*args)));

        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        let rect = wm.registry.get(0x400001).unwrap().rect;

        let data = [rect.right() as u32, 500, moveresize::SIZE_RIGHT, 1, 0];
        message(&mut wm, 0x400001, Message::WmMoveResize, data);
        wm.process(WmEvent::MotionNotify { root_x: rect.right() + 200, root_y: 500 }).unwrap();
        wm.process(WmEvent::KeyPress { key: Key::Return }).unwrap();

        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.rect, rect);
        assert!(client.flags.contains(ClientFlags::MODE_RESIZE));
        let expected = ((rect.width + 200) * 100 / 1920) as u8;
        assert_eq!(client.weight, expected);
        assert_eq!(*seen.borrow(), vec![HookArgs::Weight { window: 0x400001, weight: expected }]);
    }

    #[test]
    fn test_screen_change_falls_back_to_first_screen() {
        let mut wm = manager(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
        wm.view_jump(0, 1).unwrap();
        map(&mut wm, 0x400001, hints("gimp", Rect::new(2000, 100, 400, 300)));
        assert_eq!(wm.registry.get(0x400001).unwrap().screen, 1);

        wm.backend.outputs = vec![SINGLE];
        wm.process(WmEvent::ScreenChange).unwrap();

        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.screen, 0);
        assert_eq!(wm.backend.cardinals(wm.backend.root(), Prop::NetWorkarea), Some(vec![0, 0, 1920, 1080]));
        assert_eq!(wm.backend.cardinals(0x400001, Prop::WindowScreen), Some(vec![0]));
    }

    #[test]
    fn test_floating_client_follows_its_view() {
        let mut wm = manager(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
        map(&mut wm, 0x400001, hints("gimp", Rect::new(100, 100, 400, 300)));
        wm.view_jump(0, 1).unwrap();
        assert_eq!(wm.registry.get(0x400001).unwrap().rect, Rect::new(2020, 100, 400, 300));

        message(&mut wm, ROOT, Message::WindowScreen, [0x400001, 1, 0, 0, 0]);
        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.screen, 1);
        assert_eq!(client.rect, Rect::new(2020, 100, 400, 300));
    }

    #[test]
    fn test_unmanaged_configure_is_forwarded() {
        let mut wm = manager(vec![SINGLE]);
        let request = ConfigureRequest { window: 0x500000, width: Some(10), ..ConfigureRequest::default() };
        wm.process(WmEvent::ConfigureRequest(request)).unwrap();
        assert_eq!(wm.backend.take_calls(), vec![Call::ConfigureUnmanaged(0x500000)]);
    }

    #[test]
    fn test_tiled_configure_request_keeps_layout() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("foo", Rect::new(10, 10, 300, 200)));
        let rect = wm.registry.get(0x400001).unwrap().rect;
        wm.backend.take_calls();

        let request = ConfigureRequest { window: 0x400001, x: Some(5), width: Some(10), ..ConfigureRequest::default() };
        wm.process(WmEvent::ConfigureRequest(request)).unwrap();
        assert!(wm.backend.take_calls().contains(&Call::ConfigureNotify(0x400001, rect, 2)));
    }

    #[test]
    fn test_panels_reserve_space() {
        let mut config = config();
        config.options.top_panel = true;
        config.options.panel_height = 20;
        let mut wm = WindowManager::new(MockBackend::new(vec![SINGLE]), &config).unwrap();
        wm.start().unwrap();

        assert!(wm.backend.take_calls().contains(&Call::Panel(Rect::new(0, 0, 1920, 20))));
        assert_eq!(wm.screens.get(0).unwrap().geom, Rect::new(0, 20, 1920, 1060));
        assert!(wm.screens.get(0).unwrap().panels[0].is_some());
        let gravities = wm.backend.strings(wm.backend.root(), Prop::GravityList).unwrap();
        assert_eq!(gravities[5], "center 50 50 100 100");
    }

    #[test]
    fn test_reload_rematches_tags() {
        let mut wm = manager(vec![SINGLE]);
        map(&mut wm, 0x400001, hints("mutt", Rect::new(10, 10, 300, 200)));
        assert_eq!(wm.registry.get(0x400001).unwrap().tags, DEFAULT_TAG_BIT);

        let mut config = config();
        config.tags.push(TagSpec::new("mail", "mutt"));
        config.views[0].tags.push("mail".to_string());
        wm.reload(&config).unwrap();

        let mail = wm.tags.iter().position(|t| t.name == "mail").unwrap();
        let client = wm.registry.get(0x400001).unwrap();
        assert_eq!(client.tags, tag_bit(mail));
        assert!(!client.flags.contains(ClientFlags::UNMAP));
    }
}
