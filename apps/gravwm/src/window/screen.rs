use gravwm_config::Options;
use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

use crate::core::geometry::Rect;
use crate::window::hints::Strut;

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    /// Raw monitor geometry
    pub base: Rect,
    /// Base minus padding, struts and panels
    pub geom: Rect,
    /// View currently shown
    pub view: usize,
    /// WM-owned panel bars (top, bottom)
    pub panels: [Option<Window>; 2],
}

impl Screen {
    pub fn new(base: Rect, view: usize) -> Self {
        Self { base, geom: base, view, panels: [None, None] }
    }
}

pub struct ScreenManager {
    pub screens: Vec<Screen>,
    strut: Strut,
    padding: [u16; 4],
    panel_height: u16,
    top_panel: bool,
    bottom_panel: bool,
}

impl ScreenManager {
    pub fn new(options: &Options) -> Self {
        let mut manager = Self {
            screens: Vec::new(),
            strut: Strut::default(),
            padding: [0; 4],
            panel_height: 0,
            top_panel: false,
            bottom_panel: false,
        };
        manager.apply_options(options);
        manager
    }

    pub fn apply_options(&mut self, options: &Options) {
        self.padding = options.padding;
        self.panel_height = options.panel_height;
        self.top_panel = options.top_panel;
        self.bottom_panel = options.bottom_panel;
        self.resize();
    }

    /// Replace the screen list with the reported outputs. Views shown so far
    /// are kept per index; new screens start on the view with their index.
    pub fn discover(&mut self, outputs: Vec<Rect>, whole: Rect, views: usize) {
        let outputs = if outputs.is_empty() {
            info!("No outputs reported, using the whole display {:?}", whole);
            vec![whole]
        } else {
            outputs
        };

        let last_view = views.saturating_sub(1);
        let previous = std::mem::take(&mut self.screens);
        self.screens = outputs
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                let view = previous.get(i).map(|s| s.view).unwrap_or(i).min(last_view);
                let mut screen = Screen::new(base, view);
                if let Some(old) = previous.get(i) {
                    screen.panels = old.panels;
                }
                screen
            })
            .collect();

        // Keep every view on at most one screen
        for i in 1..self.screens.len() {
            if self.screens[..i].iter().any(|s| s.view == self.screens[i].view) {
                if let Some(free) = (0..views).find(|v| !self.screens.iter().any(|s| s.view == *v)) {
                    self.screens[i].view = free;
                }
            }
        }

        self.resize();
        for (i, s) in self.screens.iter().enumerate() {
            info!("Screen {}: {:?} showing view {}", i, s.base, s.view);
        }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn get(&self, id: usize) -> Option<&Screen> {
        self.screens.get(id)
    }

    /// Screen containing the point; stale or off-screen coordinates fall
    /// back to the first screen.
    pub fn find(&self, x: i32, y: i32) -> usize {
        self.screens.iter().position(|s| s.base.contains_point(x, y)).unwrap_or(0)
    }

    /// Screen containing the center of `rect`
    pub fn find_rect(&self, rect: &Rect) -> usize {
        self.find(rect.x + rect.width / 2, rect.y + rect.height / 2)
    }

    /// Screen that currently shows `view`
    pub fn showing(&self, view: usize) -> Option<usize> {
        self.screens.iter().position(|s| s.view == view)
    }

    /// Combine a strut with the running per-edge maximum. Returns whether the
    /// reservation grew.
    pub fn add_strut(&mut self, strut: &Strut) -> bool {
        let merged = self.strut.merge(strut);
        if merged == self.strut {
            return false;
        }
        debug!("Strut grew from {:?} to {:?}", self.strut, merged);
        self.strut = merged;
        self.resize();
        true
    }

    /// Drop all reservations; callers rescan the struts of their clients
    pub fn reset_struts(&mut self) {
        self.strut = Strut::default();
        self.resize();
    }

    /// Recompute the adjusted rect of every screen. Struts are relative to
    /// the root window, so an edge only reserves space on the screens that
    /// touch that edge of the display.
    pub fn resize(&mut self) {
        let [pad_left, pad_right, pad_top, pad_bottom] = self.padding.map(i32::from);
        let panel = self.panel_height as i32;
        let (top_panel, bottom_panel) = (self.top_panel, self.bottom_panel);
        let extent = self.extent();
        let strut = self.strut;

        for screen in &mut self.screens {
            let base = screen.base;
            let edge = |touches: bool, reserved: u32| if touches { reserved as i32 } else { 0 };
            let left = edge(base.x == extent.x, strut.left);
            let right = edge(base.right() == extent.right(), strut.right);
            let top = edge(base.y == extent.y, strut.top);
            let bottom = edge(base.bottom() == extent.bottom(), strut.bottom);
            let mut geom = Rect {
                x: base.x + pad_left + left,
                y: base.y + pad_top + top,
                width: base.width - pad_left - pad_right - left - right,
                height: base.height - pad_top - pad_bottom - top - bottom,
            };
            if top_panel {
                geom.y += panel;
                geom.height -= panel;
            }
            if bottom_panel {
                geom.height -= panel;
            }
            geom.width = geom.width.max(1);
            geom.height = geom.height.max(1);
            screen.geom = geom;
        }
    }

    /// Geometry of the top and bottom panel bar of a screen
    pub fn panel_rects(&self, id: usize) -> [Option<Rect>; 2] {
        let Some(screen) = self.screens.get(id) else { return [None, None]; };
        let base = screen.base;
        let h = self.panel_height as i32;
        if h == 0 {
            return [None, None];
        }
        [
            self.top_panel.then(|| Rect::new(base.x, base.y, base.width, h)),
            self.bottom_panel.then(|| Rect::new(base.x, base.bottom() - h, base.width, h)),
        ]
    }

    /// `_NET_WORKAREA`: one x, y, width, height tuple per screen
    pub fn workareas(&self) -> Vec<u32> {
        self.screens
            .iter()
            .flat_map(|s| [s.geom.x as u32, s.geom.y as u32, s.geom.width as u32, s.geom.height as u32])
            .collect()
    }

    /// `_NET_DESKTOP_VIEWPORT`: no large desktops, all zero
    pub fn viewports(&self) -> Vec<u32> {
        vec![0; 2 * self.screens.len()]
    }

    /// Current view per screen
    pub fn views(&self) -> Vec<u32> {
        self.screens.iter().map(|s| s.view as u32).collect()
    }

    /// Bounding box of all screens
    pub fn extent(&self) -> Rect {
        let Some(first) = self.screens.first() else { return Rect::default(); };
        let (mut x0, mut y0, mut x1, mut y1) = (first.base.x, first.base.y, first.base.right(), first.base.bottom());
        for s in &self.screens[1..] {
            x0 = x0.min(s.base.x);
            y0 = y0.min(s.base.y);
            x1 = x1.max(s.base.right());
            y1 = y1.max(s.base.bottom());
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual() -> ScreenManager {
        let mut manager = ScreenManager::new(&Options { panel_height: 0, ..Options::default() });
        manager.discover(
            vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)],
            Rect::new(0, 0, 3840, 1080),
            3,
        );
        manager
    }

    #[test]
    fn test_discover_fallback_single_screen() {
        let mut manager = ScreenManager::new(&Options::default());
        manager.discover(Vec::new(), Rect::new(0, 0, 1024, 768), 2);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.screens[0].base, Rect::new(0, 0, 1024, 768));
        assert_eq!(manager.screens[0].view, 0);
    }

    #[test]
    fn test_find_with_fallback() {
        let manager = dual();
        assert_eq!(manager.find(100, 100), 0);
        assert_eq!(manager.find(1920, 500), 1);
        assert_eq!(manager.find(5000, 5000), 0);
        assert_eq!(manager.find(-10, 0), 0);
        assert_eq!(manager.find_rect(&Rect::new(1800, 0, 400, 100)), 1);
    }

    #[test]
    fn test_strut_running_max() {
        let mut manager = dual();
        assert!(manager.add_strut(&Strut { top: 24, ..Strut::default() }));
        assert!(manager.add_strut(&Strut { top: 16, bottom: 10, ..Strut::default() }));
        assert!(!manager.add_strut(&Strut { top: 20, ..Strut::default() }));
        assert_eq!(manager.screens[1].geom, Rect::new(1920, 24, 1920, 1046));
        assert_eq!(manager.workareas()[4..], [1920, 24, 1920, 1046]);
        assert_eq!(manager.viewports(), vec![0; 4]);

        manager.reset_struts();
        assert_eq!(manager.screens[0].geom, manager.screens[0].base);
    }

    #[test]
    fn test_side_strut_only_on_touching_screen() {
        let mut manager = dual();
        assert!(manager.add_strut(&Strut { left: 40, top: 24, ..Strut::default() }));
        assert_eq!(manager.screens[0].geom, Rect::new(40, 24, 1880, 1056));
        assert_eq!(manager.screens[1].geom, Rect::new(1920, 24, 1920, 1056));

        manager.add_strut(&Strut { right: 30, ..Strut::default() });
        assert_eq!(manager.screens[0].geom.width, 1880);
        assert_eq!(manager.screens[1].geom, Rect::new(1920, 24, 1890, 1056));
    }

    #[test]
    fn test_padding_and_panels() {
        let options = Options {
            padding: [5, 5, 0, 10],
            panel_height: 20,
            top_panel: true,
            bottom_panel: true,
            ..Options::default()
        };
        let mut manager = ScreenManager::new(&options);
        manager.discover(vec![Rect::new(0, 0, 1000, 800)], Rect::new(0, 0, 1000, 800), 1);
        assert_eq!(manager.screens[0].geom, Rect::new(5, 20, 990, 750));
        let [top, bottom] = manager.panel_rects(0);
        assert_eq!(top, Some(Rect::new(0, 0, 1000, 20)));
        assert_eq!(bottom, Some(Rect::new(0, 780, 1000, 20)));
    }

    #[test]
    fn test_rediscovery_keeps_views_unique() {
        let mut manager = dual();
        assert_eq!(manager.views(), vec![0, 1]);
        manager.screens[0].view = 2;
        manager.discover(
            vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080), Rect::new(3840, 0, 800, 600)],
            Rect::new(0, 0, 4640, 1080),
            3,
        );
        assert_eq!(manager.views(), vec![2, 1, 0]);
        assert_eq!(manager.extent(), Rect::new(0, 0, 4640, 1080));
        assert_eq!(manager.showing(1), Some(1));
    }
}
