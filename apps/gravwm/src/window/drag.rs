use gravwm_proto::moveresize;
use x11rb::protocol::xproto::Window;

use crate::core::event::Key;
use crate::core::geometry::Rect;
use crate::window::hints::SizeHints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    Continue,
    Commit(Rect),
    Cancel,
}

/// Interactive move/resize of one client.
///
/// The manager feeds pointer and key input in; the drag only computes
/// geometry. Nothing is applied to the client before a commit.
#[derive(Debug, Clone)]
pub struct Drag {
    pub window: Window,
    pub mode: DragMode,
    pub start: Rect,
    pub current: Rect,
    pointer: (i32, i32),
    border: i32,
    bounds: Rect,
    snap: i32,
    size: SizeHints,
    /// Grabbed in the left half: the right edge stays put
    left: bool,
    /// Grabbed in the top half: the bottom edge stays put
    top: bool,
    horizontal: bool,
    vertical: bool,
}

impl Drag {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window: Window,
        mode: DragMode,
        rect: Rect,
        pointer: (i32, i32),
        border: u16,
        bounds: Rect,
        snap: u16,
        size: SizeHints,
    ) -> Self {
        let border = border as i32;
        let (px, py) = pointer;
        Self {
            window,
            mode,
            start: rect,
            current: rect,
            pointer,
            border,
            bounds,
            snap: snap as i32,
            size,
            left: px < rect.x + border + rect.width / 2,
            top: py < rect.y + border + rect.height / 2,
            horizontal: true,
            vertical: true,
        }
    }

    /// Override the grab quadrant with a `_NET_WM_MOVERESIZE` direction
    pub fn with_direction(mut self, direction: u32) -> Self {
        let (left, top, horizontal, vertical) = match direction {
            moveresize::SIZE_TOPLEFT => (true, true, true, true),
            moveresize::SIZE_TOP => (false, true, false, true),
            moveresize::SIZE_TOPRIGHT => (false, true, true, true),
            moveresize::SIZE_RIGHT => (false, false, true, false),
            moveresize::SIZE_BOTTOMRIGHT => (false, false, true, true),
            moveresize::SIZE_BOTTOM => (false, false, false, true),
            moveresize::SIZE_BOTTOMLEFT => (true, false, true, true),
            moveresize::SIZE_LEFT => (true, false, true, false),
            _ => return self,
        };
        self.left = left;
        self.top = top;
        self.horizontal = horizontal;
        self.vertical = vertical;
        self
    }

    /// Outline drawn for `current`, border included
    pub fn mask(&self) -> Rect {
        Rect::new(self.current.x, self.current.y, self.current.width + 2 * self.border, self.current.height + 2 * self.border)
    }

    pub fn motion(&mut self, x: i32, y: i32) -> Rect {
        let dx = x - self.pointer.0;
        let dy = y - self.pointer.1;
        self.current = match self.mode {
            DragMode::Move => self.moved(dx, dy),
            DragMode::Resize => self.resized(dx, dy),
        };
        self.current
    }

    fn moved(&self, dx: i32, dy: i32) -> Rect {
        let footprint_w = self.start.width + 2 * self.border;
        let footprint_h = self.start.height + 2 * self.border;
        let b = &self.bounds;

        let mut x = self.start.x + dx;
        let mut y = self.start.y + dy;

        if (x - b.x).abs() <= self.snap {
            x = b.x;
        } else if (b.right() - (x + footprint_w)).abs() <= self.snap {
            x = b.right() - footprint_w;
        }
        if (y - b.y).abs() <= self.snap {
            y = b.y;
        } else if (b.bottom() - (y + footprint_h)).abs() <= self.snap {
            y = b.bottom() - footprint_h;
        }

        Rect { x, y, ..self.start }
    }

    fn resized(&self, dx: i32, dy: i32) -> Rect {
        let s = &self.start;
        let raw_w = match (self.horizontal, self.left) {
            (false, _) => s.width,
            (true, true) => s.width - dx,
            (true, false) => s.width + dx,
        };
        let raw_h = match (self.vertical, self.top) {
            (false, _) => s.height,
            (true, true) => s.height - dy,
            (true, false) => s.height + dy,
        };

        let (width, height) = self.size.apply_size(raw_w, raw_h, self.border, &self.bounds);
        let x = if self.horizontal && self.left { s.right() - width } else { s.x };
        let y = if self.vertical && self.top { s.bottom() - height } else { s.y };

        Rect::new(x, y, width, height)
    }

    pub fn key(&self, key: Key) -> DragOutcome {
        match key {
            Key::Escape => DragOutcome::Cancel,
            Key::Return => DragOutcome::Commit(self.current),
            Key::Other => DragOutcome::Continue,
        }
    }

    pub fn release(&self) -> DragOutcome {
        DragOutcome::Commit(self.current)
    }

    /// Share of the screen taken by the resized client in percent,
    /// clamped to 10..=90
    pub fn weight(&self) -> u8 {
        let percent = if self.horizontal && !self.vertical {
            self.current.width * 100 / self.bounds.width.max(1)
        } else if self.vertical && !self.horizontal {
            self.current.height * 100 / self.bounds.height.max(1)
        } else if self.current.width != self.start.width {
            self.current.width * 100 / self.bounds.width.max(1)
        } else {
            self.current.height * 100 / self.bounds.height.max(1)
        };
        percent.clamp(10, 90) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Rect = Rect::new(0, 0, 1920, 1080);

    fn drag(mode: DragMode, pointer: (i32, i32)) -> Drag {
        Drag::new(1, mode, Rect::new(100, 100, 400, 300), pointer, 2, BOUNDS, 10, SizeHints::default())
    }

    #[test]
    fn test_move_translates_and_snaps() {
        let mut d = drag(DragMode::Move, (200, 200));
        assert_eq!(d.motion(250, 230), Rect::new(150, 130, 400, 300));

        // Within the snap distance of the left and top edge
        assert_eq!(d.motion(108, 105), Rect::new(0, 0, 400, 300));

        // Right edge: footprint is 404 wide
        let r = d.motion(200 + 1920 - 404 - 100 - 5, 600);
        assert_eq!(r.x, 1920 - 404);
        assert_eq!(d.mask(), Rect::new(r.x, r.y, 404, 304));
    }

    #[test]
    fn test_resize_quadrants() {
        // Far half: origin fixed, extent grows
        let mut d = drag(DragMode::Resize, (450, 350));
        assert_eq!(d.motion(500, 400), Rect::new(100, 100, 450, 350));

        // Near half: far edge anchored, origin follows
        let mut d = drag(DragMode::Resize, (120, 120));
        assert_eq!(d.motion(70, 90), Rect::new(50, 70, 450, 330));
        assert_eq!(d.current.right(), d.start.right());
    }

    #[test]
    fn test_resize_respects_increments() {
        let mut size = SizeHints::default();
        size.inc_width = 10;
        size.inc_height = 20;
        size.base_width = 0;
        size.base_height = 0;
        let mut d = Drag::new(1, DragMode::Resize, Rect::new(0, 0, 400, 300), (390, 290), 0, BOUNDS, 0, size);
        let r = d.motion(417, 333);
        assert_eq!((r.width, r.height), (420, 340));

        let r = d.motion(-1000, -1000);
        assert_eq!((r.width, r.height), (10, 20));
    }

    #[test]
    fn test_direction_limits_axes() {
        let mut d = drag(DragMode::Resize, (450, 350)).with_direction(moveresize::SIZE_LEFT);
        assert_eq!(d.motion(400, 500), Rect::new(50, 100, 450, 300));
        assert_eq!(d.weight(), 23);
    }

    #[test]
    fn test_termination_keys() {
        let mut d = drag(DragMode::Move, (200, 200));
        d.motion(300, 300);
        assert_eq!(d.key(Key::Escape), DragOutcome::Cancel);
        assert_eq!(d.key(Key::Other), DragOutcome::Continue);
        assert_eq!(d.key(Key::Return), DragOutcome::Commit(Rect::new(200, 200, 400, 300)));
        assert_eq!(d.release(), DragOutcome::Commit(Rect::new(200, 200, 400, 300)));
    }

    #[test]
    fn test_weight_is_clamped() {
        let mut d = drag(DragMode::Resize, (450, 350)).with_direction(moveresize::SIZE_RIGHT);
        d.motion(2000, 350);
        assert_eq!(d.weight(), 90);
        d.motion(-2000, 350);
        assert_eq!(d.weight(), 10);
    }
}
