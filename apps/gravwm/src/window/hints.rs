use x11rb::protocol::xproto::Window;

use crate::core::geometry::Rect;

/// Fallback minimum size for clients without usable size hints
pub const MIN_WIDTH: i32 = 1;
pub const MIN_HEIGHT: i32 = 1;

// WM_NORMAL_HINTS flag bits (ICCCM 4.1.2.3)
const US_POSITION: u32 = 1 << 0;
const P_POSITION: u32 = 1 << 2;
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeHints {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: Option<i32>,
    pub max_height: Option<i32>,
    pub base_width: i32,
    pub base_height: i32,
    pub inc_width: i32,
    pub inc_height: i32,
    pub min_aspect: Option<f64>,
    pub max_aspect: Option<f64>,
    /// Position requested by the user or program
    pub position: Option<(i32, i32)>,
}

impl Default for SizeHints {
    fn default() -> Self {
        Self {
            min_width: MIN_WIDTH,
            min_height: MIN_HEIGHT,
            max_width: None,
            max_height: None,
            base_width: MIN_WIDTH,
            base_height: MIN_HEIGHT,
            inc_width: 1,
            inc_height: 1,
            min_aspect: None,
            max_aspect: None,
            position: None,
        }
    }
}

impl SizeHints {
    /// Decode the 18 word `WM_SIZE_HINTS` layout. Short or malformed
    /// properties decode as far as they go and keep the defaults otherwise.
    pub fn from_words(data: &[u32]) -> Self {
        let mut hints = Self::default();
        let Some(&flags) = data.first() else { return hints; };
        let word = |i: usize| data.get(i).map(|&v| v as i32);

        if flags & (US_POSITION | P_POSITION) != 0 {
            if let (Some(x), Some(y)) = (word(1), word(2)) {
                hints.position = Some((x, y));
            }
        }

        let min = if flags & P_MIN_SIZE != 0 { word(5).zip(word(6)) } else { None };
        let base = if flags & P_BASE_SIZE != 0 { word(15).zip(word(16)) } else { None };

        // Base and minimum size stand in for each other
        if let Some((w, h)) = min.or(base) {
            hints.min_width = w.max(MIN_WIDTH);
            hints.min_height = h.max(MIN_HEIGHT);
        }
        if let Some((w, h)) = base.or(min) {
            hints.base_width = w.max(0);
            hints.base_height = h.max(0);
        }

        if flags & P_MAX_SIZE != 0 {
            if let (Some(w), Some(h)) = (word(7), word(8)) {
                hints.max_width = (w > 0).then_some(w);
                hints.max_height = (h > 0).then_some(h);
            }
        }

        if flags & P_RESIZE_INC != 0 {
            if let (Some(w), Some(h)) = (word(9), word(10)) {
                hints.inc_width = w.max(1);
                hints.inc_height = h.max(1);
            }
        }

        if flags & P_ASPECT != 0 {
            if let (Some(nx), Some(dx), Some(ny), Some(dy)) = (word(11), word(12), word(13), word(14)) {
                if dx > 0 && nx > 0 {
                    hints.min_aspect = Some(nx as f64 / dx as f64);
                }
                if dy > 0 && ny > 0 {
                    hints.max_aspect = Some(ny as f64 / dy as f64);
                }
            }
        }

        hints
    }

    /// Fixed-size windows can't be tiled sensibly
    pub fn is_fixed(&self) -> bool {
        match (self.max_width, self.max_height) {
            (Some(w), Some(h)) => w == self.min_width && h == self.min_height,
            _ => false,
        }
    }

    /// Apply the size hints to `rect` and fit it into `bounds`.
    ///
    /// `border` is drawn outside the content rect; the footprint of the
    /// window is `width + 2 * border`.
    pub fn constrain(&self, rect: Rect, border: i32, bounds: &Rect) -> Rect {
        let (width, height) = self.apply_size(rect.width, rect.height, border, bounds);
        fit(Rect { width, height, ..rect }, border, bounds)
    }

    /// Min/max clamping, increments and aspect ratio without positioning
    pub fn apply_size(&self, width: i32, height: i32, border: i32, bounds: &Rect) -> (i32, i32) {
        let max_w = self.max_width.unwrap_or(bounds.width - 2 * border).max(self.min_width);
        let max_h = self.max_height.unwrap_or(bounds.height - 2 * border).max(self.min_height);

        let mut w = width.clamp(self.min_width, max_w);
        let mut h = height.clamp(self.min_height, max_h);

        w = snap(w, self.base_width, self.inc_width, self.min_width, max_w);
        h = snap(h, self.base_height, self.inc_height, self.min_height, max_h);

        if h > 0 {
            let ratio = w as f64 / h as f64;
            // Widths stay on the increment grid: round away from the
            // violated ratio, down again only when the maximum is in the way
            if let Some(min) = self.min_aspect.filter(|&min| ratio < min) {
                let wanted = ((h as f64 * min).ceil() as i32).max(self.min_width);
                w = snap_up(wanted, self.base_width, self.inc_width, self.min_width, max_w);
            } else if let Some(max) = self.max_aspect.filter(|&max| ratio > max) {
                let wanted = ((h as f64 * max) as i32).clamp(self.min_width, max_w);
                w = snap(wanted, self.base_width, self.inc_width, self.min_width, max_w);
            }
        }

        (w, h)
    }
}

fn snap(size: i32, base: i32, inc: i32, min: i32, max: i32) -> i32 {
    if inc <= 1 {
        return size;
    }
    let mut snapped = size - (size - base).rem_euclid(inc);
    if snapped < min && snapped + inc <= max {
        snapped += inc;
    }
    snapped
}

fn snap_up(size: i32, base: i32, inc: i32, min: i32, max: i32) -> i32 {
    if inc <= 1 {
        return size.min(max);
    }
    let rest = (size - base).rem_euclid(inc);
    let raised = if rest == 0 { size } else { size + inc - rest };
    if raised > max {
        snap(max, base, inc, min, max)
    } else {
        raised
    }
}

/// Shrink `rect` to the bounds and move it back to the bounds' origin on
/// every axis where an edge would stick out.
pub fn fit(rect: Rect, border: i32, bounds: &Rect) -> Rect {
    let mut r = rect;

    if r.width + 2 * border > bounds.width {
        r.width = (bounds.width - 2 * border).max(1);
    }
    if r.height + 2 * border > bounds.height {
        r.height = (bounds.height - 2 * border).max(1);
    }

    if r.x < bounds.x || r.x + r.width + 2 * border > bounds.right() {
        r.x = bounds.x;
    }
    if r.y < bounds.y || r.y + r.height + 2 * border > bounds.bottom() {
        r.y = bounds.y;
    }

    r
}

/// Edge reservation of a dock or panel window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Strut {
    /// Decode `_NET_WM_STRUT` or the first four words of `_NET_WM_STRUT_PARTIAL`
    pub fn from_words(data: &[u32]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        Some(Self { left: data[0], right: data[1], top: data[2], bottom: data[3] })
    }

    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.right == 0 && self.top == 0 && self.bottom == 0
    }

    /// Per-edge maximum
    pub fn merge(&self, other: &Strut) -> Strut {
        Strut {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Desktop,
    Dock,
    Toolbar,
    Splash,
    Dialog,
}

/// `_NET_WM_STATE` entries that are honored at map time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetState {
    pub fullscreen: bool,
    pub sticky: bool,
    pub above: bool,
    pub demands_attention: bool,
}

/// Everything read from a window when it gets managed
#[derive(Debug, Clone, PartialEq)]
pub struct WindowHints {
    pub geometry: Rect,
    pub name: Option<String>,
    pub instance: Option<String>,
    pub class: Option<String>,
    pub role: Option<String>,
    pub size: SizeHints,
    pub input: bool,
    pub urgent: bool,
    pub take_focus: bool,
    pub delete_window: bool,
    pub transient_for: Option<Window>,
    pub window_type: WindowType,
    pub state: NetState,
    pub strut: Option<Strut>,
}

impl Default for WindowHints {
    fn default() -> Self {
        Self {
            geometry: Rect::new(0, 0, 640, 480),
            name: None,
            instance: None,
            class: None,
            role: None,
            size: SizeHints::default(),
            input: true,
            urgent: false,
            take_focus: false,
            delete_window: false,
            transient_for: None,
            window_type: WindowType::Normal,
            state: NetState::default(),
            strut: None,
        }
    }
}

/// Split a `WM_CLASS` value into instance and class
pub fn parse_wm_class(raw: &[u8]) -> (Option<String>, Option<String>) {
    let mut parts = raw
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned());
    (parts.next(), parts.next())
}
