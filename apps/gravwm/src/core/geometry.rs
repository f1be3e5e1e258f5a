/// Window rectangle in root coordinates.
///
/// Arithmetic happens in `i32`; values are narrowed to the X11 wire types
/// (`i16`/`u16`) only when a request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether `other` lies completely inside this rect
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }

    /// Shrink by `amount` on every side, keeping at least one pixel
    pub fn inset(&self, amount: i32) -> Rect {
        Rect {
            x: self.x + amount,
            y: self.y + amount,
            width: (self.width - 2 * amount).max(1),
            height: (self.height - 2 * amount).max(1),
        }
    }

    /// Same size, centered inside `outer`
    pub fn centered_in(&self, outer: &Rect) -> Rect {
        Rect {
            x: outer.x + (outer.width - self.width) / 2,
            y: outer.y + (outer.height - self.height) / 2,
            width: self.width,
            height: self.height,
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    pub fn wire_x(&self) -> i16 {
        self.x.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    pub fn wire_y(&self) -> i16 {
        self.y.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    pub fn wire_width(&self) -> u16 {
        self.width.clamp(1, u16::MAX as i32) as u16
    }

    pub fn wire_height(&self) -> u16 {
        self.height.clamp(1, u16::MAX as i32) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_point_is_half_open() {
        let r = Rect::new(0, 0, 1920, 1080);
        assert!(r.contains_point(0, 0));
        assert!(r.contains_point(1919, 1079));
        assert!(!r.contains_point(1920, 0));
        assert!(!r.contains_point(-1, 10));
    }

    #[test]
    fn test_centered_in() {
        let outer = Rect::new(1920, 0, 1920, 1080);
        let inner = Rect::new(0, 0, 200, 100).centered_in(&outer);
        assert_eq!(inner, Rect::new(1920 + 860, 490, 200, 100));
        assert!(outer.contains(&inner));
    }

    #[test]
    fn test_inset_keeps_one_pixel() {
        assert_eq!(Rect::new(10, 10, 100, 50).inset(5), Rect::new(15, 15, 90, 40));
        assert_eq!(Rect::new(0, 0, 4, 4).inset(5).width, 1);
    }

    #[test]
    fn test_wire_conversion_saturates() {
        let r = Rect::new(-40000, 10, 0, 70000);
        assert_eq!(r.wire_x(), i16::MIN);
        assert_eq!(r.wire_width(), 1);
        assert_eq!(r.wire_height(), u16::MAX);
    }
}
