//! Small value types shared by the scene graph and the renderer.

/// Packed ARGB color with every channel at full intensity: multiplying by it changes nothing.
pub const NOOP_TINT: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Unpack a `0xAARRGGBB` value.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as f32 / 255.0,
            g: ((argb >> 8) & 0xFF) as f32 / 255.0,
            b: (argb & 0xFF) as f32 / 255.0,
            a: ((argb >> 24) & 0xFF) as f32 / 255.0,
        }
    }

    /// Pack into `0xAARRGGBB`, clamping each channel to [0, 1].
    pub fn to_argb(self) -> u32 {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (c(self.a) << 24) | (c(self.r) << 16) | (c(self.g) << 8) | c(self.b)
    }

    /// Channels as an `[r, g, b, a]` array, the layout the shaders expect.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Tint arithmetic on packed `0xAARRGGBB` values.
pub mod tint {
    /// Multiply two tints channel by channel.
    pub fn combine(a: u32, b: u32) -> u32 {
        if a == super::NOOP_TINT {
            return b;
        }
        if b == super::NOOP_TINT {
            return a;
        }
        let ch = |shift: u32| {
            let x = (a >> shift) & 0xFF;
            let y = (b >> shift) & 0xFF;
            ((x * y + 127) / 255) << shift
        };
        ch(24) | ch(16) | ch(8) | ch(0)
    }

    /// Replace the alpha byte of `tint` with `alpha` scaled to 0..=255.
    pub fn with_alpha(tint: u32, alpha: f32) -> u32 {
        let a = (255.0 * alpha.clamp(0.0, 1.0)) as u32;
        (a << 24) | (tint & 0x00FF_FFFF)
    }

    /// Alpha byte of `tint` as a fraction in [0, 1].
    pub fn alpha(tint: u32) -> f32 {
        ((tint >> 24) & 0xFF) as f32 / 255.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}
