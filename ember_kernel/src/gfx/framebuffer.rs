use super::types::{Color, Dimension, Position};

use bootloader_api::info::{FrameBuffer as RawFrameBuffer, FrameBufferInfo, PixelFormat};
use core::fmt;
use embedded_graphics::{
    geometry::{OriginDimensions, Point, Size},
    mono_font::{ascii::FONT_10X20, MonoTextStyleBuilder},
    pixelcolor::{Rgb888, RgbColor},
    text::{Baseline, Text},
    Drawable, Pixel,
};
use spin::{Mutex, MutexGuard, Once};

static FRAMEBUFFER: Once<Mutex<Framebuffer>> = Once::new();

pub fn init(fb: RawFrameBuffer) {
    FRAMEBUFFER.call_once(|| Mutex::new(Framebuffer::new(fb)));
}

pub fn framebuffer() -> MutexGuard<'static, Framebuffer> {
    FRAMEBUFFER
        .get()
        .expect("framebuffer not initialized")
        .lock()
}

pub fn get() -> Option<MutexGuard<'static, Framebuffer>> {
    FRAMEBUFFER.get().map(|fb| fb.lock())
}

/// Break the console lock from the panic path.
///
/// safety: only sound when the owning context can never resume, i.e. with
/// interrupts disabled on the way down.
pub unsafe fn force_unlock() {
    if let Some(fb) = FRAMEBUFFER.get() {
        fb.force_unlock();
    }
}

const CHAR_WIDTH: usize = 10;
const CHAR_HEIGHT: usize = 20;

pub struct Framebuffer {
    text_color: Color,
    cursor: Position,

    columns: usize,
    rows: usize,
    info: FrameBufferInfo,

    buffer: &'static mut [u8],
}

impl Framebuffer {
    fn new(fb: RawFrameBuffer) -> Self {
        let info = fb.info();
        let buffer = fb.into_buffer();

        let mut framebuffer = Self {
            text_color: Color::WHITE,
            cursor: Position::new(0, 0),

            columns: info.width / CHAR_WIDTH,
            rows: info.height / CHAR_HEIGHT,
            info,

            buffer,
        };

        framebuffer.clear();

        framebuffer
    }

    #[inline]
    #[allow(dead_code)]
    pub fn dimensions(&self) -> Dimension {
        Dimension::new(self.info.width, self.info.height)
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0);
        self.cursor = Position::new(0, 0);
    }

    pub fn set_color(&mut self, color: &Color) {
        self.text_color = *color;
    }

    pub fn write_string(&mut self, string: &str) {
        let foreground = self.text_color;
        self.write_colored(string, foreground, Color::BLACK);
    }

    pub fn write_colored(&mut self, string: &str, foreground: Color, background: Color) {
        for character in string.chars() {
            if character == '\n' {
                self.new_line();
            } else {
                if self.cursor.x >= self.columns {
                    self.new_line();
                }
                self.draw_char(character, &foreground, &background);
                self.cursor.x += 1;
            }
        }
    }

    fn draw_char(&mut self, character: char, foreground: &Color, background: &Color) {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_10X20)
            .text_color(Rgb888::new(foreground.r, foreground.g, foreground.b))
            .background_color(Rgb888::new(background.r, background.g, background.b))
            .build();

        let position = Point::new(
            (self.cursor.x * CHAR_WIDTH) as i32,
            (self.cursor.y * CHAR_HEIGHT) as i32,
        );

        let mut encoded = [0; 4];
        let glyph: &str = character.encode_utf8(&mut encoded);
        Text::with_baseline(glyph, position, style, Baseline::Top)
            .draw(self)
            .unwrap();
    }

    fn new_line(&mut self) {
        self.cursor.x = 0;
        self.cursor.y += 1;
        if self.cursor.y >= self.rows {
            self.scroll();
        }
    }

    fn scroll(&mut self) {
        let row_bytes = CHAR_HEIGHT * self.info.stride * self.info.bytes_per_pixel;

        self.buffer.copy_within(row_bytes.., 0);
        let blank_start = self.buffer.len() - row_bytes;
        self.buffer[blank_start..].fill(0);

        self.cursor.y -= 1;
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: &Color) {
        let byte_offset = (y * self.info.stride + x) * self.info.bytes_per_pixel;
        let pixel_bytes = &mut self.buffer[byte_offset..];

        match self.info.pixel_format {
            PixelFormat::Rgb => {
                pixel_bytes[0] = color.r;
                pixel_bytes[1] = color.g;
                pixel_bytes[2] = color.b;
            }
            PixelFormat::Bgr => {
                pixel_bytes[0] = color.b;
                pixel_bytes[1] = color.g;
                pixel_bytes[2] = color.r;
            }
            PixelFormat::U8 => {
                pixel_bytes[0] = color.r / 3 + color.g / 3 + color.b / 3;
            }
            PixelFormat::Unknown {
                red_position,
                green_position,
                blue_position,
            } => {
                pixel_bytes[red_position as usize] = color.r;
                pixel_bytes[green_position as usize] = color.g;
                pixel_bytes[blue_position as usize] = color.b;
            }
            _ => {
                panic!("unsupported pixel format");
            }
        }
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.info.width as u32, self.info.height as u32)
    }
}

impl embedded_graphics::draw_target::DrawTarget for Framebuffer {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as usize, point.y as usize);
            if x >= self.info.width || y >= self.info.height {
                continue;
            }
            self.set_pixel(x, y, &Color::new(color.r(), color.g(), color.b()));
        }

        Ok(())
    }
}

impl fmt::Write for Framebuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        $crate::gfx::framebuffer().write_fmt(format_args!($($arg)*)).unwrap();
    }};
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {{
        $crate::gfx::framebuffer().set_color(&$crate::gfx::Color::RED);
        $crate::print!($($arg)*);
        $crate::gfx::framebuffer().set_color(&$crate::gfx::Color::WHITE);
    }};
}

#[macro_export]
macro_rules! eprintln {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::eprint!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! warnln {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut fb = $crate::gfx::framebuffer();
        fb.write_string("[");
        fb.write_colored("WARN", $crate::gfx::Color::YELLOW, $crate::gfx::Color::BLACK);
        fb.write_string("] ");
        fb.write_fmt(format_args!($($arg)*)).unwrap();
        fb.write_string("\n");
    }};
}
