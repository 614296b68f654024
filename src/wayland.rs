// Wayland integration module
// Presents the session in an xdg toplevel window using smithay-client-toolkit
// and translates toolkit events into session and layout intents

use crate::engine::{Bitmap, ImageEngine, PhotoEngine};
use crate::error::SessionError;
use crate::layout::{self, LayoutSync};
use crate::session::Session;
use anyhow::{Context, Result};
use log::{debug, error, info};
use rfd::{FileDialog, MessageDialog, MessageLevel};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::num::NonZeroU32;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Mouse button constant
const BTN_LEFT: u32 = 272;

/// Minimum window size
const MIN_SIZE: u32 = 200;

/// Maximum window size to prevent buffer allocation failures
const MAX_SIZE: u32 = 4096;

/// Maximum buffer size (64MB to avoid Wayland buffer issues)
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Height of one toolbar row
const TOOLBAR_ROW_HEIGHT: u32 = 28;

/// Height of a toolbar button
const BUTTON_HEIGHT: u32 = 22;

/// Gap around toolbar buttons
const BUTTON_PADDING: u32 = 3;

/// Advance per pixel-font character
const GLYPH_WIDTH: u32 = 6;

/// A user request delivered to the core
#[derive(Debug, Clone, Copy, PartialEq)]
enum Intent {
    Open,
    Save,
    SaveAs,
    Close,
    Info,
    About,
    Quit,
}

/// Toolbar buttons, left to right
const TOOLBAR_BUTTONS: &[(&str, Intent)] = &[
    ("Open", Intent::Open),
    ("Save", Intent::Save),
    ("Save as", Intent::SaveAs),
];

/// Placement of one toolbar button
#[derive(Debug, Clone, Copy)]
struct ButtonRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    label: &'static str,
    intent: Intent,
}

/// BGRA copy of the active bitmap, kept only for rendering
struct DisplayImage {
    width: u32,
    height: u32,
    bgra: Vec<u8>,
}

impl DisplayImage {
    fn from_bitmap(bitmap: &Bitmap) -> Self {
        let (width, height, bgra) = bitmap.bgra_pixels();
        Self {
            width,
            height,
            bgra,
        }
    }
}

/// Main Wayland application state
struct ViewerApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,

    // The session controller and layout synchronizer
    session: Session<PhotoEngine>,
    layout: LayoutSync,

    // Derived pixels and display region for the active image
    display: Option<DisplayImage>,
    region: Option<(u32, u32)>,

    // Surface and buffer management
    window: Option<Window>,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    configured: bool,

    // Pointer state
    pointer_pos: (f64, f64),

    // Redraw flag
    needs_redraw: bool,
    should_exit: bool,
}

impl ViewerApp {
    fn new(
        registry_state: RegistryState,
        seat_state: SeatState,
        output_state: OutputState,
        shm: Shm,
        session: Session<PhotoEngine>,
        width: u32,
        height: u32,
    ) -> Self {
        let display = session.bitmap().map(DisplayImage::from_bitmap);
        let region = if session.has_image() {
            Some(layout::display_region(
                width,
                height,
                toolbar_rows(width) * TOOLBAR_ROW_HEIGHT,
            ))
        } else {
            None
        };
        Self {
            registry_state,
            seat_state,
            output_state,
            shm,
            session,
            layout: LayoutSync::new(width, height),
            display,
            region,
            window: None,
            pool: None,
            buffer: None,
            width,
            height,
            configured: false,
            pointer_pos: (0.0, 0.0),
            needs_redraw: false,
            should_exit: false,
        }
    }

    fn base_title() -> String {
        format!("rfoto {}", env!("CARGO_PKG_VERSION"))
    }

    /// Update the window title, appending the image name when one is loaded
    fn set_title(&self, suffix: Option<&str>) {
        if let Some(ref window) = self.window {
            match suffix {
                Some(name) => window.set_title(format!("{}: {}", Self::base_title(), name)),
                None => window.set_title(Self::base_title()),
            }
        }
    }

    /// Current toolbar height; depends on the window width because buttons
    /// wrap onto extra rows in narrow windows
    fn toolbar_height(&self) -> u32 {
        toolbar_rows(self.width) * TOOLBAR_ROW_HEIGHT
    }

    /// Recompute the display region from the current geometry
    fn refresh_region(&mut self) {
        self.region = if self.session.has_image() {
            Some(layout::display_region(
                self.width,
                self.height,
                self.toolbar_height(),
            ))
        } else {
            None
        };
    }

    /// Toolbar button under the pointer, if any
    fn button_at(&self, x: f64, y: f64) -> Option<Intent> {
        button_rects(self.width).into_iter().find_map(|b| {
            let inside = x >= b.x as f64
                && x < (b.x + b.w) as f64
                && y >= b.y as f64
                && y < (b.y + b.h) as f64;
            inside.then_some(b.intent)
        })
    }

    fn handle_intent(&mut self, intent: Intent, qh: &QueueHandle<Self>) {
        debug!("Intent: {:?}", intent);
        match intent {
            Intent::Open => self.intent_open(),
            Intent::Save => self.intent_save(),
            Intent::SaveAs => self.intent_save_as(),
            Intent::Close => self.intent_close(),
            Intent::Info => self.intent_info(),
            Intent::About => self.intent_about(),
            Intent::Quit => {
                info!("Exit requested");
                self.should_exit = true;
            }
        }
        if self.needs_redraw {
            self.draw(qh);
        }
    }

    fn intent_open(&mut self) {
        let picked = FileDialog::new()
            .set_title("Open image")
            .add_filter("JPEG files", &["jpg", "jpeg"])
            .pick_file();
        // A cancelled dialog emits nothing
        let Some(path) = picked else {
            debug!("Open dialog cancelled");
            return;
        };

        match self.session.open(&path) {
            Ok(suffix) => {
                self.display = self.session.bitmap().map(DisplayImage::from_bitmap);
                self.refresh_region();
                self.set_title(Some(&suffix));
                self.needs_redraw = true;
            }
            Err(err) => self.show_error(&err),
        }
    }

    fn intent_save(&mut self) {
        if let Err(err) = self.session.save() {
            self.show_error(&err);
        }
    }

    fn intent_save_as(&mut self) {
        let picked = FileDialog::new()
            .set_title("Save image as")
            .add_filter("JPEG files", &["jpg", "jpeg"])
            .save_file();
        let Some(path) = picked else {
            debug!("Save as dialog cancelled");
            return;
        };

        match self.session.save_as(&path) {
            Ok(suffix) => self.set_title(Some(&suffix)),
            Err(err) => self.show_error(&err),
        }
    }

    fn intent_close(&mut self) {
        self.session.close();
        self.display = None;
        self.region = None;
        self.set_title(None);
        self.needs_redraw = true;
    }

    fn intent_info(&mut self) {
        match self.session.query_info() {
            Ok(props) => {
                let text = props
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let _ = MessageDialog::new()
                    .set_level(MessageLevel::Info)
                    .set_title("Image info")
                    .set_description(text)
                    .show();
            }
            Err(err) => self.show_error(&err),
        }
    }

    fn intent_about(&mut self) {
        let _ = MessageDialog::new()
            .set_level(MessageLevel::Info)
            .set_title("About rfoto")
            .set_description(self.session.engine().version())
            .show();
    }

    /// Present a session failure modally; the session itself is untouched
    fn show_error(&self, err: &SessionError) {
        error!("{err}");
        let _ = MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title("Error")
            .set_description(err.to_string())
            .show();
    }

    /// Draw the toolbar, frame and image into a fresh shm buffer
    fn draw(&mut self, _qh: &QueueHandle<Self>) {
        if !self.configured || self.window.is_none() {
            return;
        }

        let width = self.width;
        let height = self.height;
        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;

        if buffer_size > MAX_BUFFER_SIZE {
            error!(
                "Buffer size too large: {} bytes, max: {} bytes",
                buffer_size, MAX_BUFFER_SIZE
            );
            return;
        }

        // Initialize pool if needed
        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}", e);
                    return;
                }
            }
        }
        let pool = self.pool.as_mut().unwrap();

        // Resize pool if needed
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return;
            }
        }

        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Xrgb8888,
        ) {
            Ok(buf) => buf,
            Err(e) => {
                error!("Failed to create buffer {}x{}: {}", width, height, e);
                return;
            }
        };

        // Window background
        fill_rect(canvas, width, height, 0, 0, width, height, [0xd0, 0xd0, 0xd0, 0xff]);

        let chrome = toolbar_rows(width) * TOOLBAR_ROW_HEIGHT;
        render_toolbar(canvas, width, height, chrome);

        if let (Some(display), Some((rw, rh))) = (self.display.as_ref(), self.region) {
            let x0 = layout::H_INSET / 2;
            let y0 = chrome + layout::V_INSET / 2;
            render_frame(canvas, width, height, x0, y0, rw, rh);
            render_image(display, canvas, width, height, x0, y0, rw, rh);
        }

        // Attach and commit
        let window = self.window.as_ref().unwrap();
        let surface = window.wl_surface();
        buffer.attach_to(surface).expect("Failed to attach buffer");
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
        self.needs_redraw = false;
    }
}

/// Button placement for a window of the given width, wrapping onto new rows
/// when a button would not fit
fn button_rects(width: u32) -> Vec<ButtonRect> {
    let mut rects = Vec::with_capacity(TOOLBAR_BUTTONS.len());
    let mut x = BUTTON_PADDING;
    let mut y = BUTTON_PADDING;
    for &(label, intent) in TOOLBAR_BUTTONS {
        let w = label.len() as u32 * GLYPH_WIDTH + 16;
        if x + w + BUTTON_PADDING > width && x > BUTTON_PADDING {
            x = BUTTON_PADDING;
            y += TOOLBAR_ROW_HEIGHT;
        }
        rects.push(ButtonRect {
            x,
            y,
            w,
            h: BUTTON_HEIGHT,
            label,
            intent,
        });
        x += w + BUTTON_PADDING;
    }
    rects
}

/// Number of toolbar rows needed at the given window width
fn toolbar_rows(width: u32) -> u32 {
    button_rects(width)
        .iter()
        .map(|b| b.y / TOOLBAR_ROW_HEIGHT)
        .max()
        .unwrap_or(0)
        + 1
}

/// Scale `(src_w, src_h)` to fit inside `(max_w, max_h)` preserving aspect
fn fit_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }
    let scale = (max_w as f32 / src_w as f32).min(max_h as f32 / src_h as f32);
    (
        ((src_w as f32 * scale) as u32).clamp(1, max_w),
        ((src_h as f32 * scale) as u32).clamp(1, max_h),
    )
}

/// Fill a rectangle with a BGRA color, clipped to the canvas
fn fill_rect(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: [u8; 4],
) {
    for py in y..(y.saturating_add(h)).min(canvas_height) {
        for px in x..(x.saturating_add(w)).min(canvas_width) {
            let idx = ((py * canvas_width + px) * 4) as usize;
            if idx + 3 < canvas.len() {
                canvas[idx] = color[0];
                canvas[idx + 1] = color[1];
                canvas[idx + 2] = color[2];
                canvas[idx + 3] = color[3];
            }
        }
    }
}

/// Outline a rectangle with a BGRA color
fn stroke_rect(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: [u8; 4],
) {
    if w == 0 || h == 0 {
        return;
    }
    fill_rect(canvas, canvas_width, canvas_height, x, y, w, 1, color);
    fill_rect(canvas, canvas_width, canvas_height, x, y + h - 1, w, 1, color);
    fill_rect(canvas, canvas_width, canvas_height, x, y, 1, h, color);
    fill_rect(canvas, canvas_width, canvas_height, x + w - 1, y, 1, h, color);
}

/// Draw the toolbar strip and its buttons
fn render_toolbar(canvas: &mut [u8], width: u32, height: u32, chrome: u32) {
    fill_rect(canvas, width, height, 0, 0, width, chrome, [0xbe, 0xbe, 0xbe, 0xff]);
    // separator under the toolbar
    fill_rect(
        canvas,
        width,
        height,
        0,
        chrome.saturating_sub(1),
        width,
        1,
        [0x88, 0x88, 0x88, 0xff],
    );

    for b in button_rects(width) {
        fill_rect(canvas, width, height, b.x, b.y, b.w, b.h, [0xe4, 0xe4, 0xe4, 0xff]);
        stroke_rect(canvas, width, height, b.x, b.y, b.w, b.h, [0x70, 0x70, 0x70, 0xff]);
        let text_x = b.x + 8;
        let text_y = b.y + (b.h - 7) / 2;
        draw_text(canvas, width, height, text_x, text_y, b.label, [0x20, 0x20, 0x20, 0xff]);
    }
}

/// White, sunken-border frame the image sits in
fn render_frame(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) {
    fill_rect(canvas, canvas_width, canvas_height, x, y, w, h, [0xff, 0xff, 0xff, 0xff]);
    stroke_rect(canvas, canvas_width, canvas_height, x, y, w, h, [0x90, 0x90, 0x90, 0xff]);
}

/// Letterbox the image into the display region with bilinear interpolation
fn render_image(
    display: &DisplayImage,
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    region_x: u32,
    region_y: u32,
    region_w: u32,
    region_h: u32,
) {
    let (target_w, target_h) = fit_within(display.width, display.height, region_w, region_h);
    if target_w == 0 || target_h == 0 {
        return;
    }
    let offset_x = region_x + (region_w - target_w) / 2;
    let offset_y = region_y + (region_h - target_h) / 2;

    let src = &display.bgra;
    let scale_x = display.width as f32 / target_w as f32;
    let scale_y = display.height as f32 / target_h as f32;

    for y in 0..target_h {
        for x in 0..target_w {
            let src_x = x as f32 * scale_x;
            let src_y = y as f32 * scale_y;

            let x0 = src_x.floor() as u32;
            let y0 = src_y.floor() as u32;
            let x1 = (x0 + 1).min(display.width - 1);
            let y1 = (y0 + 1).min(display.height - 1);

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let get_pixel = |px: u32, py: u32| -> [u8; 4] {
                let idx = ((py * display.width + px) * 4) as usize;
                if idx + 3 < src.len() {
                    [src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]
                } else {
                    [0, 0, 0, 0]
                }
            };

            let p00 = get_pixel(x0, y0);
            let p10 = get_pixel(x1, y0);
            let p01 = get_pixel(x0, y1);
            let p11 = get_pixel(x1, y1);

            let interpolate = |c: usize| -> f32 {
                let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                v0 * (1.0 - fy) + v1 * fy
            };

            let dst_idx = (((offset_y + y) * canvas_width + offset_x + x) * 4) as usize;
            if offset_x + x < canvas_width
                && offset_y + y < canvas_height
                && dst_idx + 3 < canvas.len()
            {
                // composite over the white frame, the buffer itself is opaque
                let alpha = interpolate(3) / 255.0;
                for c in 0..3 {
                    let v = interpolate(c) * alpha + 255.0 * (1.0 - alpha);
                    canvas[dst_idx + c] = v.round().clamp(0.0, 255.0) as u8;
                }
                canvas[dst_idx + 3] = 0xff;
            }
        }
    }
}

/// Draw text with a basic 5x7 pixel font (toolbar labels only)
fn draw_text(
    canvas: &mut [u8],
    canvas_width: u32,
    canvas_height: u32,
    x: u32,
    y: u32,
    text: &str,
    color: [u8; 4],
) {
    let mut cx = x;
    for ch in text.chars() {
        if let Some(glyph) = glyph(ch) {
            for (row, line) in glyph.iter().enumerate() {
                for (col, &pixel) in line.iter().enumerate() {
                    if pixel == 1 {
                        let px = cx + col as u32;
                        let py = y + row as u32;
                        if px < canvas_width && py < canvas_height {
                            let idx = ((py * canvas_width + px) * 4) as usize;
                            if idx + 3 < canvas.len() {
                                canvas[idx] = color[0];
                                canvas[idx + 1] = color[1];
                                canvas[idx + 2] = color[2];
                                canvas[idx + 3] = color[3];
                            }
                        }
                    }
                }
            }
        }
        cx += GLYPH_WIDTH;
    }
}

/// Glyphs for the characters the toolbar labels need
fn glyph(ch: char) -> Option<[[u8; 5]; 7]> {
    let g = match ch {
        'O' => [
            [0, 1, 1, 1, 0],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [0, 1, 1, 1, 0],
        ],
        'S' => [
            [0, 1, 1, 1, 0],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [0, 1, 1, 1, 0],
        ],
        'a' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 0, 0, 1],
            [0, 1, 1, 1, 1],
            [1, 0, 0, 0, 1],
            [0, 1, 1, 1, 1],
        ],
        'e' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 1, 1, 0, 0],
            [1, 0, 0, 1, 0],
            [1, 1, 1, 1, 0],
            [1, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
        ],
        'n' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [1, 1, 1, 1, 0],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
        ],
        'p' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [1, 1, 1, 1, 0],
            [1, 0, 0, 0, 1],
            [1, 1, 1, 1, 0],
            [1, 0, 0, 0, 0],
            [1, 0, 0, 0, 0],
        ],
        's' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
            [1, 0, 0, 0, 0],
            [0, 1, 1, 0, 0],
            [0, 0, 0, 1, 0],
            [1, 1, 1, 0, 0],
        ],
        'v' => [
            [0, 0, 0, 0, 0],
            [0, 0, 0, 0, 0],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [1, 0, 0, 0, 1],
            [0, 1, 0, 1, 0],
            [0, 0, 1, 0, 0],
        ],
        ' ' => [[0; 5]; 7],
        _ => return None,
    };
    Some(g)
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for ViewerApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        if self.needs_redraw {
            self.draw(qh);
        }
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for ViewerApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for ViewerApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Window close requested");
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure.new_size);

        let width = configure
            .new_size
            .0
            .map(NonZeroU32::get)
            .unwrap_or(self.width)
            .clamp(MIN_SIZE, MAX_SIZE);
        let height = configure
            .new_size
            .1
            .map(NonZeroU32::get)
            .unwrap_or(self.height)
            .clamp(MIN_SIZE, MAX_SIZE);

        let first_configure = !self.configured;
        self.configured = true;

        if width != self.width || height != self.height {
            self.pool = None;
            self.buffer = None;
        }
        self.width = width;
        self.height = height;

        let chrome = self.toolbar_height();
        if let Some(region) =
            self.layout
                .on_resize(width, height, self.session.has_image(), chrome)
        {
            self.region = Some(region);
        } else if first_configure {
            // the compositor may echo back the size the synchronizer was
            // primed with, so the initial region is established here
            self.refresh_region();
        }

        self.needs_redraw = true;
        self.draw(qh);
    }
}

impl SeatHandler for ViewerApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for ViewerApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);

        let intent = match event.keysym {
            Keysym::o => Some(Intent::Open),
            Keysym::s => Some(Intent::Save),
            Keysym::a => Some(Intent::SaveAs),
            Keysym::w => Some(Intent::Close),
            Keysym::i => Some(Intent::Info),
            Keysym::h => Some(Intent::About),
            Keysym::q | Keysym::Escape => Some(Intent::Quit),
            _ => None,
        };
        if let Some(intent) = intent {
            self.handle_intent(intent, qh);
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl PointerHandler for ViewerApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered");
                }
                PointerEventKind::Leave { .. } => {
                    debug!("Pointer left");
                }
                PointerEventKind::Motion { .. } => {
                    self.pointer_pos = event.position;
                }
                PointerEventKind::Press { button, .. } => {
                    debug!("Pointer button pressed: {}", button);
                    if button == BTN_LEFT {
                        let (x, y) = self.pointer_pos;
                        if let Some(intent) = self.button_at(x, y) {
                            self.handle_intent(intent, qh);
                        }
                    }
                }
                PointerEventKind::Release { .. } => {}
                PointerEventKind::Axis { .. } => {}
            }
        }
    }
}

impl ShmHandler for ViewerApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for ViewerApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(ViewerApp);
delegate_output!(ViewerApp);
delegate_xdg_shell!(ViewerApp);
delegate_xdg_window!(ViewerApp);
delegate_seat!(ViewerApp);
delegate_keyboard!(ViewerApp);
delegate_pointer!(ViewerApp);
delegate_shm!(ViewerApp);
delegate_registry!(ViewerApp);

/// Run the Wayland application
pub fn run(session: Session<PhotoEngine>, width: u32, height: u32) -> Result<()> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    let mut app = ViewerApp::new(
        RegistryState::new(&globals),
        SeatState::new(&globals, &qh),
        OutputState::new(&globals, &qh),
        shm,
        session,
        width,
        height,
    );

    let surface = compositor_state.create_surface(&qh);
    let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_app_id("io.github.rfoto");
    window.set_min_size(Some((MIN_SIZE, MIN_SIZE)));
    window.commit();
    app.window = Some(window);

    let suffix = app.session.title_suffix();
    app.set_title(suffix.as_deref());

    info!("Starting event loop");
    info!("Controls: o=open  s=save  a=save as  w=close  i=image info  h=about  q=quit");

    loop {
        event_queue.blocking_dispatch(&mut app)?;

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    Ok(())
}
