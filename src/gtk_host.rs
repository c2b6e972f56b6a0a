//! GTK display host: one preview window plus one window per detail channel.
//!
//! Signal handlers only queue [`HostEvent`]s; the render loop drains them
//! from [`Host::pump`] by iterating the default main context itself.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use gtk4::prelude::*;
use gtk4::{cairo, glib, DrawingArea, EventControllerMotion, GestureClick, Window};

use crate::error::{Result, SenseError};
use crate::host::{DataChannel, DetailFrame, Host, HostEvent};
use crate::raster::Raster;

/// Frames a detail window may have in flight before the worker's are dropped.
const DETAIL_BACKLOG: usize = 4;

#[derive(Default)]
struct Shared {
    events: RefCell<Vec<HostEvent>>,
    closed: Cell<bool>,
    surface: RefCell<Option<cairo::ImageSurface>>,
}

impl Shared {
    fn push(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }
}

pub struct GtkHost {
    shared: Rc<Shared>,
    window: Window,
    area: DrawingArea,
    context: glib::MainContext,
}

impl GtkHost {
    pub fn connect(path: &Path) -> Result<Self> {
        gtk4::init().map_err(|e| SenseError::HostRejected(e.to_string()))?;

        let title = format!("sense_file - {}", path.display());
        let window = Window::builder().title(title.as_str()).build();
        let area = DrawingArea::new();
        area.set_hexpand(true);
        area.set_vexpand(true);
        window.set_child(Some(&area));

        let shared = Rc::new(Shared::default());

        let draw_shared = Rc::clone(&shared);
        area.set_draw_func(move |_, cr, _, _| {
            if let Some(surface) = draw_shared.surface.borrow().as_ref() {
                if cr.set_source_surface(surface, 0.0, 0.0).is_ok() {
                    let _ = cr.paint();
                }
            }
        });

        let resize_shared = Rc::clone(&shared);
        area.connect_resize(move |_, width, height| {
            if width > 0 && height > 0 {
                resize_shared.push(HostEvent::Resize {
                    width: width as u32,
                    height: height as u32,
                });
            }
        });

        let click = GestureClick::new();
        click.set_button(0);
        let press_shared = Rc::clone(&shared);
        click.connect_pressed(move |_, n_press, x, y| {
            press_shared.push(pointer(x, y, true, n_press));
        });
        let release_shared = Rc::clone(&shared);
        click.connect_released(move |_, n_press, x, y| {
            release_shared.push(pointer(x, y, false, n_press));
        });
        area.add_controller(click);

        let motion = EventControllerMotion::new();
        let motion_shared = Rc::clone(&shared);
        motion.connect_motion(move |_, x, y| {
            motion_shared.push(HostEvent::Motion {
                x: x.max(0.0) as u32,
                y: y.max(0.0) as u32,
            });
        });
        area.add_controller(motion);

        let close_shared = Rc::clone(&shared);
        window.connect_close_request(move |_| {
            close_shared.closed.set(true);
            close_shared.push(HostEvent::Close);
            glib::Propagation::Proceed
        });

        window.present();

        Ok(Self {
            shared,
            window,
            area,
            context: glib::MainContext::default(),
        })
    }
}

fn pointer(x: f64, y: f64, pressed: bool, n_press: i32) -> HostEvent {
    HostEvent::Pointer {
        x: x.max(0.0) as u32,
        y: y.max(0.0) as u32,
        pressed,
        clicks: n_press.clamp(1, u8::MAX as i32) as u8,
    }
}

/// Packs `width * height` pixels into a cairo RGB24 surface.
fn rgb_surface(
    width: u32,
    height: u32,
    pixel: impl Fn(u32, u32) -> [u8; 3],
) -> Option<cairo::ImageSurface> {
    let format = cairo::Format::Rgb24;
    let stride = format.stride_for_width(width).ok()?;
    let mut data = vec![0u8; stride as usize * height as usize];

    for y in 0..height {
        for x in 0..width {
            let [r, g, b] = pixel(x, y);
            let value = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            let i = y as usize * stride as usize + x as usize * 4;
            data[i..i + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }

    cairo::ImageSurface::create_for_data(data, format, width as i32, height as i32, stride).ok()
}

impl Host for GtkHost {
    fn pump(&mut self, block: bool, events: &mut Vec<HostEvent>) -> bool {
        self.context.iteration(block);
        while self.context.pending() {
            self.context.iteration(false);
        }
        events.append(&mut self.shared.events.borrow_mut());
        !self.shared.closed.get()
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.shared.closed.get() {
            return false;
        }
        self.area.set_content_width(width as i32);
        self.area.set_content_height(height as i32);
        true
    }

    fn present(&mut self, raster: &Raster) {
        let image = raster.to_rgb_image();
        let surface = rgb_surface(image.width(), image.height(), |x, y| image.get_pixel(x, y).0);
        if surface.is_none() {
            log::warn!("couldn't build preview surface");
        }
        *self.shared.surface.borrow_mut() = surface;
        self.area.queue_draw();
    }

    fn open_channel(&mut self, name: &str, base: usize) -> Result<Box<dyn DataChannel>> {
        if base == 0 || self.shared.closed.get() {
            return Err(SenseError::ChannelRejected {
                name: name.to_string(),
            });
        }

        let window = Window::builder()
            .title(name)
            .deletable(false)
            .transient_for(&self.window)
            .build();
        let area = DrawingArea::new();
        area.set_content_width(base as i32);
        area.set_content_height(base as i32);
        window.set_child(Some(&area));

        let surface: Rc<RefCell<Option<cairo::ImageSurface>>> = Rc::default();
        let draw_surface = Rc::clone(&surface);
        area.set_draw_func(move |_, cr, _, _| {
            if let Some(surface) = draw_surface.borrow().as_ref() {
                if cr.set_source_surface(surface, 0.0, 0.0).is_ok() {
                    let _ = cr.paint();
                }
            }
        });
        window.present();

        let (tx, rx) = async_channel::bounded::<DetailFrame>(DETAIL_BACKLOG);
        let side = base as u32;
        let title = name.to_string();
        glib::spawn_future_local(async move {
            while let Ok(frame) = rx.recv().await {
                let built = rgb_surface(side, side, |x, y| {
                    let i = y as usize * side as usize + x as usize;
                    let v = frame.bytes.get(i).copied().unwrap_or(0);
                    [v, v, v]
                });
                *surface.borrow_mut() = built;
                let label = format!(
                    "{} @ {:#x} ({:.2} bits/byte, {} values)",
                    title,
                    frame.offset,
                    frame.entropy,
                    frame.histogram.distinct()
                );
                window.set_title(Some(label.as_str()));
                area.queue_draw();
            }
        });

        Ok(Box::new(GtkChannel {
            name: name.to_string(),
            size: base * base,
            frames: tx,
        }))
    }

    fn request_clock(&mut self, hz: u32) {
        let period = Duration::from_millis(1000 / u64::from(hz.max(1)));
        let tick_shared = Rc::clone(&self.shared);
        glib::timeout_add_local(period, move || {
            tick_shared.push(HostEvent::Tick);
            glib::ControlFlow::Continue
        });
    }
}

/// Worker side of a detail window: frames cross to the GTK thread over a
/// bounded channel and are dropped when the window can't keep up.
struct GtkChannel {
    name: String,
    size: usize,
    frames: async_channel::Sender<DetailFrame>,
}

impl DataChannel for GtkChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn publish(&mut self, frame: &DetailFrame) -> Result<()> {
        match self.frames.try_send(frame.clone()) {
            Ok(()) | Err(async_channel::TrySendError::Full(_)) => Ok(()),
            Err(async_channel::TrySendError::Closed(_)) => Err(SenseError::ChannelRejected {
                name: self.name.clone(),
            }),
        }
    }
}
