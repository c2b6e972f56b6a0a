use crate::geometry::ViewportGeometry;
use crate::host::HostEvent;

/// What the render loop should do in response to one host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ignore,
    /// Ask the host for new surface dimensions and re-render if granted.
    Resize { width: u32, height: u32 },
    /// Move the active detail window to `offset`.
    Seek { offset: u64 },
    /// Open another detail window starting at `offset`.
    Spawn { offset: u64 },
    Shutdown,
}

/// Translates a decoded host event against the current geometry.
pub fn dispatch(event: &HostEvent, geometry: &ViewportGeometry, view_len: u64) -> Action {
    match *event {
        HostEvent::Resize { width, height } => {
            if width == 0 || height == 0 {
                return Action::Ignore;
            }
            if width == geometry.width && height == geometry.height {
                return Action::Ignore;
            }
            Action::Resize { width, height }
        }
        HostEvent::Pointer {
            x,
            y,
            pressed: true,
            clicks,
        } => {
            if !geometry.contains(x, y) {
                return Action::Ignore;
            }
            let offset = geometry.offset_at(x, y, view_len);
            if clicks >= 2 {
                Action::Spawn { offset }
            } else {
                Action::Seek { offset }
            }
        }
        HostEvent::Pointer { .. } | HostEvent::Motion { .. } => Action::Ignore,
        HostEvent::Tick => {
            log::trace!("heartbeat");
            Action::Ignore
        }
        HostEvent::Close => Action::Shutdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ViewportGeometry {
        ViewportGeometry::new(32, 32).unwrap()
    }

    fn click(x: u32, y: u32, clicks: u8) -> HostEvent {
        HostEvent::Pointer {
            x,
            y,
            pressed: true,
            clicks,
        }
    }

    #[test]
    fn test_click_becomes_seek() {
        assert_eq!(
            dispatch(&click(16, 1, 1), &geometry(), 1024),
            Action::Seek { offset: 48 }
        );
        // 4096 bytes over 32x32: step 4, 128 bytes per row
        assert_eq!(
            dispatch(&click(3, 2, 1), &geometry(), 4096),
            Action::Seek { offset: 268 }
        );
    }

    #[test]
    fn test_double_click_spawns() {
        assert_eq!(
            dispatch(&click(0, 2, 2), &geometry(), 1024),
            Action::Spawn { offset: 64 }
        );
    }

    #[test]
    fn test_release_motion_and_outside_ignored() {
        let release = HostEvent::Pointer {
            x: 1,
            y: 1,
            pressed: false,
            clicks: 1,
        };
        assert_eq!(dispatch(&release, &geometry(), 1024), Action::Ignore);
        assert_eq!(
            dispatch(&HostEvent::Motion { x: 3, y: 3 }, &geometry(), 1024),
            Action::Ignore
        );
        assert_eq!(dispatch(&click(32, 0, 1), &geometry(), 1024), Action::Ignore);
        assert_eq!(dispatch(&HostEvent::Tick, &geometry(), 1024), Action::Ignore);
    }

    #[test]
    fn test_resize_only_when_different() {
        let same = HostEvent::Resize {
            width: 32,
            height: 32,
        };
        assert_eq!(dispatch(&same, &geometry(), 1024), Action::Ignore);

        let zero = HostEvent::Resize {
            width: 0,
            height: 32,
        };
        assert_eq!(dispatch(&zero, &geometry(), 1024), Action::Ignore);

        let bigger = HostEvent::Resize {
            width: 64,
            height: 32,
        };
        assert_eq!(
            dispatch(&bigger, &geometry(), 1024),
            Action::Resize {
                width: 64,
                height: 32
            }
        );
    }

    #[test]
    fn test_close_shuts_down() {
        assert_eq!(dispatch(&HostEvent::Close, &geometry(), 1024), Action::Shutdown);
    }
}
