use bitflags::bitflags;

bitflags! {
    /// Behavior of a full-screen fade.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScreenFadeFlags: u32 {
        /// Fade from the color to the scene.
        const IN = 1 << 0;
        /// Fade from the scene to the color.
        const OUT = 1 << 1;
        /// Multiply instead of blend.
        const MODULATE = 1 << 2;
        /// Hold the faded-out color until replaced.
        const STAYOUT = 1 << 3;
        /// Drop every active fade before adding this one.
        const PURGE = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FadeEntry {
    color: [u8; 4],
    flags: ScreenFadeFlags,
    start: f32,
    duration: f32,
    hold: f32,
}

impl FadeEntry {
    fn expires_at(&self) -> Option<f32> {
        if self.flags.contains(ScreenFadeFlags::STAYOUT) && self.flags.contains(ScreenFadeFlags::OUT) {
            None
        } else {
            Some(self.start + self.duration + self.hold)
        }
    }

    fn alpha_at(&self, now: f32) -> f32 {
        let target = self.color[3] as f32;
        let elapsed = (now - self.start).max(0.0);
        let ramp = if self.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.duration).min(1.0)
        };
        if self.flags.contains(ScreenFadeFlags::OUT) {
            target * ramp
        } else {
            // fade in: hold the color, then ramp away
            let after_hold = (elapsed - self.hold).max(0.0);
            let ramp = if self.duration <= 0.0 {
                1.0
            } else {
                (after_hold / self.duration).min(1.0)
            };
            target * (1.0 - ramp)
        }
    }
}

/// Blend applied over the finished 3D frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeOverlay {
    pub color: [u8; 3],
    pub alpha: u8,
    pub modulate: bool,
}

/// Accumulated full-screen fade state.
#[derive(Debug, Clone, Default)]
pub struct ScreenFade {
    fades: Vec<FadeEntry>,
}

impl ScreenFade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, color: [u8; 4], duration: f32, hold: f32, flags: ScreenFadeFlags, now: f32) {
        if flags.contains(ScreenFadeFlags::PURGE) {
            self.fades.clear();
        }
        self.fades.push(FadeEntry {
            color,
            flags,
            start: now,
            duration: duration.max(0.0),
            hold: hold.max(0.0),
        });
        tracing::debug!(?flags, duration, hold, active = self.fades.len(), "screen fade started");
    }

    pub fn clear(&mut self) {
        self.fades.clear();
    }

    pub fn active_count(&self) -> usize {
        self.fades.len()
    }

    /// Drops expired fades and returns the overlay to draw at `now`, if any.
    pub fn update(&mut self, now: f32) -> Option<FadeOverlay> {
        self.fades
            .retain(|fade| fade.expires_at().is_none_or(|end| now < end));
        if self.fades.is_empty() {
            return None;
        }

        let mut rgb = [0u32; 3];
        let mut alpha = 0.0f32;
        let mut modulate = false;
        for fade in &self.fades {
            for (sum, c) in rgb.iter_mut().zip(fade.color) {
                *sum += c as u32;
            }
            alpha = alpha.max(fade.alpha_at(now));
            modulate |= fade.flags.contains(ScreenFadeFlags::MODULATE);
        }
        let n = self.fades.len() as u32;
        let alpha = alpha.clamp(0.0, 255.0) as u8;
        if alpha == 0 {
            return None;
        }
        Some(FadeOverlay {
            color: rgb.map(|sum| (sum / n) as u8),
            alpha,
            modulate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_out_ramps_to_color_then_expires() {
        let mut fade = ScreenFade::new();
        fade.start([0, 0, 0, 200], 2.0, 1.0, ScreenFadeFlags::OUT, 10.0);
        assert_eq!(fade.update(11.0).unwrap().alpha, 100);
        assert_eq!(fade.update(12.5).unwrap().alpha, 200);
        assert!(fade.update(13.0).is_none());
        assert_eq!(fade.active_count(), 0);
    }

    #[test]
    fn stayout_holds_forever() {
        let mut fade = ScreenFade::new();
        fade.start([255, 0, 0, 255], 1.0, 0.0, ScreenFadeFlags::OUT | ScreenFadeFlags::STAYOUT, 0.0);
        let overlay = fade.update(1000.0).unwrap();
        assert_eq!(overlay.alpha, 255);
        assert_eq!(overlay.color, [255, 0, 0]);
    }

    #[test]
    fn fade_in_holds_then_clears() {
        let mut fade = ScreenFade::new();
        fade.start([0, 0, 0, 255], 2.0, 1.0, ScreenFadeFlags::IN, 0.0);
        assert_eq!(fade.update(0.5).unwrap().alpha, 255);
        assert_eq!(fade.update(2.0).unwrap().alpha, 127);
        assert!(fade.update(3.5).is_none());
    }

    #[test]
    fn purge_replaces_active_fades() {
        let mut fade = ScreenFade::new();
        fade.start([0, 0, 0, 255], 1.0, 5.0, ScreenFadeFlags::OUT, 0.0);
        fade.start([0, 0, 0, 255], 1.0, 5.0, ScreenFadeFlags::OUT, 0.0);
        fade.start([9, 9, 9, 255], 1.0, 0.0, ScreenFadeFlags::OUT | ScreenFadeFlags::PURGE, 0.0);
        assert_eq!(fade.active_count(), 1);
        let overlay = fade.update(0.5).unwrap();
        assert_eq!(overlay.color, [9, 9, 9]);
        assert!(!overlay.modulate);
    }
}
