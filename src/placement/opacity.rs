use std::time::Duration;

/// How long a symbol takes to fade fully in or out in continuous mode.
pub const FADE_DURATION: Duration = Duration::from_millis(300);

/// Whether placement decisions fade over wall-clock time or take effect
/// instantly (static snapshot rendering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationMode {
    Continuous,
    Instant,
}

/// This frame's raw decision for one cross-tile id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointPlacement {
    pub text: bool,
    pub icon: bool,
    /// Every tested primitive fell outside the viewport.
    pub offscreen: bool,
}

impl JointPlacement {
    pub fn new(text: bool, icon: bool, offscreen: bool) -> Self {
        Self {
            text,
            icon,
            offscreen,
        }
    }
}

/// Fade progress for one side of a symbol. `opacity == 0 && !placed` means
/// fully hidden and eligible to be forgotten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityState {
    pub opacity: f32,
    pub placed: bool,
}

impl OpacityState {
    /// First commit for a symbol. One placed fully offscreen starts opaque:
    /// it was invisible anyway, so there is nothing to fade in.
    pub fn initial(placed: bool, offscreen: bool) -> Self {
        Self {
            opacity: if offscreen && placed { 1.0 } else { 0.0 },
            placed,
        }
    }

    /// Advances opacity by `increment` in the direction of the *previous*
    /// placed flag, then records the new one. The direction lag is
    /// observable for one commit when a symbol flips mid-fade.
    pub fn advance(prev: &OpacityState, increment: f32, placed: bool) -> Self {
        let delta = if prev.placed { increment } else { -increment };
        Self {
            opacity: (prev.opacity + delta).clamp(0.0, 1.0),
            placed,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.opacity == 0.0 && !self.placed
    }
}

/// Fade progress for a whole symbol, icon and text tracked independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointOpacityState {
    pub text: OpacityState,
    pub icon: OpacityState,
}

impl JointOpacityState {
    pub fn initial(placement: &JointPlacement) -> Self {
        Self {
            text: OpacityState::initial(placement.text, placement.offscreen),
            icon: OpacityState::initial(placement.icon, placement.offscreen),
        }
    }

    pub fn advance(
        prev: &JointOpacityState,
        increment: f32,
        placed_text: bool,
        placed_icon: bool,
    ) -> Self {
        Self {
            text: OpacityState::advance(&prev.text, increment, placed_text),
            icon: OpacityState::advance(&prev.icon, increment, placed_icon),
        }
    }

    /// The fully-hidden state used for symbols absent from the fade map.
    pub fn hidden() -> Self {
        Self {
            text: OpacityState {
                opacity: 0.0,
                placed: false,
            },
            icon: OpacityState {
                opacity: 0.0,
                placed: false,
            },
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.text.is_hidden() && self.icon.is_hidden()
    }
}
