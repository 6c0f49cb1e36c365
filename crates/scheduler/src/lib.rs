use tracing::debug;

pub mod power;

pub use power::{DeviceClass, PowerMonitor, PowerVerdict};

pub type RequestId = u64;

/// Issues and revokes animation-frame requests on behalf of [`FrameLoop`].
/// Hosts adapt their windowing primitive behind this; tests record the
/// request/cancel pairs.
pub trait FrameRequester {
    fn request_frame(&mut self) -> RequestId;
    fn cancel_frame(&mut self, id: RequestId);
}

#[derive(Debug)]
pub struct FrameLoop {
    visible: bool,
    paused: bool,
    charging: Option<bool>,
    verdict: PowerVerdict,
    pending: Option<RequestId>,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            visible: true,
            paused: false,
            charging: None,
            verdict: PowerVerdict::Unknown,
            pending: None,
        }
    }

    /// Issues the initial frame request when the gate allows it.
    pub fn start(&mut self, requester: &mut dyn FrameRequester) {
        self.sync(requester);
    }

    pub fn set_visible(&mut self, visible: bool, requester: &mut dyn FrameRequester) {
        if self.visible != visible {
            self.visible = visible;
            self.sync(requester);
        }
    }

    pub fn set_paused(&mut self, paused: bool, requester: &mut dyn FrameRequester) {
        if self.paused != paused {
            self.paused = paused;
            self.sync(requester);
        }
    }

    pub fn toggle_paused(&mut self, requester: &mut dyn FrameRequester) -> bool {
        self.set_paused(!self.paused, requester);
        self.paused
    }

    pub fn set_charging(&mut self, charging: Option<bool>, requester: &mut dyn FrameRequester) {
        if self.charging != charging {
            self.charging = charging;
            self.sync(requester);
        }
    }

    pub fn set_verdict(&mut self, verdict: PowerVerdict, requester: &mut dyn FrameRequester) {
        if self.verdict != verdict {
            debug!(?verdict, "power verdict changed");
            self.verdict = verdict;
            self.sync(requester);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn verdict(&self) -> PowerVerdict {
        self.verdict
    }

    /// True while the animation should run: window visible, not paused, and
    /// not saving power on battery. Only an explicit charging signal clears
    /// the power gate; an absent battery interface counts as on-battery.
    pub fn should_animate(&self) -> bool {
        self.visible && !self.paused && !self.low_power()
    }

    fn low_power(&self) -> bool {
        self.charging != Some(true) && self.verdict == PowerVerdict::Saving
    }

    /// Answers a delivered frame callback: true when the request is still
    /// live and the gate holds. Callbacks whose request was cancelled get
    /// false and must render nothing.
    pub fn begin_frame(&mut self) -> bool {
        self.pending.is_some() && self.should_animate()
    }

    /// Marks the pending frame delivered and chains the next request while
    /// the gate still holds.
    pub fn complete_frame(&mut self, requester: &mut dyn FrameRequester) {
        self.pending = None;
        self.sync(requester);
    }

    fn sync(&mut self, requester: &mut dyn FrameRequester) {
        if self.should_animate() {
            if self.pending.is_none() {
                self.pending = Some(requester.request_frame());
            }
        } else if let Some(id) = self.pending.take() {
            requester.cancel_frame(id);
        }
    }
}
