//! Hot-cue pad gestures
//!
//! A pad press becomes either a trigger (short press: store or jump) or a
//! clear (held past the long-press threshold). Each press gets its own
//! token so a late release or a pointer leaving the pad can never act on a
//! newer press of the same slot.

use std::time::{Duration, Instant};

use crate::error::{MixError, Result};

/// Number of hot-cue slots per deck
pub const HOT_CUE_SLOTS: usize = 8;

/// Check a 1-based hot-cue slot number
pub fn validate_slot(slot: u8) -> Result<usize> {
    if (1..=HOT_CUE_SLOTS as u8).contains(&slot) {
        Ok(slot as usize - 1)
    } else {
        Err(MixError::invalid_parameter(
            "hot_cue_slot",
            slot,
            format!("1..={}", HOT_CUE_SLOTS),
        ))
    }
}

/// Handle for one press of one pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressToken {
    slot: u8,
    serial: u64,
}

impl PressToken {
    pub fn slot(&self) -> u8 {
        self.slot
    }
}

/// What a completed gesture asks the deck to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadAction {
    /// Store the current position or jump to the stored cue
    Trigger(u8),
    /// Delete the cue in this slot
    Clear(u8),
}

#[derive(Debug, Clone, Copy)]
struct PendingPress {
    serial: u64,
    pressed_at: Instant,
}

/// Press tracking for the eight pads of one deck
#[derive(Debug, Clone)]
pub struct HotCuePads {
    long_press: Duration,
    pending: [Option<PendingPress>; HOT_CUE_SLOTS],
    next_serial: u64,
}

impl HotCuePads {
    pub fn new(long_press: Duration) -> Self {
        Self {
            long_press,
            pending: [None; HOT_CUE_SLOTS],
            next_serial: 0,
        }
    }

    /// Pad pressed down
    ///
    /// A second press of a slot that is still held replaces the first.
    pub fn press(&mut self, slot: u8, now: Instant) -> Result<PressToken> {
        let index = validate_slot(slot)?;
        let serial = self.next_serial;
        self.next_serial += 1;
        self.pending[index] = Some(PendingPress {
            serial,
            pressed_at: now,
        });
        Ok(PressToken { slot, serial })
    }

    /// Pad released
    ///
    /// Returns the action for this press, or `None` when the token is stale
    /// (already cancelled, superseded, or consumed by a long press).
    pub fn release(&mut self, token: PressToken, now: Instant) -> Option<PadAction> {
        let press = self.take(token)?;
        if now.saturating_duration_since(press.pressed_at) >= self.long_press {
            Some(PadAction::Clear(token.slot))
        } else {
            Some(PadAction::Trigger(token.slot))
        }
    }

    /// Pointer left the pad; the press does nothing
    pub fn cancel(&mut self, token: PressToken) -> bool {
        self.take(token).is_some()
    }

    /// Fire long presses that have been held long enough
    pub fn tick(&mut self, now: Instant) -> Vec<PadAction> {
        let mut actions = Vec::new();
        for (index, pending) in self.pending.iter_mut().enumerate() {
            if let Some(press) = pending {
                if now.saturating_duration_since(press.pressed_at) >= self.long_press {
                    *pending = None;
                    actions.push(PadAction::Clear(index as u8 + 1));
                }
            }
        }
        actions
    }

    /// Forget every press in flight
    pub fn reset(&mut self) {
        self.pending = [None; HOT_CUE_SLOTS];
    }

    pub fn long_press(&self) -> Duration {
        self.long_press
    }

    fn take(&mut self, token: PressToken) -> Option<PendingPress> {
        let index = validate_slot(token.slot).ok()?;
        match self.pending[index] {
            Some(press) if press.serial == token.serial => self.pending[index].take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pads() -> HotCuePads {
        HotCuePads::new(Duration::from_millis(600))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_short_press_triggers() {
        let mut pads = pads();
        let t0 = Instant::now();
        let token = pads.press(3, t0).unwrap();
        assert!(pads.tick(t0 + ms(100)).is_empty());
        assert_eq!(pads.release(token, t0 + ms(150)), Some(PadAction::Trigger(3)));
    }

    #[test]
    fn test_long_press_clears_from_tick() {
        let mut pads = pads();
        let t0 = Instant::now();
        let token = pads.press(5, t0).unwrap();
        assert_eq!(pads.tick(t0 + ms(600)), vec![PadAction::Clear(5)]);
        // Release after the long press fired does nothing more
        assert_eq!(pads.release(token, t0 + ms(900)), None);
    }

    #[test]
    fn test_long_release_without_tick_clears() {
        let mut pads = pads();
        let t0 = Instant::now();
        let token = pads.press(1, t0).unwrap();
        assert_eq!(pads.release(token, t0 + ms(700)), Some(PadAction::Clear(1)));
    }

    #[test]
    fn test_cancel_discards_press() {
        let mut pads = pads();
        let t0 = Instant::now();
        let token = pads.press(2, t0).unwrap();
        assert!(pads.cancel(token));
        assert!(pads.tick(t0 + ms(1000)).is_empty());
        assert_eq!(pads.release(token, t0 + ms(1000)), None);
    }

    #[test]
    fn test_stale_token_ignored() {
        let mut pads = pads();
        let t0 = Instant::now();
        let first = pads.press(4, t0).unwrap();
        let second = pads.press(4, t0 + ms(50)).unwrap();
        assert_ne!(first, second);

        assert_eq!(pads.release(first, t0 + ms(100)), None);
        assert_eq!(pads.release(second, t0 + ms(100)), Some(PadAction::Trigger(4)));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut pads = pads();
        let t0 = Instant::now();
        let a = pads.press(1, t0).unwrap();
        pads.press(8, t0 + ms(300)).unwrap();
        assert_eq!(pads.tick(t0 + ms(700)), vec![PadAction::Clear(1)]);
        assert_eq!(pads.tick(t0 + ms(950)), vec![PadAction::Clear(8)]);
        assert_eq!(pads.release(a, t0 + ms(1000)), None);
    }

    #[test]
    fn test_invalid_slot() {
        let mut pads = pads();
        assert!(pads.press(0, Instant::now()).is_err());
        assert!(pads.press(9, Instant::now()).is_err());
        assert_eq!(validate_slot(8).unwrap(), 7);
    }
}
