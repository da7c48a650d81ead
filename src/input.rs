// input.rs — 按键状态：过滤系统重复按下，失去焦点时全部松开

use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug)]
pub struct KeyLatch<K> {
    held: HashSet<K>,
}

impl<K: Eq + Hash + Copy> KeyLatch<K> {
    pub fn new() -> Self {
        Self { held: HashSet::new() }
    }

    /// True only for the first press of a key that is not already held.
    pub fn press(&mut self, key: K) -> bool {
        self.held.insert(key)
    }

    pub fn release(&mut self, key: K) {
        self.held.remove(&key);
    }

    pub fn is_held(&self, key: K) -> bool {
        self.held.contains(&key)
    }

    /// `1.0` when only `positive` is held, `-1.0` when only `negative` is.
    pub fn axis(&self, positive: K, negative: K) -> f32 {
        self.is_held(positive) as i32 as f32 - self.is_held(negative) as i32 as f32
    }

    /// Forgets every held key. Releases that happen while the window is
    /// unfocused or a modal dialog is open never arrive.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}

impl<K: Eq + Hash + Copy> Default for KeyLatch<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_presses_fire_once_until_released() {
        let mut keys = KeyLatch::new();
        assert!(keys.press('c'));
        assert!(!keys.press('c'));
        assert!(keys.is_held('c'));
        keys.release('c');
        assert!(!keys.is_held('c'));
        assert!(keys.press('c'));
    }

    #[test]
    fn clearing_after_focus_loss_rearms_every_key() {
        let mut keys = KeyLatch::new();
        keys.press('w');
        keys.press('g');
        // focus lost while both were down: their releases go elsewhere
        keys.clear();
        assert!(!keys.is_held('w'));
        assert_eq!(keys.axis('w', 's'), 0.0);
        assert!(keys.press('g'));
    }

    #[test]
    fn opposite_keys_cancel_on_an_axis() {
        let mut keys = KeyLatch::new();
        keys.press('w');
        assert_eq!(keys.axis('w', 's'), 1.0);
        keys.press('s');
        assert_eq!(keys.axis('w', 's'), 0.0);
        keys.release('w');
        assert_eq!(keys.axis('w', 's'), -1.0);
    }
}
