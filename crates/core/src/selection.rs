/// Upper bound on selectable classes per day; the mask is a `u32` and
/// callback payload indices are validated against this before use.
pub const MAX_SELECTABLE_CLASSES: usize = 32;

/// Bit field of selected schedule positions, bit `i` set ⇔ the class at
/// 0-based index `i` is selected. The mask round-trips verbatim inside
/// callback payloads and is never persisted; consumers must re-bound it
/// against the freshly resolved schedule length, since the schedule may
/// have shrunk between keyboard renders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SelectionMask(u32);

impl SelectionMask {
    pub const EMPTY: Self = Self(0);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flips the bit at `index`. Self-inverse; indices at or beyond the mask
    /// width leave the mask unchanged.
    #[must_use]
    pub fn toggle(self, index: usize) -> Self {
        let bit = 1u32.checked_shl(index as u32).unwrap_or(0);
        Self(self.0 ^ bit)
    }

    pub fn contains(self, index: usize) -> bool {
        self.0.checked_shr(index as u32).map(|shifted| shifted & 1 == 1).unwrap_or(false)
    }

    /// Ascending 1-based indices of the set bits, bounded by `count`. Bits
    /// beyond `count` are ignored rather than trusted.
    pub fn to_indices(self, count: usize) -> Vec<usize> {
        (0..count.min(MAX_SELECTABLE_CLASSES))
            .filter(|&index| self.contains(index))
            .map(|index| index + 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectionMask, MAX_SELECTABLE_CLASSES};

    #[test]
    fn toggle_is_self_inverse() {
        for index in 0..MAX_SELECTABLE_CLASSES {
            let mask = SelectionMask::from_bits(0b1010_0110);
            assert_eq!(mask.toggle(index).toggle(index), mask, "index {index}");
        }
    }

    #[test]
    fn toggle_sets_and_clears_single_bits() {
        let mask = SelectionMask::EMPTY.toggle(0).toggle(3);
        assert!(mask.contains(0));
        assert!(mask.contains(3));
        assert!(!mask.contains(1));
        assert_eq!(mask.bits(), 0b1001);
    }

    #[test]
    fn toggle_beyond_width_is_a_no_op() {
        let mask = SelectionMask::from_bits(7);
        assert_eq!(mask.toggle(32), mask);
        assert_eq!(mask.toggle(200), mask);
        assert!(!mask.contains(64));
    }

    #[test]
    fn indices_are_ascending_and_one_based() {
        let mask = SelectionMask::from_bits(0b10110);
        assert_eq!(mask.to_indices(8), vec![2, 3, 5]);
    }

    #[test]
    fn indices_are_bounded_by_schedule_length() {
        // bits 1, 2 and 4 set, but the schedule has shrunk to 2 classes
        let mask = SelectionMask::from_bits(0b10110);
        assert_eq!(mask.to_indices(2), vec![2]);
        assert_eq!(mask.to_indices(0), Vec::<usize>::new());
    }
}
