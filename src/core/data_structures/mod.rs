/*!
 * Data Structures
 *
 * Containers shared by the monitor-based primitives:
 * - Ordered slots: FIFO records with O(1)-ish removal by stable handle
 */

mod ordered_slots;

pub use ordered_slots::{OrderedSlots, SlotHandle};
