//! Slot filling: missing-slot tracking in declaration order, and typed
//! extraction/coercion of raw captured text into a slot's declared type.

mod coerce;
mod manager;

pub use coerce::coerce;
pub use manager::{
    all_slots_filled, fill_awaited_slot, fill_from_trigger_captures, missing_slots,
    next_awaited_slot,
};
