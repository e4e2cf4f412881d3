//! Delivery priority levels for outbound events

/// Priority bands for event delivery. Consumers drain higher bands first;
/// LOW may be batched.
pub mod priority {
    pub const CRITICAL: u8 = 3;
    pub const HIGH: u8 = 2;
    pub const NORMAL: u8 = 1;
    pub const LOW: u8 = 0;
}
