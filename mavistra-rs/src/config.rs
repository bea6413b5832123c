pub use mavistra_controller::config::*;

// ---- User Parameters ----
// Name shown to scanning peers. Empty means the controller default
pub const ADVERTISING_NAME: &str = DEFAULT_ADVERTISING_NAME;
// Buttons reported by the control loop when they are pressed or released
pub const WATCHED_BUTTONS: [&str; 12] = [
    "L_UP", "L_DOWN", "L_LEFT", "L_RIGHT", "L_CENTER", "R_UP", "R_DOWN", "R_LEFT", "R_RIGHT",
    "R_CENTER", "BTN_1", "BTN_2",
];

// ---- BLE parameters ----
// Connection interval requested once a peer is linked
pub const CONNECTION_INTERVAL_US: u64 = 7500;
// Queued status notifications waiting for the notifier
pub const STATUS_QUEUE_LENGTH: usize = 4;
