use crate::clock::Duration;

// ---- Controller parameters ----
// Advertised when the configured name is empty
pub const DEFAULT_ADVERTISING_NAME: &str = "MavistraController";
// Visible bytes of the advertising name. Longer names are truncated
pub const MAX_ADVERTISING_NAME_LENGTH: usize = 31;
// A command is released once no frame named it for longer than this
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 150;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::millis(DEFAULT_COMMAND_TIMEOUT_MS);
// How often the control loop polls the controller
pub const CONTROL_LOOP_INTERVAL_MS: u64 = 10;

// ---- Protocol parameters ----
// Largest frame a peer may write in one go, terminator included
pub const MAX_FRAME_LENGTH: usize = 64;
pub const MAX_IDENTIFIER_LENGTH: usize = 32;
// Distinct identifiers tracked over the controller's lifetime. Has to be a power of two
pub const MAX_COMMANDS: usize = 16;
pub const MAX_STATUS_LENGTH: usize = 32;

// ---- BLE parameters ----
pub const CONNECTIONS_MAX: usize = 1;
pub const L2CAP_CHANNELS_MAX: usize = 2;
