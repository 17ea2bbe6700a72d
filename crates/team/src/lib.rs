//! The boardroom team: configuration, the stock roster and the leader that
//! routes questions to its members.

pub mod config;
pub mod roster;
pub mod team;

pub use config::{
    API_KEY_ENV, BASE_URL_ENV, BoardroomConfig, ServerConfig, TeamMode, TeamSettings,
};
pub use roster::{RESERVED_SLUGS, default_roster, validate_roster};
pub use team::{Team, TransferTool, transfer_tool_name};
