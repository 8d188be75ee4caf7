//! Domain types that travel on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TankColor
// ---------------------------------------------------------------------------

/// An RGB color for a tank.
///
/// Channels are `i32`, not `u8`, because the servers accept (and may
/// reject) out-of-range values — the client validates `0..=255` locally
/// before issuing a call, and a narrower type would make that check
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankColor {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
}

impl TankColor {
    /// Creates a color from raw channel values.
    pub fn new(red: i32, green: i32, blue: i32) -> Self {
        Self { red, green, blue }
    }

    /// Returns `true` if all three channels lie in `0..=255`.
    pub fn in_range(&self) -> bool {
        [self.red, self.green, self.blue]
            .iter()
            .all(|c| (0..=255).contains(c))
    }
}

impl fmt::Display for TankColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

// ---------------------------------------------------------------------------
// TankAttributes
// ---------------------------------------------------------------------------

/// Everything the servers need to know about one player-owned tank.
///
/// `speed_factor` and `armor_factor` are normalized around 1.0 and trade
/// off against each other: pushing speed above 1.0 must pull armor below
/// it by the same amount. The session layer enforces that rule before any
/// create/update call; the server remains the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankAttributes {
    /// Display name. Alphanumeric, no whitespace.
    pub name: String,
    /// Speed multiplier in `[0.5, 1.5]`.
    pub speed_factor: f32,
    /// Armor multiplier in `[0.5, 1.5]`.
    pub armor_factor: f32,
    /// Model asset name.
    pub model: String,
    /// Skin asset name. May be empty for the default skin.
    pub skin: String,
    /// Identifier of the equipped weapon. Non-negative.
    pub weapon_id: i32,
    /// Body color.
    pub color: TankColor,
}

// ---------------------------------------------------------------------------
// Game servers
// ---------------------------------------------------------------------------

/// The game mode a server is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GameMode {
    Deathmatch,
    TeamDeathmatch,
    CaptureTheFlag,
}

/// One entry in the master server's game-server roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Host name or IP of the game server.
    pub host: String,
    /// Port of the game server.
    pub port: u16,
    /// Display name of the game server.
    pub name: String,
    /// Whether the master has approved this server.
    pub approved: bool,
    /// Whether the game server sits behind a secure gateway.
    pub use_gateway: bool,
    /// Players currently on the server.
    pub player_count: u32,
    /// Maximum players the server accepts.
    pub player_limit: u32,
    /// Name of the map in rotation.
    pub current_map: String,
    /// Mode currently being played.
    pub game_mode: GameMode,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

// =========================================================================
// Tests
// =========================================================================
