//! Booking session status and the plug-in handshake state.

/// `charging_session_status` values written by the booking producer.
///
/// The strings are the exact live-database spellings; tagged variants
/// here so nothing downstream ever string-compares case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingState {
    Booked,
    CheckedIn,
    Pending,
    ChargingBev,
    Ready,
    Canceled,
    NoShow,
}

impl BookingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::CheckedIn => "checked_in",
            Self::Pending => "pending",
            Self::ChargingBev => "charging_BEV",
            Self::Ready => "ready",
            Self::Canceled => "canceled",
            Self::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "booked" => Some(Self::Booked),
            "checked_in" => Some(Self::CheckedIn),
            "pending" => Some(Self::Pending),
            "charging_BEV" => Some(Self::ChargingBev),
            "ready" => Some(Self::Ready),
            "canceled" => Some(Self::Canceled),
            "no_show" => Some(Self::NoShow),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-booking handshake separating "charger delivered" from "vehicle
/// and cart ready to exchange power".
///
/// ```text
/// BRING_CHARGER ──(handshake)──► ROBOT_READY2PLUG ──(status pending)──► BEV_PENDING
/// BEV_PENDING ──(handshake)──► PLUG_IN ──(bring job success)──► SUCCESS
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    BringCharger,
    RobotReady2Plug,
    BevPending,
    PlugIn,
    Success,
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for state in [
            BookingState::Booked,
            BookingState::CheckedIn,
            BookingState::Pending,
            BookingState::ChargingBev,
            BookingState::Ready,
            BookingState::Canceled,
            BookingState::NoShow,
        ] {
            assert_eq!(BookingState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn spelling_is_exact() {
        // The live database writes mixed case for exactly one status.
        assert_eq!(BookingState::ChargingBev.as_str(), "charging_BEV");
        assert_eq!(BookingState::parse("charging_bev"), None);
        assert_eq!(BookingState::parse("CHECKED_IN"), None);
    }
}
