use serde::{Deserialize, Serialize};

/// Categorical event type derived from the stored boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "WW")]
    Ww,
    Network,
    #[serde(rename = "JBT goes")]
    JbtGoes,
    Other,
}

/// Collapses the flag columns into a single type.
///
/// The flags are not mutually exclusive in storage; the precedence
/// ww > network > jbt_goes is what the rest of the system (chips,
/// filtering, capacity rules) observes and must stay exactly as is.
pub fn classify(ww: bool, network: bool, jbt_goes: bool) -> EventType {
    if ww {
        EventType::Ww
    } else if network {
        EventType::Network
    } else if jbt_goes {
        EventType::JbtGoes
    } else {
        EventType::Other
    }
}

impl EventType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ww => "WW",
            Self::Network => "Network",
            Self::JbtGoes => "JBT goes",
            Self::Other => "Other",
        }
    }

    pub fn is_working_weekend(self) -> bool {
        self == Self::Ww
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ww_wins_over_every_other_flag() {
        assert_eq!(classify(true, true, false), EventType::Ww);
        assert_eq!(classify(true, false, true), EventType::Ww);
        assert_eq!(classify(true, true, true), EventType::Ww);
    }

    #[test]
    fn network_wins_over_jbt_goes() {
        assert_eq!(classify(false, true, true), EventType::Network);
    }

    #[test]
    fn no_flags_means_other() {
        assert_eq!(classify(false, false, false), EventType::Other);
        assert_eq!(classify(false, false, true), EventType::JbtGoes);
    }
}
