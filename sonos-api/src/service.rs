use std::fmt;

use crate::ids::{GroupId, HouseholdId, PlayerId};

/// Independently-subscribable event namespaces of the control API
///
/// Each namespace delivers its own webhook events once subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Playback state, play modes and position of a group
    Playback,

    /// Current and next item metadata of a group
    PlaybackMetadata,

    /// Volume and mute of a single player
    PlayerVolume,
}

/// Defines what a namespace subscription is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    /// Scoped to a (household, group) pair; must be recreated when the group changes
    Group,
    /// Scoped to a single player; survives regrouping
    Player,
}

impl Namespace {
    /// REST name of this namespace, also sent in the `X-Sonos-Namespace` header
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Playback => "playback",
            Namespace::PlaybackMetadata => "playbackMetadata",
            Namespace::PlayerVolume => "playerVolume",
        }
    }

    pub fn scope(&self) -> NamespaceScope {
        match self {
            Namespace::Playback | Namespace::PlaybackMetadata => NamespaceScope::Group,
            Namespace::PlayerVolume => NamespaceScope::Player,
        }
    }

    /// Namespaces that are subscribed per group
    pub fn group_namespaces() -> [Namespace; 2] {
        [Namespace::Playback, Namespace::PlaybackMetadata]
    }

    /// Parse a namespace from its REST name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "playback" => Some(Namespace::Playback),
            "playbackMetadata" => Some(Namespace::PlaybackMetadata),
            "playerVolume" => Some(Namespace::PlayerVolume),
            _ => None,
        }
    }

    /// Subscription path for a group-scoped namespace
    pub fn group_subscription_path(&self, household_id: &HouseholdId, group_id: &GroupId) -> String {
        format!(
            "/households/{}/groups/{}/{}/subscription",
            household_id,
            group_id,
            self.name()
        )
    }

    /// Subscription path for a player-scoped namespace
    pub fn player_subscription_path(&self, player_id: &PlayerId) -> String {
        format!("/players/{}/{}/subscription", player_id, self.name())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
