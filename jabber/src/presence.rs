// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Presence construction and classification.

use std::collections::BTreeMap;

use jabber_stanzas::presence::{Presence, PresenceType, Show};

use crate::event::Availability;
use tokio_jabber::Error;

impl Availability {
    fn show(&self) -> Option<Show> {
        match self {
            Availability::Available => None,
            Availability::Chat => Some(Show::Chat),
            Availability::Away => Some(Show::Away),
            Availability::ExtendedAway => Some(Show::Xa),
            Availability::DoNotDisturb => Some(Show::Dnd),
            Availability::Unavailable => None,
        }
    }
}

/// Builds the broadcast presence for [set_status][crate::Client::set_status]:
/// a `show` child for non-default availabilities, a `priority` child when
/// non-zero, one `status` child per language.
///
/// Going offline is not a status; that's what closing the session is for.
pub(crate) fn status_presence(
    availability: Availability,
    priority: i8,
    messages: &BTreeMap<String, String>,
) -> Result<Presence, Error> {
    if availability == Availability::Unavailable {
        return Err(Error::InvalidArgument(
            "use close() instead of an unavailable status",
        ));
    }
    let mut presence = Presence::available().with_priority(priority);
    if let Some(show) = availability.show() {
        presence = presence.with_show(show);
    }
    for (lang, message) in messages {
        presence.set_status(lang.clone(), message.clone());
    }
    Ok(presence)
}

/// Maps an inbound presence to the availability it announces.
pub(crate) fn classify_availability(presence: &Presence) -> Availability {
    if presence.type_ == PresenceType::Unavailable {
        return Availability::Unavailable;
    }
    match presence.show {
        None => Availability::Available,
        Some(Show::Chat) => Availability::Chat,
        Some(Show::Away) => Availability::Away,
        Some(Show::Xa) => Availability::ExtendedAway,
        Some(Show::Dnd) => Availability::DoNotDisturb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_presence_minimal() {
        let presence = status_presence(
            Availability::Available,
            0,
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(presence.show, None);
        assert_eq!(presence.priority, 0);
        assert!(presence.statuses.is_empty());

        // An available presence with no decorations serializes bare.
        let elem = minidom::Element::from(presence);
        assert_eq!(elem.children().count(), 0);
    }

    #[test]
    fn test_status_presence_full() {
        let mut messages = BTreeMap::new();
        messages.insert(String::from(""), String::from("busy"));
        messages.insert(String::from("fr"), String::from("occupé"));
        let presence = status_presence(Availability::DoNotDisturb, 5, &messages).unwrap();
        assert_eq!(presence.show, Some(Show::Dnd));
        assert_eq!(presence.priority, 5);
        assert_eq!(presence.statuses.len(), 2);
    }

    #[test]
    fn test_offline_is_rejected() {
        let error =
            status_presence(Availability::Unavailable, 0, &BTreeMap::new()).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_classify() {
        let presence = Presence::available().with_show(Show::Away);
        assert_eq!(classify_availability(&presence), Availability::Away);

        let presence = Presence::new(PresenceType::Unavailable);
        assert_eq!(
            classify_availability(&presence),
            Availability::Unavailable
        );
    }
}
