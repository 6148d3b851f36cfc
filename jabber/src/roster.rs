// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The session-local roster mirror.
//!
//! All mutations of the mirror originate from the server: either as the
//! reply to a fetch, or as pushes dispatched through the inbound path. The
//! mutating operations only send the request; the server echoes the change
//! back as a push.

use std::collections::HashMap;
use std::sync::RwLock;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::{BareJid, Jid};
use jabber_stanzas::roster::{Group, Item, Roster as RosterQuery, Subscription};

use tokio_jabber::{Error, Session};

/// The user's contact list, mirrored from the server.
pub struct Roster {
    session: Session,
    items: RwLock<HashMap<BareJid, Item>>,
}

impl Roster {
    pub(crate) fn new(session: Session) -> Roster {
        Roster {
            session,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches the roster from the server and replaces the mirror.
    pub async fn refresh(&self) -> Result<Vec<Item>, Error> {
        let iq = Iq::from_get("roster", RosterQuery::default());
        let response = self.session.iq_request(iq).await?;
        let roster = match response.payload {
            IqType::Result(Some(payload)) => RosterQuery::try_from(payload)?,
            _ => return Err(Error::InvalidState),
        };
        let mut items = self.items.write().unwrap();
        items.clear();
        for item in &roster.items {
            items.insert(item.jid.clone(), item.clone());
        }
        Ok(roster.items)
    }

    /// A snapshot of the mirrored items.
    pub fn items(&self) -> Vec<Item> {
        self.items.read().unwrap().values().cloned().collect()
    }

    /// The mirrored item for one contact.
    pub fn get(&self, jid: &BareJid) -> Option<Item> {
        self.items.read().unwrap().get(jid).cloned()
    }

    /// Asks the server to add or update a contact. The mirror is updated by
    /// the resulting push, not by this call.
    pub async fn add_contact(
        &self,
        jid: BareJid,
        name: Option<&str>,
        groups: &[&str],
    ) -> Result<(), Error> {
        let item = Item {
            jid,
            name: name.map(String::from),
            subscription: Subscription::None,
            ask: Default::default(),
            groups: groups
                .iter()
                .map(|group| Group(String::from(*group)))
                .collect(),
        };
        let query = RosterQuery {
            ver: None,
            items: vec![item],
        };
        self.session
            .iq_request(Iq::from_set("roster-add", query))
            .await?;
        Ok(())
    }

    /// Asks the server to remove a contact, revoking both subscriptions.
    pub async fn remove_contact(&self, jid: &BareJid) -> Result<(), Error> {
        let item = Item {
            jid: jid.clone(),
            name: None,
            subscription: Subscription::Remove,
            ask: Default::default(),
            groups: vec![],
        };
        let query = RosterQuery {
            ver: None,
            items: vec![item],
        };
        self.session
            .iq_request(Iq::from_set("roster-remove", query))
            .await?;
        Ok(())
    }

    /// Applies one pushed item to the mirror.
    pub(crate) fn apply_push(&self, item: &Item) {
        let mut items = self.items.write().unwrap();
        if item.subscription == Subscription::Remove {
            items.remove(&item.jid);
        } else {
            items.insert(item.jid.clone(), item.clone());
        }
    }

    pub(crate) fn clear(&self) {
        self.items.write().unwrap().clear();
    }
}

/// Whether a roster push sender is trusted: pushes must come from the
/// account itself (no from, the bare JID, or the full bound JID).
pub(crate) fn push_sender_is_trusted(from: Option<&Jid>, bound: Option<&Jid>) -> bool {
    let from = match from {
        None => return true,
        Some(from) => from,
    };
    let bound = match bound {
        None => return false,
        Some(bound) => bound,
    };
    *from == *bound || from.to_bare() == bound.to_bare() && from.is_bare()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_sender_validation() {
        let bound = Jid::new("alice@test/home").unwrap();

        assert!(push_sender_is_trusted(None, Some(&bound)));
        assert!(push_sender_is_trusted(
            Some(&Jid::new("alice@test").unwrap()),
            Some(&bound)
        ));
        assert!(push_sender_is_trusted(
            Some(&Jid::new("alice@test/home").unwrap()),
            Some(&bound)
        ));

        // Another resource of the same account is not a valid push origin.
        assert!(!push_sender_is_trusted(
            Some(&Jid::new("alice@test/work").unwrap()),
            Some(&bound)
        ));
        assert!(!push_sender_is_trusted(
            Some(&Jid::new("mallory@test").unwrap()),
            Some(&bound)
        ));
        assert!(!push_sender_is_trusted(
            Some(&Jid::new("test").unwrap()),
            Some(&bound)
        ));
    }

    #[test]
    fn test_apply_push() {
        let roster = Roster::new(crate::test_support::offline_session());
        let jid = BareJid::new("bob@test").unwrap();
        let mut item = Item::new(jid.clone());
        item.subscription = Subscription::To;
        roster.apply_push(&item);
        assert_eq!(roster.get(&jid).unwrap().subscription, Subscription::To);
        assert_eq!(roster.items().len(), 1);

        item.subscription = Subscription::Remove;
        roster.apply_push(&item);
        assert!(roster.get(&jid).is_none());
        assert!(roster.items().is_empty());
    }
}
