// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-user chat (XEP-0045) and direct invitations (XEP-0249).

mod admin;
#[allow(clippy::module_inception)]
mod muc;
mod owner;
mod user;

pub use self::admin::{AdminItem, AdminQuery};
pub use self::muc::{History, Muc};
pub use self::owner::{OwnerDestroy, OwnerQuery};
pub use self::user::{
    Actor, Affiliation, Continue, Decline, Destroy, Invite, Item, MucUser, Role, Status,
};

use core::convert::TryFrom;

use minidom::Element;

use crate::jid::BareJid;
use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

/// A direct invitation to a chatroom, carried in a normal message
/// (XEP-0249).
#[derive(Debug, Clone, PartialEq)]
pub struct DirectInvite {
    /// The room the recipient is invited to.
    pub jid: BareJid,

    /// The password needed to enter the room, if any.
    pub password: Option<String>,

    /// The reason for the invitation.
    pub reason: Option<String>,
}

impl MessagePayload for DirectInvite {}

impl TryFrom<Element> for DirectInvite {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DirectInvite, Error> {
        check_self!(elem, "x", CONFERENCE, "direct invite");
        check_no_children!(elem, "direct invite");
        check_no_unknown_attributes!(elem, "direct invite", ["jid", "password", "reason", "continue", "thread"]);
        Ok(DirectInvite {
            jid: get_attr!(elem, "jid", Required),
            password: get_attr!(elem, "password", Option),
            reason: get_attr!(elem, "reason", Option),
        })
    }
}

impl From<DirectInvite> for Element {
    fn from(invite: DirectInvite) -> Element {
        Element::builder("x", ns::CONFERENCE)
            .attr("jid", invite.jid)
            .attr("password", invite.password)
            .attr("reason", invite.reason)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_invite() {
        let elem: Element =
            "<x xmlns='jabber:x:conference' jid='darkcave@macbeth.shakespeare.lit' reason='Hey!'/>"
                .parse()
                .unwrap();
        let invite = DirectInvite::try_from(elem).unwrap();
        assert_eq!(
            invite.jid,
            BareJid::new("darkcave@macbeth.shakespeare.lit").unwrap()
        );
        assert_eq!(invite.reason.as_deref(), Some("Hey!"));
        assert_eq!(invite.password, None);
    }
}
