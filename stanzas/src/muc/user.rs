// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::jid::{BareJid, FullJid, Jid};
use crate::message::MessagePayload;
use crate::ns;
use crate::presence::PresencePayload;
use crate::util::error::Error;

/// The status codes used in MUC presences and messages, see XEP-0045 §11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 100: Inform user that any occupant is allowed to see the user's full
    /// JID
    NonAnonymousRoom,

    /// 101: Inform user that his or her affiliation changed while not in the
    /// room
    AffiliationChange,

    /// 102: Inform occupants that room now shows unavailable members
    ConfigShowsUnavailableMembers,

    /// 103: Inform occupants that room now does not show unavailable members
    ConfigHidesUnavailableMembers,

    /// 104: Inform occupants that a non-privacy-related room configuration
    /// change has occurred
    ConfigNonPrivacyRelated,

    /// 110: Inform user that presence refers to itself
    SelfPresence,

    /// 170: Inform occupants that room logging is now enabled
    ConfigRoomLoggingEnabled,

    /// 171: Inform occupants that room logging is now disabled
    ConfigRoomLoggingDisabled,

    /// 172: Inform occupants that the room is now non-anonymous
    ConfigRoomNonAnonymous,

    /// 173: Inform occupants that the room is now semi-anonymous
    ConfigRoomSemiAnonymous,

    /// 201: Inform user that a new room has been created
    RoomHasBeenCreated,

    /// 210: Inform user that service has assigned or modified occupant's
    /// roomnick
    AssignedNick,

    /// 301: Inform user that they have been banned from the room
    Banned,

    /// 303: Inform all occupants of new room nickname
    NewNick,

    /// 307: Inform user that they have been kicked from the room
    Kicked,

    /// 321: Inform user that they are being removed from the room because of
    /// an affiliation change
    RemovalFromRoom,

    /// 322: Inform user that they are being removed from the room because
    /// the room has been changed to members-only and the user is not a
    /// member
    ConfigMembersOnly,

    /// 332: Inform user that they are being removed from the room because
    /// the MUC service is being shut down
    ServiceShutdown,

    /// 333: Inform user that they are being removed from the room for
    /// technical reasons
    ServiceErrorKick,
}

impl Status {
    /// The numeric code of this status.
    pub fn code(&self) -> u16 {
        match self {
            Status::NonAnonymousRoom => 100,
            Status::AffiliationChange => 101,
            Status::ConfigShowsUnavailableMembers => 102,
            Status::ConfigHidesUnavailableMembers => 103,
            Status::ConfigNonPrivacyRelated => 104,
            Status::SelfPresence => 110,
            Status::ConfigRoomLoggingEnabled => 170,
            Status::ConfigRoomLoggingDisabled => 171,
            Status::ConfigRoomNonAnonymous => 172,
            Status::ConfigRoomSemiAnonymous => 173,
            Status::RoomHasBeenCreated => 201,
            Status::AssignedNick => 210,
            Status::Banned => 301,
            Status::NewNick => 303,
            Status::Kicked => 307,
            Status::RemovalFromRoom => 321,
            Status::ConfigMembersOnly => 322,
            Status::ServiceShutdown => 332,
            Status::ServiceErrorKick => 333,
        }
    }

    /// Looks a status up by its numeric code.
    pub fn from_code(code: u16) -> Result<Status, Error> {
        Ok(match code {
            100 => Status::NonAnonymousRoom,
            101 => Status::AffiliationChange,
            102 => Status::ConfigShowsUnavailableMembers,
            103 => Status::ConfigHidesUnavailableMembers,
            104 => Status::ConfigNonPrivacyRelated,
            110 => Status::SelfPresence,
            170 => Status::ConfigRoomLoggingEnabled,
            171 => Status::ConfigRoomLoggingDisabled,
            172 => Status::ConfigRoomNonAnonymous,
            173 => Status::ConfigRoomSemiAnonymous,
            201 => Status::RoomHasBeenCreated,
            210 => Status::AssignedNick,
            301 => Status::Banned,
            303 => Status::NewNick,
            307 => Status::Kicked,
            321 => Status::RemovalFromRoom,
            322 => Status::ConfigMembersOnly,
            332 => Status::ServiceShutdown,
            333 => Status::ServiceErrorKick,
            _ => return Err(Error::ParseError("Invalid status code value.")),
        })
    }
}

impl TryFrom<Element> for Status {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Status, Error> {
        check_self!(elem, "status", MUC_USER);
        check_no_children!(elem, "status");
        check_no_unknown_attributes!(elem, "status", ["code"]);
        Status::from_code(get_attr!(elem, "code", Required))
    }
}

impl From<Status> for Element {
    fn from(status: Status) -> Element {
        Element::builder("status", ns::MUC_USER)
            .attr("code", format!("{}", status.code()))
            .build()
    }
}

/// Optional `<actor/>` element inside `<item/>` elements, attributing an
/// administrative action either to a real JID or to a roomnick.
#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    /// The full JID associated with this user.
    Jid(FullJid),

    /// The nickname of this user.
    Nick(String),
}

impl TryFrom<Element> for Actor {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Actor, Error> {
        check_self!(elem, "actor", MUC_USER);
        check_no_unknown_attributes!(elem, "actor", ["jid", "nick"]);
        check_no_children!(elem, "actor");
        let jid: Option<FullJid> = get_attr!(elem, "jid", Option);
        let nick = get_attr!(elem, "nick", Option);

        match (jid, nick) {
            (Some(_), Some(_)) | (None, None) => Err(Error::ParseError(
                "Either 'jid' or 'nick' attribute is required.",
            )),
            (Some(jid), _) => Ok(Actor::Jid(jid)),
            (_, Some(nick)) => Ok(Actor::Nick(nick)),
        }
    }
}

impl From<Actor> for Element {
    fn from(actor: Actor) -> Element {
        let elem = Element::builder("actor", ns::MUC_USER);

        (match actor {
            Actor::Jid(jid) => elem.attr("jid", jid),
            Actor::Nick(nick) => elem.attr("nick", nick),
        })
        .build()
    }
}

/// Used to continue a one-to-one discussion in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Continue {
    /// The thread to continue in this room.
    pub thread: Option<String>,
}

impl TryFrom<Element> for Continue {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Continue, Error> {
        check_self!(elem, "continue", MUC_USER);
        check_no_children!(elem, "continue");
        check_no_unknown_attributes!(elem, "continue", ["thread"]);
        Ok(Continue {
            thread: get_attr!(elem, "thread", Option),
        })
    }
}

impl From<Continue> for Element {
    fn from(cont: Continue) -> Element {
        Element::builder("continue", ns::MUC_USER)
            .attr("thread", cont.thread)
            .build()
    }
}

generate_attribute!(
    /// The affiliation of an entity with a room, which isn't tied to its
    /// presence in it.
    Affiliation, "affiliation", {
        /// The user who created the room, or who got appointed by its
        /// creator to be their equal.
        Owner => "owner",

        /// A user who has been empowered by an owner to do administrative
        /// operations.
        Admin => "admin",

        /// A user who is whitelisted to speak in moderated rooms, or to join
        /// a member-only room.
        Member => "member",

        /// A user who has been banned from this room.
        Outcast => "outcast",

        /// A normal participant.
        None => "none",
    }, Default = None
);

generate_attribute!(
    /// The current role of an entity in a room, it can be changed by an
    /// owner or an administrator but will be lost once they leave the room.
    Role, "role", {
        /// This user can kick other participants, as well as grant and
        /// revoke them voice.
        Moderator => "moderator",

        /// A user who can speak in this room.
        Participant => "participant",

        /// A user who cannot speak in this room, and must request voice
        /// before doing so.
        Visitor => "visitor",

        /// A user who is absent from the room.
        None => "none",
    }, Default = None
);

/// An item representing a user in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// The affiliation of this user with the room.
    pub affiliation: Affiliation,

    /// The real JID of this user, if you are allowed to see it.
    pub jid: Option<FullJid>,

    /// The current nickname of this user.
    pub nick: Option<String>,

    /// The current role of this user.
    pub role: Role,

    /// The actor affected by this item.
    pub actor: Option<Actor>,

    /// Whether this continues a one-to-one discussion.
    pub continue_: Option<Continue>,

    /// A reason for this item.
    pub reason: Option<String>,
}

impl Item {
    /// Creates a new item with the given affiliation and role.
    pub fn new(affiliation: Affiliation, role: Role) -> Item {
        Item {
            affiliation,
            role,
            jid: None,
            nick: None,
            actor: None,
            continue_: None,
            reason: None,
        }
    }
}

impl TryFrom<Element> for Item {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Item, Error> {
        check_self!(elem, "item", MUC_USER);
        check_no_unknown_attributes!(elem, "item", ["affiliation", "jid", "nick", "role"]);
        let mut item = Item {
            affiliation: get_attr!(elem, "affiliation", Default),
            jid: get_attr!(elem, "jid", Option),
            nick: get_attr!(elem, "nick", Option),
            role: get_attr!(elem, "role", Default),
            actor: None,
            continue_: None,
            reason: None,
        };
        for child in elem.children() {
            if child.is("actor", ns::MUC_USER) {
                item.actor = Some(Actor::try_from(child.clone())?);
            } else if child.is("continue", ns::MUC_USER) {
                item.continue_ = Some(Continue::try_from(child.clone())?);
            } else if child.is("reason", ns::MUC_USER) {
                item.reason = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in item element."));
            }
        }
        Ok(item)
    }
}

impl From<Item> for Element {
    fn from(item: Item) -> Element {
        Element::builder("item", ns::MUC_USER)
            .attr("affiliation", item.affiliation)
            .attr("jid", item.jid)
            .attr("nick", item.nick)
            .attr("role", item.role)
            .append_all(item.actor.map(Element::from))
            .append_all(item.continue_.map(Element::from))
            .append_all(item.reason.map(|reason| {
                Element::builder("reason", ns::MUC_USER)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// A mediated invitation to a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    /// The invitee, on the sending side.
    pub to: Option<Jid>,

    /// The inviter, on the receiving side.
    pub from: Option<Jid>,

    /// The reason for the invitation.
    pub reason: Option<String>,
}

impl TryFrom<Element> for Invite {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Invite, Error> {
        check_self!(elem, "invite", MUC_USER);
        check_no_unknown_attributes!(elem, "invite", ["to", "from"]);
        let mut invite = Invite {
            to: get_attr!(elem, "to", Option),
            from: get_attr!(elem, "from", Option),
            reason: None,
        };
        for child in elem.children() {
            if child.is("reason", ns::MUC_USER) {
                invite.reason = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in invite element."));
            }
        }
        Ok(invite)
    }
}

impl From<Invite> for Element {
    fn from(invite: Invite) -> Element {
        Element::builder("invite", ns::MUC_USER)
            .attr("to", invite.to)
            .attr("from", invite.from)
            .append_all(invite.reason.map(|reason| {
                Element::builder("reason", ns::MUC_USER)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// A declined mediated invitation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decline {
    /// The original inviter, on the sending side.
    pub to: Option<Jid>,

    /// The decliner, on the receiving side.
    pub from: Option<Jid>,

    /// The reason for declining.
    pub reason: Option<String>,
}

impl TryFrom<Element> for Decline {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Decline, Error> {
        check_self!(elem, "decline", MUC_USER);
        check_no_unknown_attributes!(elem, "decline", ["to", "from"]);
        let mut decline = Decline {
            to: get_attr!(elem, "to", Option),
            from: get_attr!(elem, "from", Option),
            reason: None,
        };
        for child in elem.children() {
            if child.is("reason", ns::MUC_USER) {
                decline.reason = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in decline element."));
            }
        }
        Ok(decline)
    }
}

impl From<Decline> for Element {
    fn from(decline: Decline) -> Element {
        Element::builder("decline", ns::MUC_USER)
            .attr("to", decline.to)
            .attr("from", decline.from)
            .append_all(decline.reason.map(|reason| {
                Element::builder("reason", ns::MUC_USER)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// Notification that a room got destroyed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Destroy {
    /// An alternative venue, when the room moved.
    pub jid: Option<BareJid>,

    /// The reason for the destruction.
    pub reason: Option<String>,
}

impl TryFrom<Element> for Destroy {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Destroy, Error> {
        check_self!(elem, "destroy", MUC_USER);
        check_no_unknown_attributes!(elem, "destroy", ["jid"]);
        let mut destroy = Destroy {
            jid: get_attr!(elem, "jid", Option),
            reason: None,
        };
        for child in elem.children() {
            if child.is("reason", ns::MUC_USER) {
                destroy.reason = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in destroy element."));
            }
        }
        Ok(destroy)
    }
}

impl From<Destroy> for Element {
    fn from(destroy: Destroy) -> Element {
        Element::builder("destroy", ns::MUC_USER)
            .attr("jid", destroy.jid)
            .append_all(destroy.reason.map(|reason| {
                Element::builder("reason", ns::MUC_USER)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// The `<x/>` element of the muc#user namespace, carried by presences and
/// messages fanned out by a room.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MucUser {
    /// List of statuses applying to this item.
    pub status: Vec<Status>,

    /// List of items.
    pub items: Vec<Item>,

    /// Mediated invitations carried by this message.
    pub invites: Vec<Invite>,

    /// A declined invitation.
    pub decline: Option<Decline>,

    /// A room destruction notification.
    pub destroy: Option<Destroy>,

    /// The password to a room, sent along a mediated invitation.
    pub password: Option<String>,
}

impl MessagePayload for MucUser {}
impl PresencePayload for MucUser {}

impl MucUser {
    /// Whether the given status code is present.
    pub fn has_status(&self, status: Status) -> bool {
        self.status.contains(&status)
    }
}

impl TryFrom<Element> for MucUser {
    type Error = Error;

    fn try_from(elem: Element) -> Result<MucUser, Error> {
        check_self!(elem, "x", MUC_USER);
        check_no_attributes!(elem, "x");
        let mut muc_user = MucUser::default();
        for child in elem.children() {
            if child.is("status", ns::MUC_USER) {
                muc_user.status.push(Status::try_from(child.clone())?);
            } else if child.is("item", ns::MUC_USER) {
                muc_user.items.push(Item::try_from(child.clone())?);
            } else if child.is("invite", ns::MUC_USER) {
                muc_user.invites.push(Invite::try_from(child.clone())?);
            } else if child.is("decline", ns::MUC_USER) {
                if muc_user.decline.is_some() {
                    return Err(Error::ParseError("More than one decline in x element."));
                }
                muc_user.decline = Some(Decline::try_from(child.clone())?);
            } else if child.is("destroy", ns::MUC_USER) {
                if muc_user.destroy.is_some() {
                    return Err(Error::ParseError("More than one destroy in x element."));
                }
                muc_user.destroy = Some(Destroy::try_from(child.clone())?);
            } else if child.is("password", ns::MUC_USER) {
                muc_user.password = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in x element."));
            }
        }
        Ok(muc_user)
    }
}

impl From<MucUser> for Element {
    fn from(muc_user: MucUser) -> Element {
        Element::builder("x", ns::MUC_USER)
            .append_all(muc_user.items.into_iter().map(Element::from))
            .append_all(muc_user.status.into_iter().map(Element::from))
            .append_all(muc_user.invites.into_iter().map(Element::from))
            .append_all(muc_user.decline.map(Element::from))
            .append_all(muc_user.destroy.map(Element::from))
            .append_all(muc_user.password.map(|password| {
                Element::builder("password", ns::MUC_USER)
                    .append(password)
                    .build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_join() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc#user'><item affiliation='owner' role='moderator'/><status code='110'/><status code='201'/></x>"
            .parse()
            .unwrap();
        let muc_user = MucUser::try_from(elem).unwrap();
        assert_eq!(muc_user.items.len(), 1);
        assert_eq!(muc_user.items[0].affiliation, Affiliation::Owner);
        assert_eq!(muc_user.items[0].role, Role::Moderator);
        assert!(muc_user.has_status(Status::SelfPresence));
        assert!(muc_user.has_status(Status::RoomHasBeenCreated));
        assert!(!muc_user.has_status(Status::Kicked));
    }

    #[test]
    fn test_invalid_status_code() {
        let elem: Element =
            "<x xmlns='http://jabber.org/protocol/muc#user'><status code='666'/></x>"
                .parse()
                .unwrap();
        let error = MucUser::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Invalid status code value.");
    }

    #[test]
    fn test_mediated_invite() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc#user'><invite from='crone1@shakespeare.lit/desktop'><reason>Hey Hecate</reason></invite><password>cauldronburn</password></x>"
            .parse()
            .unwrap();
        let muc_user = MucUser::try_from(elem).unwrap();
        assert_eq!(muc_user.invites.len(), 1);
        assert_eq!(muc_user.invites[0].reason.as_deref(), Some("Hey Hecate"));
        assert_eq!(muc_user.password.as_deref(), Some("cauldronburn"));
    }

    #[test]
    fn test_kick() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc#user'><item affiliation='none' role='none'><actor nick='Fluellen'/><reason>Avaunt, you cullion!</reason></item><status code='307'/></x>"
            .parse()
            .unwrap();
        let muc_user = MucUser::try_from(elem).unwrap();
        assert!(muc_user.has_status(Status::Kicked));
        let item = &muc_user.items[0];
        assert_eq!(item.role, Role::None);
        assert_eq!(item.actor, Some(Actor::Nick(String::from("Fluellen"))));
        assert_eq!(item.reason.as_deref(), Some("Avaunt, you cullion!"));
    }

    #[test]
    fn test_roundtrip() {
        let elem: Element = "<x xmlns='http://jabber.org/protocol/muc#user'><item affiliation='member' role='participant' jid='hag66@shakespeare.lit/pda' nick='thirdwitch'/><status code='110'/></x>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let muc_user = MucUser::try_from(elem).unwrap();
        let elem2 = Element::from(muc_user);
        assert_eq!(elem1, elem2);
    }
}
