// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use jabber_stanzas::activity::General;
use jabber_stanzas::chatstates::ChatState;
use jabber_stanzas::jid::{BareJid, Jid};
use jabber_stanzas::mood::Mood;
use jabber_stanzas::muc::{Item as MucItem, Status as MucStatus};
use jabber_stanzas::roster::Item as RosterItem;
use jabber_stanzas::stanza_error::StanzaError;
use jabber_stanzas::tune::Tune;
use tokio_jabber::{Error, SessionState};

/// A received one-to-one or group chat message, decoded for the consumer.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// The stanza id of the message.
    pub id: Option<String>,

    /// The sender.
    pub from: Option<Jid>,

    /// The selected body text.
    pub body: String,

    /// When the message was originally sent, for delayed deliveries.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Whether this message came out of a groupchat.
    pub groupchat: bool,
}

/// An invitation to a chatroom, mediated by the room or sent directly.
#[derive(Debug, Clone)]
pub struct GroupInvite {
    /// The room the recipient is invited to.
    pub room: BareJid,

    /// The inviter, when disclosed.
    pub from: Option<Jid>,

    /// The reason for the invitation.
    pub reason: Option<String>,

    /// The room password, if one is needed.
    pub password: Option<String>,

    /// Whether this was a direct invitation (XEP-0249) rather than a
    /// mediated one.
    pub direct: bool,
}

/// Everything the library reports to its consumers.
///
/// Events are broadcast: every subscribed receiver gets its own copy.
#[derive(Debug, Clone)]
pub enum Event {
    /// The connection lifecycle moved to a new state.
    Connection(SessionState),

    /// A contact's availability changed.
    StatusChanged {
        /// The full JID the presence came from.
        jid: Jid,
        /// Whether the contact is available at all, and how.
        availability: Availability,
        /// The resource priority.
        priority: i8,
        /// Status texts, per language.
        statuses: BTreeMap<String, String>,
    },

    /// A chat message arrived.
    Message(ChatMessage),

    /// A message of type error arrived.
    ErrorMessage {
        /// The bounced sender.
        from: Option<Jid>,
        /// The error condition, when parsable.
        error: Option<StanzaError>,
    },

    /// The roster changed, either by our doing or from another resource.
    RosterUpdated(RosterItem),

    /// The contact accepted our presence subscription request.
    SubscriptionApproved(BareJid),

    /// The contact denied our presence subscription request.
    SubscriptionRefused(BareJid),

    /// The contact cancelled our subscription or unsubscribed from us.
    Unsubscribed(BareJid),

    /// A room subject was set or changed.
    GroupChatSubjectChanged {
        /// The room.
        room: BareJid,
        /// The nick which set the subject, if any.
        nick: Option<String>,
        /// The new subject.
        subject: String,
    },

    /// An occupant's presence in a room changed.
    GroupPresenceChanged {
        /// The room.
        room: BareJid,
        /// The occupant nickname.
        nick: Option<String>,
        /// False when this is an unavailable presence.
        available: bool,
        /// The item carried in the muc#user envelope.
        item: Option<MucItem>,
        /// The full status code set of the presence.
        statuses: Vec<MucStatus>,
    },

    /// We got invited to a room.
    GroupInviteReceived(GroupInvite),

    /// Someone declined our invitation.
    GroupInviteDeclined {
        /// The room.
        room: BareJid,
        /// The decliner.
        from: Option<Jid>,
        /// The reason given.
        reason: Option<String>,
    },

    /// A room-related stanza bounced with an error.
    GroupMucError {
        /// The room.
        room: BareJid,
        /// The error returned by the service.
        error: StanzaError,
    },

    /// A contact published a mood.
    MoodChanged {
        /// The publishing contact.
        from: BareJid,
        /// The new mood, absent for a retraction.
        mood: Option<Mood>,
        /// The accompanying text.
        text: Option<String>,
    },

    /// A contact published an activity.
    ActivityChanged {
        /// The publishing contact.
        from: BareJid,
        /// The general activity category, absent for a retraction.
        general: Option<General>,
        /// The specific activity.
        specific: Option<String>,
        /// The accompanying text.
        text: Option<String>,
    },

    /// A contact published the tune they are listening to.
    Tune {
        /// The publishing contact.
        from: BareJid,
        /// The tune; empty when the broadcast stops.
        tune: Tune,
    },

    /// A chat peer's composing state changed.
    ChatStateChanged {
        /// The peer.
        from: Jid,
        /// The new state.
        state: ChatState,
    },

    /// Bytes moved on a file transfer.
    FileTransferProgress {
        /// The transfer session.
        sid: String,
        /// The file name of the transfer.
        name: String,
        /// Bytes moved so far.
        transferred: u64,
        /// Total bytes expected.
        total: u64,
    },

    /// A file transfer ended before completion.
    FileTransferAborted {
        /// The transfer session.
        sid: String,
    },

    /// A non-fatal error, e.g. one unparsable inbound stanza.
    Error(Arc<Error>),

    /// The session went away, orderly or not.
    Disconnected(Arc<Error>),
}

/// How available a contact is. `Offline` is deliberately absent: leaving is
/// done by closing the session, not by setting a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Online, no particular state.
    Available,

    /// Actively interested in chatting.
    Chat,

    /// Temporarily away.
    Away,

    /// Away for an extended period.
    ExtendedAway,

    /// Busy, do not disturb.
    DoNotDisturb,

    /// Gone; only seen on inbound unavailable presences.
    Unavailable,
}
