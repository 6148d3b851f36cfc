// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Multi-user chat (XEP-0045): the room lifecycle, administration, invites
//! and the event fan-out for everything a room sends us.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use jabber_stanzas::data_forms::{DataForm, DataFormType, Field, FieldType};
use jabber_stanzas::disco::{DiscoInfoResult, Item as DiscoItem};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::{BareJid, Jid};
use jabber_stanzas::message::{Message, MessageType};
use jabber_stanzas::muc::{
    AdminItem, AdminQuery, Affiliation, Decline, DirectInvite, History, Invite, Muc, MucUser,
    OwnerDestroy, OwnerQuery, Role,
};
use jabber_stanzas::ns;
use jabber_stanzas::presence::{Presence, PresenceType};
use tokio_jabber::{Error, Stanza};

use crate::disco::ServiceDiscovery;
use crate::event::{Event, GroupInvite};
use crate::extension::{Extension, ExtensionContext};

const ROOM_CONFIG_FORM_TYPE: &str = "http://jabber.org/protocol/muc#roomconfig";
const VOICE_REQUEST_FORM_TYPE: &str = "http://jabber.org/protocol/muc#request";

/// The multi-user chat extension.
pub struct MucChat {
    ctx: ExtensionContext,
    disco: Arc<ServiceDiscovery>,
    // room -> our nickname in it.
    rooms: Mutex<HashMap<BareJid, String>>,
}

impl MucChat {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "MultiUserChat";

    pub(crate) fn new(ctx: ExtensionContext, disco: Arc<ServiceDiscovery>) -> MucChat {
        MucChat {
            ctx,
            disco,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn room_jid(room: &BareJid, nick: &str) -> Result<Jid, Error> {
        room.with_resource(nick)
            .map(Jid::from)
            .map_err(|_| Error::InvalidArgument("invalid room nickname"))
    }

    /// The rooms this session joined, with the nickname used in each.
    pub fn joined_rooms(&self) -> Vec<(BareJid, String)> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .map(|(room, nick)| (room.clone(), nick.clone()))
            .collect()
    }

    /// Lists the rooms a conference service hosts.
    pub async fn discover_rooms(&self, service: Jid) -> Result<Vec<DiscoItem>, Error> {
        Ok(self.disco.items(service).await?.items)
    }

    /// Fetches a room's identity, features and extended information.
    pub async fn room_info(&self, room: &BareJid) -> Result<DiscoInfoResult, Error> {
        self.disco.info(room.clone().into(), None).await
    }

    /// Enters a room under the given nickname. The outcome arrives as
    /// [`Event::GroupPresenceChanged`] (or [`Event::GroupMucError`]).
    pub fn join_room(
        &self,
        room: BareJid,
        nick: &str,
        password: Option<&str>,
        history: Option<History>,
    ) -> Result<(), Error> {
        let mut envelope = Muc::new();
        if let Some(password) = password {
            envelope = envelope.with_password(password);
        }
        if let Some(history) = history {
            envelope = envelope.with_history(history);
        }
        let presence = Presence::available()
            .with_to(Self::room_jid(&room, nick)?)
            .with_payload(envelope);
        self.ctx.send_stanza(Stanza::Presence(presence))?;
        self.rooms.lock().unwrap().insert(room, String::from(nick));
        Ok(())
    }

    /// Leaves a room.
    pub fn leave_room(&self, room: &BareJid) -> Result<(), Error> {
        let nick = self
            .rooms
            .lock()
            .unwrap()
            .remove(room)
            .ok_or(Error::InvalidArgument("not in this room"))?;
        let presence =
            Presence::new(PresenceType::Unavailable).with_to(Self::room_jid(room, &nick)?);
        self.ctx.send_stanza(Stanza::Presence(presence))
    }

    /// Changes the subject of a room.
    pub fn edit_room_subject(&self, room: &BareJid, subject: &str) -> Result<(), Error> {
        let mut message = Message::groupchat(Jid::from(room.clone()));
        message.subjects.insert(
            String::new(),
            jabber_stanzas::message::Subject(String::from(subject)),
        );
        self.ctx.send_stanza(Stanza::Message(message))
    }

    /// Invites a contact to a room through the room (mediated invitation).
    pub fn send_invite(
        &self,
        room: &BareJid,
        invitee: Jid,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let envelope = MucUser {
            invites: vec![Invite {
                to: Some(invitee),
                from: None,
                reason: reason.map(String::from),
            }],
            ..MucUser::default()
        };
        let message = Message::normal(Jid::from(room.clone())).with_payload(envelope);
        self.ctx.send_stanza(Stanza::Message(message))
    }

    /// Invites a contact directly (XEP-0249), bypassing the room.
    pub fn send_direct_invite(
        &self,
        room: BareJid,
        invitee: Jid,
        password: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let invite = DirectInvite {
            jid: room,
            password: password.map(String::from),
            reason: reason.map(String::from),
        };
        let message = Message::normal(invitee).with_payload(invite);
        self.ctx.send_stanza(Stanza::Message(message))
    }

    /// Declines a mediated invitation.
    pub fn decline_invite(
        &self,
        room: &BareJid,
        inviter: Option<Jid>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let envelope = MucUser {
            decline: Some(Decline {
                to: inviter,
                from: None,
                reason: reason.map(String::from),
            }),
            ..MucUser::default()
        };
        let message = Message::normal(Jid::from(room.clone())).with_payload(envelope);
        self.ctx.send_stanza(Stanza::Message(message))
    }

    async fn admin_set(&self, room: &BareJid, item: AdminItem) -> Result<(), Error> {
        let query = AdminQuery { items: vec![item] };
        let iq = Iq::from_set("muc-admin", query).with_to(Jid::from(room.clone()));
        self.ctx.iq_request(iq).await?;
        Ok(())
    }

    /// Changes the role of an occupant, by nickname.
    pub async fn set_role(
        &self,
        room: &BareJid,
        nick: &str,
        role: Role,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.admin_set(
            room,
            AdminItem {
                role: Some(role),
                nick: Some(String::from(nick)),
                reason: reason.map(String::from),
                ..AdminItem::default()
            },
        )
        .await
    }

    /// Changes the affiliation of a user, by real JID.
    pub async fn set_affiliation(
        &self,
        room: &BareJid,
        user: Jid,
        affiliation: Affiliation,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.admin_set(
            room,
            AdminItem {
                affiliation: Some(affiliation),
                jid: Some(user),
                reason: reason.map(String::from),
                ..AdminItem::default()
            },
        )
        .await
    }

    /// Kicks an occupant out of the room.
    pub async fn kick_occupant(
        &self,
        room: &BareJid,
        nick: &str,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.set_role(room, nick, Role::None, reason).await
    }

    /// Bans a user from the room.
    pub async fn ban_user(
        &self,
        room: &BareJid,
        user: Jid,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.set_affiliation(room, user, Affiliation::Outcast, reason)
            .await
    }

    /// Grants membership.
    pub async fn add_member(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.set_affiliation(room, user, Affiliation::Member, None)
            .await
    }

    /// Grants admin powers.
    pub async fn add_admin(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.set_affiliation(room, user, Affiliation::Admin, None)
            .await
    }

    /// Strips a user of any affiliation with the room.
    pub async fn remove_user(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.set_affiliation(room, user, Affiliation::None, None)
            .await
    }

    /// Grants voice to a visitor.
    pub async fn grant_voice(&self, room: &BareJid, nick: &str) -> Result<(), Error> {
        self.set_role(room, nick, Role::Participant, None).await
    }

    /// Revokes voice from a participant.
    pub async fn revoke_voice(&self, room: &BareJid, nick: &str) -> Result<(), Error> {
        self.set_role(room, nick, Role::Visitor, None).await
    }

    async fn admin_list(&self, room: &BareJid, item: AdminItem) -> Result<Vec<AdminItem>, Error> {
        let query = AdminQuery { items: vec![item] };
        let iq = Iq::from_get("muc-admin-list", query).with_to(Jid::from(room.clone()));
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(AdminQuery::try_from(payload)?.items),
            _ => Err(Error::InvalidState),
        }
    }

    /// The occupants currently holding the given role.
    pub async fn occupants_by_role(
        &self,
        room: &BareJid,
        role: Role,
    ) -> Result<Vec<AdminItem>, Error> {
        self.admin_list(
            room,
            AdminItem {
                role: Some(role),
                ..AdminItem::default()
            },
        )
        .await
    }

    /// The users holding the given affiliation.
    pub async fn users_by_affiliation(
        &self,
        room: &BareJid,
        affiliation: Affiliation,
    ) -> Result<Vec<AdminItem>, Error> {
        self.admin_list(
            room,
            AdminItem {
                affiliation: Some(affiliation),
                ..AdminItem::default()
            },
        )
        .await
    }

    /// Every occupant of the room, across all roles.
    pub async fn all_occupants(&self, room: &BareJid) -> Result<Vec<AdminItem>, Error> {
        let mut occupants = vec![];
        for role in [Role::Moderator, Role::Participant, Role::Visitor] {
            occupants.extend(self.occupants_by_role(room, role).await?);
        }
        Ok(occupants)
    }

    /// Fetches the room configuration form, for an owner.
    pub async fn room_config(&self, room: &BareJid) -> Result<DataForm, Error> {
        let iq = Iq::from_get("muc-owner-config", OwnerQuery::default())
            .with_to(Jid::from(room.clone()));
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => OwnerQuery::try_from(payload)?
                .form
                .ok_or(Error::InvalidState),
            _ => Err(Error::InvalidState),
        }
    }

    /// Submits a completed room configuration form.
    pub async fn submit_room_config(&self, room: &BareJid, mut form: DataForm) -> Result<(), Error> {
        form.type_ = DataFormType::Submit;
        let query = OwnerQuery {
            form: Some(form),
            destroy: None,
        };
        let iq = Iq::from_set("muc-owner-config", query).with_to(Jid::from(room.clone()));
        self.ctx.iq_request(iq).await?;
        Ok(())
    }

    /// Accepts the default configuration of a freshly created room.
    pub async fn request_instant_room(&self, room: &BareJid) -> Result<(), Error> {
        let form = DataForm::new(DataFormType::Submit, ROOM_CONFIG_FORM_TYPE, vec![]);
        self.submit_room_config(room, form).await
    }

    /// Destroys a room, for an owner.
    pub async fn destroy_room(
        &self,
        room: &BareJid,
        alternative: Option<BareJid>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        let query = OwnerQuery {
            form: None,
            destroy: Some(OwnerDestroy {
                jid: alternative,
                reason: reason.map(String::from),
            }),
        };
        let iq = Iq::from_set("muc-owner-destroy", query).with_to(Jid::from(room.clone()));
        self.ctx.iq_request(iq).await?;
        self.rooms.lock().unwrap().remove(room);
        Ok(())
    }

    /// Asks the moderators for voice, as a visitor.
    pub fn request_voice(&self, room: &BareJid) -> Result<(), Error> {
        let form = DataForm::new(
            DataFormType::Submit,
            VOICE_REQUEST_FORM_TYPE,
            vec![Field {
                var: Some(String::from("muc#role")),
                type_: FieldType::ListSingle,
                label: None,
                required: false,
                options: vec![],
                values: vec![String::from("participant")],
            }],
        );
        let mut message = Message::normal(Jid::from(room.clone()));
        message.payloads.push(form.into());
        self.ctx.send_stanza(Stanza::Message(message))
    }

    fn is_known_room(&self, jid: &Jid) -> bool {
        self.rooms.lock().unwrap().contains_key(&jid.to_bare())
    }

    fn handle_muc_presence(&self, ctx: &ExtensionContext, presence: &Presence) -> bool {
        let from = match &presence.from {
            Some(from) => from.clone(),
            None => return false,
        };

        if presence.type_ == PresenceType::Error {
            if !self.is_known_room(&from) {
                return false;
            }
            let error = presence
                .payloads
                .iter()
                .find(|payload| payload.is("error", ns::DEFAULT_NS))
                .and_then(|payload| {
                    jabber_stanzas::stanza_error::StanzaError::try_from(payload.clone()).ok()
                });
            if let Some(error) = error {
                self.rooms.lock().unwrap().remove(&from.to_bare());
                ctx.emit(Event::GroupMucError {
                    room: from.to_bare(),
                    error,
                });
            }
            return true;
        }

        let envelope = presence
            .payloads
            .iter()
            .find(|payload| payload.is("x", ns::MUC_USER))
            .and_then(|payload| MucUser::try_from(payload.clone()).ok());
        let envelope = match envelope {
            Some(envelope) => envelope,
            None => return false,
        };

        let available = presence.type_ != PresenceType::Unavailable;
        ctx.emit(Event::GroupPresenceChanged {
            room: from.to_bare(),
            nick: from.resource().map(String::from),
            available,
            item: envelope.items.into_iter().next(),
            statuses: envelope.status,
        });
        true
    }

    fn handle_muc_message(&self, ctx: &ExtensionContext, message: &mut Message) -> bool {
        let from = message.from.clone();
        let room = from.as_ref().map(|from| from.to_bare());

        // Errors bounced back by a room.
        if message.type_ == MessageType::Error {
            if let (Some(room), Some(sender)) = (room.clone(), from.as_ref()) {
                if self.is_known_room(sender) {
                    let error = message
                        .payloads
                        .iter()
                        .find(|payload| payload.is("error", ns::DEFAULT_NS))
                        .and_then(|payload| {
                            jabber_stanzas::stanza_error::StanzaError::try_from(payload.clone())
                                .ok()
                        });
                    if let Some(error) = error {
                        ctx.emit(Event::GroupMucError { room, error });
                        return true;
                    }
                }
            }
            return false;
        }

        // Direct invitations.
        match message.extract_payload::<DirectInvite>("x", ns::CONFERENCE) {
            Ok(Some(invite)) => {
                ctx.emit(Event::GroupInviteReceived(GroupInvite {
                    room: invite.jid,
                    from,
                    reason: invite.reason,
                    password: invite.password,
                    direct: true,
                }));
                return true;
            }
            Ok(None) => (),
            Err(e) => {
                debug!("invalid direct invite: {}", e);
                return true;
            }
        }

        // Mediated invitations, declines, and voice-request approvals all
        // ride in the muc#user envelope.
        match message.extract_payload::<MucUser>("x", ns::MUC_USER) {
            Ok(Some(envelope)) => {
                let room = match room {
                    Some(room) => room,
                    None => return true,
                };
                if let Some(invite) = envelope.invites.into_iter().next() {
                    ctx.emit(Event::GroupInviteReceived(GroupInvite {
                        room,
                        from: invite.from,
                        reason: invite.reason,
                        password: envelope.password,
                        direct: false,
                    }));
                } else if let Some(decline) = envelope.decline {
                    ctx.emit(Event::GroupInviteDeclined {
                        room,
                        from: decline.from,
                        reason: decline.reason,
                    });
                }
                return true;
            }
            Ok(None) => (),
            Err(e) => {
                debug!("invalid muc#user payload: {}", e);
                return true;
            }
        }

        // A moderated room forwarding a voice request to us.
        if let Some(index) = message
            .payloads
            .iter()
            .position(|payload| payload.is("x", ns::DATA_FORMS))
        {
            if let Ok(form) = DataForm::try_from(message.payloads[index].clone()) {
                if form.form_type.as_deref() == Some(VOICE_REQUEST_FORM_TYPE) {
                    message.payloads.remove(index);
                    if let (Some(answer), Some(room)) =
                        (ctx.callbacks.answer_voice_request(&form), room)
                    {
                        let mut reply = Message::normal(Jid::from(room));
                        reply.payloads.push(answer.into());
                        if let Err(e) = ctx.send_stanza(Stanza::Message(reply)) {
                            warn!("cannot answer voice request: {}", e);
                        }
                    }
                    return true;
                }
            }
        }

        // Subject changes: a groupchat message with a subject and no body.
        if message.type_ == MessageType::Groupchat
            && !message.subjects.is_empty()
            && message.bodies.is_empty()
        {
            if let Some(room) = room {
                let subject = message
                    .get_best_subject(&[])
                    .map(|(_, subject)| subject.0.clone())
                    .unwrap_or_default();
                ctx.emit(Event::GroupChatSubjectChanged {
                    room,
                    nick: from.as_ref().and_then(|f| f.resource()).map(String::from),
                    subject,
                });
            }
            return true;
        }

        false
    }
}

impl Extension for MucChat {
    fn name(&self) -> &'static str {
        MucChat::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::MUC, ns::MUC_USER, ns::CONFERENCE]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        match stanza {
            Stanza::Presence(presence) => self.handle_muc_presence(ctx, presence),
            Stanza::Message(message) => self.handle_muc_message(ctx, message),
            Stanza::Iq(_) => false,
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jabber_stanzas::muc::Status;
    use minidom::Element;

    fn muc() -> (MucChat, tokio::sync::broadcast::Receiver<Event>) {
        let ctx = crate::test_support::offline_context();
        let events = ctx.events.subscribe();
        let disco = Arc::new(ServiceDiscovery::new(ctx.clone()));
        (MucChat::new(ctx, disco), events)
    }

    fn presence(xml: &str) -> Presence {
        let elem: Element = xml.parse().unwrap();
        Presence::try_from(elem).unwrap()
    }

    fn message(xml: &str) -> Message {
        let elem: Element = xml.parse().unwrap();
        Message::try_from(elem).unwrap()
    }

    #[test]
    fn test_occupant_presence() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Presence(presence(
            "<presence xmlns='jabber:client' from='room@conf.test/alice'><x xmlns='http://jabber.org/protocol/muc#user'><item affiliation='owner' role='moderator'/><status code='110'/><status code='201'/></x></presence>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupPresenceChanged {
                room,
                nick,
                available,
                item,
                statuses,
            }) => {
                assert_eq!(room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(nick.as_deref(), Some("alice"));
                assert!(available);
                let item = item.unwrap();
                assert_eq!(item.affiliation, Affiliation::Owner);
                assert_eq!(item.role, Role::Moderator);
                assert!(statuses.contains(&Status::SelfPresence));
                assert!(statuses.contains(&Status::RoomHasBeenCreated));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_plain_presence_not_consumed() {
        let (muc, _) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Presence(presence(
            "<presence xmlns='jabber:client' from='bob@test/pda'/>",
        ));
        assert!(!muc.input_filter(&ctx, &mut stanza));
    }

    #[test]
    fn test_subject_change() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Message(message(
            "<message xmlns='jabber:client' from='room@conf.test/alice' type='groupchat'><subject>welcome</subject></message>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupChatSubjectChanged {
                room,
                nick,
                subject,
            }) => {
                assert_eq!(room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(nick.as_deref(), Some("alice"));
                assert_eq!(subject, "welcome");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_groupchat_body_not_consumed() {
        let (muc, _) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Message(message(
            "<message xmlns='jabber:client' from='room@conf.test/alice' type='groupchat'><body>hello</body></message>",
        ));
        assert!(!muc.input_filter(&ctx, &mut stanza));
    }

    #[test]
    fn test_mediated_invite() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Message(message(
            "<message xmlns='jabber:client' from='room@conf.test'><x xmlns='http://jabber.org/protocol/muc#user'><invite from='crone@test/desktop'><reason>come</reason></invite><password>pass</password></x></message>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupInviteReceived(invite)) => {
                assert_eq!(invite.room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(invite.from, Some(Jid::new("crone@test/desktop").unwrap()));
                assert_eq!(invite.reason.as_deref(), Some("come"));
                assert_eq!(invite.password.as_deref(), Some("pass"));
                assert!(!invite.direct);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_direct_invite() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Message(message(
            "<message xmlns='jabber:client' from='crone@test/desktop'><x xmlns='jabber:x:conference' jid='room@conf.test' reason='party'/></message>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupInviteReceived(invite)) => {
                assert!(invite.direct);
                assert_eq!(invite.room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(invite.reason.as_deref(), Some("party"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_declined_invite() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        let mut stanza = Stanza::Message(message(
            "<message xmlns='jabber:client' from='room@conf.test'><x xmlns='http://jabber.org/protocol/muc#user'><decline from='hecate@test'><reason>busy</reason></decline></x></message>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupInviteDeclined { room, from, reason }) => {
                assert_eq!(room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(from, Some(Jid::new("hecate@test").unwrap()));
                assert_eq!(reason.as_deref(), Some("busy"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_room_error_after_join() {
        let (muc, mut events) = muc();
        let ctx = muc.ctx.clone();
        muc.rooms.lock().unwrap().insert(
            BareJid::new("room@conf.test").unwrap(),
            String::from("alice"),
        );
        let mut stanza = Stanza::Presence(presence(
            "<presence xmlns='jabber:client' from='room@conf.test/alice' type='error'><error type='auth'><registration-required xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error></presence>",
        ));
        assert!(muc.input_filter(&ctx, &mut stanza));
        match events.try_recv() {
            Ok(Event::GroupMucError { room, error }) => {
                assert_eq!(room, BareJid::new("room@conf.test").unwrap());
                assert_eq!(
                    error.defined_condition,
                    jabber_stanzas::stanza_error::DefinedCondition::RegistrationRequired
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
