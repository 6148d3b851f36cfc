// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The inbound pipeline: session events in, filter chain, built-in
//! semantics, typed events out.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::message::{Message, MessageType};
use jabber_stanzas::ns;
use jabber_stanzas::presence::{Presence, PresenceType};
use jabber_stanzas::roster::Roster as RosterQuery;
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::{SessionEvent, Stanza};

use crate::callbacks::SubscriptionDecision;
use crate::event::{ChatMessage, Event};
use crate::presence::classify_availability;
use crate::roster::push_sender_is_trusted;
use crate::Client;

pub(crate) async fn dispatch_loop(
    client: Client,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Online { .. } => {
                client.emit(Event::Connection(client.session().state()));
                if client.auto_restore() {
                    if let Err(e) = client.restore_session_state().await {
                        warn!("cannot restore session state: {}", e);
                    }
                }
            }
            SessionEvent::Stanza(stanza) => handle_stanza(&client, stanza),
            SessionEvent::ParseError(e) => client.emit(Event::Error(Arc::new(e))),
            SessionEvent::Disconnected(e) => {
                client.emit(Event::Disconnected(Arc::new(e)));
                client.emit(Event::Connection(client.session().state()));
            }
        }
    }
}

fn handle_stanza(client: &Client, mut stanza: Stanza) {
    if client.registry().run_input_filters(&mut stanza) {
        return;
    }
    match stanza {
        Stanza::Iq(iq) => handle_iq(client, iq),
        Stanza::Message(message) => handle_message(client, message),
        Stanza::Presence(presence) => handle_presence(client, presence),
    }
}

/// Get and Set requests which no extension claimed. Responses never land
/// here; the session resolves them against its pending table.
fn handle_iq(client: &Client, iq: Iq) {
    let payload = match &iq.payload {
        IqType::Set(payload) if payload.is("query", ns::ROSTER) => {
            handle_roster_push(client, &iq);
            return;
        }
        IqType::Get(payload) | IqType::Set(payload) => payload.clone(),
        _ => return,
    };

    // One consumer may field unknown requests; everyone else gets the
    // polite refusal of RFC 6120 §8.4.
    let reply = match client
        .callbacks()
        .answer_custom_iq(iq.from.as_ref(), &payload)
    {
        Some(Some(result_payload)) => Iq {
            from: None,
            to: iq.from.clone(),
            id: iq.id.clone(),
            payload: IqType::Result(Some(result_payload)),
        },
        Some(None) | None => {
            let mut reply = Iq::from_error(
                iq.id.clone(),
                StanzaError::new(
                    ErrorType::Cancel,
                    DefinedCondition::ServiceUnavailable,
                    "en",
                    None,
                ),
            );
            reply.to = iq.from.clone();
            reply
        }
    };
    if let Err(e) = client.session().send_iq_response(reply) {
        warn!("cannot answer iq: {}", e);
    }
}

fn handle_roster_push(client: &Client, iq: &Iq) {
    // Pushes must come from the account itself; anything else is an
    // injection attempt and is dropped on the floor.
    if !push_sender_is_trusted(iq.from.as_ref(), client.session().jid().as_ref()) {
        debug!("ignoring roster push from untrusted sender");
        return;
    }
    let payload = match &iq.payload {
        IqType::Set(payload) => payload.clone(),
        _ => return,
    };
    let query = match RosterQuery::try_from(payload) {
        Ok(query) => query,
        Err(e) => {
            debug!("invalid roster push: {}", e);
            return;
        }
    };
    for item in query.items {
        client.roster().apply_push(&item);
        client.emit(Event::RosterUpdated(item));
    }
    let mut reply = Iq::empty_result(iq.id.clone());
    reply.to = iq.from.clone();
    if let Err(e) = client.session().send_iq_response(reply) {
        warn!("cannot acknowledge roster push: {}", e);
    }
}

fn handle_message(client: &Client, message: Message) {
    if message.type_ == MessageType::Error {
        let error = message
            .payloads
            .iter()
            .find(|payload| payload.is("error", ns::DEFAULT_NS))
            .and_then(|payload| StanzaError::try_from(payload.clone()).ok());
        client.emit(Event::ErrorMessage {
            from: message.from,
            error,
        });
        return;
    }

    let body = match message.get_best_body(&client.preferred_langs()) {
        Some((_, body)) => body.0.clone(),
        None => return,
    };
    let timestamp = message
        .payloads
        .iter()
        .find(|payload| payload.is("delay", ns::DELAY))
        .and_then(|payload| jabber_stanzas::delay::Delay::try_from(payload.clone()).ok())
        .map(|delay| delay.stamp);
    client.emit(Event::Message(ChatMessage {
        id: message.id.clone(),
        from: message.from.clone(),
        body,
        timestamp,
        groupchat: message.type_ == MessageType::Groupchat,
    }));
}

fn handle_presence(client: &Client, presence: Presence) {
    let from = match presence.from.clone() {
        Some(from) => from,
        None => return,
    };
    match presence.type_ {
        PresenceType::None | PresenceType::Unavailable => {
            client.emit(Event::StatusChanged {
                jid: from,
                availability: classify_availability(&presence),
                priority: presence.priority,
                statuses: presence.statuses,
            });
        }
        PresenceType::Subscribe => {
            // The decision is the consumer's; silence by default.
            match client.callbacks().decide_subscription(&from) {
                SubscriptionDecision::Approve => {
                    if let Err(e) = client.approve_subscription(&from.to_bare()) {
                        warn!("cannot approve subscription: {}", e);
                    }
                }
                SubscriptionDecision::Refuse => {
                    if let Err(e) = client.refuse_subscription(&from.to_bare()) {
                        warn!("cannot refuse subscription: {}", e);
                    }
                }
                SubscriptionDecision::Ignore => (),
            }
        }
        PresenceType::Subscribed => {
            client.forget_pending_subscription(&from.to_bare());
            client.emit(Event::SubscriptionApproved(from.to_bare()));
        }
        PresenceType::Unsubscribed => {
            // A denial of our own pending request reads differently from a
            // later revocation.
            if client.forget_pending_subscription(&from.to_bare()) {
                client.emit(Event::SubscriptionRefused(from.to_bare()));
            } else {
                client.emit(Event::Unsubscribed(from.to_bare()));
            }
        }
        PresenceType::Unsubscribe => {
            client.emit(Event::Unsubscribed(from.to_bare()));
        }
        PresenceType::Probe | PresenceType::Error => {
            debug!("ignoring {} presence from {}", presence.type_, from);
        }
    }
}
