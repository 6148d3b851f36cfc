// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stream initiation (XEP-0095): offering a stream profile and negotiating
//! the byte-stream method over the embedded feature-negotiation form.
//!
//! Profiles plug in; the only one spoken here is file transfer (XEP-0096),
//! registered by the [file transfer coordinator](crate::filetransfer).

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::warn;

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::si::StreamInitiation as SiPayload;
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// A profile able to answer inbound stream-initiation offers.
pub trait SiProfile: Send + Sync {
    /// Decides on an inbound offer: `Ok` carries the answer payload (with
    /// the selected method), `Err` the error to bounce.
    fn handle_offer(
        &self,
        ctx: &ExtensionContext,
        from: Option<&Jid>,
        offer: &SiPayload,
    ) -> Result<SiPayload, StanzaError>;
}

/// The stream-initiation extension.
pub struct StreamInitiation {
    profiles: Mutex<HashMap<String, Arc<dyn SiProfile>>>,
}

impl StreamInitiation {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "StreamInitiation";

    pub(crate) fn new() -> StreamInitiation {
        StreamInitiation {
            profiles: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the handler for one profile namespace.
    pub fn register_profile(&self, profile: &str, handler: Arc<dyn SiProfile>) {
        self.profiles
            .lock()
            .unwrap()
            .insert(String::from(profile), handler);
    }

    /// Sends an offer and returns the peer's answer, which carries the
    /// selected stream method.
    pub async fn send_offer(&self, ctx: &ExtensionContext, to: Jid, offer: SiPayload) -> Result<SiPayload, Error> {
        let iq = Iq::from_set("si-offer", offer).with_to(to);
        let response = ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(SiPayload::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    fn answer(&self, ctx: &ExtensionContext, iq: &Iq, payload: &minidom::Element) {
        let offer = match SiPayload::try_from(payload.clone()) {
            Ok(offer) => offer,
            Err(e) => {
                warn!("invalid si offer: {}", e);
                self.bounce(
                    ctx,
                    iq,
                    StanzaError::new(ErrorType::Modify, DefinedCondition::BadRequest, "en", None),
                );
                return;
            }
        };

        let handler = offer
            .profile
            .as_deref()
            .and_then(|profile| self.profiles.lock().unwrap().get(profile).cloned());
        let verdict = match handler {
            Some(handler) => handler.handle_offer(ctx, iq.from.as_ref(), &offer),
            None => Err(StanzaError::new(
                ErrorType::Cancel,
                DefinedCondition::BadRequest,
                "en",
                Some(String::from("Unknown SI profile")),
            )),
        };

        let mut reply = match verdict {
            Ok(answer) => Iq::from_result(iq.id.clone(), Some(answer)),
            Err(error) => Iq::from_error(iq.id.clone(), error),
        };
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer si offer: {}", e);
        }
    }

    fn bounce(&self, ctx: &ExtensionContext, iq: &Iq, error: StanzaError) {
        let mut reply = Iq::from_error(iq.id.clone(), error);
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot bounce si offer: {}", e);
        }
    }
}

impl Extension for StreamInitiation {
    fn name(&self) -> &'static str {
        StreamInitiation::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::SI, ns::FEATURE_NEG]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let iq = match stanza {
            Stanza::Iq(iq) => iq,
            _ => return false,
        };
        let payload = match &iq.payload {
            IqType::Set(payload) | IqType::Get(payload) if payload.is("si", ns::SI) => {
                payload.clone()
            }
            _ => return false,
        };
        self.answer(ctx, iq, &payload);
        true
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
