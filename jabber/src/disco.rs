// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Service discovery (XEP-0030) and the entity-capabilities cache
//! (XEP-0115) built on top of it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};

use jabber_stanzas::caps::{self, Caps};
use jabber_stanzas::disco::{
    DiscoInfoQuery, DiscoInfoResult, DiscoItemsQuery, DiscoItemsResult, Feature, Identity,
};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::presence::PresenceType;
use jabber_stanzas::stanza_error::{DefinedCondition, ErrorType, StanzaError};
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext, ExtensionRegistry};

/// Feature and identity queries over the network, the responder for the
/// queries others make about us, and the caps-hash cache that short-cuts
/// them.
pub struct ServiceDiscovery {
    ctx: ExtensionContext,
    // base64 ver -> verified disco result.
    caps_cache: Arc<Mutex<HashMap<String, DiscoInfoResult>>>,
    // full JID -> the ver it last announced.
    jid_caps: Arc<Mutex<HashMap<Jid, String>>>,
}

impl ServiceDiscovery {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "ServiceDiscovery";

    pub(crate) fn new(ctx: ExtensionContext) -> ServiceDiscovery {
        ServiceDiscovery {
            ctx,
            caps_cache: Arc::new(Mutex::new(HashMap::new())),
            jid_caps: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The identities and features we advertise, i.e. the configured
    /// identity plus the namespace union of all loaded extensions.
    pub fn local_info(&self, registry: &ExtensionRegistry) -> DiscoInfoResult {
        let settings = &self.ctx.settings;
        let mut features = vec![];
        for namespace in registry.advertised_namespaces() {
            features.push(Feature::new(namespace));
        }
        DiscoInfoResult {
            node: None,
            identities: vec![Identity::new(
                settings.identity_category.clone(),
                settings.identity_type.clone(),
                "en",
                settings.identity_name.clone(),
            )],
            features,
            extensions: vec![],
        }
    }

    /// The caps element matching [local_info](Self::local_info).
    pub fn caps(&self, registry: &ExtensionRegistry) -> Caps {
        let info = self.local_info(registry);
        let ver = caps::hash_caps(&caps::compute_disco(&info));
        Caps::new(self.ctx.settings.caps_node.clone(), ver)
    }

    /// Queries a peer for its identities and features.
    pub async fn info(&self, jid: Jid, node: Option<&str>) -> Result<DiscoInfoResult, Error> {
        let iq = Iq::from_get(
            "disco-info",
            DiscoInfoQuery {
                node: node.map(String::from),
            },
        )
        .with_to(jid);
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(DiscoInfoResult::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Queries a peer for its items.
    pub async fn items(&self, jid: Jid) -> Result<DiscoItemsResult, Error> {
        let iq = Iq::from_get("disco-items", DiscoItemsQuery::default()).with_to(jid);
        let response = self.ctx.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(DiscoItemsResult::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Whether the peer supports the given namespace: answered from the
    /// caps cache when it announced a known hash, by a live disco#info
    /// query otherwise.
    pub async fn supports(&self, jid: Jid, namespace: &str) -> Result<bool, Error> {
        let cached = {
            let jid_caps = self.jid_caps.lock().unwrap();
            jid_caps.get(&jid).and_then(|ver| {
                self.caps_cache
                    .lock()
                    .unwrap()
                    .get(ver)
                    .map(|info| info.has_feature(namespace))
            })
        };
        if let Some(answer) = cached {
            return Ok(answer);
        }
        Ok(self.info(jid, None).await?.has_feature(namespace))
    }

    /// Records the caps announcement of a presence and, when the hash is
    /// not cached yet, fills the cache in the background.
    fn note_caps(&self, ctx: &ExtensionContext, from: Jid, announced: Caps) {
        if announced.hash != "sha-1" {
            debug!("ignoring caps with unsupported hash {}", announced.hash);
            return;
        }
        let ver = announced.ver_string();
        self.jid_caps.lock().unwrap().insert(from.clone(), ver.clone());
        if self.caps_cache.lock().unwrap().contains_key(&ver) {
            return;
        }

        let cache = Arc::clone(&self.caps_cache);
        let expected = announced.ver.clone();
        let iq = Iq::from_get("caps-disco", caps::query_caps(&announced)).with_to(from);
        ctx.iq_request_callback(iq, move |response| {
            let payload = match response {
                Ok(Iq {
                    payload: IqType::Result(Some(payload)),
                    ..
                }) => payload,
                Ok(_) => return,
                Err(e) => {
                    debug!("caps disco query failed: {}", e);
                    return;
                }
            };
            let info = match DiscoInfoResult::try_from(payload) {
                Ok(info) => info,
                Err(e) => {
                    debug!("invalid caps disco result: {}", e);
                    return;
                }
            };
            // Only verified hashes enter the shared cache.
            let actual = caps::hash_caps(&caps::compute_disco(&info));
            if actual != expected {
                warn!("caps verification string mismatch, not caching");
                return;
            }
            cache.lock().unwrap().insert(ver, info);
        });
    }

    fn answer_info_query(&self, ctx: &ExtensionContext, iq: &Iq, query: DiscoInfoQuery) {
        let reply = match ctx.registry.get().and_then(Weak::upgrade) {
            Some(registry) => {
                let mut info = self.local_info(&registry);
                info.node = query.node;
                Iq::from_result("", Some(info))
            }
            None => Iq::from_error(
                "",
                StanzaError::new(
                    ErrorType::Cancel,
                    DefinedCondition::InternalServerError,
                    "en",
                    None,
                ),
            ),
        };
        let mut reply = reply;
        reply.id = iq.id.clone();
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer disco#info: {}", e);
        }
    }

    fn answer_items_query(&self, ctx: &ExtensionContext, iq: &Iq) {
        let mut reply = Iq::from_result(iq.id.clone(), Some(DiscoItemsResult::default()));
        if let Some(from) = &iq.from {
            reply.to = Some(from.clone());
        }
        if let Err(e) = ctx.session.send_iq_response(reply) {
            warn!("cannot answer disco#items: {}", e);
        }
    }
}

impl Extension for ServiceDiscovery {
    fn name(&self) -> &'static str {
        ServiceDiscovery::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::DISCO_INFO, ns::DISCO_ITEMS, ns::CAPS]
    }

    fn input_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        match stanza {
            Stanza::Iq(iq) => match &iq.payload {
                IqType::Get(payload) if payload.is("query", ns::DISCO_INFO) => {
                    match DiscoInfoQuery::try_from(payload.clone()) {
                        Ok(query) => self.answer_info_query(ctx, iq, query),
                        Err(_) => return false,
                    }
                    true
                }
                IqType::Get(payload) if payload.is("query", ns::DISCO_ITEMS) => {
                    self.answer_items_query(ctx, iq);
                    true
                }
                _ => false,
            },
            Stanza::Presence(presence) => {
                if presence.type_ != PresenceType::None {
                    return false;
                }
                let announced = presence
                    .payloads
                    .iter()
                    .find(|payload| payload.is("c", ns::CAPS))
                    .and_then(|payload| Caps::try_from(payload.clone()).ok());
                if let (Some(announced), Some(from)) = (announced, presence.from.clone()) {
                    self.note_caps(ctx, from, announced);
                }
                // The presence still carries availability; let it flow.
                false
            }
            Stanza::Message(_) => false,
        }
    }

    fn output_filter(&self, ctx: &ExtensionContext, stanza: &mut Stanza) {
        // Advertise our caps hash on every broadcast available presence.
        if let Stanza::Presence(presence) = stanza {
            if presence.type_ == PresenceType::None
                && presence.to.is_none()
                && !presence.payloads.iter().any(|p| p.is("c", ns::CAPS))
            {
                if let Some(registry) = ctx.registry.get().and_then(Weak::upgrade) {
                    presence.payloads.push(self.caps(&registry).into());
                }
            }
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
