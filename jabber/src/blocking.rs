// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simple communications blocking (XEP-0191), with a best-effort fallback
//! onto a privacy list for servers that never learned it.

use std::any::Any;
use std::sync::Arc;

use jabber_stanzas::blocking::{Block, BlocklistRequest, BlocklistResult, Unblock};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::ns;
use jabber_stanzas::privacy::{Action, List, PrivacyItem, SelectorType};
use tokio_jabber::Error;

use crate::disco::ServiceDiscovery;
use crate::extension::{Extension, ExtensionContext};
use crate::privacy::PrivacyLists;

/// The name of the privacy list the fallback edits.
const FALLBACK_LIST: &str = "blocklist";

/// Blocking operations.
pub struct Blocking {
    ctx: ExtensionContext,
    disco: Arc<ServiceDiscovery>,
}

impl Blocking {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "Blocking";

    pub(crate) fn new(ctx: ExtensionContext, disco: Arc<ServiceDiscovery>) -> Blocking {
        Blocking { ctx, disco }
    }

    async fn server_supports_blocking(&self) -> bool {
        let server = match self.ctx.session.jid() {
            Some(jid) => match Jid::new(jid.domain()) {
                Ok(server) => server,
                Err(_) => return false,
            },
            None => return false,
        };
        self.disco
            .supports(server, ns::BLOCKING)
            .await
            .unwrap_or(false)
    }

    fn privacy(&self) -> PrivacyLists {
        PrivacyLists::new(self.ctx.session.clone())
    }

    /// Blocks all communication with a contact.
    ///
    /// Uses the blocking command when the server advertises it; otherwise
    /// falls back to a deny rule in a privacy list named `blocklist`, which
    /// is best-effort and not interoperable with other blocking clients.
    pub async fn block(&self, jid: Jid) -> Result<(), Error> {
        if self.server_supports_blocking().await {
            let payload = Block { items: vec![jid] };
            self.ctx.iq_request(Iq::from_set("block", payload)).await?;
            return Ok(());
        }

        let privacy = self.privacy();
        let mut list = privacy.get_list(FALLBACK_LIST).await.unwrap_or_else(|_| List::new(FALLBACK_LIST));
        let next_order = list
            .items
            .iter()
            .map(|item| item.order)
            .max()
            .map(|order| order + 1)
            .unwrap_or(1);
        let mut item = PrivacyItem::new(Action::Deny, next_order);
        item.type_ = Some(SelectorType::Jid);
        item.value = Some(jid.to_string());
        list.items.push(item);
        privacy.set_list(list).await?;
        privacy.set_default(Some(FALLBACK_LIST)).await
    }

    /// Unblocks a contact.
    pub async fn unblock(&self, jid: Jid) -> Result<(), Error> {
        if self.server_supports_blocking().await {
            let payload = Unblock { items: vec![jid] };
            self.ctx
                .iq_request(Iq::from_set("unblock", payload))
                .await?;
            return Ok(());
        }

        let privacy = self.privacy();
        let mut list = match privacy.get_list(FALLBACK_LIST).await {
            Ok(list) => list,
            Err(_) => return Ok(()),
        };
        let value = jid.to_string();
        list.items.retain(|item| item.value.as_deref() != Some(value.as_str()));
        privacy.set_list(list).await
    }

    /// The currently blocked JIDs.
    pub async fn blocklist(&self) -> Result<Vec<Jid>, Error> {
        if self.server_supports_blocking().await {
            let response = self
                .ctx
                .iq_request(Iq::from_get("blocklist", BlocklistRequest))
                .await?;
            return match response.payload {
                IqType::Result(Some(payload)) => {
                    Ok(BlocklistResult::try_from(payload)?.items)
                }
                _ => Err(Error::InvalidState),
            };
        }

        let list = match self.privacy().get_list(FALLBACK_LIST).await {
            Ok(list) => list,
            Err(_) => return Ok(vec![]),
        };
        Ok(list
            .items
            .iter()
            .filter(|item| {
                item.action == Action::Deny && item.type_ == Some(SelectorType::Jid)
            })
            .filter_map(|item| item.value.as_deref())
            .filter_map(|value| value.parse().ok())
            .collect())
    }
}

impl Extension for Blocking {
    fn name(&self) -> &'static str {
        Blocking::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::BLOCKING]
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
