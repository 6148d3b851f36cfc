// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Message archive management (XEP-0313): paged queries over the server
//! archive, with the results streamed back as forwarded messages.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, SecondsFormat};
use log::debug;
use rand::{thread_rng, Rng};
use tokio::sync::oneshot;

use jabber_stanzas::data_forms::{DataForm, DataFormType, Field, FieldType};
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::Jid;
use jabber_stanzas::mam::{Fin, QueryId, Query as MamQuery, Result_ as MamResult};
use jabber_stanzas::message::Message;
use jabber_stanzas::ns;
use jabber_stanzas::rsm::SetQuery;
use tokio_jabber::{Error, Stanza};

use crate::extension::{Extension, ExtensionContext};

/// What to page over and how.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// The maximum number of messages in the page.
    pub max: Option<usize>,

    /// Return messages after this archive id.
    pub after: Option<String>,

    /// Return messages before this archive id.
    pub before: Option<String>,
}

/// Optional filters of an archive query.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    /// Only messages exchanged with this JID.
    pub with: Option<Jid>,

    /// Only messages after this point in time.
    pub start: Option<DateTime<FixedOffset>>,

    /// Only messages before this point in time.
    pub end: Option<DateTime<FixedOffset>>,
}

/// One message out of the archive.
#[derive(Debug, Clone)]
pub struct ArchivedMessage {
    /// The id under which the archive stored the message.
    pub id: String,

    /// When the archive says the message was sent.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// The message itself.
    pub message: Message,
}

/// One page of the archive.
#[derive(Debug, Clone)]
pub struct ArchivePage {
    /// The messages of this page, oldest first.
    pub messages: Vec<ArchivedMessage>,

    /// The archive id of the first message of the page.
    pub first: Option<String>,

    /// The archive id of the last message of the page.
    pub last: Option<String>,

    /// The total size of the result set, when the archive reports it.
    pub total: Option<usize>,

    /// Whether the end of the archive was reached.
    pub complete: bool,
}

struct PendingQuery {
    messages: Vec<ArchivedMessage>,
    // Fires when the fin arrives inside a message instead of the iq result.
    fin_tx: Option<oneshot::Sender<Fin>>,
}

/// The archive extension.
pub struct MessageArchive {
    ctx: ExtensionContext,
    queries: Arc<Mutex<HashMap<String, PendingQuery>>>,
}

impl MessageArchive {
    /// The registry tag of this extension.
    pub const TAG: &'static str = "MessageArchive";

    pub(crate) fn new(ctx: ExtensionContext) -> MessageArchive {
        MessageArchive {
            ctx,
            queries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn build_form(filter: &ArchiveFilter) -> DataForm {
        let mut fields = vec![];
        if let Some(with) = &filter.with {
            fields.push(Field::text_single("with", &with.to_string()));
        }
        if let Some(start) = &filter.start {
            fields.push(Field::text_single(
                "start",
                &start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(end) = &filter.end {
            fields.push(Field::text_single(
                "end",
                &end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        let mut form_type = Field::new("FORM_TYPE", FieldType::Hidden);
        form_type.values.push(String::from(ns::MAM));
        let mut all = vec![form_type];
        all.extend(fields);
        DataForm {
            type_: DataFormType::Submit,
            form_type: Some(String::from(ns::MAM)),
            title: None,
            instructions: None,
            fields: all,
        }
    }

    /// Queries one page of an archive: the account's own when `archive` is
    /// None, the given service (e.g. a room) otherwise.
    pub async fn query(
        &self,
        archive: Option<Jid>,
        page: PageRequest,
        filter: ArchiveFilter,
    ) -> Result<ArchivePage, Error> {
        let query_id = format!("mam-{}", thread_rng().gen::<u64>());
        let (fin_tx, fin_rx) = oneshot::channel();
        self.queries.lock().unwrap().insert(
            query_id.clone(),
            PendingQuery {
                messages: vec![],
                fin_tx: Some(fin_tx),
            },
        );

        let payload = MamQuery {
            queryid: Some(QueryId(query_id.clone())),
            form: Some(Self::build_form(&filter)),
            set: Some(SetQuery {
                max: page.max,
                after: page.after,
                before: page.before,
                index: None,
            }),
        };
        let mut iq = Iq::from_set("mam-query", payload);
        if let Some(archive) = archive {
            iq = iq.with_to(archive);
        }

        let response = match self.ctx.iq_request(iq).await {
            Ok(response) => response,
            Err(e) => {
                self.queries.lock().unwrap().remove(&query_id);
                return Err(e);
            }
        };

        // The page normally finalizes through the iq result; some servers
        // send the fin in a message instead, which resolves fin_rx.
        let fin = match response.payload {
            IqType::Result(Some(ref payload)) if payload.is("fin", ns::MAM) => {
                Some(Fin::try_from(payload.clone())?)
            }
            _ => None,
        };
        let fin = match fin {
            Some(fin) => fin,
            None => match fin_rx.await {
                Ok(fin) => fin,
                Err(_) => {
                    self.queries.lock().unwrap().remove(&query_id);
                    return Err(Error::Cancelled);
                }
            },
        };

        let pending = self
            .queries
            .lock()
            .unwrap()
            .remove(&query_id)
            .ok_or(Error::InvalidState)?;

        Ok(ArchivePage {
            messages: pending.messages,
            first: fin.set.first.as_ref().map(|first| first.item.clone()),
            last: fin.set.last.clone(),
            total: fin.set.count,
            complete: fin.complete,
        })
    }
}

impl Extension for MessageArchive {
    fn name(&self) -> &'static str {
        MessageArchive::TAG
    }

    fn namespaces(&self) -> &'static [&'static str] {
        &[ns::MAM]
    }

    fn input_filter(&self, _ctx: &ExtensionContext, stanza: &mut Stanza) -> bool {
        let message = match stanza {
            Stanza::Message(message) => message,
            _ => return false,
        };

        // A streamed result for one of our open queries.
        match message.extract_payload::<MamResult>("result", ns::MAM) {
            Ok(Some(result)) => {
                let query_id = match &result.queryid {
                    Some(query_id) => query_id.0.clone(),
                    None => return true,
                };
                let mut queries = self.queries.lock().unwrap();
                match queries.get_mut(&query_id) {
                    Some(pending) => {
                        pending.messages.push(ArchivedMessage {
                            id: result.id,
                            timestamp: result.forwarded.delay.map(|delay| delay.stamp),
                            message: *result.forwarded.message,
                        });
                    }
                    None => debug!("dropping archive result for unknown query {}", query_id),
                }
                return true;
            }
            Ok(None) => (),
            Err(e) => {
                debug!("invalid archive result: {}", e);
                return true;
            }
        }

        // The tolerated message-borne fin.
        match message.extract_payload::<Fin>("fin", ns::MAM) {
            Ok(Some(fin)) => {
                let query_id = match &fin.queryid {
                    Some(query_id) => query_id.0.clone(),
                    None => return true,
                };
                let mut queries = self.queries.lock().unwrap();
                if let Some(pending) = queries.get_mut(&query_id) {
                    if let Some(tx) = pending.fin_tx.take() {
                        let _ = tx.send(fin);
                    }
                }
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!("invalid archive fin: {}", e);
                true
            }
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidom::Element;

    fn archive() -> MessageArchive {
        MessageArchive::new(crate::test_support::offline_context())
    }

    fn result_message(query_id: &str, archive_id: &str, body: &str) -> Message {
        let xml = format!(
            "<message xmlns='jabber:client'><result xmlns='urn:xmpp:mam:2' queryid='{}' id='{}'><forwarded xmlns='urn:xmpp:forward:0'><delay xmlns='urn:xmpp:delay' stamp='2010-07-10T23:08:25Z'/><message xmlns='jabber:client' from='witch@test' to='alice@test'><body>{}</body></message></forwarded></result></message>",
            query_id, archive_id, body
        );
        let elem: Element = xml.parse().unwrap();
        Message::try_from(elem).unwrap()
    }

    #[test]
    fn test_results_accumulate_per_query() {
        let archive = archive();
        let ctx = archive.ctx.clone();
        archive.queries.lock().unwrap().insert(
            String::from("q1"),
            PendingQuery {
                messages: vec![],
                fin_tx: None,
            },
        );

        let mut stanza = Stanza::Message(result_message("q1", "id-1", "one"));
        assert!(archive.input_filter(&ctx, &mut stanza));
        let mut stanza = Stanza::Message(result_message("q1", "id-2", "two"));
        assert!(archive.input_filter(&ctx, &mut stanza));
        // A result for a finished or foreign query is swallowed silently.
        let mut stanza = Stanza::Message(result_message("other", "id-3", "three"));
        assert!(archive.input_filter(&ctx, &mut stanza));

        let queries = archive.queries.lock().unwrap();
        let pending = queries.get("q1").unwrap();
        assert_eq!(pending.messages.len(), 2);
        assert_eq!(pending.messages[0].id, "id-1");
        assert!(pending.messages[0].timestamp.is_some());
    }

    #[test]
    fn test_message_borne_fin_resolves() {
        let archive = archive();
        let ctx = archive.ctx.clone();
        let (fin_tx, mut fin_rx) = oneshot::channel();
        archive.queries.lock().unwrap().insert(
            String::from("q1"),
            PendingQuery {
                messages: vec![],
                fin_tx: Some(fin_tx),
            },
        );

        let xml = "<message xmlns='jabber:client'><fin xmlns='urn:xmpp:mam:2' queryid='q1' complete='true'><set xmlns='http://jabber.org/protocol/rsm'><count>0</count></set></fin></message>";
        let elem: Element = xml.parse().unwrap();
        let mut stanza = Stanza::Message(Message::try_from(elem).unwrap());
        assert!(archive.input_filter(&ctx, &mut stanza));

        let fin = fin_rx.try_recv().unwrap();
        assert!(fin.complete);
        assert_eq!(fin.set.count, Some(0));
    }

    #[test]
    fn test_plain_message_untouched() {
        let archive = archive();
        let ctx = archive.ctx.clone();
        let mut stanza = Stanza::Message(Message::chat(None));
        assert!(!archive.input_filter(&ctx, &mut stanza));
    }
}
