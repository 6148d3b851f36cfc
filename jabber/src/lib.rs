// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! High-level XMPP instant-messaging library.
//!
//! [`Client`] wraps one long-lived [`tokio_jabber::Session`] with the typed
//! IM semantics: roster and subscriptions, presence, privacy lists, and a
//! registry of protocol extensions (service discovery, PEP, multi-user
//! chat, file transfer, message archives, and friends) whose filters see
//! every stanza in both directions.
//!
//! ```no_run
//! # async fn example() -> Result<(), tokio_jabber::Error> {
//! use jabber::{ClientBuilder, Event};
//! use jabber_stanzas::jid::Jid;
//!
//! let client = ClientBuilder::new(Jid::new("alice@example.org").unwrap(), "hunter2").build()?;
//! let mut events = client.subscribe();
//! client.authenticate().await?;
//! client.send_message(Jid::new("bob@example.org").unwrap(), "coucou")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::broadcast;

use jabber_stanzas::data_forms::DataForm;
use jabber_stanzas::disco::{DiscoInfoResult, Feature, Identity, Item as DiscoItem};
use jabber_stanzas::http_upload::{Slot, SlotRequest};
use jabber_stanzas::ibr;
use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::jid::{BareJid, Jid};
use jabber_stanzas::message::Message;
use jabber_stanzas::muc::History;
use jabber_stanzas::ns;
use jabber_stanzas::presence::{Presence, PresenceType};
use jabber_stanzas::search::{SearchQuery, SearchResult};
use jabber_stanzas::time::TimeResult;
use jabber_stanzas::version::VersionResult;
use tokio_jabber::{Config, Error, Session, SessionState, Stanza, TlsPolicy};

pub use jabber_stanzas as stanzas;
pub use tokio_jabber;

mod attention;
mod blocking;
mod bytestreams;
mod callbacks;
mod carbons;
mod chatstates;
mod disco;
mod dispatch;
mod event;
mod extension;
mod filetransfer;
mod mam;
mod muc;
mod pep;
mod ping;
mod presence;
mod privacy;
mod roster;
mod si;
#[cfg(test)]
mod test_support;
mod time;
mod version;

pub use crate::attention::Attention;
pub use crate::blocking::Blocking;
pub use crate::bytestreams::{Ibb, Socks5};
pub use crate::callbacks::{SubscriptionDecision, TransferSink};
pub use crate::carbons::Carbons;
pub use crate::chatstates::ChatStates;
pub use crate::disco::ServiceDiscovery;
pub use crate::event::{Availability, ChatMessage, Event, GroupInvite};
pub use crate::extension::{
    ClientSettings, Extension, ExtensionContext, ExtensionDescriptor, ExtensionRegistry,
};
pub use crate::filetransfer::{
    Direction, FileTransfer, FileTransferOffer, TransferSession, TransferSource,
};
pub use crate::mam::{ArchiveFilter, ArchivePage, ArchivedMessage, MessageArchive, PageRequest};
pub use crate::muc::MucChat;
pub use crate::pep::Pep;
pub use crate::ping::Ping;
pub use crate::privacy::PrivacyLists;
pub use crate::roster::Roster;
pub use crate::si::StreamInitiation;
pub use crate::time::EntityTime;
pub use crate::version::SoftwareVersion;

use crate::callbacks::Callbacks;

/// The default extensions, in load — and therefore filter — order.
fn builtin_descriptors() -> Vec<ExtensionDescriptor> {
    vec![
        ExtensionDescriptor {
            tag: ServiceDiscovery::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(ServiceDiscovery::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: Carbons::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(Carbons::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: MessageArchive::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(MessageArchive::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: Pep::TAG,
            requires: &[ServiceDiscovery::TAG],
            build: |registry| Ok(Arc::new(Pep::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: MucChat::TAG,
            requires: &[ServiceDiscovery::TAG],
            build: |registry| {
                let disco = registry.load_as::<ServiceDiscovery>(ServiceDiscovery::TAG)?;
                Ok(Arc::new(MucChat::new(registry.context().clone(), disco)))
            },
        },
        ExtensionDescriptor {
            tag: ChatStates::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(ChatStates::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: StreamInitiation::TAG,
            requires: &[],
            build: |_| Ok(Arc::new(StreamInitiation::new())),
        },
        ExtensionDescriptor {
            tag: FileTransfer::TAG,
            requires: &[StreamInitiation::TAG],
            build: |registry| {
                let si = registry.load_as::<StreamInitiation>(StreamInitiation::TAG)?;
                let ft = Arc::new(FileTransfer::new(registry.context().clone(), si.clone()));
                si.register_profile(ns::SI_FILE_TRANSFER, ft.clone());
                Ok(ft)
            },
        },
        ExtensionDescriptor {
            tag: Ibb::TAG,
            requires: &[FileTransfer::TAG],
            build: |registry| {
                let ft = registry.load_as::<FileTransfer>(FileTransfer::TAG)?;
                let ibb = Arc::new(Ibb::new(ft.clone()));
                ft.register_backend(ibb.clone());
                Ok(ibb)
            },
        },
        ExtensionDescriptor {
            tag: Socks5::TAG,
            requires: &[FileTransfer::TAG],
            build: |registry| {
                let ft = registry.load_as::<FileTransfer>(FileTransfer::TAG)?;
                let socks5 = Arc::new(Socks5::new(ft.clone()));
                ft.register_backend(socks5.clone());
                Ok(socks5)
            },
        },
        ExtensionDescriptor {
            tag: Ping::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(Ping::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: SoftwareVersion::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(SoftwareVersion::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: EntityTime::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(EntityTime::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: Attention::TAG,
            requires: &[],
            build: |registry| Ok(Arc::new(Attention::new(registry.context().clone()))),
        },
        ExtensionDescriptor {
            tag: Blocking::TAG,
            requires: &[ServiceDiscovery::TAG],
            build: |registry| {
                let disco = registry.load_as::<ServiceDiscovery>(ServiceDiscovery::TAG)?;
                Ok(Arc::new(Blocking::new(registry.context().clone(), disco)))
            },
        },
    ]
}

/// Configures and builds a [`Client`].
pub struct ClientBuilder {
    host: Option<String>,
    port: u16,
    jid: Jid,
    password: String,
    tls: TlsPolicy,
    allow_plain_cleartext: bool,
    default_timeout: Option<Duration>,
    certificate_validator: Option<Arc<dyn tokio_jabber::connect::CertificateValidator>>,
    lang: Vec<String>,
    settings: ClientSettings,
}

impl ClientBuilder {
    /// Starts a builder for the given account. The server host defaults to
    /// the JID domain, the port to 5222, TLS to opportunistic STARTTLS.
    pub fn new<P: Into<String>>(jid: Jid, password: P) -> ClientBuilder {
        ClientBuilder {
            host: None,
            port: 5222,
            jid,
            password: password.into(),
            tls: TlsPolicy::Opportunistic,
            allow_plain_cleartext: false,
            default_timeout: Some(Duration::from_secs(30)),
            certificate_validator: None,
            lang: vec![String::from("en")],
            settings: ClientSettings::default(),
        }
    }

    /// Connects to this host instead of the JID domain.
    pub fn host<H: Into<String>>(mut self, host: H) -> ClientBuilder {
        self.host = Some(host.into());
        self
    }

    /// Connects to this port instead of 5222.
    pub fn port(mut self, port: u16) -> ClientBuilder {
        self.port = port;
        self
    }

    /// Sets the TLS upgrade policy.
    pub fn tls(mut self, tls: TlsPolicy) -> ClientBuilder {
        self.tls = tls;
        self
    }

    /// Allows the PLAIN mechanism over an unencrypted channel.
    pub fn allow_plain_cleartext(mut self) -> ClientBuilder {
        self.allow_plain_cleartext = true;
        self
    }

    /// Sets the default IQ timeout; `None` waits forever.
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> ClientBuilder {
        self.default_timeout = timeout;
        self
    }

    /// Replaces the built-in certificate validation with a predicate over
    /// the DER chain.
    pub fn certificate_validator(
        mut self,
        validator: Arc<dyn tokio_jabber::connect::CertificateValidator>,
    ) -> ClientBuilder {
        self.certificate_validator = Some(validator);
        self
    }

    /// The preferred body languages, most preferred first.
    pub fn lang(mut self, lang: Vec<String>) -> ClientBuilder {
        self.lang = lang;
        self
    }

    /// Sets the disco identity advertised by this client.
    pub fn identity(mut self, category: &str, type_: &str, name: &str) -> ClientBuilder {
        self.settings.identity_category = String::from(category);
        self.settings.identity_type = String::from(type_);
        self.settings.identity_name = String::from(name);
        self
    }

    /// Sets what the software-version responder reports.
    pub fn software(mut self, name: &str, version: &str, os: Option<&str>) -> ClientBuilder {
        self.settings.software_name = String::from(name);
        self.settings.software_version = String::from(version);
        self.settings.software_os = os.map(String::from);
        self
    }

    /// Builds the client and loads the default extensions. Nothing touches
    /// the network until [`Client::authenticate`].
    pub fn build(self) -> Result<Client, Error> {
        let host = self
            .host
            .unwrap_or_else(|| String::from(self.jid.domain()));
        let mut config = Config::new(host, self.jid, self.password);
        config.port = self.port;
        config.tls = self.tls;
        config.allow_plain_cleartext = self.allow_plain_cleartext;
        config.default_timeout = self.default_timeout;
        config.certificate_validator = self.certificate_validator;

        let (session, session_events) = Session::new(config);
        let (events, _) = broadcast::channel(256);
        let callbacks = Arc::new(Callbacks::default());
        let lang = Arc::new(self.lang);
        let context = ExtensionContext {
            session: session.clone(),
            events: events.clone(),
            callbacks: callbacks.clone(),
            lang: lang.clone(),
            settings: Arc::new(self.settings),
            registry: Arc::new(OnceLock::new()),
        };

        let registry = Arc::new(ExtensionRegistry::new(
            context.clone(),
            builtin_descriptors(),
        ));
        if context.registry.set(Arc::downgrade(&registry)).is_err() {
            return Err(Error::InvalidState);
        }
        for descriptor_tag in [
            ServiceDiscovery::TAG,
            Carbons::TAG,
            MessageArchive::TAG,
            Pep::TAG,
            MucChat::TAG,
            ChatStates::TAG,
            StreamInitiation::TAG,
            FileTransfer::TAG,
            Ibb::TAG,
            Socks5::TAG,
            Ping::TAG,
            SoftwareVersion::TAG,
            EntityTime::TAG,
            Attention::TAG,
            Blocking::TAG,
        ] {
            registry.load(descriptor_tag)?;
        }
        registry.attach_all();

        let client = Client {
            inner: Arc::new(ClientInner {
                session,
                registry,
                roster: Roster::new(context.session.clone()),
                events,
                callbacks,
                lang,
                pending_subscriptions: Mutex::new(HashSet::new()),
                auto_restore: AtomicBool::new(false),
            }),
        };

        tokio::spawn(dispatch::dispatch_loop(client.clone(), session_events));
        Ok(client)
    }
}

struct ClientInner {
    session: Session,
    registry: Arc<ExtensionRegistry>,
    roster: Roster,
    events: broadcast::Sender<Event>,
    callbacks: Arc<Callbacks>,
    lang: Arc<Vec<String>>,
    pending_subscriptions: Mutex<HashSet<BareJid>>,
    auto_restore: AtomicBool,
}

/// One XMPP account online. Cheap to clone; all clones share the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    // ------------------------------------------------------------------
    // Lifecycle.

    /// Connects, authenticates, fetches the roster and broadcasts the
    /// initial presence.
    pub async fn authenticate(&self) -> Result<(), Error> {
        self.inner.auto_restore.store(true, Ordering::SeqCst);
        self.inner.session.connect().await
    }

    /// Connects and authenticates, without touching the roster or sending
    /// presence.
    pub async fn simple_authenticate(&self) -> Result<(), Error> {
        self.inner.auto_restore.store(false, Ordering::SeqCst);
        self.inner.session.connect().await
    }

    /// Tears the connection down and negotiates a fresh one; the roster and
    /// presence are restored when [`Client::authenticate`] was used.
    pub async fn reconnect(&self) -> Result<(), Error> {
        self.inner.session.reconnect().await
    }

    /// Closes the session for good: extensions detach, waiters cancel, the
    /// stream envelope closes. The client is unusable afterwards.
    pub async fn close(&self) {
        self.inner.registry.detach_all();
        self.inner.session.close().await;
    }

    /// Subscribes to the event fan-out.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// The full JID bound by the server, once ready.
    pub fn jid(&self) -> Option<Jid> {
        self.inner.session.jid()
    }

    /// Whether the session is connected and ready.
    pub fn connected(&self) -> bool {
        self.inner.session.is_ready()
    }

    /// Whether the session authenticated; with this engine that is the same
    /// as being ready.
    pub fn authenticated(&self) -> bool {
        self.inner.session.is_ready()
    }

    /// Whether the transport is TLS-encrypted.
    pub fn encrypted(&self) -> bool {
        self.inner.session.is_encrypted()
    }

    /// The connection lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// The session-wide IQ timeout.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.inner.session.default_timeout()
    }

    /// Changes the session-wide IQ timeout; `None` waits forever.
    pub fn set_default_timeout(&self, timeout: Option<Duration>) {
        self.inner.session.set_default_timeout(timeout)
    }

    /// The underlying session handle.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The extension registry of this client.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.inner.registry
    }

    pub(crate) fn emit(&self, event: Event) {
        let _ = self.inner.events.send(event);
    }

    pub(crate) fn callbacks(&self) -> &Callbacks {
        &self.inner.callbacks
    }

    pub(crate) fn auto_restore(&self) -> bool {
        self.inner.auto_restore.load(Ordering::SeqCst)
    }

    pub(crate) fn preferred_langs(&self) -> Vec<&str> {
        self.inner.lang.iter().map(String::as_str).collect()
    }

    /// Fetches the roster and announces availability; runs after every
    /// successful negotiation of an [authenticated](Self::authenticate)
    /// session.
    pub(crate) async fn restore_session_state(&self) -> Result<(), Error> {
        self.inner.roster.refresh().await?;
        self.set_status(Availability::Available, 0, BTreeMap::new())
    }

    fn extension<T: Extension>(&self, tag: &'static str) -> Result<Arc<T>, Error> {
        self.inner
            .registry
            .get_as::<T>(tag)
            .ok_or(Error::InvalidArgument("extension not loaded"))
    }

    /// Sends a stanza through the outbound filter chain.
    pub fn send_stanza(&self, mut stanza: Stanza) -> Result<(), Error> {
        self.inner.registry.run_output_filters(&mut stanza);
        self.inner.session.send_stanza(stanza.into())
    }

    // ------------------------------------------------------------------
    // Messaging.

    /// Sends a chat message with the given body.
    pub fn send_message(&self, to: Jid, body: &str) -> Result<(), Error> {
        let message = Message::chat(to).with_body(String::new(), String::from(body));
        self.send_stanza(Stanza::Message(message))
    }

    /// Sends a groupchat message to a room.
    pub fn send_room_message(&self, room: &BareJid, body: &str) -> Result<(), Error> {
        let message = Message::groupchat(Jid::from(room.clone()))
            .with_body(String::new(), String::from(body));
        self.send_stanza(Stanza::Message(message))
    }

    /// Sends an arbitrary prepared message.
    pub fn send_message_stanza(&self, message: Message) -> Result<(), Error> {
        self.send_stanza(Stanza::Message(message))
    }

    // ------------------------------------------------------------------
    // Presence and status.

    /// Broadcasts availability, priority, and per-language status texts.
    /// Going offline is done by [`Client::close`], not by a status.
    pub fn set_status(
        &self,
        availability: Availability,
        priority: i8,
        messages: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let presence = presence::status_presence(availability, priority, &messages)?;
        self.send_stanza(Stanza::Presence(presence))
    }

    /// Sends a prepared presence stanza.
    pub fn set_presence(&self, presence: Presence) -> Result<(), Error> {
        if presence.type_ == PresenceType::Unavailable {
            return Err(Error::InvalidArgument(
                "use close() instead of an unavailable presence",
            ));
        }
        self.send_stanza(Stanza::Presence(presence))
    }

    // ------------------------------------------------------------------
    // Roster and subscriptions.

    /// The session-local roster mirror.
    pub fn roster(&self) -> &Roster {
        &self.inner.roster
    }

    /// Fetches the roster from the server.
    pub async fn get_roster(&self) -> Result<Vec<jabber_stanzas::roster::Item>, Error> {
        self.inner.roster.refresh().await
    }

    /// Adds a contact to the roster.
    pub async fn add_contact(
        &self,
        jid: BareJid,
        name: Option<&str>,
        groups: &[&str],
    ) -> Result<(), Error> {
        self.inner.roster.add_contact(jid, name, groups).await
    }

    /// Removes a contact from the roster.
    pub async fn remove_contact(&self, jid: &BareJid) -> Result<(), Error> {
        self.inner.roster.remove_contact(jid).await
    }

    /// Asks a contact for their presence.
    pub fn request_subscription(&self, jid: &BareJid) -> Result<(), Error> {
        self.inner
            .pending_subscriptions
            .lock()
            .unwrap()
            .insert(jid.clone());
        let presence = Presence::new(PresenceType::Subscribe).with_to(jid.clone());
        self.send_stanza(Stanza::Presence(presence))
    }

    /// Grants a contact our presence.
    pub fn approve_subscription(&self, jid: &BareJid) -> Result<(), Error> {
        let presence = Presence::new(PresenceType::Subscribed).with_to(jid.clone());
        self.send_stanza(Stanza::Presence(presence))
    }

    /// Denies a pending subscription request.
    pub fn refuse_subscription(&self, jid: &BareJid) -> Result<(), Error> {
        let presence = Presence::new(PresenceType::Unsubscribed).with_to(jid.clone());
        self.send_stanza(Stanza::Presence(presence))
    }

    /// Stops receiving a contact's presence.
    pub fn unsubscribe(&self, jid: &BareJid) -> Result<(), Error> {
        let presence = Presence::new(PresenceType::Unsubscribe).with_to(jid.clone());
        self.send_stanza(Stanza::Presence(presence))
    }

    /// Revokes a contact's subscription to our presence.
    pub fn revoke_subscription(&self, jid: &BareJid) -> Result<(), Error> {
        let presence = Presence::new(PresenceType::Unsubscribed).with_to(jid.clone());
        self.send_stanza(Stanza::Presence(presence))
    }

    pub(crate) fn forget_pending_subscription(&self, jid: &BareJid) -> bool {
        self.inner.pending_subscriptions.lock().unwrap().remove(jid)
    }

    /// Registers the handler deciding on inbound subscription requests.
    pub fn on_subscription_request<F>(&self, handler: F)
    where
        F: Fn(&Jid) -> SubscriptionDecision + Send + Sync + 'static,
    {
        self.inner.callbacks.set_subscription(Box::new(handler));
    }

    /// Registers the handler deciding on inbound file transfers.
    pub fn on_file_transfer_request<F>(&self, handler: F)
    where
        F: Fn(&FileTransferOffer) -> Option<TransferSink> + Send + Sync + 'static,
    {
        self.inner.callbacks.set_file_transfer(Box::new(handler));
    }

    /// Registers the handler answering iq requests nothing else handles.
    pub fn on_custom_iq<F>(&self, handler: F)
    where
        F: Fn(Option<&Jid>, &minidom::Element) -> Option<minidom::Element> + Send + Sync + 'static,
    {
        self.inner.callbacks.set_custom_iq(Box::new(handler));
    }

    /// Registers the handler approving voice requests forwarded to us as a
    /// room moderator.
    pub fn on_voice_request<F>(&self, handler: F)
    where
        F: Fn(&DataForm) -> Option<DataForm> + Send + Sync + 'static,
    {
        self.inner.callbacks.set_voice_request(Box::new(handler));
    }

    // ------------------------------------------------------------------
    // Privacy lists and blocking.

    /// Privacy list operations.
    pub fn privacy(&self) -> PrivacyLists {
        PrivacyLists::new(self.inner.session.clone())
    }

    /// Blocks all communication with a contact.
    pub async fn block(&self, jid: Jid) -> Result<(), Error> {
        self.extension::<Blocking>(Blocking::TAG)?.block(jid).await
    }

    /// Unblocks a contact.
    pub async fn unblock(&self, jid: Jid) -> Result<(), Error> {
        self.extension::<Blocking>(Blocking::TAG)?
            .unblock(jid)
            .await
    }

    /// The currently blocked JIDs.
    pub async fn get_blocklist(&self) -> Result<Vec<Jid>, Error> {
        self.extension::<Blocking>(Blocking::TAG)?.blocklist().await
    }

    // ------------------------------------------------------------------
    // Service discovery.

    /// The service discovery extension.
    pub fn disco(&self) -> Result<Arc<ServiceDiscovery>, Error> {
        self.extension(ServiceDiscovery::TAG)
    }

    /// The features an entity advertises.
    pub async fn get_features(&self, jid: Jid) -> Result<Vec<Feature>, Error> {
        Ok(self.disco()?.info(jid, None).await?.features)
    }

    /// The identities an entity advertises.
    pub async fn get_identities(&self, jid: Jid) -> Result<Vec<Identity>, Error> {
        Ok(self.disco()?.info(jid, None).await?.identities)
    }

    /// The items an entity exposes.
    pub async fn get_items(&self, jid: Jid) -> Result<Vec<DiscoItem>, Error> {
        Ok(self.disco()?.items(jid).await?.items)
    }

    // ------------------------------------------------------------------
    // Personal eventing.

    /// Publishes the user's mood.
    pub async fn set_mood(
        &self,
        mood: Option<jabber_stanzas::mood::Mood>,
        text: Option<&str>,
    ) -> Result<(), Error> {
        let payload = jabber_stanzas::mood::UserMood {
            mood,
            text: text.map(String::from),
        };
        self.extension::<Pep>(Pep::TAG)?
            .publish(ns::MOOD, payload)
            .await
    }

    /// Publishes the user's activity.
    pub async fn set_activity(
        &self,
        general: Option<jabber_stanzas::activity::General>,
        specific: Option<&str>,
        text: Option<&str>,
    ) -> Result<(), Error> {
        let payload = jabber_stanzas::activity::UserActivity {
            general,
            specific: specific.map(String::from),
            text: text.map(String::from),
        };
        self.extension::<Pep>(Pep::TAG)?
            .publish(ns::ACTIVITY, payload)
            .await
    }

    /// Publishes the tune the user is listening to.
    pub async fn set_tune(&self, tune: jabber_stanzas::tune::Tune) -> Result<(), Error> {
        self.extension::<Pep>(Pep::TAG)?.publish(ns::TUNE, tune).await
    }

    // ------------------------------------------------------------------
    // Misc queries.

    /// Pings an entity, or the server when `to` is None.
    pub async fn ping(&self, to: Option<Jid>) -> Result<Duration, Error> {
        self.extension::<Ping>(Ping::TAG)?.ping(to).await
    }

    /// Buzzes a contact.
    pub fn buzz(&self, to: Jid, body: Option<&str>) -> Result<(), Error> {
        self.extension::<Attention>(Attention::TAG)?.buzz(to, body)
    }

    /// Asks an entity for its local time.
    pub async fn get_time(&self, to: Jid) -> Result<TimeResult, Error> {
        self.extension::<EntityTime>(EntityTime::TAG)?
            .query(to)
            .await
    }

    /// Asks an entity what software it runs.
    pub async fn get_version(&self, to: Jid) -> Result<VersionResult, Error> {
        self.extension::<SoftwareVersion>(SoftwareVersion::TAG)?
            .query(to)
            .await
    }

    /// Sends a chat state to a peer.
    pub fn send_chat_state(
        &self,
        to: Jid,
        state: jabber_stanzas::chatstates::ChatState,
    ) -> Result<(), Error> {
        self.extension::<ChatStates>(ChatStates::TAG)?
            .send_state(to, state)
    }

    /// Asks the server to copy messages of other resources to this one.
    pub async fn enable_carbons(&self) -> Result<(), Error> {
        self.extension::<Carbons>(Carbons::TAG)?.enable().await
    }

    // ------------------------------------------------------------------
    // Registration and search.

    /// Fetches the registration fields of a service.
    pub async fn request_registration(&self, to: Option<Jid>) -> Result<ibr::Query, Error> {
        let mut iq = Iq::from_get("register-fields", ibr::Query::new());
        if let Some(to) = to {
            iq = iq.with_to(to);
        }
        let response = self.inner.session.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(ibr::Query::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Submits a filled registration.
    pub async fn send_registration(
        &self,
        to: Option<Jid>,
        query: ibr::Query,
    ) -> Result<(), Error> {
        let mut iq = Iq::from_set("register-submit", query);
        if let Some(to) = to {
            iq = iq.with_to(to);
        }
        self.inner.session.iq_request(iq).await?;
        Ok(())
    }

    /// Registers an account with the common username/password fields.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), Error> {
        let query = ibr::Query::new()
            .with_field("username", username)
            .with_field("password", password);
        self.send_registration(None, query).await
    }

    /// Fetches the search fields of a directory.
    pub async fn request_search_form(&self, service: Jid) -> Result<SearchQuery, Error> {
        let iq = Iq::from_get("search-fields", SearchQuery::default()).with_to(service);
        let response = self.inner.session.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(SearchQuery::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Runs a directory search.
    pub async fn search(&self, service: Jid, query: SearchQuery) -> Result<SearchResult, Error> {
        let iq = Iq::from_set("search", query).with_to(service);
        let response = self.inner.session.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(SearchResult::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Requests an HTTP upload slot from the given service. Performing the
    /// PUT is the caller's business.
    pub async fn request_slot(
        &self,
        service: Jid,
        filename: &str,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<Slot, Error> {
        let request = SlotRequest {
            filename: String::from(filename),
            size,
            content_type: content_type.map(String::from),
        };
        let iq = Iq::from_get("upload-slot", request).with_to(service);
        let response = self.inner.session.iq_request(iq).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(Slot::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    // ------------------------------------------------------------------
    // Multi-user chat.

    /// The multi-user chat extension.
    pub fn muc(&self) -> Result<Arc<MucChat>, Error> {
        self.extension(MucChat::TAG)
    }

    /// Lists the rooms a conference service hosts.
    pub async fn discover_rooms(&self, service: Jid) -> Result<Vec<DiscoItem>, Error> {
        self.muc()?.discover_rooms(service).await
    }

    /// Fetches a room's identity, features and extended information.
    pub async fn get_room_info(&self, room: &BareJid) -> Result<DiscoInfoResult, Error> {
        self.muc()?.room_info(room).await
    }

    /// Enters a room under the given nickname.
    pub fn join_room(
        &self,
        room: BareJid,
        nick: &str,
        password: Option<&str>,
        history: Option<History>,
    ) -> Result<(), Error> {
        self.muc()?.join_room(room, nick, password, history)
    }

    /// Leaves a room.
    pub fn leave_room(&self, room: &BareJid) -> Result<(), Error> {
        self.muc()?.leave_room(room)
    }

    /// Changes the subject of a room.
    pub fn edit_room_subject(&self, room: &BareJid, subject: &str) -> Result<(), Error> {
        self.muc()?.edit_room_subject(room, subject)
    }

    /// Fetches the room configuration form and submits it after the closure
    /// filled it in.
    pub async fn modify_room_config<F>(&self, room: &BareJid, fill: F) -> Result<(), Error>
    where
        F: FnOnce(DataForm) -> DataForm,
    {
        let muc = self.muc()?;
        let form = muc.room_config(room).await?;
        muc.submit_room_config(room, fill(form)).await
    }

    /// Accepts the default configuration of a freshly created room.
    pub async fn request_instant_room(&self, room: &BareJid) -> Result<(), Error> {
        self.muc()?.request_instant_room(room).await
    }

    /// Destroys a room, for an owner.
    pub async fn destroy_room(
        &self,
        room: &BareJid,
        alternative: Option<BareJid>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.muc()?.destroy_room(room, alternative, reason).await
    }

    /// Kicks an occupant out of a room.
    pub async fn kick_occupant(
        &self,
        room: &BareJid,
        nick: &str,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.muc()?.kick_occupant(room, nick, reason).await
    }

    /// Bans a user from a room.
    pub async fn ban_user(
        &self,
        room: &BareJid,
        user: Jid,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.muc()?.ban_user(room, user, reason).await
    }

    /// Grants room membership.
    pub async fn add_member(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.muc()?.add_member(room, user).await
    }

    /// Grants room admin powers.
    pub async fn add_admin(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.muc()?.add_admin(room, user).await
    }

    /// Strips a user of any affiliation with a room.
    pub async fn remove_user(&self, room: &BareJid, user: Jid) -> Result<(), Error> {
        self.muc()?.remove_user(room, user).await
    }

    /// Every occupant of a room, across all roles.
    pub async fn get_room_all_occupants(
        &self,
        room: &BareJid,
    ) -> Result<Vec<jabber_stanzas::muc::AdminItem>, Error> {
        self.muc()?.all_occupants(room).await
    }

    /// The occupants of a room holding one role.
    pub async fn get_room_occupants_by_role(
        &self,
        room: &BareJid,
        role: jabber_stanzas::muc::Role,
    ) -> Result<Vec<jabber_stanzas::muc::AdminItem>, Error> {
        self.muc()?.occupants_by_role(room, role).await
    }

    /// The users of a room holding one affiliation.
    pub async fn get_room_users_by_affiliation(
        &self,
        room: &BareJid,
        affiliation: jabber_stanzas::muc::Affiliation,
    ) -> Result<Vec<jabber_stanzas::muc::AdminItem>, Error> {
        self.muc()?.users_by_affiliation(room, affiliation).await
    }

    /// Invites a contact to a room through the room.
    pub fn send_invite(
        &self,
        room: &BareJid,
        invitee: Jid,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.muc()?.send_invite(room, invitee, reason)
    }

    /// Declines a mediated invitation.
    pub fn decline_invite(
        &self,
        room: &BareJid,
        inviter: Option<Jid>,
        reason: Option<&str>,
    ) -> Result<(), Error> {
        self.muc()?.decline_invite(room, inviter, reason)
    }

    /// Asks the moderators of a room for voice.
    pub fn request_voice(&self, room: &BareJid) -> Result<(), Error> {
        self.muc()?.request_voice(room)
    }

    // ------------------------------------------------------------------
    // File transfer.

    /// The file transfer coordinator.
    pub fn file_transfer(&self) -> Result<Arc<FileTransfer>, Error> {
        self.extension(FileTransfer::TAG)
    }

    /// Offers a file to a contact; bytes are pulled from `source`. Returns
    /// the session id, usable with [`Client::cancel_file_transfer`].
    pub async fn initiate_file_transfer(
        &self,
        to: Jid,
        name: &str,
        size: u64,
        description: Option<&str>,
        source: TransferSource,
    ) -> Result<String, Error> {
        self.file_transfer()?
            .initiate(to, name, size, description, source)
            .await
    }

    /// Aborts a running transfer.
    pub fn cancel_file_transfer(&self, sid: &str) -> Result<(), Error> {
        self.file_transfer()?.cancel(sid)
    }

    /// Negotiates everything in-band, skipping SOCKS5.
    pub fn force_in_band_transfers(&self, force: bool) -> Result<(), Error> {
        self.file_transfer()?.set_force_in_band(force);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Message archives.

    /// The archive extension.
    pub fn archive(&self) -> Result<Arc<MessageArchive>, Error> {
        self.extension(MessageArchive::TAG)
    }

    /// Queries one page of the account archive.
    pub async fn get_archived_messages(
        &self,
        page: PageRequest,
        filter: ArchiveFilter,
    ) -> Result<ArchivePage, Error> {
        self.archive()?.query(None, page, filter).await
    }

    /// Queries one page of a room archive.
    pub async fn get_archived_muc_messages(
        &self,
        room: &BareJid,
        page: PageRequest,
    ) -> Result<ArchivePage, Error> {
        self.archive()?
            .query(
                Some(Jid::from(room.clone())),
                page,
                ArchiveFilter::default(),
            )
            .await
    }

    /// Alias for the room history operation of the group chat surface.
    pub async fn get_group_chat_log(
        &self,
        room: &BareJid,
        page: PageRequest,
    ) -> Result<ArchivePage, Error> {
        self.get_archived_muc_messages(room, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_loads_default_extensions() {
        let client = ClientBuilder::new(
            Jid::new("tester@example.org/unit").unwrap(),
            "secret",
        )
        .build()
        .unwrap();
        assert!(client.disco().is_ok());
        assert!(client.muc().is_ok());
        assert!(client.file_transfer().is_ok());
        assert!(client.archive().is_ok());

        let namespaces = client.registry().advertised_namespaces();
        for expected in [
            ns::DISCO_INFO,
            ns::CAPS,
            ns::CARBONS,
            ns::MAM,
            ns::MUC,
            ns::SI,
            ns::SI_FILE_TRANSFER,
            ns::IBB,
            ns::BYTESTREAMS,
            ns::PING,
            ns::VERSION,
            ns::TIME,
            ns::ATTENTION,
            ns::BLOCKING,
            ns::CHATSTATES,
        ] {
            assert!(
                namespaces.contains(&expected),
                "missing namespace {}",
                expected
            );
        }
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail_cleanly() {
        let client = ClientBuilder::new(
            Jid::new("tester@example.org/unit").unwrap(),
            "secret",
        )
        .build()
        .unwrap();
        assert!(!client.connected());
        let error = client
            .send_message(Jid::new("bob@example.org").unwrap(), "hi")
            .unwrap_err();
        assert!(matches!(error, Error::NotConnected));
    }
}
