// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The extension contract and the registry that wires extensions together.
//!
//! Each protocol extension is a singleton registered under a unique tag. A
//! descriptor names the tags it depends on; loading resolves those
//! recursively, and a dependency cycle is rejected at load time. The loaded
//! order is also the filter order: inbound stanzas run through every
//! extension's input filter until one consumes them, outbound stanzas run
//! through every output filter.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use jabber_stanzas::iq::Iq;
use tokio::sync::broadcast;

use tokio_jabber::{Error, Session, Stanza};

use crate::callbacks::Callbacks;
use crate::event::Event;

/// Static facts about this client, shared with every extension.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// The disco identity category, e.g. `client`.
    pub identity_category: String,
    /// The disco identity type, e.g. `pc` or `bot`.
    pub identity_type: String,
    /// The human-readable client name.
    pub identity_name: String,
    /// The caps node URI identifying this application.
    pub caps_node: String,
    /// The software name reported to version queries.
    pub software_name: String,
    /// The software version reported to version queries.
    pub software_version: String,
    /// The operating system reported to version queries, if any.
    pub software_os: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> ClientSettings {
        ClientSettings {
            identity_category: String::from("client"),
            identity_type: String::from("pc"),
            identity_name: String::from("jabber-rs"),
            caps_node: String::from("https://github.com/jabber-rs/jabber-rs"),
            software_name: String::from("jabber-rs"),
            software_version: String::from(env!("CARGO_PKG_VERSION")),
            software_os: None,
        }
    }
}

/// What an extension gets to work with: the session for traffic, the event
/// channel for fan-out, and the decision callbacks.
#[derive(Clone)]
pub struct ExtensionContext {
    /// The underlying session.
    pub session: Session,
    pub(crate) events: broadcast::Sender<Event>,
    pub(crate) callbacks: Arc<Callbacks>,
    /// The preferred languages of this client, most preferred first.
    pub lang: Arc<Vec<String>>,
    /// Static facts about this client.
    pub settings: Arc<ClientSettings>,
    // Backref for routing outbound traffic through the filter chain.
    pub(crate) registry: Arc<OnceLock<Weak<ExtensionRegistry>>>,
}

impl ExtensionContext {
    /// Fans an event out to every subscriber.
    pub fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn upgrade_registry(&self) -> Option<Arc<ExtensionRegistry>> {
        self.registry.get().and_then(Weak::upgrade)
    }

    /// Sends a stanza through the output filter chain.
    pub fn send_stanza(&self, mut stanza: Stanza) -> Result<(), Error> {
        if let Some(registry) = self.upgrade_registry() {
            registry.run_output_filters(&mut stanza);
        }
        self.session.send_stanza(stanza.into())
    }

    /// Sends an iq request through the output filter chain and waits for
    /// the correlated response.
    pub async fn iq_request(&self, iq: Iq) -> Result<Iq, Error> {
        let mut stanza = Stanza::Iq(iq);
        if let Some(registry) = self.upgrade_registry() {
            registry.run_output_filters(&mut stanza);
        }
        match stanza {
            Stanza::Iq(iq) => self.session.iq_request(iq).await,
            _ => Err(Error::InvalidState),
        }
    }

    /// Non-blocking variant of [`ExtensionContext::iq_request`]; usable
    /// from inside a filter.
    pub fn iq_request_callback<F>(&self, iq: Iq, callback: F)
    where
        F: FnOnce(Result<Iq, Error>) + Send + 'static,
    {
        let mut stanza = Stanza::Iq(iq);
        if let Some(registry) = self.upgrade_registry() {
            registry.run_output_filters(&mut stanza);
        }
        match stanza {
            Stanza::Iq(iq) => self.session.iq_request_callback(iq, callback),
            _ => callback(Err(Error::InvalidState)),
        }
    }
}

/// A pluggable protocol module.
///
/// Filters must not block: anything that needs the network goes through
/// [`Session::iq_request_callback`] or a spawned task.
pub trait Extension: Send + Sync + 'static {
    /// The unique tag of this extension.
    fn name(&self) -> &'static str;

    /// The XML namespaces this extension implements, advertised through
    /// service discovery.
    fn namespaces(&self) -> &'static [&'static str] {
        &[]
    }

    /// Inspects an inbound stanza before the built-in handling. Returning
    /// true consumes the stanza: the chain stops and no events are raised
    /// for it.
    fn input_filter(&self, _ctx: &ExtensionContext, _stanza: &mut Stanza) -> bool {
        false
    }

    /// Mutates an outbound stanza before serialization.
    fn output_filter(&self, _ctx: &ExtensionContext, _stanza: &mut Stanza) {}

    /// Called once all extensions of the session are loaded.
    fn attached(&self, _ctx: &ExtensionContext) {}

    /// Called when the extension is unloaded or the session closes.
    fn detached(&self) {}

    /// Upcast for typed lookups through the registry.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl std::fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Extension").field(&self.name()).finish()
    }
}

/// A recipe for building one extension, with its declared dependencies.
pub struct ExtensionDescriptor {
    /// The unique tag this descriptor registers.
    pub tag: &'static str,

    /// Tags which must be loaded before this one.
    pub requires: &'static [&'static str],

    /// Builds the extension; dependencies can be fetched from the registry.
    pub build: fn(&ExtensionRegistry) -> Result<Arc<dyn Extension>, Error>,
}

struct RegistryState {
    loaded: Vec<(&'static str, Arc<dyn Extension>)>,
    loading: Vec<&'static str>,
}

/// The per-session extension registry.
pub struct ExtensionRegistry {
    context: ExtensionContext,
    descriptors: HashMap<&'static str, ExtensionDescriptor>,
    state: Mutex<RegistryState>,
}

impl ExtensionRegistry {
    /// Creates a registry over the given descriptors.
    pub fn new(
        context: ExtensionContext,
        descriptors: Vec<ExtensionDescriptor>,
    ) -> ExtensionRegistry {
        ExtensionRegistry {
            context,
            descriptors: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.tag, descriptor))
                .collect(),
            state: Mutex::new(RegistryState {
                loaded: Vec::new(),
                loading: Vec::new(),
            }),
        }
    }

    /// The shared context handed to extensions.
    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }

    /// Loads the extension registered under `tag`, building its
    /// dependencies first. Loading an already-loaded tag returns the
    /// existing singleton; a dependency cycle is an error.
    pub fn load(&self, tag: &str) -> Result<Arc<dyn Extension>, Error> {
        if let Some(extension) = self.get(tag) {
            return Ok(extension);
        }

        let descriptor = self
            .descriptors
            .get(tag)
            .ok_or(Error::InvalidArgument("unknown extension tag"))?;

        {
            let mut state = self.state.lock().unwrap();
            if state.loading.contains(&descriptor.tag) {
                return Err(Error::InvalidArgument("extension dependency cycle"));
            }
            state.loading.push(descriptor.tag);
        }

        let result = (|| {
            for dep in descriptor.requires {
                self.load(dep)?;
            }
            (descriptor.build)(self)
        })();

        let mut state = self.state.lock().unwrap();
        state.loading.pop();
        match result {
            Ok(extension) => {
                state.loaded.push((descriptor.tag, extension.clone()));
                Ok(extension)
            }
            Err(e) => Err(e),
        }
    }

    /// Removes the extension registered under `tag`, dropping its namespace
    /// advertisements.
    pub fn unload(&self, tag: &str) {
        let removed = {
            let mut state = self.state.lock().unwrap();
            match state.loaded.iter().position(|(t, _)| *t == tag) {
                Some(index) => Some(state.loaded.remove(index).1),
                None => None,
            }
        };
        if let Some(extension) = removed {
            extension.detached();
        }
    }

    /// The extension loaded under `tag`, if any.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Extension>> {
        self.state
            .lock()
            .unwrap()
            .loaded
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, extension)| extension.clone())
    }

    /// Typed variant of [`ExtensionRegistry::get`].
    pub fn get_as<T: Extension>(&self, tag: &str) -> Option<Arc<T>> {
        self.get(tag)
            .and_then(|extension| extension.as_any().downcast::<T>().ok())
    }

    /// Loads `tag` and hands it back as its concrete type.
    pub fn load_as<T: Extension>(&self, tag: &str) -> Result<Arc<T>, Error> {
        self.load(tag)?
            .as_any()
            .downcast::<T>()
            .map_err(|_| Error::InvalidArgument("extension tag bound to another type"))
    }

    /// Snapshot of the loaded extensions, in load (and therefore filter)
    /// order.
    pub fn filters(&self) -> Vec<Arc<dyn Extension>> {
        self.state
            .lock()
            .unwrap()
            .loaded
            .iter()
            .map(|(_, extension)| extension.clone())
            .collect()
    }

    /// The union of all loaded extensions' namespaces, in load order.
    pub fn advertised_namespaces(&self) -> Vec<&'static str> {
        let mut namespaces = Vec::new();
        for (_, extension) in self.state.lock().unwrap().loaded.iter() {
            for namespace in extension.namespaces() {
                if !namespaces.contains(namespace) {
                    namespaces.push(*namespace);
                }
            }
        }
        namespaces
    }

    /// Invokes the attach hook on every loaded extension.
    pub(crate) fn attach_all(&self) {
        for extension in self.filters() {
            extension.attached(&self.context);
        }
    }

    /// Invokes the detach hook on every loaded extension, in reverse load
    /// order.
    pub(crate) fn detach_all(&self) {
        let mut filters = self.filters();
        filters.reverse();
        for extension in filters {
            extension.detached();
        }
    }

    /// Runs the inbound filter chain. Returns true when some extension
    /// consumed the stanza.
    pub(crate) fn run_input_filters(&self, stanza: &mut Stanza) -> bool {
        for extension in self.filters() {
            if extension.input_filter(&self.context, stanza) {
                return true;
            }
        }
        false
    }

    /// Runs the outbound filter chain.
    pub(crate) fn run_output_filters(&self, stanza: &mut Stanza) {
        for extension in self.filters() {
            extension.output_filter(&self.context, stanza);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(&'static str);

    impl Extension for Dummy {
        fn name(&self) -> &'static str {
            self.0
        }

        fn namespaces(&self) -> &'static [&'static str] {
            &["urn:example:dummy"]
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn test_registry(descriptors: Vec<ExtensionDescriptor>) -> ExtensionRegistry {
        // A context pointing nowhere is enough for registry tests.
        let (events, _) = broadcast::channel(16);
        let context = ExtensionContext {
            session: crate::test_support::offline_session(),
            events,
            callbacks: Arc::new(Callbacks::default()),
            lang: Arc::new(vec![String::from("en")]),
            settings: Arc::new(ClientSettings::default()),
            registry: Arc::new(OnceLock::new()),
        };
        ExtensionRegistry::new(context, descriptors)
    }

    #[test]
    fn test_load_order_is_filter_order() {
        let registry = test_registry(vec![
            ExtensionDescriptor {
                tag: "a",
                requires: &[],
                build: |_| Ok(Arc::new(Dummy("a"))),
            },
            ExtensionDescriptor {
                tag: "b",
                requires: &["a"],
                build: |_| Ok(Arc::new(Dummy("b"))),
            },
        ]);
        registry.load("b").unwrap();
        let names: Vec<_> = registry.filters().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_load_is_idempotent() {
        let registry = test_registry(vec![ExtensionDescriptor {
            tag: "a",
            requires: &[],
            build: |_| Ok(Arc::new(Dummy("a"))),
        }]);
        let first = registry.load("a").unwrap();
        let second = registry.load("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.filters().len(), 1);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let registry = test_registry(vec![
            ExtensionDescriptor {
                tag: "a",
                requires: &["b"],
                build: |_| Ok(Arc::new(Dummy("a"))),
            },
            ExtensionDescriptor {
                tag: "b",
                requires: &["a"],
                build: |_| Ok(Arc::new(Dummy("b"))),
            },
        ]);
        let error = registry.load("a").unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(_)));
        assert!(registry.filters().is_empty());
    }

    #[test]
    fn test_unload_drops_namespaces() {
        let registry = test_registry(vec![ExtensionDescriptor {
            tag: "a",
            requires: &[],
            build: |_| Ok(Arc::new(Dummy("a"))),
        }]);
        registry.load("a").unwrap();
        assert_eq!(registry.advertised_namespaces(), ["urn:example:dummy"]);
        registry.unload("a");
        assert!(registry.advertised_namespaces().is_empty());
    }

    #[test]
    fn test_unknown_tag() {
        let registry = test_registry(vec![]);
        assert!(registry.load("nope").is_err());
    }
}
