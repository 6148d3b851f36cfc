// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpers for unit tests that need session-shaped objects without a
//! network.

use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;

use jabber_stanzas::jid::Jid;
use tokio_jabber::{Config, Session};

use crate::callbacks::Callbacks;
use crate::extension::{ClientSettings, ExtensionContext};

pub(crate) fn offline_session() -> Session {
    let config = Config::new(
        "127.0.0.1",
        Jid::new("tester@example.org/unit").unwrap(),
        "secret",
    );
    let (session, _events) = Session::new(config);
    session
}

pub(crate) fn offline_context() -> ExtensionContext {
    let (events, _) = broadcast::channel(16);
    ExtensionContext {
        session: offline_session(),
        events,
        callbacks: Arc::new(Callbacks::default()),
        lang: Arc::new(vec![String::from("en")]),
        settings: Arc::new(ClientSettings::default()),
        registry: Arc::new(OnceLock::new()),
    }
}
