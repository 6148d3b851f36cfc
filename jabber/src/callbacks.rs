// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Single-consumer decision callbacks.
//!
//! Unlike [events](crate::Event), which fan out to every subscriber, these
//! are questions with exactly one answer: whether to accept a subscription,
//! where to put an incoming file, how to answer an unknown iq.

use std::sync::Mutex;

use minidom::Element;

use jabber_stanzas::data_forms::DataForm;
use jabber_stanzas::jid::Jid;

use crate::filetransfer::FileTransferOffer;

/// The answer to an inbound presence subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionDecision {
    /// Send `subscribed`, granting the request.
    Approve,
    /// Send `unsubscribed`, denying the request.
    Refuse,
    /// Do nothing; the caller will answer later via the subscription
    /// primitives.
    Ignore,
}

/// Where received file-transfer bytes go.
pub type TransferSink = Box<dyn tokio::io::AsyncWrite + Send + Unpin>;

type SubscriptionCallback = Box<dyn Fn(&Jid) -> SubscriptionDecision + Send + Sync>;
type FileTransferCallback = Box<dyn Fn(&FileTransferOffer) -> Option<TransferSink> + Send + Sync>;
type CustomIqCallback = Box<dyn Fn(Option<&Jid>, &Element) -> Option<Element> + Send + Sync>;
type VoiceRequestCallback = Box<dyn Fn(&DataForm) -> Option<DataForm> + Send + Sync>;

/// The registered decision callbacks of one client.
#[derive(Default)]
pub struct Callbacks {
    subscription: Mutex<Option<SubscriptionCallback>>,
    file_transfer: Mutex<Option<FileTransferCallback>>,
    custom_iq: Mutex<Option<CustomIqCallback>>,
    voice_request: Mutex<Option<VoiceRequestCallback>>,
}

impl Callbacks {
    pub(crate) fn set_subscription(&self, callback: SubscriptionCallback) {
        *self.subscription.lock().unwrap() = Some(callback);
    }

    pub(crate) fn decide_subscription(&self, from: &Jid) -> SubscriptionDecision {
        match *self.subscription.lock().unwrap() {
            Some(ref callback) => callback(from),
            None => SubscriptionDecision::Ignore,
        }
    }

    pub(crate) fn set_file_transfer(&self, callback: FileTransferCallback) {
        *self.file_transfer.lock().unwrap() = Some(callback);
    }

    pub(crate) fn decide_file_transfer(
        &self,
        offer: &FileTransferOffer,
    ) -> Option<Option<TransferSink>> {
        self.file_transfer
            .lock()
            .unwrap()
            .as_ref()
            .map(|callback| callback(offer))
    }

    pub(crate) fn set_custom_iq(&self, callback: CustomIqCallback) {
        *self.custom_iq.lock().unwrap() = Some(callback);
    }

    pub(crate) fn answer_custom_iq(
        &self,
        from: Option<&Jid>,
        payload: &Element,
    ) -> Option<Option<Element>> {
        self.custom_iq
            .lock()
            .unwrap()
            .as_ref()
            .map(|callback| callback(from, payload))
    }

    pub(crate) fn set_voice_request(&self, callback: VoiceRequestCallback) {
        *self.voice_request.lock().unwrap() = Some(callback);
    }

    pub(crate) fn answer_voice_request(&self, form: &DataForm) -> Option<DataForm> {
        self.voice_request
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|callback| callback(form))
    }
}
