// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! XML namespace definitions used by XMPP.

/// RFC 6120: client-to-server stanzas.
pub const JABBER_CLIENT: &str = "jabber:client";

/// The default namespace for stanzas in this build.
pub const DEFAULT_NS: &str = JABBER_CLIENT;

/// RFC 6120: the stream envelope.
pub const STREAM: &str = "http://etherx.jabber.org/streams";

/// RFC 6120: stream-level errors.
pub const XMPP_STREAMS: &str = "urn:ietf:params:xml:ns:xmpp-streams";

/// RFC 6120: STARTTLS negotiation.
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// RFC 6120: SASL authentication.
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// RFC 6120: resource binding.
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// RFC 3921: legacy session establishment.
pub const SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";

/// RFC 6120: stanza error conditions.
pub const XMPP_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// RFC 6121: contact list management.
pub const ROSTER: &str = "jabber:iq:roster";

/// XEP-0016: privacy lists.
pub const PRIVACY: &str = "jabber:iq:privacy";

/// XEP-0030: service discovery, info part.
pub const DISCO_INFO: &str = "http://jabber.org/protocol/disco#info";

/// XEP-0030: service discovery, items part.
pub const DISCO_ITEMS: &str = "http://jabber.org/protocol/disco#items";

/// XEP-0115: entity capabilities.
pub const CAPS: &str = "http://jabber.org/protocol/caps";

/// XEP-0004: data forms.
pub const DATA_FORMS: &str = "jabber:x:data";

/// XEP-0059: result set management.
pub const RSM: &str = "http://jabber.org/protocol/rsm";

/// XEP-0045: multi-user chat, the join envelope.
pub const MUC: &str = "http://jabber.org/protocol/muc";

/// XEP-0045: multi-user chat, occupant payloads.
pub const MUC_USER: &str = "http://jabber.org/protocol/muc#user";

/// XEP-0045: multi-user chat, administration.
pub const MUC_ADMIN: &str = "http://jabber.org/protocol/muc#admin";

/// XEP-0045: multi-user chat, room configuration.
pub const MUC_OWNER: &str = "http://jabber.org/protocol/muc#owner";

/// XEP-0249: direct MUC invitations.
pub const CONFERENCE: &str = "jabber:x:conference";

/// XEP-0095: stream initiation.
pub const SI: &str = "http://jabber.org/protocol/si";

/// XEP-0096: stream initiation profile for file transfer.
pub const SI_FILE_TRANSFER: &str = "http://jabber.org/protocol/si/profile/file-transfer";

/// XEP-0020: feature negotiation.
pub const FEATURE_NEG: &str = "http://jabber.org/protocol/feature-neg";

/// XEP-0065: SOCKS5 bytestreams.
pub const BYTESTREAMS: &str = "http://jabber.org/protocol/bytestreams";

/// XEP-0047: in-band bytestreams.
pub const IBB: &str = "http://jabber.org/protocol/ibb";

/// XEP-0313: message archive management.
pub const MAM: &str = "urn:xmpp:mam:2";

/// XEP-0280: message carbons.
pub const CARBONS: &str = "urn:xmpp:carbons:2";

/// XEP-0297: stanza forwarding.
pub const FORWARD: &str = "urn:xmpp:forward:0";

/// XEP-0203: delayed delivery.
pub const DELAY: &str = "urn:xmpp:delay";

/// XEP-0199: XMPP ping.
pub const PING: &str = "urn:xmpp:ping";

/// XEP-0202: entity time.
pub const TIME: &str = "urn:xmpp:time";

/// XEP-0092: software version.
pub const VERSION: &str = "jabber:iq:version";

/// XEP-0224: attention.
pub const ATTENTION: &str = "urn:xmpp:attention:0";

/// XEP-0191: blocking command.
pub const BLOCKING: &str = "urn:xmpp:blocking";

/// XEP-0085: chat state notifications.
pub const CHATSTATES: &str = "http://jabber.org/protocol/chatstates";

/// XEP-0077: in-band registration.
pub const REGISTER: &str = "jabber:iq:register";

/// XEP-0055: Jabber search.
pub const SEARCH: &str = "jabber:iq:search";

/// XEP-0363: HTTP file upload.
pub const HTTP_UPLOAD: &str = "urn:xmpp:http:upload:0";

/// XEP-0060: publish-subscribe.
pub const PUBSUB: &str = "http://jabber.org/protocol/pubsub";

/// XEP-0060: publish-subscribe event notifications.
pub const PUBSUB_EVENT: &str = "http://jabber.org/protocol/pubsub#event";

/// XEP-0107: user mood.
pub const MOOD: &str = "http://jabber.org/protocol/mood";

/// XEP-0108: user activity.
pub const ACTIVITY: &str = "http://jabber.org/protocol/activity";

/// XEP-0118: user tune.
pub const TUNE: &str = "http://jabber.org/protocol/tune";

/// vcard-temp, kept for interoperability with avatar updates.
pub const VCARD: &str = "vcard-temp";

/// XEP-0153: vCard-based avatar update hints in presence.
pub const VCARD_UPDATE: &str = "vcard-temp:x:update";
