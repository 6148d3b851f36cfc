// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;
use std::collections::BTreeMap;

use minidom::Element;

use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

/// Should be implemented on every known payload of a `<message/>`.
pub trait MessagePayload: TryFrom<Element> + Into<Element> {}

generate_attribute!(
    /// The type of a message.
    MessageType, "type", {
        /// Standard instant messaging message.
        Chat => "chat",

        /// Notifies that an error happened.
        Error => "error",

        /// Standard group instant messaging message.
        Groupchat => "groupchat",

        /// Used by servers to notify users when things happen.
        Headline => "headline",

        /// This is an email-like message, it usually contains a
        /// [subject](struct.Subject.html).
        Normal => "normal",
    }, Default = Normal
);

type Lang = String;

generate_elem_id!(
    /// Represents one `<body/>` element, that is the free form text content
    /// of a message.
    Body,
    "body",
    DEFAULT_NS
);

generate_elem_id!(
    /// Defines the subject of a room, or of an email-like normal message.
    Subject,
    "subject",
    DEFAULT_NS
);

generate_elem_id!(
    /// A thread identifier, so that other people can specify to which
    /// message they are replying.
    Thread,
    "thread",
    DEFAULT_NS
);

/// The main structure representing the `<message/>` stanza.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza.
    pub id: Option<String>,

    /// The type of this message.
    pub type_: MessageType,

    /// A list of bodies, sorted per language.
    pub bodies: BTreeMap<Lang, Body>,

    /// A list of subjects, sorted per language.
    pub subjects: BTreeMap<Lang, Subject>,

    /// An optional thread identifier, so that other people can reply
    /// directly to this message.
    pub thread: Option<Thread>,

    /// A list of the extension payloads contained in this stanza.
    pub payloads: Vec<Element>,
}

impl Message {
    /// Creates a new `<message/>` stanza of a certain type for the given
    /// recipient.
    pub fn new_with_type<J: Into<Option<Jid>>>(type_: MessageType, to: J) -> Message {
        Message {
            from: None,
            to: to.into(),
            id: None,
            type_,
            bodies: BTreeMap::new(),
            subjects: BTreeMap::new(),
            thread: None,
            payloads: vec![],
        }
    }

    /// Creates a new `<message/>` stanza of type Chat for the given
    /// recipient.
    pub fn chat<J: Into<Option<Jid>>>(to: J) -> Message {
        Self::new_with_type(MessageType::Chat, to)
    }

    /// Creates a new `<message/>` stanza of type Groupchat for the given
    /// recipient.
    pub fn groupchat<J: Into<Option<Jid>>>(to: J) -> Message {
        Self::new_with_type(MessageType::Groupchat, to)
    }

    /// Creates a new `<message/>` stanza of type Normal for the given
    /// recipient.
    pub fn normal<J: Into<Option<Jid>>>(to: J) -> Message {
        Self::new_with_type(MessageType::Normal, to)
    }

    /// Appends a body in the given language to this message.
    pub fn with_body(mut self, lang: Lang, body: String) -> Message {
        self.bodies.insert(lang, Body(body));
        self
    }

    /// Appends a payload to this message.
    pub fn with_payload<P: MessagePayload>(mut self, payload: P) -> Message {
        self.payloads.push(payload.into());
        self
    }

    fn get_best<'a, T>(
        map: &'a BTreeMap<Lang, T>,
        preferred_langs: &[&str],
    ) -> Option<(Lang, &'a T)> {
        if map.is_empty() {
            return None;
        }
        for lang in preferred_langs {
            if let Some(value) = map.get(*lang) {
                return Some((Lang::from(*lang), value));
            }
        }
        if let Some(value) = map.get("") {
            return Some((Lang::new(), value));
        }
        map.iter().map(|(lang, value)| (lang.clone(), value)).next()
    }

    /// Returns the best matching body from a list of preferred languages.
    ///
    /// If no body matches, the empty-language one is tried, then any body at
    /// all.
    pub fn get_best_body(&self, preferred_langs: &[&str]) -> Option<(Lang, &Body)> {
        Message::get_best::<Body>(&self.bodies, preferred_langs)
    }

    /// Returns the best matching subject from a list of preferred languages.
    pub fn get_best_subject(&self, preferred_langs: &[&str]) -> Option<(Lang, &Subject)> {
        Message::get_best::<Subject>(&self.subjects, preferred_langs)
    }

    /// Tries to extract the given payload type from this message, removing
    /// the matching element. Elements which do not match are left in place;
    /// a matching element which fails to parse is reported as an error.
    pub fn extract_payload<T: TryFrom<Element, Error = Error>>(
        &mut self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<T>, Error> {
        match self.payloads.iter().position(|e| e.is(name, namespace)) {
            Some(index) => T::try_from(self.payloads.remove(index)).map(Some),
            None => Ok(None),
        }
    }
}

impl TryFrom<Element> for Message {
    type Error = Error;

    fn try_from(root: Element) -> Result<Message, Error> {
        check_self!(root, "message", DEFAULT_NS);
        let from = get_attr!(root, "from", Option);
        let to = get_attr!(root, "to", Option);
        let id = get_attr!(root, "id", Option);
        let type_ = get_attr!(root, "type", Default);
        let mut bodies = BTreeMap::new();
        let mut subjects = BTreeMap::new();
        let mut thread = None;
        let mut payloads = vec![];
        for elem in root.children() {
            if elem.is("body", ns::DEFAULT_NS) {
                check_no_children!(elem, "body");
                let lang = get_attr!(elem, "xml:lang", Default);
                let body = Body(elem.text());
                if bodies.insert(lang, body).is_some() {
                    return Err(Error::ParseError(
                        "Body element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("subject", ns::DEFAULT_NS) {
                check_no_children!(elem, "subject");
                let lang = get_attr!(elem, "xml:lang", Default);
                let subject = Subject(elem.text());
                if subjects.insert(lang, subject).is_some() {
                    return Err(Error::ParseError(
                        "Subject element present twice for the same xml:lang.",
                    ));
                }
            } else if elem.is("thread", ns::DEFAULT_NS) {
                if thread.is_some() {
                    return Err(Error::ParseError("Thread element present twice."));
                }
                check_no_children!(elem, "thread");
                thread = Some(Thread(elem.text()));
            } else {
                payloads.push(elem.clone())
            }
        }
        Ok(Message {
            from,
            to,
            id,
            type_,
            bodies,
            subjects,
            thread,
            payloads,
        })
    }
}

impl From<Message> for Element {
    fn from(message: Message) -> Element {
        Element::builder("message", ns::DEFAULT_NS)
            .attr("from", message.from)
            .attr("to", message.to)
            .attr("id", message.id)
            .attr("type", message.type_)
            .append_all(message.subjects.into_iter().map(|(lang, subject)| {
                let mut subject = Element::from(subject);
                subject.set_attr(
                    "xml:lang",
                    match lang.as_ref() {
                        "" => None,
                        lang => Some(lang),
                    },
                );
                subject
            }))
            .append_all(message.bodies.into_iter().map(|(lang, body)| {
                let mut body = Element::from(body);
                body.set_attr(
                    "xml:lang",
                    match lang.as_ref() {
                        "" => None,
                        lang => Some(lang),
                    },
                );
                body
            }))
            .append_all(
                message
                    .thread
                    .map(Element::from)
                    .into_iter(),
            )
            .append_all(message.payloads)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn test_simple() {
        let elem: Element = "<message xmlns='jabber:client'/>".parse().unwrap();
        let message = Message::try_from(elem).unwrap();
        assert_eq!(message.from, None);
        assert_eq!(message.to, None);
        assert_eq!(message.id, None);
        assert_eq!(message.type_, MessageType::Normal);
        assert!(message.payloads.is_empty());
    }

    #[test]
    fn test_body() {
        let elem: Element = "<message xmlns='jabber:client' to='coucou@example.org' type='chat'><body>Hello world!</body></message>".parse().unwrap();
        let elem1 = elem.clone();
        let message = Message::try_from(elem).unwrap();
        assert_eq!(message.bodies[""], Body::from_str("Hello world!").unwrap());

        let elem2 = Element::from(message);
        assert_eq!(elem1, elem2);
    }

    #[test]
    fn get_best_body() {
        let elem: Element = "<message xmlns='jabber:client' to='coucou@example.org' type='chat'><body xml:lang='de'>Hallo Welt!</body><body xml:lang='fr'>Salut le monde !</body><body>Hello world!</body></message>".parse().unwrap();
        let message = Message::try_from(elem).unwrap();

        {
            let (lang, body) = message.get_best_body(&["fr"]).unwrap();
            assert_eq!(lang, "fr");
            assert_eq!(body, &Body::from_str("Salut le monde !").unwrap());
        }

        // Order of the preference list wins.
        {
            let (lang, body) = message.get_best_body(&["en", "de"]).unwrap();
            assert_eq!(lang, "de");
            assert_eq!(body, &Body::from_str("Hallo Welt!").unwrap());
        }

        // Fallback to the empty language.
        {
            let (lang, body) = message.get_best_body(&["ja"]).unwrap();
            assert_eq!(lang, "");
            assert_eq!(body, &Body::from_str("Hello world!").unwrap());
        }

        let message = Message::chat(None);
        assert_eq!(message.get_best_body(&["ja"]), None);
    }

    #[test]
    fn test_subject_and_thread() {
        let elem: Element = "<message xmlns='jabber:client' type='groupchat'><subject>Hello</subject><thread>id1</thread></message>".parse().unwrap();
        let elem1 = elem.clone();
        let message = Message::try_from(elem).unwrap();
        assert_eq!(
            message.subjects[""],
            Subject::from_str("Hello").unwrap()
        );
        assert_eq!(message.thread, Some(Thread(String::from("id1"))));
        let elem2 = Element::from(message);
        assert_eq!(elem1, elem2);
    }

    #[test]
    fn test_extract_payload() {
        let elem: Element = "<message xmlns='jabber:client' to='coucou@example.org' type='chat'><attention xmlns='urn:xmpp:attention:0'/></message>".parse().unwrap();
        let mut message = Message::try_from(elem).unwrap();
        assert_eq!(message.payloads.len(), 1);
        let attention = message
            .extract_payload::<crate::attention::Attention>("attention", crate::ns::ATTENTION)
            .unwrap();
        assert!(attention.is_some());
        assert_eq!(message.payloads.len(), 0);
    }
}
