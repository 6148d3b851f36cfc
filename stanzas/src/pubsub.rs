// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The subset of publish-subscribe (XEP-0060) spoken for personal eventing
//! (XEP-0163): publishing items to own nodes and receiving event
//! notifications.

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqResultPayload, IqSetPayload};
use crate::message::MessagePayload;
use crate::ns;
use crate::util::error::Error;

/// An item being published or notified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    /// The identifier of this item, generated by the server when absent.
    pub id: Option<String>,

    /// The payload of this item.
    pub payload: Option<Element>,
}

impl Item {
    /// Creates an item carrying the given payload.
    pub fn new<P: Into<Element>>(payload: P) -> Item {
        Item {
            id: None,
            payload: Some(payload.into()),
        }
    }
}

fn parse_item(elem: &Element) -> Result<Item, Error> {
    let mut item = Item {
        id: get_attr!(elem, "id", Option),
        payload: None,
    };
    for child in elem.children() {
        if item.payload.is_some() {
            return Err(Error::ParseError("More than one payload in item element."));
        }
        item.payload = Some(child.clone());
    }
    Ok(item)
}

fn item_element(item: Item, ns: &str) -> Element {
    Element::builder("item", ns)
        .attr("id", item.id)
        .append_all(item.payload)
        .build()
}

/// A publication request for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Publish {
    /// The node to publish to.
    pub node: String,

    /// The items to publish.
    pub items: Vec<Item>,
}

/// The `<pubsub/>` payload of an iq, restricted to publication.
#[derive(Debug, Clone, PartialEq)]
pub struct PubSub {
    /// The publication carried.
    pub publish: Publish,
}

impl IqSetPayload for PubSub {}
impl IqResultPayload for PubSub {}

impl PubSub {
    /// Creates a publication of one payload on the given node.
    pub fn publish<P: Into<Element>>(node: &str, payload: P) -> PubSub {
        PubSub {
            publish: Publish {
                node: String::from(node),
                items: vec![Item::new(payload)],
            },
        }
    }
}

impl TryFrom<Element> for PubSub {
    type Error = Error;

    fn try_from(elem: Element) -> Result<PubSub, Error> {
        check_self!(elem, "pubsub", PUBSUB);
        check_no_attributes!(elem, "pubsub");
        let mut publish = None;
        for child in elem.children() {
            if child.is("publish", ns::PUBSUB) {
                if publish.is_some() {
                    return Err(Error::ParseError("More than one publish in pubsub."));
                }
                let node = get_attr!(child, "node", Required);
                let mut items = vec![];
                for item in child.children() {
                    if !item.is("item", ns::PUBSUB) {
                        return Err(Error::ParseError("Unknown child in publish element."));
                    }
                    items.push(parse_item(item)?);
                }
                publish = Some(Publish { node, items });
            } else if child.is("publish-options", ns::PUBSUB) {
                // Accepted and ignored.
            } else {
                return Err(Error::ParseError("Unknown child in pubsub element."));
            }
        }
        Ok(PubSub {
            publish: publish.ok_or(Error::ParseError("Missing publish in pubsub element."))?,
        })
    }
}

impl From<PubSub> for Element {
    fn from(pubsub: PubSub) -> Element {
        Element::builder("pubsub", ns::PUBSUB)
            .append(
                Element::builder("publish", ns::PUBSUB)
                    .attr("node", pubsub.publish.node)
                    .append_all(
                        pubsub
                            .publish
                            .items
                            .into_iter()
                            .map(|item| item_element(item, ns::PUBSUB)),
                    )
                    .build(),
            )
            .build()
    }
}

/// An event notification received in a message.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The node this notification comes from.
    pub node: String,

    /// The published items.
    pub items: Vec<Item>,
}

impl MessagePayload for Event {}

impl TryFrom<Element> for Event {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Event, Error> {
        check_self!(elem, "event", PUBSUB_EVENT);
        check_no_attributes!(elem, "event");
        let mut event = None;
        for child in elem.children() {
            if child.is("items", ns::PUBSUB_EVENT) {
                if event.is_some() {
                    return Err(Error::ParseError("More than one items in event element."));
                }
                let node = get_attr!(child, "node", Required);
                let mut items = vec![];
                for item in child.children() {
                    if item.is("item", ns::PUBSUB_EVENT) {
                        items.push(parse_item(item)?);
                    } else if item.is("retract", ns::PUBSUB_EVENT) {
                        // Retractions carry no payload we care about.
                    } else {
                        return Err(Error::ParseError("Unknown child in items element."));
                    }
                }
                event = Some(Event { node, items });
            } else {
                return Err(Error::ParseError("Unknown child in event element."));
            }
        }
        event.ok_or(Error::ParseError("Missing items in event element."))
    }
}

impl From<Event> for Element {
    fn from(event: Event) -> Element {
        Element::builder("event", ns::PUBSUB_EVENT)
            .append(
                Element::builder("items", ns::PUBSUB_EVENT)
                    .attr("node", event.node)
                    .append_all(
                        event
                            .items
                            .into_iter()
                            .map(|item| item_element(item, ns::PUBSUB_EVENT)),
                    )
                    .build(),
            )
            .build()
    }
}
