// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Blocking command (XEP-0191).

use core::convert::TryFrom;

use minidom::Element;

use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::jid::Jid;
use crate::ns;
use crate::util::error::Error;

fn parse_items(elem: &Element) -> Result<Vec<Jid>, Error> {
    let mut items = vec![];
    for child in elem.children() {
        if !child.is("item", ns::BLOCKING) {
            return Err(Error::ParseError("Unknown child in blocking element."));
        }
        items.push(get_attr!(child, "jid", Required));
    }
    Ok(items)
}

fn items_to_elements(items: Vec<Jid>) -> impl Iterator<Item = Element> {
    items.into_iter().map(|jid| {
        Element::builder("item", ns::BLOCKING)
            .attr("jid", jid)
            .build()
    })
}

generate_empty_element!(
    /// Asks the server for the list of blocked JIDs.
    BlocklistRequest,
    "blocklist",
    BLOCKING
);

impl IqGetPayload for BlocklistRequest {}

/// The list of currently blocked JIDs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlocklistResult {
    /// The blocked JIDs.
    pub items: Vec<Jid>,
}

impl IqResultPayload for BlocklistResult {}

impl TryFrom<Element> for BlocklistResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<BlocklistResult, Error> {
        check_self!(elem, "blocklist", BLOCKING);
        check_no_attributes!(elem, "blocklist");
        Ok(BlocklistResult {
            items: parse_items(&elem)?,
        })
    }
}

impl From<BlocklistResult> for Element {
    fn from(result: BlocklistResult) -> Element {
        Element::builder("blocklist", ns::BLOCKING)
            .append_all(items_to_elements(result.items))
            .build()
    }
}

/// A request to block one or more JIDs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    /// The JIDs to block.
    pub items: Vec<Jid>,
}

impl IqSetPayload for Block {}

impl TryFrom<Element> for Block {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Block, Error> {
        check_self!(elem, "block", BLOCKING);
        check_no_attributes!(elem, "block");
        Ok(Block {
            items: parse_items(&elem)?,
        })
    }
}

impl From<Block> for Element {
    fn from(block: Block) -> Element {
        Element::builder("block", ns::BLOCKING)
            .append_all(items_to_elements(block.items))
            .build()
    }
}

/// A request to unblock one or more JIDs, or all of them when empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unblock {
    /// The JIDs to unblock; unblocks everything when empty.
    pub items: Vec<Jid>,
}

impl IqSetPayload for Unblock {}

impl TryFrom<Element> for Unblock {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Unblock, Error> {
        check_self!(elem, "unblock", BLOCKING);
        check_no_attributes!(elem, "unblock");
        Ok(Unblock {
            items: parse_items(&elem)?,
        })
    }
}

impl From<Unblock> for Element {
    fn from(unblock: Unblock) -> Element {
        Element::builder("unblock", ns::BLOCKING)
            .append_all(items_to_elements(unblock.items))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocklist() {
        let elem: Element = "<blocklist xmlns='urn:xmpp:blocking'><item jid='romeo@montague.net'/><item jid='iago@shakespeare.lit'/></blocklist>"
            .parse()
            .unwrap();
        let result = BlocklistResult::try_from(elem).unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0], Jid::new("romeo@montague.net").unwrap());
    }

    #[test]
    fn test_block_roundtrip() {
        let block = Block {
            items: vec![Jid::new("iago@shakespeare.lit").unwrap()],
        };
        let elem = Element::from(block.clone());
        assert_eq!(Block::try_from(elem).unwrap(), block);
    }

    #[test]
    fn test_unblock_all() {
        let elem: Element = "<unblock xmlns='urn:xmpp:blocking'/>".parse().unwrap();
        let unblock = Unblock::try_from(elem).unwrap();
        assert!(unblock.items.is_empty());
    }
}
