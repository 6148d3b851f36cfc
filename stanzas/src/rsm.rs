// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Result set management (XEP-0059).

use core::convert::TryFrom;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

/// Requests paging through a potentially big set of items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetQuery {
    /// Limit the number of items, or use the recipient's defaults if None.
    pub max: Option<usize>,

    /// The UID after which to give results, or if None it is the element
    /// "before" the first item, effectively an index of negative one.
    pub after: Option<String>,

    /// The UID before which to give results, or if None it starts with the
    /// last page of the full set.
    pub before: Option<String>,

    /// Numerical index of the page (deprecated).
    pub index: Option<usize>,
}

impl TryFrom<Element> for SetQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<SetQuery, Error> {
        check_self!(elem, "set", RSM, "RSM set");
        check_no_attributes!(elem, "set");
        let mut set = SetQuery::default();
        for child in elem.children() {
            if child.is("max", ns::RSM) {
                if set.max.is_some() {
                    return Err(Error::ParseError("Set can't have more than one max."));
                }
                set.max = Some(child.text().parse()?);
            } else if child.is("after", ns::RSM) {
                if set.after.is_some() {
                    return Err(Error::ParseError("Set can't have more than one after."));
                }
                set.after = Some(child.text());
            } else if child.is("before", ns::RSM) {
                if set.before.is_some() {
                    return Err(Error::ParseError("Set can't have more than one before."));
                }
                set.before = Some(child.text());
            } else if child.is("index", ns::RSM) {
                if set.index.is_some() {
                    return Err(Error::ParseError("Set can't have more than one index."));
                }
                set.index = Some(child.text().parse()?);
            } else {
                return Err(Error::ParseError("Unknown child in set element."));
            }
        }
        Ok(set)
    }
}

impl From<SetQuery> for Element {
    fn from(set: SetQuery) -> Element {
        Element::builder("set", ns::RSM)
            .append_all(set.max.map(|max| {
                Element::builder("max", ns::RSM)
                    .append(format!("{}", max))
                    .build()
            }))
            .append_all(set.after.map(|after| {
                Element::builder("after", ns::RSM).append(after).build()
            }))
            .append_all(set.before.map(|before| {
                Element::builder("before", ns::RSM).append(before).build()
            }))
            .append_all(set.index.map(|index| {
                Element::builder("index", ns::RSM)
                    .append(format!("{}", index))
                    .build()
            }))
            .build()
    }
}

/// The first item of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct First {
    /// The position of the first item in the full set (which may be
    /// approximate).
    pub index: Option<usize>,

    /// The UID of the first item of the page.
    pub item: String,
}

/// Describes the paging result of a [SetQuery].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetResult {
    /// The first item of the page.
    pub first: Option<First>,

    /// The UID of the last item of the page.
    pub last: Option<String>,

    /// How many items there are in the full set (which may be approximate).
    pub count: Option<usize>,
}

impl TryFrom<Element> for SetResult {
    type Error = Error;

    fn try_from(elem: Element) -> Result<SetResult, Error> {
        check_self!(elem, "set", RSM, "RSM set");
        check_no_attributes!(elem, "set");
        let mut set = SetResult::default();
        for child in elem.children() {
            if child.is("first", ns::RSM) {
                if set.first.is_some() {
                    return Err(Error::ParseError("Set can't have more than one first."));
                }
                set.first = Some(First {
                    index: get_attr!(child, "index", Option),
                    item: child.text(),
                });
            } else if child.is("last", ns::RSM) {
                if set.last.is_some() {
                    return Err(Error::ParseError("Set can't have more than one last."));
                }
                set.last = Some(child.text());
            } else if child.is("count", ns::RSM) {
                if set.count.is_some() {
                    return Err(Error::ParseError("Set can't have more than one count."));
                }
                set.count = Some(child.text().parse()?);
            } else {
                return Err(Error::ParseError("Unknown child in set element."));
            }
        }
        Ok(set)
    }
}

impl From<SetResult> for Element {
    fn from(set: SetResult) -> Element {
        Element::builder("set", ns::RSM)
            .append_all(set.first.map(|first| {
                Element::builder("first", ns::RSM)
                    .attr("index", first.index.map(|index| format!("{}", index)))
                    .append(first.item)
                    .build()
            }))
            .append_all(set.last.map(|last| {
                Element::builder("last", ns::RSM).append(last).build()
            }))
            .append_all(set.count.map(|count| {
                Element::builder("count", ns::RSM)
                    .append(format!("{}", count))
                    .build()
            }))
            .build()
    }
}
