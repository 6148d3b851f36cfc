// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User tune (XEP-0118).

use core::convert::TryFrom;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

/// The `<tune/>` element published over PEP; an empty one stops the
/// broadcast.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tune {
    /// The artist or performer of the song.
    pub artist: Option<String>,

    /// The duration of the song in seconds.
    pub length: Option<u32>,

    /// The user's rating of the song from 1 to 10.
    pub rating: Option<u8>,

    /// The album or other source of the song.
    pub source: Option<String>,

    /// The title of the song.
    pub title: Option<String>,

    /// A unique identifier for the tune, e.g. the track number.
    pub track: Option<String>,

    /// A URI pointing to information about the song.
    pub uri: Option<String>,
}

impl Tune {
    /// Whether this tune carries no information, i.e. stops the broadcast.
    pub fn is_empty(&self) -> bool {
        *self == Tune::default()
    }
}

impl TryFrom<Element> for Tune {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Tune, Error> {
        check_self!(elem, "tune", TUNE);
        check_no_attributes!(elem, "tune");
        let mut tune = Tune::default();
        for child in elem.children() {
            if child.is("artist", ns::TUNE) {
                tune.artist = Some(child.text());
            } else if child.is("length", ns::TUNE) {
                tune.length = Some(child.text().parse()?);
            } else if child.is("rating", ns::TUNE) {
                tune.rating = Some(child.text().parse()?);
            } else if child.is("source", ns::TUNE) {
                tune.source = Some(child.text());
            } else if child.is("title", ns::TUNE) {
                tune.title = Some(child.text());
            } else if child.is("track", ns::TUNE) {
                tune.track = Some(child.text());
            } else if child.is("uri", ns::TUNE) {
                tune.uri = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in tune element."));
            }
        }
        Ok(tune)
    }
}

impl From<Tune> for Element {
    fn from(tune: Tune) -> Element {
        fn text_child(name: &str, text: String) -> Element {
            Element::builder(name, ns::TUNE).append(text).build()
        }
        Element::builder("tune", ns::TUNE)
            .append_all(tune.artist.map(|v| text_child("artist", v)))
            .append_all(tune.length.map(|v| text_child("length", format!("{}", v))))
            .append_all(tune.rating.map(|v| text_child("rating", format!("{}", v))))
            .append_all(tune.source.map(|v| text_child("source", v)))
            .append_all(tune.title.map(|v| text_child("title", v)))
            .append_all(tune.track.map(|v| text_child("track", v)))
            .append_all(tune.uri.map(|v| text_child("uri", v)))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element = "<tune xmlns='http://jabber.org/protocol/tune'><artist>Yes</artist><length>686</length><source>Yessongs</source><title>Heart of the Sunrise</title></tune>"
            .parse()
            .unwrap();
        let tune = Tune::try_from(elem).unwrap();
        assert_eq!(tune.artist.as_deref(), Some("Yes"));
        assert_eq!(tune.length, Some(686));
        assert_eq!(tune.title.as_deref(), Some("Heart of the Sunrise"));
        assert!(!tune.is_empty());
    }

    #[test]
    fn test_stop() {
        let elem: Element = "<tune xmlns='http://jabber.org/protocol/tune'/>"
            .parse()
            .unwrap();
        let tune = Tune::try_from(elem).unwrap();
        assert!(tune.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let tune = Tune {
            artist: Some(String::from("Gerry Rafferty")),
            title: Some(String::from("Baker Street")),
            ..Tune::default()
        };
        let elem = Element::from(tune.clone());
        assert_eq!(Tune::try_from(elem).unwrap(), tune);
    }
}
