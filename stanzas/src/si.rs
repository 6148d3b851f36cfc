// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stream initiation (XEP-0095), its file-transfer profile (XEP-0096), and
//! the feature negotiation envelope it relies on (XEP-0020).

use core::convert::TryFrom;

use minidom::Element;

use crate::data_forms::{DataForm, DataFormType, Field, FieldType, Option_};
use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::ns;
use crate::util::error::Error;

/// The feature negotiation envelope, carrying one data form.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureNegotiation {
    /// The form negotiated over.
    pub form: DataForm,
}

impl TryFrom<Element> for FeatureNegotiation {
    type Error = Error;

    fn try_from(elem: Element) -> Result<FeatureNegotiation, Error> {
        check_self!(elem, "feature", FEATURE_NEG, "feature negotiation");
        check_no_attributes!(elem, "feature");
        let mut form = None;
        for child in elem.children() {
            if !child.is("x", ns::DATA_FORMS) || form.is_some() {
                return Err(Error::ParseError("Unknown child in feature element."));
            }
            form = Some(DataForm::try_from(child.clone())?);
        }
        Ok(FeatureNegotiation {
            form: form.ok_or(Error::ParseError("Missing form in feature element."))?,
        })
    }
}

impl From<FeatureNegotiation> for Element {
    fn from(feature: FeatureNegotiation) -> Element {
        Element::builder("feature", ns::FEATURE_NEG)
            .append(Element::from(feature.form))
            .build()
    }
}

/// Metadata about the file being offered (XEP-0096).
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFile {
    /// The file name the sender suggests.
    pub name: String,

    /// The size of the file in bytes.
    pub size: u64,

    /// An optional description of the file.
    pub desc: Option<String>,
}

impl TransferFile {
    /// Creates a new file description.
    pub fn new<N: Into<String>>(name: N, size: u64) -> TransferFile {
        TransferFile {
            name: name.into(),
            size,
            desc: None,
        }
    }
}

impl TryFrom<Element> for TransferFile {
    type Error = Error;

    fn try_from(elem: Element) -> Result<TransferFile, Error> {
        check_self!(elem, "file", SI_FILE_TRANSFER, "file description");
        check_no_unknown_attributes!(elem, "file", ["name", "size", "date", "hash"]);
        let mut desc = None;
        for child in elem.children() {
            if child.is("desc", ns::SI_FILE_TRANSFER) {
                desc = Some(child.text());
            } else if child.is("range", ns::SI_FILE_TRANSFER) {
                // Ranged transfers are not supported, the offer is treated
                // as a full transfer.
            } else {
                return Err(Error::ParseError("Unknown child in file element."));
            }
        }
        Ok(TransferFile {
            name: get_attr!(elem, "name", Required),
            size: get_attr!(elem, "size", Required),
            desc,
        })
    }
}

impl From<TransferFile> for Element {
    fn from(file: TransferFile) -> Element {
        Element::builder("file", ns::SI_FILE_TRANSFER)
            .attr("name", file.name)
            .attr("size", format!("{}", file.size))
            .append_all(file.desc.map(|desc| {
                Element::builder("desc", ns::SI_FILE_TRANSFER)
                    .append(desc)
                    .build()
            }))
            .build()
    }
}

/// The variable of the stream-method field in an SI negotiation form.
pub const STREAM_METHOD: &str = "stream-method";

/// A stream initiation offer or response.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInitiation {
    /// The session identifier of this stream, unique between the two peers.
    pub sid: Option<String>,

    /// The content type of the stream.
    pub mime_type: Option<String>,

    /// The profile defining the meaning of this stream; only the
    /// file-transfer profile is spoken here.
    pub profile: Option<String>,

    /// The file metadata of the file-transfer profile.
    pub file: Option<TransferFile>,

    /// The negotiated stream methods.
    pub feature: Option<FeatureNegotiation>,
}

impl IqGetPayload for StreamInitiation {}
impl IqSetPayload for StreamInitiation {}
impl IqResultPayload for StreamInitiation {}

impl StreamInitiation {
    /// Builds a file-transfer offer advertising the given stream methods.
    pub fn new_offer(sid: &str, file: TransferFile, methods: &[&str]) -> StreamInitiation {
        let field = Field {
            var: Some(String::from(STREAM_METHOD)),
            type_: FieldType::ListSingle,
            label: None,
            required: false,
            options: methods
                .iter()
                .map(|method| Option_ {
                    label: None,
                    value: String::from(*method),
                })
                .collect(),
            values: vec![],
        };
        StreamInitiation {
            sid: Some(String::from(sid)),
            mime_type: None,
            profile: Some(String::from(ns::SI_FILE_TRANSFER)),
            file: Some(file),
            feature: Some(FeatureNegotiation {
                form: DataForm {
                    type_: DataFormType::Form,
                    form_type: None,
                    title: None,
                    instructions: None,
                    fields: vec![field],
                },
            }),
        }
    }

    /// Builds the answer selecting one stream method.
    pub fn new_selection(method: &str) -> StreamInitiation {
        StreamInitiation {
            sid: None,
            mime_type: None,
            profile: None,
            file: None,
            feature: Some(FeatureNegotiation {
                form: DataForm {
                    type_: DataFormType::Submit,
                    form_type: None,
                    title: None,
                    instructions: None,
                    fields: vec![Field {
                        var: Some(String::from(STREAM_METHOD)),
                        type_: FieldType::TextSingle,
                        label: None,
                        required: false,
                        options: vec![],
                        values: vec![String::from(method)],
                    }],
                },
            }),
        }
    }

    /// The stream methods offered, for an offer form.
    pub fn offered_methods(&self) -> Vec<String> {
        match self.feature {
            Some(ref feature) => match feature.form.field(STREAM_METHOD) {
                Some(field) => field
                    .options
                    .iter()
                    .map(|option| option.value.clone())
                    .collect(),
                None => vec![],
            },
            None => vec![],
        }
    }

    /// The stream method selected by the peer, for a submitted form.
    pub fn selected_method(&self) -> Option<&str> {
        self.feature
            .as_ref()
            .and_then(|feature| feature.form.field(STREAM_METHOD))
            .and_then(|field| field.value())
    }
}

impl TryFrom<Element> for StreamInitiation {
    type Error = Error;

    fn try_from(elem: Element) -> Result<StreamInitiation, Error> {
        check_self!(elem, "si", SI, "stream initiation");
        check_no_unknown_attributes!(elem, "si", ["id", "mime-type", "profile"]);
        let mut si = StreamInitiation {
            sid: get_attr!(elem, "id", Option),
            mime_type: get_attr!(elem, "mime-type", Option),
            profile: get_attr!(elem, "profile", Option),
            file: None,
            feature: None,
        };
        for child in elem.children() {
            if child.is("file", ns::SI_FILE_TRANSFER) {
                if si.file.is_some() {
                    return Err(Error::ParseError("More than one file in si element."));
                }
                si.file = Some(TransferFile::try_from(child.clone())?);
            } else if child.is("feature", ns::FEATURE_NEG) {
                if si.feature.is_some() {
                    return Err(Error::ParseError("More than one feature in si element."));
                }
                si.feature = Some(FeatureNegotiation::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in si element."));
            }
        }
        Ok(si)
    }
}

impl From<StreamInitiation> for Element {
    fn from(si: StreamInitiation) -> Element {
        Element::builder("si", ns::SI)
            .attr("id", si.sid)
            .attr("mime-type", si.mime_type)
            .attr("profile", si.profile)
            .append_all(si.file.map(Element::from))
            .append_all(si.feature.map(Element::from))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer() {
        let elem: Element = r#"<si xmlns='http://jabber.org/protocol/si' id='a0' profile='http://jabber.org/protocol/si/profile/file-transfer'>
  <file xmlns='http://jabber.org/protocol/si/profile/file-transfer' name='test.txt' size='1022'>
    <desc>This is a test.</desc>
  </file>
  <feature xmlns='http://jabber.org/protocol/feature-neg'>
    <x xmlns='jabber:x:data' type='form'>
      <field var='stream-method' type='list-single'>
        <option><value>http://jabber.org/protocol/bytestreams</value></option>
        <option><value>http://jabber.org/protocol/ibb</value></option>
      </field>
    </x>
  </feature>
</si>"#
            .parse()
            .unwrap();
        let si = StreamInitiation::try_from(elem).unwrap();
        assert_eq!(si.sid.as_deref(), Some("a0"));
        let file = si.file.clone().unwrap();
        assert_eq!(file.name, "test.txt");
        assert_eq!(file.size, 1022);
        assert_eq!(file.desc.as_deref(), Some("This is a test."));
        assert_eq!(
            si.offered_methods(),
            [ns::BYTESTREAMS, ns::IBB]
        );
    }

    #[test]
    fn test_selection() {
        let si = StreamInitiation::new_selection(ns::IBB);
        let elem = Element::from(si);
        let si = StreamInitiation::try_from(elem).unwrap();
        assert_eq!(si.selected_method(), Some(ns::IBB));
    }

    #[test]
    fn test_offer_construction() {
        let si =
            StreamInitiation::new_offer("s1", TransferFile::new("a.bin", 2048), &[ns::IBB]);
        assert_eq!(si.offered_methods(), [ns::IBB]);
        let elem = Element::from(si);
        let si = StreamInitiation::try_from(elem).unwrap();
        assert_eq!(si.file.unwrap().size, 2048);
        assert_eq!(si.profile.as_deref(), Some(ns::SI_FILE_TRANSFER));
    }
}
