// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::convert::TryFrom;

use minidom::Element;

use crate::data_forms::DataForm;
use crate::iq::{IqGetPayload, IqResultPayload, IqSetPayload};
use crate::jid::BareJid;
use crate::ns;
use crate::util::error::Error;

/// A room destruction request, in the muc#owner namespace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OwnerDestroy {
    /// An alternative venue to redirect occupants to.
    pub jid: Option<BareJid>,

    /// The reason for the destruction.
    pub reason: Option<String>,
}

impl TryFrom<Element> for OwnerDestroy {
    type Error = Error;

    fn try_from(elem: Element) -> Result<OwnerDestroy, Error> {
        check_self!(elem, "destroy", MUC_OWNER);
        check_no_unknown_attributes!(elem, "destroy", ["jid"]);
        let mut destroy = OwnerDestroy {
            jid: get_attr!(elem, "jid", Option),
            reason: None,
        };
        for child in elem.children() {
            if child.is("reason", ns::MUC_OWNER) {
                destroy.reason = Some(child.text());
            } else {
                return Err(Error::ParseError("Unknown child in destroy element."));
            }
        }
        Ok(destroy)
    }
}

impl From<OwnerDestroy> for Element {
    fn from(destroy: OwnerDestroy) -> Element {
        Element::builder("destroy", ns::MUC_OWNER)
            .attr("jid", destroy.jid)
            .append_all(destroy.reason.map(|reason| {
                Element::builder("reason", ns::MUC_OWNER)
                    .append(reason)
                    .build()
            }))
            .build()
    }
}

/// A muc#owner query: requesting or submitting the room configuration form,
/// or destroying the room.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OwnerQuery {
    /// The configuration form, absent in a request.
    pub form: Option<DataForm>,

    /// A destruction request.
    pub destroy: Option<OwnerDestroy>,
}

impl IqGetPayload for OwnerQuery {}
impl IqSetPayload for OwnerQuery {}
impl IqResultPayload for OwnerQuery {}

impl TryFrom<Element> for OwnerQuery {
    type Error = Error;

    fn try_from(elem: Element) -> Result<OwnerQuery, Error> {
        check_self!(elem, "query", MUC_OWNER, "muc#owner query");
        check_no_attributes!(elem, "query");
        let mut query = OwnerQuery::default();
        for child in elem.children() {
            if child.is("x", ns::DATA_FORMS) {
                if query.form.is_some() {
                    return Err(Error::ParseError("More than one form in owner query."));
                }
                query.form = Some(DataForm::try_from(child.clone())?);
            } else if child.is("destroy", ns::MUC_OWNER) {
                if query.destroy.is_some() {
                    return Err(Error::ParseError("More than one destroy in owner query."));
                }
                query.destroy = Some(OwnerDestroy::try_from(child.clone())?);
            } else {
                return Err(Error::ParseError("Unknown child in owner query."));
            }
        }
        Ok(query)
    }
}

impl From<OwnerQuery> for Element {
    fn from(query: OwnerQuery) -> Element {
        Element::builder("query", ns::MUC_OWNER)
            .append_all(query.form.map(Element::from))
            .append_all(query.destroy.map(Element::from))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_forms::DataFormType;

    #[test]
    fn test_config_request() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/muc#owner'/>"
            .parse()
            .unwrap();
        let query = OwnerQuery::try_from(elem).unwrap();
        assert!(query.form.is_none());
        assert!(query.destroy.is_none());
    }

    #[test]
    fn test_config_form() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/muc#owner'><x xmlns='jabber:x:data' type='form'><field var='FORM_TYPE' type='hidden'><value>http://jabber.org/protocol/muc#roomconfig</value></field></x></query>"
            .parse()
            .unwrap();
        let query = OwnerQuery::try_from(elem).unwrap();
        let form = query.form.unwrap();
        assert_eq!(form.type_, DataFormType::Form);
        assert_eq!(
            form.form_type.as_deref(),
            Some("http://jabber.org/protocol/muc#roomconfig")
        );
    }

    #[test]
    fn test_destroy() {
        let elem: Element = "<query xmlns='http://jabber.org/protocol/muc#owner'><destroy jid='coven@chat.shakespeare.lit'><reason>Macbeth doth come.</reason></destroy></query>"
            .parse()
            .unwrap();
        let query = OwnerQuery::try_from(elem).unwrap();
        let destroy = query.destroy.unwrap();
        assert_eq!(
            destroy.jid,
            Some(BareJid::new("coven@chat.shakespeare.lit").unwrap())
        );
        assert_eq!(destroy.reason.as_deref(), Some("Macbeth doth come."));
    }
}
