// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Data forms (XEP-0004).

use core::convert::TryFrom;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

/// Represents one of the possible values for a list- field.
#[derive(Debug, Clone, PartialEq)]
pub struct Option_ {
    /// The optional label to be displayed to the user for this option.
    pub label: Option<String>,

    /// The value returned to the server when selecting this option.
    pub value: String,
}

impl TryFrom<Element> for Option_ {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Option_, Error> {
        check_self!(elem, "option", DATA_FORMS);
        check_no_unknown_attributes!(elem, "option", ["label"]);
        let label = get_attr!(elem, "label", Option);
        let mut value = None;
        for child in elem.children() {
            if !child.is("value", ns::DATA_FORMS) {
                return Err(Error::ParseError("Non-value child in option element."));
            }
            if value.is_some() {
                return Err(Error::ParseError("More than one value in option element."));
            }
            value = Some(child.text());
        }
        Ok(Option_ {
            label,
            value: value.ok_or(Error::ParseError("No value in option element."))?,
        })
    }
}

impl From<Option_> for Element {
    fn from(option: Option_) -> Element {
        Element::builder("option", ns::DATA_FORMS)
            .attr("label", option.label)
            .append(
                Element::builder("value", ns::DATA_FORMS)
                    .append(option.value)
                    .build(),
            )
            .build()
    }
}

generate_attribute!(
    /// The type of a field element.
    FieldType, "type", {
        /// This field can only take the values "0" or "false" for a false
        /// value, and "1" or "true" for a true value.
        Boolean => "boolean",

        /// This field describes data, it must not be modified.
        Fixed => "fixed",

        /// This field is hidden, it should not be displayed to the user but
        /// should be sent back to the requester.
        Hidden => "hidden",

        /// This field accepts one or more JIDs.
        JidMulti => "jid-multi",

        /// This field accepts one JID.
        JidSingle => "jid-single",

        /// This field accepts one or more values from the list provided as
        /// options.
        ListMulti => "list-multi",

        /// This field accepts one value from the list provided as options.
        ListSingle => "list-single",

        /// This field accepts one or more free form text lines.
        TextMulti => "text-multi",

        /// This field accepts one free form password.
        TextPrivate => "text-private",

        /// This field accepts one free form text line.
        TextSingle => "text-single",
    }, Default = TextSingle
);

/// Represents a field in a data form.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The unique identifier for this field, in the form.
    pub var: Option<String>,

    /// The type of this field.
    pub type_: FieldType,

    /// The label to be possibly displayed to the user for this field.
    pub label: Option<String>,

    /// The form will be rejected if this field isn't present.
    pub required: bool,

    /// A list of allowed values.
    pub options: Vec<Option_>,

    /// The values provided for this field.
    pub values: Vec<String>,
}

impl Field {
    /// Creates a new field of the given type.
    pub fn new(var: &str, type_: FieldType) -> Field {
        Field {
            var: Some(String::from(var)),
            type_,
            label: None,
            required: false,
            options: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a value to this field.
    pub fn with_value(mut self, value: &str) -> Field {
        self.values.push(String::from(value));
        self
    }

    /// Creates a text-single field with the given value.
    pub fn text_single(var: &str, value: &str) -> Field {
        Field::new(var, FieldType::TextSingle).with_value(value)
    }

    /// The first value of this field, if any.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

impl TryFrom<Element> for Field {
    type Error = Error;

    fn try_from(elem: Element) -> Result<Field, Error> {
        check_self!(elem, "field", DATA_FORMS);
        check_no_unknown_attributes!(elem, "field", ["label", "type", "var"]);
        let mut field = Field {
            var: get_attr!(elem, "var", Option),
            type_: get_attr!(elem, "type", Default),
            label: get_attr!(elem, "label", Option),
            required: false,
            options: vec![],
            values: vec![],
        };
        if field.type_ != FieldType::Fixed && field.var.is_none() {
            return Err(Error::ParseError("Required attribute 'var' missing."));
        }
        for element in elem.children() {
            if element.is("value", ns::DATA_FORMS) {
                check_no_children!(element, "value");
                check_no_attributes!(element, "value");
                field.values.push(element.text());
            } else if element.is("required", ns::DATA_FORMS) {
                if field.required {
                    return Err(Error::ParseError("More than one required element."));
                }
                check_no_children!(element, "required");
                check_no_attributes!(element, "required");
                field.required = true;
            } else if element.is("option", ns::DATA_FORMS) {
                if field.type_ != FieldType::ListSingle && field.type_ != FieldType::ListMulti {
                    return Err(Error::ParseError("Option element found in non-list field."));
                }
                field.options.push(Option_::try_from(element.clone())?);
            } else if element.is("desc", ns::DATA_FORMS) {
                // Ignored for now.
            } else {
                return Err(Error::ParseError("Field child isn't a value or option element."));
            }
        }
        Ok(field)
    }
}

impl From<Field> for Element {
    fn from(field: Field) -> Element {
        Element::builder("field", ns::DATA_FORMS)
            .attr("var", field.var)
            .attr("type", field.type_)
            .attr("label", field.label)
            .append_all(if field.required {
                Some(Element::builder("required", ns::DATA_FORMS).build())
            } else {
                None
            })
            .append_all(field.options)
            .append_all(field.values.into_iter().map(|value| {
                Element::builder("value", ns::DATA_FORMS)
                    .append(value)
                    .build()
            }))
            .build()
    }
}

generate_attribute!(
    /// The type of a data form.
    DataFormType, "type", {
        /// This form is a cancel request for a prior form.
        Cancel => "cancel",

        /// This is a request for the recipient to fill this form and send it
        /// back.
        Form => "form",

        /// This is a result form.
        Result_ => "result",

        /// This is a filled form to be processed by the recipient.
        Submit => "submit",
    }
);

/// This is a form to be sent to another entity for filling.
#[derive(Debug, Clone, PartialEq)]
pub struct DataForm {
    /// The type of this form.
    pub type_: DataFormType,

    /// An easy accessor for the FORM_TYPE of this form, see
    /// [XEP-0068](https://xmpp.org/extensions/xep-0068.html) for more
    /// information.
    pub form_type: Option<String>,

    /// The title of this form.
    pub title: Option<String>,

    /// The instructions set on this form.
    pub instructions: Option<String>,

    /// A list of fields comprising this form.
    pub fields: Vec<Field>,
}

impl DataForm {
    /// Creates a new form with the given FORM_TYPE.
    pub fn new(type_: DataFormType, form_type: &str, fields: Vec<Field>) -> DataForm {
        DataForm {
            type_,
            form_type: Some(String::from(form_type)),
            title: None,
            instructions: None,
            fields,
        }
    }

    /// The field with the given var, if present.
    pub fn field(&self, var: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.var.as_deref() == Some(var))
    }
}

impl TryFrom<Element> for DataForm {
    type Error = Error;

    fn try_from(elem: Element) -> Result<DataForm, Error> {
        check_self!(elem, "x", DATA_FORMS);
        check_no_unknown_attributes!(elem, "x", ["type"]);
        let type_ = get_attr!(elem, "type", Required);
        let mut form = DataForm {
            type_,
            form_type: None,
            title: None,
            instructions: None,
            fields: vec![],
        };
        for child in elem.children() {
            if child.is("title", ns::DATA_FORMS) {
                if form.title.is_some() {
                    return Err(Error::ParseError("More than one title in form element."));
                }
                check_no_children!(child, "title");
                check_no_attributes!(child, "title");
                form.title = Some(child.text());
            } else if child.is("instructions", ns::DATA_FORMS) {
                if form.instructions.is_some() {
                    return Err(Error::ParseError(
                        "More than one instructions in form element.",
                    ));
                }
                check_no_children!(child, "instructions");
                check_no_attributes!(child, "instructions");
                form.instructions = Some(child.text());
            } else if child.is("field", ns::DATA_FORMS) {
                let field = Field::try_from(child.clone())?;
                if field.var.as_deref() == Some("FORM_TYPE") && field.type_ == FieldType::Hidden {
                    if form.form_type.is_some() {
                        return Err(Error::ParseError("More than one FORM_TYPE in a form."));
                    }
                    form.form_type = field.values.first().cloned();
                }
                form.fields.push(field);
            } else {
                return Err(Error::ParseError("Unknown child in data form element."));
            }
        }
        Ok(form)
    }
}

impl From<DataForm> for Element {
    fn from(form: DataForm) -> Element {
        Element::builder("x", ns::DATA_FORMS)
            .attr("type", form.type_)
            .append_all(form.title.map(|title| {
                Element::builder("title", ns::DATA_FORMS)
                    .append(title)
                    .build()
            }))
            .append_all(form.instructions.map(|instructions| {
                Element::builder("instructions", ns::DATA_FORMS)
                    .append(instructions)
                    .build()
            }))
            .append_all(form.fields)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_form() {
        let elem: Element = "<x xmlns='jabber:x:data' type='result'/>".parse().unwrap();
        let form = DataForm::try_from(elem).unwrap();
        assert_eq!(form.type_, DataFormType::Result_);
        assert!(form.form_type.is_none());
        assert!(form.fields.is_empty());
    }

    #[test]
    fn test_form_type() {
        let elem: Element = "<x xmlns='jabber:x:data' type='submit'><field var='FORM_TYPE' type='hidden'><value>urn:xmpp:mam:2</value></field></x>"
            .parse()
            .unwrap();
        let form = DataForm::try_from(elem).unwrap();
        assert_eq!(form.form_type, Some(String::from("urn:xmpp:mam:2")));
    }

    #[test]
    fn test_list_single() {
        let elem: Element = "<x xmlns='jabber:x:data' type='form'><field var='stream-method' type='list-single'><option><value>a</value></option><option><value>b</value></option></field></x>"
            .parse()
            .unwrap();
        let form = DataForm::try_from(elem).unwrap();
        let field = form.field("stream-method").unwrap();
        assert_eq!(field.type_, FieldType::ListSingle);
        assert_eq!(field.options.len(), 2);
        assert_eq!(field.options[0].value, "a");
    }

    #[test]
    fn test_option_in_text_field_rejected() {
        let elem: Element = "<x xmlns='jabber:x:data' type='form'><field var='a'><option><value>v</value></option></field></x>"
            .parse()
            .unwrap();
        let error = DataForm::try_from(elem).unwrap_err();
        let message = match error {
            Error::ParseError(string) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Option element found in non-list field.");
    }

    #[test]
    fn test_roundtrip() {
        let elem: Element = "<x xmlns='jabber:x:data' type='submit'><field var='FORM_TYPE' type='hidden'><value>ns</value></field><field var='muc#roomconfig_roomname'><value>My room</value></field></x>"
            .parse()
            .unwrap();
        let elem1 = elem.clone();
        let form = DataForm::try_from(elem).unwrap();
        let elem2 = Element::from(form);
        assert_eq!(elem1, elem2);
    }
}
