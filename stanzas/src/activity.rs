// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User activity (XEP-0108).

use core::convert::TryFrom;
use core::str::FromStr;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

generate_attribute!(
    /// The general category of an activity.
    General, "general", {
        /// Doing household chores.
        DoingChores => "doing_chores",

        /// Having a drink.
        Drinking => "drinking",

        /// Having a meal.
        Eating => "eating",

        /// Physical activity.
        Exercising => "exercising",

        /// Personal grooming.
        Grooming => "grooming",

        /// Attending an appointment.
        HavingAppointment => "having_appointment",

        /// Away from the device.
        Inactive => "inactive",

        /// Taking it easy.
        Relaxing => "relaxing",

        /// In a conversation.
        Talking => "talking",

        /// On the move.
        Traveling => "traveling",

        /// Anything else.
        Undefined => "undefined",

        /// At work.
        Working => "working",
    }
);

impl General {
    fn from_element_name(s: &str) -> Result<General, Error> {
        General::from_str(s)
            .map_err(|_| Error::ParseError("Unknown general activity category."))
    }
}

/// The `<activity/>` element published over PEP; an empty one retracts the
/// current activity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserActivity {
    /// The general category, absent for a retraction.
    pub general: Option<General>,

    /// The specific activity inside the general category, as its element
    /// name on the wire (e.g. `partying`).
    pub specific: Option<String>,

    /// A natural-language description of the activity.
    pub text: Option<String>,
}

impl TryFrom<Element> for UserActivity {
    type Error = Error;

    fn try_from(elem: Element) -> Result<UserActivity, Error> {
        check_self!(elem, "activity", ACTIVITY);
        check_no_attributes!(elem, "activity");
        let mut activity = UserActivity::default();
        for child in elem.children() {
            if child.is("text", ns::ACTIVITY) {
                activity.text = Some(child.text());
            } else if child.has_ns(ns::ACTIVITY) {
                if activity.general.is_some() {
                    return Err(Error::ParseError("More than one general activity."));
                }
                activity.general = Some(General::from_element_name(child.name())?);
                for specific in child.children() {
                    if !specific.has_ns(ns::ACTIVITY) || activity.specific.is_some() {
                        return Err(Error::ParseError("Invalid specific activity."));
                    }
                    activity.specific = Some(specific.name().to_owned());
                }
            } else {
                return Err(Error::ParseError("Unknown child in activity element."));
            }
        }
        Ok(activity)
    }
}

impl From<UserActivity> for Element {
    fn from(activity: UserActivity) -> Element {
        Element::builder("activity", ns::ACTIVITY)
            .append_all(activity.general.map(|general| {
                Element::builder(general.to_string(), ns::ACTIVITY)
                    .append_all(activity.specific.map(|specific| {
                        Element::builder(specific, ns::ACTIVITY).build()
                    }))
                    .build()
            }))
            .append_all(activity.text.map(|text| {
                Element::builder("text", ns::ACTIVITY).append(text).build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element = "<activity xmlns='http://jabber.org/protocol/activity'><relaxing><partying/></relaxing><text>My nurse&apos;s birthday!</text></activity>"
            .parse()
            .unwrap();
        let activity = UserActivity::try_from(elem).unwrap();
        assert_eq!(activity.general, Some(General::Relaxing));
        assert_eq!(activity.specific.as_deref(), Some("partying"));
        assert_eq!(activity.text.as_deref(), Some("My nurse's birthday!"));
    }

    #[test]
    fn test_retraction() {
        let elem: Element = "<activity xmlns='http://jabber.org/protocol/activity'/>"
            .parse()
            .unwrap();
        let activity = UserActivity::try_from(elem).unwrap();
        assert_eq!(activity.general, None);
    }

    #[test]
    fn test_roundtrip() {
        let activity = UserActivity {
            general: Some(General::Traveling),
            specific: Some(String::from("in_a_car")),
            text: None,
        };
        let elem = Element::from(activity.clone());
        assert_eq!(UserActivity::try_from(elem).unwrap(), activity);
    }
}
