// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User mood (XEP-0107).

use core::convert::TryFrom;
use core::str::FromStr;

use minidom::Element;

use crate::ns;
use crate::util::error::Error;

/// The mood values defined in XEP-0107.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Mood {
    Afraid,
    Amazed,
    Amorous,
    Angry,
    Annoyed,
    Anxious,
    Aroused,
    Ashamed,
    Bored,
    Brave,
    Calm,
    Cautious,
    Cold,
    Confident,
    Confused,
    Contemplative,
    Contented,
    Cranky,
    Crazy,
    Creative,
    Curious,
    Dejected,
    Depressed,
    Disappointed,
    Disgusted,
    Dismayed,
    Distracted,
    Embarrassed,
    Envious,
    Excited,
    Flirtatious,
    Frustrated,
    Grateful,
    Grieving,
    Grumpy,
    Guilty,
    Happy,
    Hopeful,
    Hot,
    Humbled,
    Humiliated,
    Hungry,
    Hurt,
    Impressed,
    InAwe,
    InLove,
    Indignant,
    Interested,
    Intoxicated,
    Invincible,
    Jealous,
    Lonely,
    Lost,
    Lucky,
    Mean,
    Moody,
    Nervous,
    Neutral,
    Offended,
    Outraged,
    Playful,
    Proud,
    Relaxed,
    Relieved,
    Remorseful,
    Restless,
    Sad,
    Sarcastic,
    Satisfied,
    Serious,
    Shocked,
    Shy,
    Sick,
    Sleepy,
    Spontaneous,
    Stressed,
    Strong,
    Surprised,
    Thankful,
    Thirsty,
    Tired,
    Undefined,
    Weak,
    Worried,
}

impl Mood {
    /// The element name of this mood on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Mood::Afraid => "afraid",
            Mood::Amazed => "amazed",
            Mood::Amorous => "amorous",
            Mood::Angry => "angry",
            Mood::Annoyed => "annoyed",
            Mood::Anxious => "anxious",
            Mood::Aroused => "aroused",
            Mood::Ashamed => "ashamed",
            Mood::Bored => "bored",
            Mood::Brave => "brave",
            Mood::Calm => "calm",
            Mood::Cautious => "cautious",
            Mood::Cold => "cold",
            Mood::Confident => "confident",
            Mood::Confused => "confused",
            Mood::Contemplative => "contemplative",
            Mood::Contented => "contented",
            Mood::Cranky => "cranky",
            Mood::Crazy => "crazy",
            Mood::Creative => "creative",
            Mood::Curious => "curious",
            Mood::Dejected => "dejected",
            Mood::Depressed => "depressed",
            Mood::Disappointed => "disappointed",
            Mood::Disgusted => "disgusted",
            Mood::Dismayed => "dismayed",
            Mood::Distracted => "distracted",
            Mood::Embarrassed => "embarrassed",
            Mood::Envious => "envious",
            Mood::Excited => "excited",
            Mood::Flirtatious => "flirtatious",
            Mood::Frustrated => "frustrated",
            Mood::Grateful => "grateful",
            Mood::Grieving => "grieving",
            Mood::Grumpy => "grumpy",
            Mood::Guilty => "guilty",
            Mood::Happy => "happy",
            Mood::Hopeful => "hopeful",
            Mood::Hot => "hot",
            Mood::Humbled => "humbled",
            Mood::Humiliated => "humiliated",
            Mood::Hungry => "hungry",
            Mood::Hurt => "hurt",
            Mood::Impressed => "impressed",
            Mood::InAwe => "in_awe",
            Mood::InLove => "in_love",
            Mood::Indignant => "indignant",
            Mood::Interested => "interested",
            Mood::Intoxicated => "intoxicated",
            Mood::Invincible => "invincible",
            Mood::Jealous => "jealous",
            Mood::Lonely => "lonely",
            Mood::Lost => "lost",
            Mood::Lucky => "lucky",
            Mood::Mean => "mean",
            Mood::Moody => "moody",
            Mood::Nervous => "nervous",
            Mood::Neutral => "neutral",
            Mood::Offended => "offended",
            Mood::Outraged => "outraged",
            Mood::Playful => "playful",
            Mood::Proud => "proud",
            Mood::Relaxed => "relaxed",
            Mood::Relieved => "relieved",
            Mood::Remorseful => "remorseful",
            Mood::Restless => "restless",
            Mood::Sad => "sad",
            Mood::Sarcastic => "sarcastic",
            Mood::Satisfied => "satisfied",
            Mood::Serious => "serious",
            Mood::Shocked => "shocked",
            Mood::Shy => "shy",
            Mood::Sick => "sick",
            Mood::Sleepy => "sleepy",
            Mood::Spontaneous => "spontaneous",
            Mood::Stressed => "stressed",
            Mood::Strong => "strong",
            Mood::Surprised => "surprised",
            Mood::Thankful => "thankful",
            Mood::Thirsty => "thirsty",
            Mood::Tired => "tired",
            Mood::Undefined => "undefined",
            Mood::Weak => "weak",
            Mood::Worried => "worried",
        }
    }
}

impl FromStr for Mood {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mood, Error> {
        Ok(match s {
            "afraid" => Mood::Afraid,
            "amazed" => Mood::Amazed,
            "amorous" => Mood::Amorous,
            "angry" => Mood::Angry,
            "annoyed" => Mood::Annoyed,
            "anxious" => Mood::Anxious,
            "aroused" => Mood::Aroused,
            "ashamed" => Mood::Ashamed,
            "bored" => Mood::Bored,
            "brave" => Mood::Brave,
            "calm" => Mood::Calm,
            "cautious" => Mood::Cautious,
            "cold" => Mood::Cold,
            "confident" => Mood::Confident,
            "confused" => Mood::Confused,
            "contemplative" => Mood::Contemplative,
            "contented" => Mood::Contented,
            "cranky" => Mood::Cranky,
            "crazy" => Mood::Crazy,
            "creative" => Mood::Creative,
            "curious" => Mood::Curious,
            "dejected" => Mood::Dejected,
            "depressed" => Mood::Depressed,
            "disappointed" => Mood::Disappointed,
            "disgusted" => Mood::Disgusted,
            "dismayed" => Mood::Dismayed,
            "distracted" => Mood::Distracted,
            "embarrassed" => Mood::Embarrassed,
            "envious" => Mood::Envious,
            "excited" => Mood::Excited,
            "flirtatious" => Mood::Flirtatious,
            "frustrated" => Mood::Frustrated,
            "grateful" => Mood::Grateful,
            "grieving" => Mood::Grieving,
            "grumpy" => Mood::Grumpy,
            "guilty" => Mood::Guilty,
            "happy" => Mood::Happy,
            "hopeful" => Mood::Hopeful,
            "hot" => Mood::Hot,
            "humbled" => Mood::Humbled,
            "humiliated" => Mood::Humiliated,
            "hungry" => Mood::Hungry,
            "hurt" => Mood::Hurt,
            "impressed" => Mood::Impressed,
            "in_awe" => Mood::InAwe,
            "in_love" => Mood::InLove,
            "indignant" => Mood::Indignant,
            "interested" => Mood::Interested,
            "intoxicated" => Mood::Intoxicated,
            "invincible" => Mood::Invincible,
            "jealous" => Mood::Jealous,
            "lonely" => Mood::Lonely,
            "lost" => Mood::Lost,
            "lucky" => Mood::Lucky,
            "mean" => Mood::Mean,
            "moody" => Mood::Moody,
            "nervous" => Mood::Nervous,
            "neutral" => Mood::Neutral,
            "offended" => Mood::Offended,
            "outraged" => Mood::Outraged,
            "playful" => Mood::Playful,
            "proud" => Mood::Proud,
            "relaxed" => Mood::Relaxed,
            "relieved" => Mood::Relieved,
            "remorseful" => Mood::Remorseful,
            "restless" => Mood::Restless,
            "sad" => Mood::Sad,
            "sarcastic" => Mood::Sarcastic,
            "satisfied" => Mood::Satisfied,
            "serious" => Mood::Serious,
            "shocked" => Mood::Shocked,
            "shy" => Mood::Shy,
            "sick" => Mood::Sick,
            "sleepy" => Mood::Sleepy,
            "spontaneous" => Mood::Spontaneous,
            "stressed" => Mood::Stressed,
            "strong" => Mood::Strong,
            "surprised" => Mood::Surprised,
            "thankful" => Mood::Thankful,
            "thirsty" => Mood::Thirsty,
            "tired" => Mood::Tired,
            "undefined" => Mood::Undefined,
            "weak" => Mood::Weak,
            "worried" => Mood::Worried,
            _ => return Err(Error::ParseError("Unknown mood.")),
        })
    }
}

/// The `<mood/>` element published over PEP; an empty one retracts the
/// current mood.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserMood {
    /// The mood value, absent for a retraction.
    pub mood: Option<Mood>,

    /// A natural-language description of, or reason for, the mood.
    pub text: Option<String>,
}

impl TryFrom<Element> for UserMood {
    type Error = Error;

    fn try_from(elem: Element) -> Result<UserMood, Error> {
        check_self!(elem, "mood", MOOD);
        check_no_attributes!(elem, "mood");
        let mut user_mood = UserMood::default();
        for child in elem.children() {
            if child.is("text", ns::MOOD) {
                user_mood.text = Some(child.text());
            } else if child.has_ns(ns::MOOD) {
                if user_mood.mood.is_some() {
                    return Err(Error::ParseError("More than one mood value."));
                }
                user_mood.mood = Some(child.name().parse()?);
            } else {
                return Err(Error::ParseError("Unknown child in mood element."));
            }
        }
        Ok(user_mood)
    }
}

impl From<UserMood> for Element {
    fn from(user_mood: UserMood) -> Element {
        Element::builder("mood", ns::MOOD)
            .append_all(
                user_mood
                    .mood
                    .map(|mood| Element::builder(mood.name(), ns::MOOD).build()),
            )
            .append_all(user_mood.text.map(|text| {
                Element::builder("text", ns::MOOD).append(text).build()
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let elem: Element =
            "<mood xmlns='http://jabber.org/protocol/mood'><happy/><text>Yay!</text></mood>"
                .parse()
                .unwrap();
        let mood = UserMood::try_from(elem).unwrap();
        assert_eq!(mood.mood, Some(Mood::Happy));
        assert_eq!(mood.text.as_deref(), Some("Yay!"));
    }

    #[test]
    fn test_retraction() {
        let elem: Element = "<mood xmlns='http://jabber.org/protocol/mood'/>"
            .parse()
            .unwrap();
        let mood = UserMood::try_from(elem).unwrap();
        assert_eq!(mood.mood, None);
    }

    #[test]
    fn test_roundtrip() {
        let user_mood = UserMood {
            mood: Some(Mood::InAwe),
            text: None,
        };
        let elem = Element::from(user_mood.clone());
        assert_eq!(UserMood::try_from(elem).unwrap(), user_mood);
    }
}
