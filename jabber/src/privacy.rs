// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Privacy list management (XEP-0016).
//!
//! A session can have at most one active list, a user at most one default
//! list; both are managed here, next to the list contents themselves.

use jabber_stanzas::iq::{Iq, IqType};
use jabber_stanzas::privacy::{List, ListRef, Query};
use tokio_jabber::{Error, Session};

/// Privacy list operations.
pub struct PrivacyLists {
    session: Session,
}

impl PrivacyLists {
    pub(crate) fn new(session: Session) -> PrivacyLists {
        PrivacyLists { session }
    }

    async fn request(&self, id: &str, query: Query) -> Result<Query, Error> {
        let response = self.session.iq_request(Iq::from_set(id, query)).await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(Query::try_from(payload)?),
            IqType::Result(None) => Ok(Query::default()),
            _ => Err(Error::InvalidState),
        }
    }

    /// The names of the lists stored on the server, plus which are active
    /// and default.
    pub async fn list_names(&self) -> Result<Query, Error> {
        let response = self
            .session
            .iq_request(Iq::from_get("privacy-names", Query::default()))
            .await?;
        match response.payload {
            IqType::Result(Some(payload)) => Ok(Query::try_from(payload)?),
            _ => Err(Error::InvalidState),
        }
    }

    /// Fetches the rules of one named list.
    pub async fn get_list(&self, name: &str) -> Result<List, Error> {
        let query = Query {
            lists: vec![List::new(name)],
            ..Query::default()
        };
        let response = self
            .session
            .iq_request(Iq::from_get("privacy-get", query))
            .await?;
        match response.payload {
            IqType::Result(Some(payload)) => Query::try_from(payload)?
                .lists
                .into_iter()
                .next()
                .ok_or(Error::InvalidState),
            _ => Err(Error::InvalidState),
        }
    }

    /// Creates or replaces a list. Submitting a list with no rules removes
    /// it.
    pub async fn set_list(&self, list: List) -> Result<(), Error> {
        let query = Query {
            lists: vec![list],
            ..Query::default()
        };
        self.request("privacy-set", query).await?;
        Ok(())
    }

    /// Makes a list active for this session, or declines any active list
    /// with `None`.
    pub async fn set_active(&self, name: Option<&str>) -> Result<(), Error> {
        let query = Query {
            active: Some(ListRef {
                name: name.map(String::from),
            }),
            ..Query::default()
        };
        self.request("privacy-active", query).await?;
        Ok(())
    }

    /// Makes a list the default for the user, or declines any default with
    /// `None`.
    pub async fn set_default(&self, name: Option<&str>) -> Result<(), Error> {
        let query = Query {
            default: Some(ListRef {
                name: name.map(String::from),
            }),
            ..Query::default()
        };
        self.request("privacy-default", query).await?;
        Ok(())
    }
}
