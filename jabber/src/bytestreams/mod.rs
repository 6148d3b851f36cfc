// Copyright (c) 2024 jabber-rs contributors.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The byte-stream backends pluggable under the file-transfer coordinator.

mod ibb;
mod socks5;

pub use self::ibb::Ibb;
pub use self::socks5::Socks5;
