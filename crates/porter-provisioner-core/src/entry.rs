// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Entry ids and raw entries on the stream store boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::EntryIdError;

/// Field map of one stream entry.
pub type Fields = BTreeMap<String, Bytes>;

/// Position of an entry within a stream, rendered as `{millis}-{seq}`.
///
/// Ids are assigned by the store on append and are strictly increasing within
/// a stream. Ordering is by `millis`, then `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId {
	pub millis: u64,
	pub seq: u64,
}

impl EntryId {
	/// Offset before the first entry of every stream.
	pub const ZERO: EntryId = EntryId { millis: 0, seq: 0 };

	pub const fn new(millis: u64, seq: u64) -> Self {
		Self { millis, seq }
	}

	/// The id to assign to an entry appended after `last` at wall-clock `now_millis`.
	///
	/// A clock that goes backwards keeps the previous millisecond and bumps the
	/// sequence, so ids never decrease.
	pub fn next_after(last: Option<EntryId>, now_millis: u64) -> EntryId {
		match last {
			Some(last) if now_millis <= last.millis => EntryId::new(last.millis, last.seq + 1),
			_ => EntryId::new(now_millis.max(1), 0),
		}
	}
}

impl fmt::Display for EntryId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.millis, self.seq)
	}
}

impl FromStr for EntryId {
	type Err = EntryIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (millis, seq) = s
			.split_once('-')
			.ok_or_else(|| EntryIdError::Malformed(s.to_string()))?;
		let millis = millis
			.parse()
			.map_err(|_| EntryIdError::NotNumeric(s.to_string()))?;
		let seq = seq
			.parse()
			.map_err(|_| EntryIdError::NotNumeric(s.to_string()))?;
		Ok(EntryId { millis, seq })
	}
}

impl Serialize for EntryId {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for EntryId {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// One raw entry read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
	pub id: EntryId,
	pub fields: Fields,
}

impl StreamEntry {
	pub fn new(id: EntryId, fields: Fields) -> Self {
		Self { id, fields }
	}

	pub fn field(&self, name: &str) -> Option<&Bytes> {
		self.fields.get(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_parse_and_display() {
		let id: EntryId = "1526919030474-55".parse().unwrap();
		assert_eq!(id, EntryId::new(1526919030474, 55));
		assert_eq!(id.to_string(), "1526919030474-55");
		assert_eq!("0-0".parse::<EntryId>().unwrap(), EntryId::ZERO);
	}

	#[test]
	fn test_parse_errors() {
		assert!(matches!(
			"12345".parse::<EntryId>(),
			Err(EntryIdError::Malformed(_))
		));
		assert!(matches!(
			"a-1".parse::<EntryId>(),
			Err(EntryIdError::NotNumeric(_))
		));
		assert!(matches!(
			"1-2-3".parse::<EntryId>(),
			Err(EntryIdError::NotNumeric(_))
		));
	}

	#[test]
	fn test_next_after_same_millis_bumps_seq() {
		let first = EntryId::next_after(None, 100);
		assert_eq!(first, EntryId::new(100, 0));
		let second = EntryId::next_after(Some(first), 100);
		assert_eq!(second, EntryId::new(100, 1));
		let third = EntryId::next_after(Some(second), 101);
		assert_eq!(third, EntryId::new(101, 0));
	}

	#[test]
	fn test_next_after_clock_skew() {
		let last = EntryId::new(500, 3);
		assert_eq!(EntryId::next_after(Some(last), 400), EntryId::new(500, 4));
	}

	#[test]
	fn test_first_id_is_after_zero() {
		assert!(EntryId::next_after(None, 0) > EntryId::ZERO);
	}

	#[test]
	fn test_serde_as_string() {
		let json = serde_json::to_string(&EntryId::new(5, 6)).unwrap();
		assert_eq!(json, "\"5-6\"");
		let back: EntryId = serde_json::from_str(&json).unwrap();
		assert_eq!(back, EntryId::new(5, 6));
	}

	proptest! {
		#[test]
		fn prop_ids_strictly_increase(clock in proptest::collection::vec(0u64..50, 1..64)) {
			let mut last: Option<EntryId> = None;
			for now in clock {
				let next = EntryId::next_after(last, now);
				if let Some(prev) = last {
					prop_assert!(next > prev);
				}
				last = Some(next);
			}
		}
	}
}
