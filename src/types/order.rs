use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::Serialize;

/// Monotonically increasing order identifier, assigned on creation.
///
/// Newtype-over-integer, in the style of beanstalk-rs's job identifiers,
/// but with no `NonZeroU64` invariant to uphold: id 0 is used as the
/// sentinel returned alongside an invalid submission.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Six-character alphanumeric anti-enumeration token.
///
/// Not a cryptographic secret (~35 bits); it only needs to defeat incidental
/// id enumeration by a client that doesn't already hold one.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Pincode(String);

const PINCODE_LEN: usize = 6;
const PINCODE_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

impl Pincode {
    /// Draws six independent uniform symbols from `[0-9A-Za-z]`. Collisions
    /// across orders are tolerated; pincodes are scoped per-id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let s: String = (0..PINCODE_LEN)
            .map(|_| PINCODE_ALPHABET[rng.gen_range(0..PINCODE_ALPHABET.len())] as char)
            .collect();
        Self(s)
    }
}

impl fmt::Display for Pincode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for Pincode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Order status, mapped to an HTTP-shaped status code by the caller.
/// `Processing` is internal-only and never surfaces as an HTTP response
/// status on its own.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum OrderStatus {
    Processing,
    Ready,
    RenderFailed,
    Nomem,
}

impl OrderStatus {
    pub fn code(self) -> u16 {
        match self {
            OrderStatus::Ready => 200,
            OrderStatus::Processing => 202,
            OrderStatus::RenderFailed => 500,
            OrderStatus::Nomem => 418,
        }
    }

    /// Maps a renderer child's exit code to the resulting order status.
    /// 200 -> Ready, 418 -> Nomem, anything else -> RenderFailed.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            200 => OrderStatus::Ready,
            418 => OrderStatus::Nomem,
            _ => OrderStatus::RenderFailed,
        }
    }
}

/// The six required string-valued fields, as received on the wire, in
/// canonical field order for deduplication.
pub const PARAM_KEYS: [&str; 6] = ["lat", "lon", "scale", "w", "h", "format"];

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Validates that all six required keys are present, `lat`/`lon` parse
    /// as floating point, and `scale`/`w`/`h` are non-negative decimal
    /// integers. `format` passes through verbatim.
    pub fn is_valid(&self) -> bool {
        for key in PARAM_KEYS {
            if !self.0.contains_key(key) {
                return false;
            }
        }

        if self.get("lat").unwrap().parse::<f64>().is_err() {
            return false;
        }
        if self.get("lon").unwrap().parse::<f64>().is_err() {
            return false;
        }

        for key in ["scale", "w", "h"] {
            let v = self.get(key).unwrap();
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
        }

        true
    }

    /// The canonical dedup tuple: values in `PARAM_KEYS` order, joined by a
    /// separator that cannot appear inside any individual value (they're all
    /// validated numeric/format strings).
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey(
            PARAM_KEYS
                .iter()
                .map(|k| self.0.get(*k).cloned().unwrap_or_default())
                .collect(),
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DedupKey(Vec<String>);

/// One tracked rendering job.
#[derive(Clone, Debug)]
pub struct Order {
    pub id: OrderId,
    pub params: Params,
    pub status: OrderStatus,
    pub pincode: Pincode,
}
