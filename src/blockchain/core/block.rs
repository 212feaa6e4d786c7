//! Ledger blocks: canonical hashing and proof-of-work.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

/// Payload stored in the genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";
/// Stand-in predecessor hash for the genesis block. Never a real digest.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Largest integer a binary64 float represents exactly (2^53).
const MAX_SAFE_FLOAT_INT: f64 = 9_007_199_254_740_992.0;
const MAX_PLAIN_FLOAT: f64 = 1e21;

/// One ledger entry.
///
/// `hash` is derived from the other five fields and every method that
/// changes one of them recomputes it, so fields are only reachable through
/// accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    index: u64,
    timestamp: DateTime<Utc>,
    data: Value,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Build an unmined block (`nonce = 0`). The timestamp is truncated to
    /// millisecond precision, the resolution it is hashed at.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        data: Value,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp: timestamp.trunc_subsecs(3),
            data,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 over `index ++ timestamp ++ canonical(data) ++ previous_hash ++ nonce`,
    /// lowercase hex.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string());
        hasher.update(format_timestamp(&self.timestamp));
        hasher.update(canonical_json(&self.data));
        hasher.update(&self.previous_hash);
        hasher.update(self.nonce.to_string());
        hex::encode(hasher.finalize())
    }

    /// Search nonces until the hash has `difficulty` leading zero hex digits.
    ///
    /// There is no iteration cap and no way to interrupt the search; expected
    /// work is about `16^difficulty` hashes. Returns the number of hashes
    /// computed, which is zero when the current hash already qualifies.
    pub fn mine(&mut self, difficulty: usize) -> u64 {
        let mut attempts = 0;
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;
        }
        attempts
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Plain copy of the visible fields.
    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot::from(self)
    }

    /// Back to the freshly constructed state: nonce 0, hash recomputed.
    pub(crate) fn reset_nonce(&mut self) {
        self.nonce = 0;
        self.hash = self.compute_hash();
    }

    /// Point at a new predecessor and reset the nonce. The result is
    /// content-consistent but generally no longer satisfies any difficulty.
    pub(crate) fn relink(&mut self, previous_hash: String) {
        self.previous_hash = previous_hash;
        self.reset_nonce();
    }

    /// Swap the payload, keeping the nonce.
    pub(crate) fn replace_data(&mut self, data: Value) {
        self.data = data;
        self.hash = self.compute_hash();
    }

    #[cfg(test)]
    pub(crate) fn overwrite_hash(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }
}

/// Serializable view of a [`Block`], used for listings and HTTP responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    pub index: u64,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl From<&Block> for BlockSnapshot {
    fn from(block: &Block) -> Self {
        BlockSnapshot {
            index: block.index,
            timestamp: block.timestamp,
            data: block.data.clone(),
            previous_hash: block.previous_hash.clone(),
            hash: block.hash.clone(),
            nonce: block.nonce,
        }
    }
}

/// True when the first `difficulty` characters of `hash` are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deterministic JSON encoding used as hash input.
///
/// Object keys are sorted at every depth, there is no whitespace, and floats
/// holding an exact integer are written without a fractional part so `1.0`
/// and `1` hash the same.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => out.push_str(&value.to_string()),
        Value::Number(number) => out.push_str(&canonical_number(number)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

fn canonical_number(number: &Number) -> String {
    match number.as_f64() {
        Some(f) if number.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_FLOAT_INT => {
            format!("{}", f as i64)
        }
        // whole numbers below 1e21 are written out in full, never in exponent form
        Some(f) if number.is_f64() && f.fract() == 0.0 && f.abs() < MAX_PLAIN_FLOAT => {
            format!("{:.0}", f)
        }
        _ => number.to_string(),
    }
}

mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(timestamp))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn new_year(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap()
    }

    #[test]
    fn test_known_answer_genesis_hash() {
        let block = Block::new(0, new_year(0), json!(GENESIS_DATA), GENESIS_PREVIOUS_HASH);

        // sha256("02024-01-01T00:00:00.000Z\"Genesis Block\"00")
        assert_eq!(
            block.hash(),
            "1bde3b61d7949bd6836239e1d35cf856cb1808f84f74dd91258add0c4774b0ee"
        );
        assert!(block.is_genesis());
    }

    #[test]
    fn test_known_answer_with_object_and_nonce() {
        let mut block = Block::new(1, new_year(1), json!({"b": [1, "x"], "a": 2}), "abc");
        block.nonce = 7;

        // sha256("12024-01-01T00:00:01.000Z{\"a\":2,\"b\":[1,\"x\"]}abc7")
        assert_eq!(
            block.compute_hash(),
            "f64173c00a14d43377239a033965afed2a7f230e6a0233f8cebda0c703bf281e"
        );
    }

    #[test]
    fn test_hash_matches_fields_after_construction() {
        let block = Block::new(3, Utc::now(), json!({"x": 1}), "prev");
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.hash(), block.compute_hash());
        assert_eq!(block.hash().len(), 64);
        assert!(block.hash().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_timestamp_truncated_to_millis() {
        let precise = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let block = Block::new(1, precise, Value::Null, "p");
        assert_eq!(block.timestamp().timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(format_timestamp(&block.timestamp()), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_canonical_json_ignores_key_order() {
        let mut forward = serde_json::Map::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!({"z": true, "y": null}));
        let mut reverse = serde_json::Map::new();
        reverse.insert("beta".into(), json!({"y": null, "z": true}));
        reverse.insert("alpha".into(), json!(1));

        let a = canonical_json(&Value::Object(forward));
        let b = canonical_json(&Value::Object(reverse));
        assert_eq!(a, b);
        assert_eq!(a, r#"{"alpha":1,"beta":{"y":null,"z":true}}"#);
    }

    #[test]
    fn test_canonical_json_numbers_and_strings() {
        assert_eq!(canonical_json(&json!(1.0)), "1");
        assert_eq!(canonical_json(&json!(-2.0)), "-2");
        assert_eq!(canonical_json(&json!(1.5)), "1.5");
        assert_eq!(canonical_json(&json!(42)), "42");
        assert_eq!(canonical_json(&json!(1e20)), "100000000000000000000");
        assert_eq!(canonical_json(&json!(-1e20)), "-100000000000000000000");
        assert_eq!(canonical_json(&json!("a\"b")), r#""a\"b""#);
        assert_eq!(canonical_json(&json!([1, [2, {}]])), "[1,[2,{}]]");
    }

    #[test]
    fn test_mine_zero_difficulty_is_noop() {
        let mut block = Block::new(1, Utc::now(), json!("payload"), "prev");
        let before = block.hash().to_string();

        let attempts = block.mine(0);

        assert_eq!(attempts, 0);
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.hash(), before);
    }

    #[test]
    fn test_mine_meets_target() {
        let mut block = Block::new(1, Utc::now(), json!({"x": 1}), "prev");
        block.mine(2);

        assert!(block.hash().starts_with("00"));
        assert!(block.meets_difficulty(2));
        assert_eq!(block.hash(), block.compute_hash());
    }

    #[test]
    fn test_meets_difficulty_bounds() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0a0b", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_relink_resets_nonce() {
        let mut block = Block::new(1, Utc::now(), json!(1), "old");
        block.mine(1);

        block.relink("new".to_string());

        assert_eq!(block.nonce(), 0);
        assert_eq!(block.previous_hash(), "new");
        assert_eq!(block.hash(), block.compute_hash());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let block = Block::new(0, new_year(0), json!(GENESIS_DATA), GENESIS_PREVIOUS_HASH);
        let json = serde_json::to_value(block.snapshot()).unwrap();

        assert_eq!(json["index"], 0);
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
        assert_eq!(json["data"], GENESIS_DATA);
        assert_eq!(json["previousHash"], "0");
        assert_eq!(json["hash"], block.hash());
        assert_eq!(json["nonce"], 0);

        let back: BlockSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, block.snapshot());
    }
}
