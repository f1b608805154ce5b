//! JSON record codec.
//!
//! Every record is written as `{"type": <tag>, "value": <body>}` so stored
//! bytes say what they hold and a tracker can never be read back as a job.

use crate::domain::{BtcMultiSig, CodecError, Job, Tracker};
use crate::ports::{Serializer, Tagged};
use serde::{Deserialize, Serialize};

impl Tagged for Tracker {
    const TAG: &'static str = "custody_tracker";
}

impl Tagged for Job {
    const TAG: &'static str = "custody_job";
}

impl Tagged for BtcMultiSig {
    const TAG: &'static str = "btc_multisig";
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    #[serde(rename = "type")]
    tag: &'static str,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: String,
    value: serde_json::Value,
}

/// `serde_json` implementation of `Serializer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Serializer for JsonCodec {
    fn serialize<T: Tagged>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&EnvelopeRef {
            tag: T::TAG,
            value,
        })
        .map_err(|e| CodecError::Serialize {
            tag: T::TAG,
            reason: e.to_string(),
        })
    }

    fn deserialize<T: Tagged>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize {
                tag: T::TAG,
                reason: e.to_string(),
            })?;
        if envelope.tag != T::TAG {
            return Err(CodecError::TagMismatch {
                expected: T::TAG,
                found: envelope.tag,
            });
        }
        serde_json::from_value(envelope.value).map_err(|e| CodecError::Deserialize {
            tag: T::TAG,
            reason: e.to_string(),
        })
    }
}
