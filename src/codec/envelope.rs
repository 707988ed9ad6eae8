//! Default `bincode` envelope for api replies.

use bincode::{config, decode_from_slice, encode_to_vec};

use super::{ApiReturn, Codec, CodecError};
use crate::{error::RpcError, service::SchemaId};

#[derive(bincode::Encode, bincode::Decode)]
enum ReturnEnvelope {
    Success(Vec<u8>),
    Failure(RpcError),
}

pub(super) fn encode_return<C>(
    codec: &C,
    ret: &ApiReturn<C::Value>,
    schema: &SchemaId,
) -> Result<Vec<u8>, CodecError>
where
    C: Codec + ?Sized,
{
    let envelope = match ret {
        ApiReturn::Success(value) => ReturnEnvelope::Success(codec.encode(value, schema)?),
        ApiReturn::Failure(error) => ReturnEnvelope::Failure(error.clone()),
    };
    encode_to_vec(&envelope, config::standard())
        .map_err(|e| CodecError::new(format!("failed to encode reply envelope: {e}")))
}

pub(super) fn decode_return<C>(
    codec: &C,
    bytes: &[u8],
    schema: &SchemaId,
) -> Result<ApiReturn<C::Value>, CodecError>
where
    C: Codec + ?Sized,
{
    let (envelope, _) = decode_from_slice::<ReturnEnvelope, _>(bytes, config::standard())
        .map_err(|e| CodecError::new(format!("failed to decode reply envelope: {e}")))?;
    match envelope {
        ReturnEnvelope::Success(body) => codec.decode(&body, schema).map(ApiReturn::Success),
        ReturnEnvelope::Failure(error) => Ok(ApiReturn::Failure(error)),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        codec::{ApiReturn, Codec},
        error::{ErrorKind, RpcError},
        service::SchemaId,
        test_helpers::{TestCodec, TestValue},
    };

    #[test]
    fn success_reply_carries_encoded_response() {
        let codec = TestCodec;
        let schema = SchemaId::from("ResLogin");
        let ret = ApiReturn::Success(TestValue::LoginAck { ok: true });
        let bytes = codec.encode_return(&ret, &schema).expect("encode reply");
        assert_eq!(codec.decode_return(&bytes, &schema).expect("decode reply"), ret);
    }

    #[test]
    fn failure_reply_carries_rpc_error() {
        let codec = TestCodec;
        let schema = SchemaId::from("ResLogin");
        let ret = ApiReturn::Failure(RpcError::internal());
        let bytes = codec.encode_return(&ret, &schema).expect("encode reply");
        let ApiReturn::Failure(err) = codec.decode_return(&bytes, &schema).expect("decode reply")
        else {
            panic!("expected failure reply");
        };
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.code(), Some("INTERNAL_ERR"));
    }

    #[test]
    fn response_outside_schema_fails_to_encode() {
        let codec = TestCodec;
        let ret = ApiReturn::Success(TestValue::Notice {
            text: "wrong".into(),
        });
        assert!(codec.encode_return(&ret, &SchemaId::from("ResLogin")).is_err());
    }

    #[test]
    fn garbage_reply_is_rejected() {
        let codec = TestCodec;
        assert!(
            codec
                .decode_return(&[0xFF, 0xFF, 0xFF], &SchemaId::from("ResLogin"))
                .is_err()
        );
    }
}
